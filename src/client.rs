//! Gateway client — single point of egress to the task-management backend.
//!
//! ARCHITECTURE
//! ============
//! Each method is a stateless function of (path, params/body) → typed result
//! or [`ApiError`]. Cross-cutting concerns are applied uniformly in
//! `dispatch`: the credential token is read from durable storage immediately
//! before every send and attached as a bearer header, and any 401 emits one
//! [`SessionEvent::Expired`] on the session channel before the fault
//! propagates to the caller. The transport layer itself never touches
//! storage writes or navigation; the session store owns those reactions.
//!
//! ERROR HANDLING
//! ==============
//! No retry and no timeout exist at this layer. The only swallowed fault is
//! the best-effort remote logout.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::storage::{Storage, TOKEN_KEY};
use crate::types::{
    Analytics, AuthResponse, Category, CreateCategoryRequest, CreateListRequest, CreateTaskRequest, ListQuery,
    LoginRequest, Paginated, Period, RegisterRequest, SearchQuery, SearchResults, Task, TaskQuery, TodoList,
    TokenResponse, UpdateProfileRequest, UpdateTaskRequest, User,
};

/// Out-of-band notifications from the transport layer to the session store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend rejected the current credentials; the session must be
    /// invalidated. Emitted exactly once per rejected response.
    Expired,
}

/// Receiving half of the session event channel, handed to the session store.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

// =============================================================================
// CLIENT
// =============================================================================

/// Typed HTTP client for every backend endpoint family.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    storage: Arc<dyn Storage>,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ApiClient {
    /// Build a client against a fixed base address. Returns the client and
    /// the session event stream a session store should consume.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(base_url: impl Into<String>, storage: Arc<dyn Storage>) -> Result<(Self, SessionEvents), ApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;

        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok((Self { http, base_url, storage, session_tx }, session_rx))
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http.request(method, format!("{}{path}", self.base_url))
    }

    /// Send one request: attach the bearer token when present, classify any
    /// non-2xx response, and surface 401s on the session channel.
    async fn dispatch(&self, req: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let req = match self.storage.get(TOKEN_KEY) {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        let request = req.build().map_err(|e| ApiError::Network(e.to_string()))?;
        debug!(method = %request.method(), url = %request.url(), "dispatching request");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ApiError::Network(e.to_string()))?;

        if (200..300).contains(&status) {
            return Ok(text);
        }

        let fault = ApiError::from_response(status, &text);
        if fault.is_authentication_rejected() {
            debug!(status, "authentication rejected; notifying session store");
            if self.session_tx.send(SessionEvent::Expired).is_err() {
                warn!("session event channel closed; expiry notification dropped");
            }
        }
        Err(fault)
    }

    async fn execute<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let text = self.dispatch(req).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn execute_no_content(&self, req: reqwest::RequestBuilder) -> Result<(), ApiError> {
        self.dispatch(req).await.map(|_| ())
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// Register a new account, returning the user and a fresh token.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.execute(self.request(Method::POST, "/auth/register").json(request)).await
    }

    /// Exchange credentials for a user and token.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault; bad
    /// credentials surface as [`ApiError::AuthenticationRejected`].
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.execute(self.request(Method::POST, "/auth/login").json(credentials)).await
    }

    /// Obtain a fresh token for the current session.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn refresh_token(&self) -> Result<TokenResponse, ApiError> {
        self.execute(self.request(Method::POST, "/auth/refresh")).await
    }

    /// Notify the backend the session is ending. Best-effort: a failed call
    /// is logged and swallowed, since caller-side cleanup belongs to the
    /// session store, not this client.
    pub async fn logout(&self) {
        if let Err(e) = self.execute_no_content(self.request(Method::POST, "/auth/logout")).await {
            debug!(error = %e, "remote logout failed; ignored");
        }
    }

    // =========================================================================
    // USERS
    // =========================================================================

    /// Fetch the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn get_current_user(&self) -> Result<User, ApiError> {
        self.execute(self.request(Method::GET, "/users/me")).await
    }

    /// Apply a partial profile update; the backend returns the full user.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn update_profile(&self, update: &UpdateProfileRequest) -> Result<User, ApiError> {
        self.execute(self.request(Method::PUT, "/users/me").json(update)).await
    }

    // =========================================================================
    // LISTS
    // =========================================================================

    /// Paginated fetch of the user's lists.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn get_lists(&self, query: &ListQuery) -> Result<Paginated<TodoList>, ApiError> {
        self.execute(self.request(Method::GET, "/lists").query(query)).await
    }

    /// Create a list. Task counters start at zero server-side.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn create_list(&self, request: &CreateListRequest) -> Result<TodoList, ApiError> {
        self.execute(self.request(Method::POST, "/lists").json(request)).await
    }

    /// Fetch one list by id.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn get_list(&self, id: Uuid) -> Result<TodoList, ApiError> {
        self.execute(self.request(Method::GET, &format!("/lists/{id}"))).await
    }

    /// Replace a list's attributes.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn update_list(&self, id: Uuid, request: &CreateListRequest) -> Result<TodoList, ApiError> {
        self.execute(self.request(Method::PUT, &format!("/lists/{id}")).json(request)).await
    }

    /// Delete a list. No result body.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn delete_list(&self, id: Uuid) -> Result<(), ApiError> {
        self.execute_no_content(self.request(Method::DELETE, &format!("/lists/{id}"))).await
    }

    // =========================================================================
    // TASKS
    // =========================================================================

    /// Paginated fetch of tasks within one list.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn get_tasks(&self, list_id: Uuid, query: &TaskQuery) -> Result<Paginated<Task>, ApiError> {
        self.execute(self.request(Method::GET, &format!("/lists/{list_id}/tasks")).query(query)).await
    }

    /// Create a task in a list.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn create_task(&self, list_id: Uuid, request: &CreateTaskRequest) -> Result<Task, ApiError> {
        self.execute(self.request(Method::POST, &format!("/lists/{list_id}/tasks")).json(request)).await
    }

    /// Fetch one task by id.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn get_task(&self, id: Uuid) -> Result<Task, ApiError> {
        self.execute(self.request(Method::GET, &format!("/tasks/{id}"))).await
    }

    /// Apply a partial task update.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn update_task(&self, id: Uuid, request: &UpdateTaskRequest) -> Result<Task, ApiError> {
        self.execute(self.request(Method::PUT, &format!("/tasks/{id}")).json(request)).await
    }

    /// Delete a task. No result body.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn delete_task(&self, id: Uuid) -> Result<(), ApiError> {
        self.execute_no_content(self.request(Method::DELETE, &format!("/tasks/{id}"))).await
    }

    /// Flip a task's completion state server-side. The returned task carries
    /// the authoritative new state; nothing is computed locally, so the
    /// result may contradict the caller's optimistic assumption.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn toggle_task(&self, id: Uuid) -> Result<Task, ApiError> {
        self.execute(self.request(Method::PATCH, &format!("/tasks/{id}/toggle"))).await
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    /// Fetch all of the user's categories (unpaginated).
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn get_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.execute(self.request(Method::GET, "/categories")).await
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn create_category(&self, request: &CreateCategoryRequest) -> Result<Category, ApiError> {
        self.execute(self.request(Method::POST, "/categories").json(request)).await
    }

    /// Fetch one category by id.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn get_category(&self, id: Uuid) -> Result<Category, ApiError> {
        self.execute(self.request(Method::GET, &format!("/categories/{id}"))).await
    }

    /// Replace a category's attributes.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn update_category(&self, id: Uuid, request: &CreateCategoryRequest) -> Result<Category, ApiError> {
        self.execute(self.request(Method::PUT, &format!("/categories/{id}")).json(request)).await
    }

    /// Delete a category. No result body.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn delete_category(&self, id: Uuid) -> Result<(), ApiError> {
        self.execute_no_content(self.request(Method::DELETE, &format!("/categories/{id}"))).await
    }

    // =========================================================================
    // SEARCH + ANALYTICS
    // =========================================================================

    /// Search tasks and lists with one query string.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults, ApiError> {
        self.execute(self.request(Method::GET, "/search").query(query)).await
    }

    /// Fetch server-computed aggregate statistics for a period.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn get_analytics(&self, period: Option<Period>) -> Result<Analytics, ApiError> {
        let mut req = self.request(Method::GET, "/analytics");
        if let Some(period) = period {
            req = req.query(&[("period", period)]);
        }
        self.execute(req).await
    }

    // =========================================================================
    // BULK
    // =========================================================================

    /// Create several tasks under one list in a single round trip.
    /// Partial-failure semantics belong to the backend; the caller sees one
    /// success or one fault.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn bulk_create_tasks(&self, list_id: Uuid, tasks: &[CreateTaskRequest]) -> Result<Vec<Task>, ApiError> {
        let body = BulkCreateRequest { list_id, tasks };
        self.execute(self.request(Method::POST, "/tasks/bulk").json(&body)).await
    }

    /// Apply one shared update payload to a set of tasks in a single round
    /// trip.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn bulk_update_tasks(
        &self,
        task_ids: &[Uuid],
        updates: &UpdateTaskRequest,
    ) -> Result<Vec<Task>, ApiError> {
        let body = BulkUpdateRequest { task_ids, updates };
        self.execute(self.request(Method::PATCH, "/tasks/bulk/update").json(&body)).await
    }

    /// Delete a set of tasks in a single round trip.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault.
    pub async fn bulk_delete_tasks(&self, task_ids: &[Uuid]) -> Result<(), ApiError> {
        let body = BulkDeleteRequest { task_ids };
        self.execute_no_content(self.request(Method::DELETE, "/tasks/bulk/delete").json(&body)).await
    }
}

// =============================================================================
// BULK WIRE TYPES
// =============================================================================

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkCreateRequest<'a> {
    list_id: Uuid,
    tasks: &'a [CreateTaskRequest],
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkUpdateRequest<'a> {
    task_ids: &'a [Uuid],
    updates: &'a UpdateTaskRequest,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkDeleteRequest<'a> {
    task_ids: &'a [Uuid],
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
