//! Session store — process-wide authentication state.
//!
//! ARCHITECTURE
//! ============
//! One explicitly-constructed store owns the (token, user) pair for the
//! lifetime of the process. Remote calls go through the gateway client;
//! durable persistence goes through the storage capability; navigation goes
//! through the [`Navigator`] capability so the view layer keeps ownership of
//! actual redirects. The store also consumes the gateway's session event
//! channel: a 401 anywhere invalidates the session out-of-band.
//!
//! CONCURRENCY
//! ===========
//! Mutating operations are not mutually exclusive. Two overlapping calls
//! resolve in arrival order and the last response wins, in memory and in
//! storage alike. Each response is applied atomically under the state lock,
//! so the durable copy and the in-memory copy never disagree for longer
//! than one pending operation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, SessionEvent, SessionEvents};
use crate::error::ApiError;
use crate::storage::{self, Storage};
use crate::types::{LoginRequest, RegisterRequest, UpdateProfileRequest, User};

/// Where the session store sends users whose credentials were rejected.
pub const LOGIN_PATH: &str = "/login";

/// Session lifecycle states.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Process start; `restore` has not run yet.
    Uninitialized,
    /// `restore` is validating stored credentials against the backend.
    Restoring,
    /// A user is signed in.
    Authenticated(User),
    /// No user is signed in. Re-entered on logout or session expiry.
    Anonymous,
}

/// Capability for client-side navigation, owned by the view layer.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Default navigator for hosts without a view layer attached: records the
/// intent in the log and nothing else.
#[derive(Debug, Default)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, path: &str) {
        info!(path, "navigation requested");
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Single source of truth for "who is logged in".
pub struct SessionStore {
    client: Arc<ApiClient>,
    storage: Arc<dyn Storage>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<SessionState>,
    in_flight: AtomicUsize,
}

impl SessionStore {
    #[must_use]
    pub fn new(client: Arc<ApiClient>, storage: Arc<dyn Storage>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            client,
            storage,
            navigator,
            state: Mutex::new(SessionState::Uninitialized),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    /// The signed-in user, if any. Consumers must check this rather than
    /// assume authentication from `is_loading` being false.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        match &*self.lock_state() {
            SessionState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    /// True exactly while restoring or while a mutating session call is in
    /// flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(&*self.lock_state(), SessionState::Restoring) || self.in_flight.load(Ordering::SeqCst) > 0
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Restore the session from durable storage, validating any stored token
    /// against the backend. Runs at first mount, and again after an
    /// out-of-band invalidation; it always re-derives from storage rather
    /// than trusting in-memory state.
    pub async fn restore(&self) {
        *self.lock_state() = SessionState::Restoring;

        let Some((_token, cached)) = storage::read_credentials(self.storage.as_ref()) else {
            debug!("no stored credentials; session is anonymous");
            *self.lock_state() = SessionState::Anonymous;
            return;
        };

        match self.client.get_current_user().await {
            Ok(user) => {
                debug!(username = %user.username, "session restored");
                *self.lock_state() = SessionState::Authenticated(user);
            }
            Err(e) => {
                warn!(error = %e, username = %cached.username, "stored token failed validation; clearing session");
                storage::clear_credentials(self.storage.as_ref());
                *self.lock_state() = SessionState::Anonymous;
            }
        }
    }

    /// Consume the gateway's session events on a background task. On expiry:
    /// clear the credential pair, force `Anonymous`, and ask the navigator
    /// for the sign-in page — once per event.
    pub fn spawn_expiry_listener(self: &Arc<Self>, mut events: SessionEvents) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SessionEvent::Expired => store.invalidate(),
                }
            }
        })
    }

    fn invalidate(&self) {
        info!("session expired; clearing credentials");
        {
            let mut state = self.lock_state();
            storage::clear_credentials(self.storage.as_ref());
            *state = SessionState::Anonymous;
        }
        self.navigator.navigate(LOGIN_PATH);
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Sign in. On success the returned token and user snapshot are
    /// persisted together and the store becomes `Authenticated`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault; state and
    /// storage are left untouched on failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let credentials = LoginRequest { email: email.to_owned(), password: password.to_owned() };
        let _guard = self.begin_op();
        let response = self.client.login(&credentials).await?;
        self.apply_credentials(&response.token, response.user.clone());
        Ok(response.user)
    }

    /// Create an account and sign in, with the same persistence behavior as
    /// `login`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault; state and
    /// storage are left untouched on failure.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let _guard = self.begin_op();
        let response = self.client.register(request).await?;
        self.apply_credentials(&response.token, response.user.clone());
        Ok(response.user)
    }

    /// Sign out. The remote call is best-effort; locally the store always
    /// clears storage and reaches `Anonymous`, and calling this while
    /// already anonymous is a harmless no-op that still clears storage.
    pub async fn logout(&self) {
        self.client.logout().await;
        let mut state = self.lock_state();
        storage::clear_credentials(self.storage.as_ref());
        *state = SessionState::Anonymous;
        debug!("session signed out");
    }

    /// Update the profile. The backend's returned user replaces the current
    /// snapshot wholesale, in memory and in storage.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on any transport or backend fault; state and
    /// storage are left untouched on failure.
    pub async fn update_profile(&self, update: &UpdateProfileRequest) -> Result<User, ApiError> {
        let _guard = self.begin_op();
        let user = self.client.update_profile(update).await?;
        {
            let mut state = self.lock_state();
            storage::store_user_snapshot(self.storage.as_ref(), &user);
            *state = SessionState::Authenticated(user.clone());
        }
        Ok(user)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Apply a fresh (token, user) pair atomically: storage and memory are
    /// written under the same lock acquisition.
    fn apply_credentials(&self, token: &str, user: User) {
        let mut state = self.lock_state();
        storage::store_credentials(self.storage.as_ref(), token, &user);
        *state = SessionState::Authenticated(user);
    }

    fn begin_op(&self) -> OpGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        OpGuard { counter: &self.in_flight }
    }
}

/// Decrements the in-flight counter when a mutating operation finishes,
/// success or fault alike.
struct OpGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
