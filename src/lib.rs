//! Client core for the task-management backend: a typed gateway client plus
//! a session store with an init/restore/teardown lifecycle.
//!
//! ARCHITECTURE
//! ============
//! [`client::ApiClient`] is the single point of egress — it injects the
//! bearer token read from the [`storage::Storage`] capability before every
//! call, classifies faults uniformly, and reports 401s on a session event
//! channel. [`session::SessionStore`] consumes that channel, owns the
//! (token, user) pair, and exposes login/register/logout/update-profile to
//! the view layer. Navigation stays behind [`session::Navigator`] so the
//! transport layer never reaches into the UI.

pub mod client;
pub mod error;
pub mod session;
pub mod storage;
pub mod types;


pub use client::{ApiClient, SessionEvent, SessionEvents};
pub use error::ApiError;
pub use session::{LoggingNavigator, Navigator, SessionState, SessionStore, LOGIN_PATH};
pub use storage::{FileStorage, MemoryStorage, Storage};
