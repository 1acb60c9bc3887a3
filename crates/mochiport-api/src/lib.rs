//! HTTP surface of mochiport: axum handlers, the service layer they call,
//! the AI client and request authentication.

pub mod ai;
pub mod chat;
pub mod conversations;
pub mod drafts;
pub mod error;
pub mod health;
pub mod middleware;
pub mod realtime;
pub mod reminders;
pub mod router;
pub mod services;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::{AppState, AppStateInner};
