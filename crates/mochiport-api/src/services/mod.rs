//! Business rules between the HTTP handlers and the store. Each service owns
//! validation for its entity and publishes realtime events after writes.

pub mod chat;
pub mod conversations;
pub mod drafts;
pub mod reminders;

use std::sync::Arc;

use tracing::error;

use mochiport_db::Store;

use crate::error::ApiError;

/// Run a store call on the blocking pool.
pub(crate) async fn run_blocking<F, T>(store: &Arc<dyn Store>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn Store) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Store(anyhow::anyhow!("background task failed"))
        })?
        .map_err(ApiError::Store)
}
