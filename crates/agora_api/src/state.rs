//! Shared application state.
//!
//! # Invariants
//! - One SQLite connection serves the whole process; access is serialized
//!   by a mutex and always happens on tokio's blocking pool.

use crate::error::{ApiError, ApiResult};
use agora_core::ServiceResult;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs storage work under the connection lock on the blocking pool.
    pub async fn run<T, F>(&self, work: F) -> ApiResult<T>
    where
        F: FnOnce(&mut Connection) -> ServiceResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let outcome = tokio::task::spawn_blocking(move || {
            let mut conn = db.lock();
            work(&mut *conn)
        })
        .await
        .map_err(|err| ApiError::Internal(format!("storage task failed: {err}")))?;
        outcome.map_err(ApiError::from)
    }
}
