//! `PgStore` — the Postgres-backed implementation of the engine's store
//! traits. The trait impls themselves live under [`crate::repository`],
//! one module per table.

use engine::stores::StoreError;

use crate::DbPool;

/// One handle over the shared pool; cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Bundle this store into the engine's [`engine::Stores`] handle.
    pub fn into_stores(self) -> engine::Stores {
        let store = std::sync::Arc::new(self);
        engine::Stores {
            campaigns: store.clone(),
            leads: store.clone(),
            accounts: store.clone(),
            steps: store,
        }
    }
}

/// Map a sqlx failure onto the engine's backend-agnostic error.
pub(crate) fn store_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Backend(other.to_string()),
    }
}

/// Row-to-domain conversion failure.
pub(crate) fn decode_err(detail: String) -> StoreError {
    StoreError::Backend(format!("row decode failed: {detail}"))
}
