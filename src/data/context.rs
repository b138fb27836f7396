use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Shared handle to the database and the write locks layered over it.
#[derive(Clone)]
pub struct DbContext {
    pool: PgPool,
    equipment_writes: Arc<Mutex<()>>,
}

impl DbContext {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            equipment_writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Serializes writes to the shared equipment catalog across concurrent region runs.
    pub async fn lock_equipment(&self) -> MutexGuard<'_, ()> {
        self.equipment_writes.lock().await
    }
}
