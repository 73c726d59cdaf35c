// Repository layer — each domain lives in its own file with `impl MessageRepository`.

use sqlx::sqlite::SqlitePool;

mod history;

#[cfg(test)]
pub(crate) mod test_helpers;

#[derive(Clone)]
pub struct MessageRepository {
    pub(crate) pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
