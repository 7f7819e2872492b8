mod database;
pub use database::DbConnection;

pub mod entity;
pub mod notify;
pub mod progress;
pub mod quiz_format;
pub mod seed;

mod error;
pub use error::{DatabaseError, DatabaseResult};

mod repo;
pub use repo::{CrudRepository, Page, PaginatableRepository, ResourceType, ResourceTyped};

use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct ModelManager {
    database: DbConnection,
}

impl ModelManager {
    pub fn new(conn: DbConnection) -> Self {
        Self { database: conn }
    }

    pub fn executor(&self) -> &SqlitePool {
        self.database.pool()
    }
}
