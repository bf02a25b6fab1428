pub mod bootstrap;
pub mod forward;
pub mod probe;
pub mod source;

pub use source::MigrationSource;

use log::info;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::MatchbookError;

/// Handle to the open store: a small connection pool over one SQLite file.
///
/// Cloned into every consumer that needs store access; there is no
/// process-wide singleton connection.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    pub fn open(db_path: &str) -> Result<Self, MatchbookError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        info!("Database opened at: {}", db_path);
        Ok(Self { pool })
    }

    pub fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, MatchbookError> {
        Ok(self.pool.get()?)
    }
}
