use rusqlite::Error as RusqliteError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchbookError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error), // Converts io::Error into MatchbookError automatically

    #[error("Database error: {0}")]
    DatabaseError(#[from] RusqliteError), // Converts rusqlite::Error automatically

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}
