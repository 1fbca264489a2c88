use crate::database::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid filter pattern: {0}")]
    InvalidFilter(String),
}
