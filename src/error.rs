use std::path::PathBuf;

use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    /// Missing or empty settings, e.g. no database URL
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("could not connect to database: {0}")]
    Connection(#[source] DbErr),

    /// A declaration refers to rows that are missing or ambiguous
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl SeedError {
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        SeedError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type SeedResult<T> = Result<T, SeedError>;
