use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Entity directory error: {0}")]
    DirectoryFetch(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Export error for {path}: {message}")]
    Export { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub(crate) fn export(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        AppError::Export {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
