use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("ZIP archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No source data found at {0}")]
    MissingSourceFile(PathBuf),

    #[error("Key column '{0}' not present in either snapshot")]
    MissingKeyColumn(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Publish failed: {message}")]
    Publish { message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
