//! Error types shared by the extractor library.
//!
//! Most boundaries (page fetches, web searches, store inserts) collapse these
//! into "no results" for callers that only want the happy path, but the
//! `try_*` variants hand them back so the difference stays visible.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Transport level failure (DNS, connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with something other than 200
    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Search backend error: {0}")]
    Search(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Excel(String),

    /// Input file has no usable `keyword` column
    #[error("Input file must contain a column named `{0}`")]
    MissingColumn(String),

    #[error("Unsupported input file: {0}")]
    UnsupportedInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

impl AppError {
    pub fn search(msg: impl Into<String>) -> Self {
        Self::Search(msg.into())
    }

    pub fn excel(msg: impl Into<String>) -> Self {
        Self::Excel(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
