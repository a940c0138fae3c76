pub mod batch;
pub mod config;
pub mod delay_manager;
pub mod error;
pub mod export;
pub mod extractor;
pub mod input_loader;
pub mod logger;
pub mod orchestrator;
pub mod scraper;
pub mod search_engine;
pub mod store;
pub mod validator;

#[cfg(test)]
mod test_support;

// Exporting types for convenience
pub use batch::{BatchDriver, BatchReport, ExtractedRow, LogProgress, ProgressSink};
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use extractor::Extractor;
pub use orchestrator::{KeywordSearch, KeywordSearchOutcome, SearchHit};
pub use scraper::{PageExtractionResult, PageSource, Scraper};
pub use search_engine::{SearchBackend, SearchEngine};
pub use store::{EmailRecord, EmailStore, InsertOutcome, NewEmail, QuotaUsage, RecordQuery};
pub use validator::is_valid_email;
