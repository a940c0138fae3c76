use indexmap::IndexSet;
use log::{info, warn};
use serde::Serialize;

use crate::orchestrator::KeywordSearch;
use crate::scraper::PageSource;
use crate::search_engine::SearchBackend;
use crate::store::{EmailStore, NewEmail};

/// A newly stored email, in export column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRow {
    pub keyword: String,
    pub email: String,
    pub website: Option<String>,
    pub source: String,
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub inserted: Vec<ExtractedRow>,
    /// Some insert wiped the store because the size ceiling was hit
    pub storage_limit_reached: bool,
    pub keywords_processed: usize,
}

/// Receives run progress. Every method has a no-op default.
pub trait ProgressSink {
    fn on_keyword_start(&mut self, _keyword: &str, _index: usize, _total: usize) {}

    /// Fraction of keywords finished, reported after each keyword.
    fn on_progress(&mut self, _fraction: f64) {}

    fn on_keyword_done(&mut self, _keyword: &str, _new_records: usize) {}

    fn on_storage_limit(&mut self) {}
}

impl ProgressSink for () {}

/// Writes progress to the log.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_keyword_start(&mut self, keyword: &str, index: usize, total: usize) {
        info!("Processing {} / {} : {}", index + 1, total, keyword);
    }

    fn on_progress(&mut self, fraction: f64) {
        info!("Progress: {:.0}%", fraction * 100.0);
    }

    fn on_keyword_done(&mut self, keyword: &str, new_records: usize) {
        if new_records == 0 {
            info!("No new emails for '{}'", keyword);
        } else {
            info!("Stored {} new email(s) for '{}'", new_records, keyword);
        }
    }

    fn on_storage_limit(&mut self) {
        warn!("DB limit reached, old data auto-cleared");
    }
}

pub struct BatchDriver<'a, S, P> {
    search: &'a KeywordSearch<S, P>,
    store: &'a EmailStore,
}

impl<'a, S: SearchBackend, P: PageSource> BatchDriver<'a, S, P> {
    pub fn new(search: &'a KeywordSearch<S, P>, store: &'a EmailStore) -> Self {
        BatchDriver { search, store }
    }

    /// Runs every distinct keyword in input order and returns the rows that
    /// were actually new to the store.
    pub fn run(&self, keywords: &[String], progress: &mut dyn ProgressSink) -> BatchReport {
        let keywords: IndexSet<&str> = keywords.iter().map(String::as_str).collect();
        let total = keywords.len();
        let mut report = BatchReport::default();

        for (i, &keyword) in keywords.iter().enumerate() {
            progress.on_keyword_start(keyword, i, total);

            let mut new_records = 0;
            for hit in self.search.search(keyword) {
                if hit.email.is_empty() || hit.source_url.is_empty() {
                    continue;
                }

                let outcome = self.store.insert(&NewEmail {
                    keyword,
                    email: &hit.email,
                    source: &hit.source_url,
                    website: hit.website.as_deref(),
                    linkedin: hit.linkedin.as_deref(),
                    facebook: hit.facebook.as_deref(),
                });

                if outcome.truncated {
                    report.storage_limit_reached = true;
                    progress.on_storage_limit();
                }

                if outcome.inserted {
                    new_records += 1;
                    report.inserted.push(ExtractedRow {
                        keyword: keyword.to_string(),
                        email: hit.email,
                        website: hit.website,
                        source: hit.source_url,
                        linkedin: hit.linkedin,
                        facebook: hit.facebook,
                    });
                }
            }

            report.keywords_processed = i + 1;
            progress.on_keyword_done(keyword, new_records);
            progress.on_progress((i + 1) as f64 / total as f64);
        }

        info!(
            "Batch completed. {} keyword(s), {} new email(s).",
            report.keywords_processed,
            report.inserted.len()
        );
        report
    }
}
