//! Stand-ins for the search backend and page fetcher used across unit tests.

use indexmap::IndexSet;
use std::cell::RefCell;
use std::collections::HashMap;

use crate::config::{AppConfig, DelayConfig};
use crate::error::{AppError, Result};
use crate::scraper::{PageExtractionResult, PageSource};
use crate::search_engine::SearchBackend;

/// Default config without throttling delays.
pub fn quiet_config() -> AppConfig {
    AppConfig {
        delays: DelayConfig::none(),
        ..AppConfig::default()
    }
}

pub fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

/// Returns the same URL list for every query, or fails when `fail` is set.
pub struct StubSearch {
    pub urls: Vec<String>,
    pub fail: bool,
}

impl SearchBackend for StubSearch {
    fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<String>> {
        if self.fail {
            return Err(AppError::search("backend down"));
        }
        Ok(self.urls.clone())
    }
}

/// Routes queries containing a keyword to its own URL list.
#[derive(Default)]
pub struct KeywordRoutedSearch {
    pub routes: Vec<(String, Vec<String>)>,
    pub queries: RefCell<Vec<String>>,
}

impl SearchBackend for KeywordRoutedSearch {
    fn search(&self, query: &str, _max_results: usize) -> Result<Vec<String>> {
        self.queries.borrow_mut().push(query.to_string());
        Ok(self
            .routes
            .iter()
            .find(|(keyword, _)| query.starts_with(keyword.as_str()))
            .map(|(_, urls)| urls.clone())
            .unwrap_or_default())
    }
}

/// Canned pages keyed by URL; unknown URLs behave like failed fetches.
#[derive(Default)]
pub struct StubPages {
    pub pages: HashMap<String, PageExtractionResult>,
    pub visited: RefCell<Vec<String>>,
}

impl StubPages {
    pub fn with_page(mut self, url: &str, emails: &[&str], linkedin: Option<&str>) -> Self {
        self.pages.insert(
            url.to_string(),
            PageExtractionResult {
                emails: emails.iter().map(|e| e.to_string()).collect::<IndexSet<_>>(),
                linkedin: linkedin.map(str::to_string),
                facebook: None,
            },
        );
        self
    }
}

impl PageSource for StubPages {
    fn extract(&self, url: &str) -> PageExtractionResult {
        self.visited.borrow_mut().push(url.to_string());
        self.pages.get(url).cloned().unwrap_or_default()
    }
}
