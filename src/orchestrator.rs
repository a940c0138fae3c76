use indexmap::IndexMap;
use log::{info, warn};
use serde::Serialize;
use std::time::Duration;

use crate::config::AppConfig;
use crate::delay_manager;
use crate::error::AppError;
use crate::extractor::website_from_email;
use crate::scraper::{PageExtractionResult, PageSource};
use crate::search_engine::SearchBackend;

/// One unique email discovered for a keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub email: String,
    pub website: Option<String>,
    pub source_url: String,
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
}

/// Hits plus the backend error that cut the search short, if any.
#[derive(Debug, Default)]
pub struct KeywordSearchOutcome {
    pub hits: Vec<SearchHit>,
    pub error: Option<AppError>,
}

pub struct KeywordSearch<S, P> {
    backend: S,
    pages: P,
    max_results: usize,
    page_delay: Duration,
    search_delay: Duration,
}

impl<S: SearchBackend, P: PageSource> KeywordSearch<S, P> {
    pub fn new(backend: S, pages: P, config: &AppConfig) -> Self {
        KeywordSearch {
            backend,
            pages,
            max_results: config.search.max_results,
            page_delay: config.delays.page_delay(),
            search_delay: config.delays.search_delay(),
        }
    }

    /// Unique hits for `keyword`; never fails, a broken search just means
    /// fewer (or no) hits.
    pub fn search(&self, keyword: &str) -> Vec<SearchHit> {
        self.search_detailed(keyword).hits
    }

    pub fn search_detailed(&self, keyword: &str) -> KeywordSearchOutcome {
        let query = format!("{} contact email", keyword);
        let mut found: IndexMap<String, SearchHit> = IndexMap::new();
        let mut error = None;

        match self.backend.search(&query, self.max_results) {
            Ok(urls) => {
                let urls = urls
                    .into_iter()
                    .filter(|u| !u.trim().is_empty())
                    .take(self.max_results);

                for url in urls {
                    let (source_url, page) = self.visit_with_fallback(&url);

                    for email in page.emails {
                        if found.contains_key(&email) {
                            continue;
                        }
                        let hit = SearchHit {
                            website: website_from_email(&email),
                            email: email.clone(),
                            source_url: source_url.clone(),
                            linkedin: page.linkedin.clone(),
                            facebook: page.facebook.clone(),
                        };
                        found.insert(email, hit);
                    }

                    delay_manager::page_delay(self.page_delay);
                }
            }
            Err(e) => {
                warn!("Search for '{}' failed: {}", keyword, e);
                error = Some(e);
            }
        }

        delay_manager::search_delay(self.search_delay);

        info!("Keyword '{}': {} unique email(s)", keyword, found.len());
        KeywordSearchOutcome {
            hits: found.into_values().collect(),
            error,
        }
    }

    /// Visits `url`; when it has no emails, tries its `/contact` page once.
    fn visit_with_fallback(&self, url: &str) -> (String, PageExtractionResult) {
        let page = self.pages.extract(url);
        if !page.is_empty() {
            return (url.to_string(), page);
        }

        let contact_url = contact_page_url(url);
        let contact_page = self.pages.extract(&contact_url);
        if contact_page.is_empty() {
            (url.to_string(), page)
        } else {
            (contact_url, contact_page)
        }
    }
}

pub fn contact_page_url(url: &str) -> String {
    format!("{}/contact", url.trim_end_matches('/'))
}
