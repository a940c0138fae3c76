use indexmap::IndexSet;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use scraper::Html;

use crate::config::HttpConfig;
use crate::error::{AppError, Result};
use crate::extractor::{visible_text, Extractor};

/// What one visited page yielded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtractionResult {
    pub emails: IndexSet<String>,
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
}

impl PageExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Anything that can turn a URL into extracted contacts. Failures are
/// swallowed here; callers only ever see fewer results.
pub trait PageSource {
    fn extract(&self, url: &str) -> PageExtractionResult;
}

pub struct Scraper {
    client: Client,
    extractor: Extractor,
}

impl Scraper {
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(http.user_agent.as_str())
            .timeout(http.timeout())
            .redirect(Policy::limited(10))
            .default_headers(headers)
            .cookie_store(true)
            .build()?;

        Ok(Scraper {
            client,
            extractor: Extractor::new(),
        })
    }

    /// Fetches and extracts one page, keeping the failure visible.
    pub fn try_extract(&self, url: &str) -> Result<PageExtractionResult> {
        info!("Visiting: {}", url);
        let markup = self.visit_page(url)?;
        Ok(self.extract_from_markup(&markup))
    }

    pub fn extract_from_markup(&self, markup: &str) -> PageExtractionResult {
        let document = Html::parse_document(markup);
        let text = visible_text(&document);

        let result = PageExtractionResult {
            emails: self.extractor.extract_emails(&text),
            linkedin: self.extractor.extract_linkedin(markup),
            facebook: self.extractor.extract_facebook(markup),
        };
        debug!(
            "Extracted {} email(s), linkedin={}, facebook={}",
            result.emails.len(),
            result.linkedin.is_some(),
            result.facebook.is_some()
        );
        result
    }

    fn visit_page(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send()?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(AppError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(resp.text()?)
    }
}

impl PageSource for Scraper {
    fn extract(&self, url: &str) -> PageExtractionResult {
        match self.try_extract(url) {
            Ok(result) => result,
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                PageExtractionResult::default()
            }
        }
    }
}
