use indexmap::IndexSet;
use log::{info, warn};
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::config::{HttpConfig, SearchConfig};
use crate::error::{AppError, Result};

/// Web search returning candidate result URLs in rank order.
pub trait SearchBackend {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>>;
}

/// Scrapes the DuckDuckGo HTML endpoint.
pub struct SearchEngine {
    client: Client,
    endpoint: String,
}

impl SearchEngine {
    pub fn new(http: &HttpConfig, search: &SearchConfig) -> Result<Self> {
        Url::parse(&search.endpoint).map_err(|_| AppError::InvalidUrl(search.endpoint.clone()))?;

        let client = Client::builder()
            .user_agent(http.user_agent.as_str())
            .timeout(http.timeout())
            .cookie_store(true)
            .build()?;

        Ok(SearchEngine {
            client,
            endpoint: search.endpoint.clone(),
        })
    }

    fn parse_duckduckgo_results(&self, html: &str, max_results: usize) -> Vec<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("a.result__a").unwrap();

        let mut urls = IndexSet::new();
        for element in document.select(&selector) {
            if urls.len() >= max_results {
                break;
            }
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if let Some(url) = resolve_result_href(href) {
                urls.insert(url);
            }
        }

        if urls.is_empty() {
            warn!("No usable links found in search results.");
        }
        urls.into_iter().collect()
    }
}

impl SearchBackend for SearchEngine {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let search_url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        info!("Searching for: '{}'", query);

        let resp = self.client.get(&search_url).send()?;
        if !resp.status().is_success() {
            return Err(AppError::search(format!(
                "search failed with status {}",
                resp.status()
            )));
        }

        let text = resp.text()?;
        let urls = self.parse_duckduckgo_results(&text, max_results);
        info!("Search returned {} result URL(s)", urls.len());
        Ok(urls)
    }
}

/// Result anchors are either direct links or `//duckduckgo.com/l/?uddg=<target>`
/// redirects. Anything else pointing back at DuckDuckGo (ads, internal pages)
/// and blank hrefs are dropped.
fn resolve_result_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;

    let is_ddg = parsed
        .host_str()
        .is_some_and(|host| host.ends_with("duckduckgo.com"));
    if !is_ddg {
        return matches!(parsed.scheme(), "http" | "https").then_some(absolute);
    }

    if parsed.path() != "/l/" {
        return None;
    }
    parsed
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, target)| target.into_owned())
        .filter(|target| target.starts_with("http"))
}
