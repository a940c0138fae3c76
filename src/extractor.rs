use indexmap::IndexSet;
use regex::Regex;
use scraper::Html;

use crate::validator::is_valid_email;

/// Elements whose text never reaches the reader.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

pub struct Extractor {
    email_regex: Regex,
    linkedin_regex: Regex,
    facebook_regex: Regex,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Extractor {
            email_regex: Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap(),
            linkedin_regex: Regex::new(r#"(?i)https?://(?:[a-z]{2,3}\.)?linkedin\.com/[^\s"'<>]+"#)
                .unwrap(),
            facebook_regex: Regex::new(r#"(?i)https?://(?:www\.|m\.|web\.)?facebook\.com/[^\s"'<>]+"#)
                .unwrap(),
        }
    }

    /// Valid addresses in `text`, lowercased, first occurrence order kept.
    pub fn extract_emails(&self, text: &str) -> IndexSet<String> {
        self.email_regex
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|email| is_valid_email(email))
            .collect()
    }

    /// First LinkedIn URL anywhere in the raw markup (hrefs included).
    pub fn extract_linkedin(&self, markup: &str) -> Option<String> {
        self.linkedin_regex
            .find(markup)
            .map(|m| m.as_str().to_string())
    }

    pub fn extract_facebook(&self, markup: &str) -> Option<String> {
        self.facebook_regex
            .find(markup)
            .map(|m| m.as_str().to_string())
    }
}

/// Visible text of a parsed document, text nodes joined by single spaces.
pub fn visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join(" ")
}

/// `https://` + the domain part of an address.
pub fn website_from_email(email: &str) -> Option<String> {
    email
        .split_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
        .map(|domain| format!("https://{}", domain))
}
