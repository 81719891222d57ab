/// Data structures for scraped contacts
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Field names used in stored records
pub mod fields {
    pub const PROFILE_URL: &str = "profileUrl";
    pub const NAME: &str = "name";
    pub const TITLE: &str = "title";
    pub const COMPANY: &str = "company";
    pub const LOCATION: &str = "location";
    pub const EMAIL: &str = "email";
    pub const SCRAPED_AT: &str = "scrapedAt";
    pub const EXTRACTED_AT: &str = "extractedAt";
    pub const PAGE_TYPE: &str = "pageType";
    pub const SCRAPED: &str = "scraped";
    pub const SEARCH_INDEX: &str = "searchIndex";
}

/// A scraped contact: an ordered map of field name to value.
///
/// Key order is insertion order, so CSV headers come out in the order
/// fields were first seen.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ContactRecord(Map<String, Value>);

impl ContactRecord {
    pub fn new() -> Self {
        ContactRecord(Map::new())
    }

    pub fn with_profile_url(url: impl Into<String>) -> Self {
        let mut record = ContactRecord::new();
        record.set_text(fields::PROFILE_URL, url);
        record
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String value of a field, if present and a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn set_text(&mut self, field: &str, value: impl Into<String>) {
        self.0.insert(field.to_string(), Value::String(value.into()));
    }

    pub fn set_flag(&mut self, field: &str, value: bool) {
        self.0.insert(field.to_string(), Value::Bool(value));
    }

    pub fn set_value(&mut self, field: &str, value: Value) {
        self.0.insert(field.to_string(), value);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn profile_url(&self) -> Option<&str> {
        self.text(fields::PROFILE_URL)
    }

    pub fn is_scraped(&self) -> bool {
        self.get(fields::SCRAPED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Parsed `scrapedAt`, or None when missing or not RFC 3339.
    pub fn scraped_at(&self) -> Option<DateTime<Utc>> {
        self.text(fields::SCRAPED_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Overlay `other` on top of this record. Keys already present keep
    /// their position and take the overlay's value; new keys are appended.
    pub fn merge(&mut self, other: &ContactRecord) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Field value as it appears in an export cell
    pub fn cell(&self, field: &str) -> String {
        match self.0.get(field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

impl From<Map<String, Value>> for ContactRecord {
    fn from(map: Map<String, Value>) -> Self {
        ContactRecord(map)
    }
}

/// Timestamp format written to `scrapedAt` / `extractedAt`
pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub const SITE_URL: &str = "https://www.linkedin.com";
const SITE_DOMAIN: &str = "linkedin.com";

/// True when `url` points at the site or one of its subdomains
pub fn is_site_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .is_some_and(|host| host == SITE_DOMAIN || host.ends_with(&format!(".{}", SITE_DOMAIN)))
}

/// Kind of page the active tab is showing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Profile,
    Search,
    Feed,
    Network,
    Other,
}

impl PageType {
    pub fn from_url(url: &str) -> PageType {
        let path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());

        if path.contains("/in/") {
            PageType::Profile
        } else if path.contains("/search/results/people/") || path.contains("/sales/search/people/") {
            PageType::Search
        } else if path.contains("/feed/") {
            PageType::Feed
        } else if path.contains("/mynetwork/") {
            PageType::Network
        } else {
            PageType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Profile => "profile",
            PageType::Search => "search",
            PageType::Feed => "feed",
            PageType::Network => "network",
            PageType::Other => "other",
        }
    }

    /// Toolbar badge text and color for this page type
    pub fn badge(&self) -> Option<(&'static str, &'static str)> {
        match self {
            PageType::Profile => Some(("P", "#28a745")),
            PageType::Search => Some(("S", "#ffc107")),
            PageType::Feed => Some(("F", "#17a2b8")),
            PageType::Network | PageType::Other => None,
        }
    }
}

/// Location and load progress of a tab's document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub url: String,
    pub ready_state: String,
}

impl PageState {
    pub fn is_complete(&self) -> bool {
        self.ready_state == "complete"
    }
}

/// What the injected snapshot script returns for a tab
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub url: String,
    pub ready_state: String,
    pub html: String,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        PageSnapshot {
            url: url.into(),
            ready_state: "complete".to_string(),
            html: html.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.ready_state == "complete"
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_url(&self.url)
    }
}
