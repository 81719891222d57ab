/// Seams to the browser: tab control, timers, notifications, key-value storage.
///
/// The `chrome` module implements these over `chrome.*`; tests use
/// in-memory fakes.
use crate::contact::{PageSnapshot, PageState};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Drives the tab the walker is scraping
#[async_trait(?Send)]
pub trait ScrapeHost {
    /// Point the tab at `url`
    async fn navigate(&self, url: &str) -> Result<()>;

    /// URL and `document.readyState` of the tab's current document
    async fn page_state(&self) -> Result<PageState>;

    /// Full snapshot of the tab's current document
    async fn snapshot(&self) -> Result<PageSnapshot>;

    async fn sleep(&self, duration: Duration);

    /// Fire-and-forget user alert
    async fn notify(&self, title: &str, message: &str);
}

/// `chrome.storage.local`-style persistence
#[async_trait(?Send)]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;
}
