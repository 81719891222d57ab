/// Error types shared by the extractor, store and walker
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScrapeError {
    #[error("Could not extract basic profile information from {url}")]
    Extraction { url: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Page did not finish loading after {polls} polls")]
    LoadTimeout { polls: u32 },

    #[error("Browser API error: {0}")]
    Host(String),

    #[error("Invalid extraction rules: {0}")]
    Rules(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No search results found")]
    EmptyQueue,

    #[error("Navigate to LinkedIn search results to use bulk scrape")]
    NotSearchPage,

    #[error("Cannot {action} while walker is {state}")]
    InvalidTransition { action: &'static str, state: String },
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Serialization(err.to_string())
    }
}

impl From<serde_wasm_bindgen::Error> for ScrapeError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        ScrapeError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
