/// Persisted user settings
use crate::error::{Result, ScrapeError};
use crate::host::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const SETTINGS_KEY: &str = "settings";

pub const MIN_DELAY_SECS: u32 = 1;
pub const MAX_DELAY_SECS: u32 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn ext(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }
}

/// What the walker does when a profile fails to load or extract
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log and move on to the next entry
    #[default]
    Skip,
    /// Try the entry again up to `maxRetries` times, then move on
    Retry,
}

/// Page-load polling parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadWait {
    pub poll_interval_ms: u32,
    pub settle_ms: u32,
    pub max_polls: u32,
}

impl Default for LoadWait {
    fn default() -> Self {
        LoadWait {
            poll_interval_ms: 500,
            settle_ms: 1000,
            max_polls: 60,
        }
    }
}

impl LoadWait {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(u64::from(self.settle_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Seconds between profile visits during a bulk scrape
    pub auto_scrape_delay: u32,
    pub max_retries: u32,
    pub enable_notifications: bool,
    pub export_format: ExportFormat,
    pub failure_policy: FailurePolicy,
    pub retention_days: u32,
    pub load_wait: LoadWait,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            auto_scrape_delay: 2,
            max_retries: 3,
            enable_notifications: true,
            export_format: ExportFormat::Csv,
            failure_policy: FailurePolicy::Skip,
            retention_days: 30,
            load_wait: LoadWait::default(),
        }
    }
}

impl Settings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(u64::from(clamp_delay(self.auto_scrape_delay)))
    }

    /// Extra attempts allowed per queue entry
    pub fn retries(&self) -> u32 {
        match self.failure_policy {
            FailurePolicy::Skip => 0,
            FailurePolicy::Retry => self.max_retries,
        }
    }

    pub async fn load(kv: &dyn KeyValueStore) -> Result<Settings> {
        match kv.get(SETTINGS_KEY).await? {
            None | Some(Value::Null) => Ok(Settings::default()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ScrapeError::Storage(format!("Failed to parse settings: {}", e))),
        }
    }

    pub async fn save(&self, kv: &dyn KeyValueStore) -> Result<()> {
        kv.set(SETTINGS_KEY, serde_json::to_value(self)?).await
    }
}

pub fn clamp_delay(secs: u32) -> u32 {
    secs.clamp(MIN_DELAY_SECS, MAX_DELAY_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::MemoryStore;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.delay(), Duration::from_secs(2));
        assert_eq!(settings.retries(), 0);
        assert!(settings.enable_notifications);
        assert_eq!(settings.retention_days, 30);
        assert_eq!(settings.load_wait.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        // Shape written by older versions of the extension
        let value = json!({
            "autoScrapeDelay": 5,
            "maxRetries": 3,
            "enableNotifications": false,
            "exportFormat": "json"
        });

        let settings: Settings = serde_json::from_value(value).unwrap();

        assert_eq!(settings.auto_scrape_delay, 5);
        assert!(!settings.enable_notifications);
        assert_eq!(settings.export_format, ExportFormat::Json);
        assert_eq!(settings.failure_policy, FailurePolicy::Skip);
        assert_eq!(settings.load_wait, LoadWait::default());
    }

    #[test]
    fn test_retry_policy_uses_max_retries() {
        let settings = Settings {
            failure_policy: FailurePolicy::Retry,
            max_retries: 2,
            ..Settings::default()
        };

        assert_eq!(settings.retries(), 2);
    }

    #[test]
    fn test_delay_is_clamped() {
        let mut settings = Settings::default();
        settings.auto_scrape_delay = 0;
        assert_eq!(settings.delay(), Duration::from_secs(1));
        settings.auto_scrape_delay = 600;
        assert_eq!(settings.delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_and_save() {
        let kv = MemoryStore::default();

        block_on(async {
            assert_eq!(Settings::load(&kv).await.unwrap(), Settings::default());

            let custom = Settings {
                auto_scrape_delay: 7,
                ..Settings::default()
            };
            custom.save(&kv).await.unwrap();

            assert_eq!(Settings::load(&kv).await.unwrap(), custom);
        });
    }
}
