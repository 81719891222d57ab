/// Contact storage over chrome.storage.local
use crate::contact::ContactRecord;
use crate::error::{Result, ScrapeError};
use crate::host::KeyValueStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

pub const CONTACTS_KEY: &str = "scrapedContacts";
pub const LAST_CLEANUP_KEY: &str = "lastCleanup";

/// The stored contact collection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ContactBook {
    pub contacts: Vec<ContactRecord>,
}

/// Outcome of a retention purge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub removed_count: usize,
    pub remaining_count: usize,
}

impl ContactBook {
    pub fn new() -> Self {
        ContactBook { contacts: Vec::new() }
    }

    pub fn add(&mut self, contact: ContactRecord) {
        self.contacts.push(contact);
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Last `n` contacts, newest first
    pub fn recent(&self, n: usize) -> Vec<ContactRecord> {
        self.contacts.iter().rev().take(n).cloned().collect()
    }

    /// Drop contacts scraped more than `days_to_keep` days before `now`.
    /// Contacts without a readable `scrapedAt` are kept.
    pub fn purge_older_than(&mut self, days_to_keep: u32, now: DateTime<Utc>) -> PurgeReport {
        let max_age = Duration::days(i64::from(days_to_keep));
        let original_len = self.contacts.len();

        self.contacts.retain(|contact| match contact.scraped_at() {
            Some(scraped_at) => now - scraped_at <= max_age,
            None => true,
        });

        PurgeReport {
            removed_count: original_len - self.contacts.len(),
            remaining_count: self.contacts.len(),
        }
    }
}

/// Persistent contact store.
///
/// Every write is load-all, modify, save-all with no isolation; it is only
/// safe while a single scraping session writes at a time.
#[derive(Clone)]
pub struct ContactStore {
    kv: Rc<dyn KeyValueStore>,
}

impl ContactStore {
    pub fn new(kv: Rc<dyn KeyValueStore>) -> Self {
        ContactStore { kv }
    }

    pub async fn get_all(&self) -> Result<ContactBook> {
        match self.kv.get(CONTACTS_KEY).await? {
            None | Some(Value::Null) => Ok(ContactBook::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ScrapeError::Storage(format!("Failed to parse contacts: {}", e))),
        }
    }

    async fn save(&self, book: &ContactBook) -> Result<()> {
        let value = serde_json::to_value(book)?;
        self.kv.set(CONTACTS_KEY, value).await
    }

    pub async fn append(&self, contact: ContactRecord) -> Result<usize> {
        let mut book = self.get_all().await?;
        book.add(contact);
        self.save(&book).await?;
        Ok(book.len())
    }

    pub async fn clear(&self) -> Result<()> {
        self.save(&ContactBook::new()).await
    }

    /// Retention purge; also records the cleanup time
    pub async fn purge_older_than(&self, days_to_keep: u32, now: DateTime<Utc>) -> Result<PurgeReport> {
        let mut book = self.get_all().await?;
        let report = book.purge_older_than(days_to_keep, now);

        if report.removed_count > 0 {
            self.save(&book).await?;
        }
        self.kv
            .set(LAST_CLEANUP_KEY, Value::from(now.timestamp_millis()))
            .await?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{fields, iso_timestamp};
    use crate::host::fake::MemoryStore;
    use chrono::TimeZone;
    use futures::executor::block_on;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn contact(name: &str, days_ago: i64) -> ContactRecord {
        let mut record = ContactRecord::with_profile_url(format!("https://site.example/in/{}", name));
        record.set_text(fields::NAME, name);
        record.set_text(fields::SCRAPED_AT, iso_timestamp(now() - Duration::days(days_ago)));
        record
    }

    #[test]
    fn test_purge_example() {
        let mut book = ContactBook::new();
        book.add(contact("A", 40));
        book.add(contact("B", 5));

        let report = book.purge_older_than(30, now());

        assert_eq!(report.removed_count, 1);
        assert_eq!(report.remaining_count, 1);
        assert_eq!(book.contacts[0].text("name"), Some("B"));
    }

    #[test]
    fn test_purge_boundary_and_idempotence() {
        let mut book = ContactBook::new();
        book.add(contact("exactly", 30));
        book.add(contact("older", 31));
        book.add(contact("fresh", 0));

        let first = book.purge_older_than(30, now());
        let second = book.purge_older_than(30, now());

        assert_eq!(first.removed_count, 1);
        assert_eq!(second.removed_count, 0);
        let names: Vec<_> = book.contacts.iter().filter_map(|c| c.text("name")).collect();
        assert_eq!(names, vec!["exactly", "fresh"]);

        // Once the clock moves on, the boundary record ages out
        let later = book.purge_older_than(30, now() + Duration::hours(1));
        assert_eq!(later.removed_count, 1);
    }

    #[test]
    fn test_purge_keeps_undated_contacts() {
        let mut book = ContactBook::new();
        book.add(ContactRecord::with_profile_url("https://site.example/in/undated"));
        let mut garbled = contact("garbled", 0);
        garbled.set_text(fields::SCRAPED_AT, "not a date");
        book.add(garbled);

        let report = book.purge_older_than(0, now() + Duration::days(365));

        assert_eq!(report.removed_count, 0);
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_recent_newest_first() {
        let mut book = ContactBook::new();
        for name in ["a", "b", "c"] {
            book.add(contact(name, 0));
        }

        let recent = book.recent(2);

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text("name"), Some("c"));
        assert_eq!(recent[1].text("name"), Some("b"));
    }

    #[test]
    fn test_store_append_and_clear() {
        let kv = Rc::new(MemoryStore::default());
        let store = ContactStore::new(kv.clone());

        block_on(async {
            assert!(store.get_all().await.unwrap().is_empty());
            assert_eq!(store.append(contact("A", 1)).await.unwrap(), 1);
            // duplicates are allowed
            assert_eq!(store.append(contact("A", 0)).await.unwrap(), 2);

            let book = store.get_all().await.unwrap();
            assert_eq!(book.len(), 2);
            assert!(kv.data.borrow()[CONTACTS_KEY].is_array());

            store.clear().await.unwrap();
            assert!(store.get_all().await.unwrap().is_empty());
        });
    }

    #[test]
    fn test_store_write_failure_surfaces() {
        let kv = Rc::new(MemoryStore::default());
        kv.fail_writes.set(true);
        let store = ContactStore::new(kv);

        let err = block_on(store.append(contact("A", 0))).unwrap_err();

        assert!(matches!(err, ScrapeError::Storage(_)));
    }

    #[test]
    fn test_store_unreadable_data() {
        let kv = Rc::new(MemoryStore::default());
        kv.data
            .borrow_mut()
            .insert(CONTACTS_KEY.to_string(), Value::String("garbage".to_string()));
        let store = ContactStore::new(kv);

        assert!(matches!(block_on(store.get_all()), Err(ScrapeError::Storage(_))));
    }

    #[test]
    fn test_store_purge_records_cleanup_time() {
        let kv = Rc::new(MemoryStore::default());
        let store = ContactStore::new(kv.clone());

        let report = block_on(async {
            store.append(contact("A", 40)).await.unwrap();
            store.append(contact("B", 5)).await.unwrap();
            store.purge_older_than(30, now()).await.unwrap()
        });

        assert_eq!(report, PurgeReport { removed_count: 1, remaining_count: 1 });
        assert_eq!(
            kv.data.borrow()[LAST_CLEANUP_KEY],
            Value::from(now().timestamp_millis())
        );
    }

    #[test]
    fn test_serialization() {
        let mut book = ContactBook::new();
        book.add(contact("A", 0));

        let json = serde_json::to_string(&book).unwrap();
        let deserialized: ContactBook = serde_json::from_str(&json).unwrap();

        assert!(json.starts_with('['));
        assert_eq!(deserialized, book);
    }
}
