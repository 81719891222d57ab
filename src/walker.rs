/// Bulk walker: visits queued profiles one at a time in the active tab.
///
/// The walker is a plain state machine shared through a `WalkerHandle`.
/// `drive` runs the iterations; commands (`start`, `pause`, `resume`) only
/// flip state, so a pause lands at the next iteration boundary and never
/// interrupts a navigation in flight.
use crate::contact::{fields, ContactRecord};
use crate::error::{Result, ScrapeError};
use crate::extractor::extract_profile;
use crate::host::ScrapeHost;
use crate::rules::Rules;
use crate::settings::{LoadWait, Settings};
use crate::storage::ContactStore;
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WalkerState {
    Idle,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for WalkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WalkerState::Idle => "idle",
            WalkerState::Running => "running",
            WalkerState::Paused => "paused",
            WalkerState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// What the caller must do after a successful `resume`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeAction {
    /// No driver is alive; spawn `drive` again
    Spawn,
    /// The previous driver is still mid-iteration and will carry on
    AlreadyDriving,
}

/// Snapshot of walker progress for the popup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalkerStatus {
    pub state: WalkerState,
    pub session_id: Option<String>,
    pub cursor: usize,
    pub queue_len: usize,
    pub stored: usize,
    pub current: Option<String>,
    pub last_error: Option<String>,
}

impl WalkerStatus {
    /// Percentage of the queue visited, 0-100
    pub fn progress(&self) -> u8 {
        if self.queue_len == 0 {
            0
        } else {
            ((self.cursor * 100) / self.queue_len).min(100) as u8
        }
    }
}

#[derive(Debug)]
pub struct BulkWalker {
    state: WalkerState,
    queue: Vec<ContactRecord>,
    cursor: usize,
    session_id: Option<Uuid>,
    stored: usize,
    last_error: Option<String>,
    settings: Settings,
    driving: bool,
}

pub type WalkerHandle = Rc<RefCell<BulkWalker>>;

impl Default for BulkWalker {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkWalker {
    pub fn new() -> Self {
        BulkWalker {
            state: WalkerState::Idle,
            queue: Vec::new(),
            cursor: 0,
            session_id: None,
            stored: 0,
            last_error: None,
            settings: Settings::default(),
            driving: false,
        }
    }

    pub fn handle() -> WalkerHandle {
        Rc::new(RefCell::new(BulkWalker::new()))
    }

    pub fn state(&self) -> WalkerState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn queue(&self) -> &[ContactRecord] {
        &self.queue
    }

    pub fn status(&self) -> WalkerStatus {
        WalkerStatus {
            state: self.state,
            session_id: self.session_id.map(|id| id.to_string()),
            cursor: self.cursor,
            queue_len: self.queue.len(),
            stored: self.stored,
            current: self
                .queue
                .get(self.cursor)
                .filter(|_| self.state == WalkerState::Running)
                .map(|entry| {
                    entry
                        .text(fields::NAME)
                        .or(entry.profile_url())
                        .unwrap_or_default()
                        .to_string()
                }),
            last_error: self.last_error.clone(),
        }
    }

    /// Begin a new session over `queue`. A completed session is reset first.
    pub fn start(&mut self, queue: Vec<ContactRecord>, settings: Settings) -> Result<()> {
        match self.state {
            WalkerState::Running | WalkerState::Paused => {
                return Err(ScrapeError::InvalidTransition {
                    action: "start",
                    state: self.state.to_string(),
                });
            }
            WalkerState::Completed => self.state = WalkerState::Idle,
            WalkerState::Idle => {}
        }

        if queue.is_empty() {
            return Err(ScrapeError::EmptyQueue);
        }

        let session_id = Uuid::new_v4();
        info!("Starting bulk session {} with {} profiles", session_id, queue.len());

        self.queue = queue;
        self.cursor = 0;
        self.stored = 0;
        self.last_error = None;
        self.session_id = Some(session_id);
        self.settings = settings;
        self.state = WalkerState::Running;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.state != WalkerState::Running {
            return Err(ScrapeError::InvalidTransition {
                action: "pause",
                state: self.state.to_string(),
            });
        }
        info!("Pausing bulk session at {}/{}", self.cursor, self.queue.len());
        self.state = WalkerState::Paused;
        Ok(())
    }

    /// Continue from the retained cursor; the queue is not re-fetched
    pub fn resume(&mut self) -> Result<ResumeAction> {
        if self.state != WalkerState::Paused {
            return Err(ScrapeError::InvalidTransition {
                action: "resume",
                state: self.state.to_string(),
            });
        }
        info!("Resuming bulk session at {}/{}", self.cursor, self.queue.len());
        self.state = WalkerState::Running;
        Ok(if self.driving {
            ResumeAction::AlreadyDriving
        } else {
            ResumeAction::Spawn
        })
    }

    /// Entry at the cursor when an iteration should run, completing the
    /// session once the queue is exhausted
    fn next_entry(&mut self) -> Option<(usize, ContactRecord)> {
        if self.state != WalkerState::Running {
            return None;
        }
        match self.queue.get(self.cursor) {
            Some(entry) => Some((self.cursor, entry.clone())),
            None => {
                self.state = WalkerState::Completed;
                None
            }
        }
    }

    /// Move past the current entry; true once the queue is exhausted
    fn advance(&mut self) -> bool {
        self.cursor += 1;
        if self.cursor >= self.queue.len() {
            info!("Bulk session finished: {} of {} stored", self.stored, self.queue.len());
            self.state = WalkerState::Completed;
            true
        } else {
            false
        }
    }
}

/// Run iterations until the walker is paused or completes.
///
/// Returns the state the driver stopped in. Only one driver runs per
/// handle; a second call while one is alive returns immediately.
pub async fn drive(handle: &WalkerHandle, rules: &Rules, host: &dyn ScrapeHost, store: &ContactStore) -> WalkerState {
    {
        let mut walker = handle.borrow_mut();
        if walker.driving {
            return walker.state;
        }
        walker.driving = true;
    }

    let settings = handle.borrow().settings.clone();

    let stopped = loop {
        let next = handle.borrow_mut().next_entry();
        let Some((index, entry)) = next else {
            break handle.borrow().state;
        };

        let url = entry.profile_url().unwrap_or_default().to_string();
        debug!("Visiting {} ({}/{})", url, index + 1, handle.borrow().queue.len());

        match scrape_entry(&url, rules, host, &settings).await {
            Ok(profile) => {
                let mut merged = entry;
                merged.merge(&profile);
                merged.set_flag(fields::SCRAPED, true);

                match store.append(merged).await {
                    Ok(_) => {
                        let mut walker = handle.borrow_mut();
                        if let Some(queued) = walker.queue.get_mut(index) {
                            queued.set_flag(fields::SCRAPED, true);
                        }
                        walker.stored += 1;
                    }
                    Err(e) => {
                        warn!("Failed to store {}: {}", url, e);
                        handle.borrow_mut().last_error = Some(e.to_string());
                    }
                }
            }
            Err(e) => {
                warn!("Skipping {}: {}", url, e);
                handle.borrow_mut().last_error = Some(e.to_string());
            }
        }

        if handle.borrow_mut().advance() {
            break WalkerState::Completed;
        }

        if handle.borrow().state == WalkerState::Running {
            host.sleep(settings.delay()).await;
        }
    };

    let stored = {
        let mut walker = handle.borrow_mut();
        walker.driving = false;
        walker.stored
    };

    if stopped == WalkerState::Completed && settings.enable_notifications {
        host.notify("Bulk Scrape Complete", &format!("Scraped {} contacts", stored))
            .await;
    }

    stopped
}

/// Visit one profile, retrying per the failure policy
async fn scrape_entry(url: &str, rules: &Rules, host: &dyn ScrapeHost, settings: &Settings) -> Result<ContactRecord> {
    let mut result = visit(url, rules, host, &settings.load_wait).await;

    for attempt in 1..=settings.retries() {
        match &result {
            Ok(_) => break,
            Err(e) => debug!("Retry {} for {} after: {}", attempt, url, e),
        }
        result = visit(url, rules, host, &settings.load_wait).await;
    }

    result
}

async fn visit(url: &str, rules: &Rules, host: &dyn ScrapeHost, wait: &LoadWait) -> Result<ContactRecord> {
    let departing = host
        .page_state()
        .await
        .ok()
        .map(|state| state.url)
        .filter(|current| current != url);
    host.navigate(url).await?;
    wait_for_load(host, departing.as_deref(), wait).await?;
    let snapshot = host.snapshot().await?;
    extract_profile(rules, &snapshot, Utc::now())
}

/// Poll `readyState` until the page reports complete, then let dynamic
/// content settle. Gives up with `LoadTimeout` after `max_polls` polls.
///
/// A complete document still at `departing` is the page being navigated
/// away from and does not count.
pub async fn wait_for_load(host: &dyn ScrapeHost, departing: Option<&str>, wait: &LoadWait) -> Result<()> {
    for _ in 0..wait.max_polls {
        match host.page_state().await {
            Ok(state) if state.is_complete() && departing.is_none_or(|d| d != state.url) => {
                host.sleep(wait.settle()).await;
                return Ok(());
            }
            Ok(_) => {}
            // Injection is rejected while the old document is torn down
            Err(e) => debug!("readyState poll failed: {}", e),
        }
        host.sleep(wait.poll_interval()).await;
    }

    Err(ScrapeError::LoadTimeout {
        polls: wait.max_polls,
    })
}
