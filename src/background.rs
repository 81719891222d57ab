/// Background service worker: owns the bulk walker, answers popup
/// messages, writes install defaults and runs the retention alarm.
use crate::chrome::{self, ChromeStorage, TabHost};
use crate::contact::{fields, is_site_url, ContactRecord, PageType, SITE_URL};
use crate::error::{Result, ScrapeError};
use crate::extractor::{extract_profile, is_logged_in};
use crate::host::{KeyValueStore, ScrapeHost};
use crate::listing::bulk_queue;
use crate::messages::{Request, Response};
use crate::rules::Rules;
use crate::settings::{clamp_delay, Settings, SETTINGS_KEY};
use crate::storage::{ContactStore, PurgeReport, CONTACTS_KEY, LAST_CLEANUP_KEY};
use crate::walker::{drive, BulkWalker, ResumeAction, WalkerHandle};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

pub const MAINTENANCE_ALARM: &str = "weeklyCleanup";
const FIRST_CLEANUP_DELAY: Duration = Duration::from_secs(60 * 60);
const CLEANUP_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

thread_local! {
    static WALKER: WalkerHandle = BulkWalker::handle();
    static RULES: RefCell<Option<Rc<Rules>>> = const { RefCell::new(None) };
    // Tab the current bulk session navigates
    static BULK_TAB: Cell<Option<i32>> = const { Cell::new(None) };
}

fn rules() -> Result<Rc<Rules>> {
    RULES.with(|cell| {
        let cached = cell.borrow().clone();
        if let Some(rules) = cached {
            return Ok(rules);
        }
        let rules = Rc::new(Rules::builtin()?);
        *cell.borrow_mut() = Some(rules.clone());
        Ok(rules)
    })
}

fn walker() -> WalkerHandle {
    WALKER.with(Rc::clone)
}

fn contact_store() -> ContactStore {
    ContactStore::new(Rc::new(ChromeStorage))
}

/// Entry point for `chrome.runtime.onMessage`
#[wasm_bindgen]
pub async fn handle_message(message: JsValue) -> JsValue {
    let response = match serde_wasm_bindgen::from_value::<Request>(message) {
        Ok(request) => dispatch(request).await.unwrap_or_else(|e| {
            warn!("Request failed: {}", e);
            Response::error(e.to_string())
        }),
        Err(e) => Response::error(format!("Unknown action: {}", e)),
    };

    chrome::to_js(&response).unwrap_or(JsValue::NULL)
}

async fn dispatch(request: Request) -> Result<Response> {
    match request {
        Request::PageInfo => page_info().await,
        Request::ScrapeProfile => scrape_profile().await.map(|contact| Response::Profile { contact }),
        Request::PreviewQueue => {
            let tab = chrome::active_tab().await?;
            let snapshot = TabHost::new(tab.id).snapshot().await?;
            let entries = bulk_queue(&rules()?.search, &snapshot, Utc::now())?;
            Ok(Response::Queue { entries })
        }
        Request::StartBulk { delay_secs } => start_bulk(delay_secs).await,
        Request::PauseBulk => {
            walker().borrow_mut().pause()?;
            Ok(bulk_status())
        }
        Request::ResumeBulk => resume_bulk().await,
        Request::BulkStatus => Ok(bulk_status()),
        Request::CleanupOldData { days_to_keep } => {
            let settings = Settings::load(&ChromeStorage).await?;
            let days = days_to_keep.unwrap_or(settings.retention_days);
            let report = contact_store().purge_older_than(days, Utc::now()).await?;
            info!("Removed {} contacts older than {} days", report.removed_count, days);
            Ok(Response::Cleanup { report })
        }
        Request::OpenSiteTab => {
            chrome::open_tab(SITE_URL).await?;
            Ok(Response::Ack)
        }
        Request::ShowNotification { title, message } => {
            if Settings::load(&ChromeStorage).await?.enable_notifications {
                chrome::notify(&title, &message);
            }
            Ok(Response::Ack)
        }
    }
}

fn bulk_status() -> Response {
    let handle = walker();
    let status = handle.borrow().status();
    Response::Bulk { status }
}

async fn page_info() -> Result<Response> {
    let tab = chrome::active_tab().await?;
    let on_site = is_site_url(&tab.url);

    let logged_in = if on_site {
        match TabHost::new(tab.id).snapshot().await {
            Ok(snapshot) => is_logged_in(&rules()?.login, &snapshot),
            Err(e) => {
                warn!("Could not check login status: {}", e);
                false
            }
        }
    } else {
        false
    };

    Ok(Response::PageInfo {
        page_type: PageType::from_url(&tab.url),
        on_site,
        is_logged_in: logged_in,
    })
}

async fn scrape_profile() -> Result<ContactRecord> {
    let settings = Settings::load(&ChromeStorage).await?;
    let tab = chrome::active_tab().await?;
    let host = TabHost::new(tab.id);

    let snapshot = host.snapshot().await?;
    let contact = extract_profile(&*rules()?, &snapshot, Utc::now())?;
    let total = contact_store().append(contact.clone()).await?;
    info!("Stored profile {} ({} contacts)", snapshot.url, total);

    if settings.enable_notifications {
        let name = contact
            .text(fields::NAME)
            .or(contact.text(fields::TITLE))
            .unwrap_or_default();
        host.notify("Profile Scraped", &format!("Successfully scraped: {}", name))
            .await;
    }

    Ok(contact)
}

async fn start_bulk(delay_secs: Option<u32>) -> Result<Response> {
    let tab = chrome::active_tab().await?;
    let host = TabHost::new(tab.id);
    let snapshot = host.snapshot().await?;
    let queue = bulk_queue(&rules()?.search, &snapshot, Utc::now())?;

    let mut settings = Settings::load(&ChromeStorage).await?;
    if let Some(secs) = delay_secs {
        settings.auto_scrape_delay = clamp_delay(secs);
        settings.save(&ChromeStorage).await?;
    }

    walker().borrow_mut().start(queue, settings)?;
    BULK_TAB.with(|cell| cell.set(Some(tab.id)));
    spawn_driver(host);

    Ok(bulk_status())
}

async fn resume_bulk() -> Result<Response> {
    let tab_id = BULK_TAB
        .with(Cell::get)
        .ok_or_else(|| ScrapeError::Host("No tab recorded for the bulk session".to_string()))?;

    if walker().borrow_mut().resume()? == ResumeAction::Spawn {
        spawn_driver(TabHost::new(tab_id));
    }

    Ok(bulk_status())
}

fn spawn_driver(host: TabHost) {
    let handle = walker();
    spawn_local(async move {
        let rules = match rules() {
            Ok(rules) => rules,
            Err(e) => {
                error!("Bulk session cannot run: {}", e);
                return;
            }
        };
        let state = drive(&handle, &*rules, &host, &contact_store()).await;
        info!("Bulk driver for tab {} stopped: {}", host.tab_id(), state);
    });
}

/// Write defaults for the keys that are missing; stored data is kept
pub async fn install_defaults(kv: &dyn KeyValueStore, now: DateTime<Utc>) -> Result<Vec<&'static str>> {
    let defaults = [
        (CONTACTS_KEY, Value::Array(Vec::new())),
        (SETTINGS_KEY, serde_json::to_value(Settings::default())?),
        (LAST_CLEANUP_KEY, Value::from(now.timestamp_millis())),
    ];

    let mut written = Vec::new();
    for (key, value) in defaults {
        if kv.get(key).await?.is_none() {
            kv.set(key, value).await?;
            written.push(key);
        }
    }
    Ok(written)
}

/// Retention purge with the configured window
pub async fn run_maintenance(kv: Rc<dyn KeyValueStore>, now: DateTime<Utc>) -> Result<PurgeReport> {
    let settings = Settings::load(kv.as_ref()).await?;
    ContactStore::new(kv)
        .purge_older_than(settings.retention_days, now)
        .await
}

/// Called by the worker loader on every service worker start
#[wasm_bindgen]
pub async fn start_background() {
    if let Err(e) = chrome::ensure_alarm(MAINTENANCE_ALARM, FIRST_CLEANUP_DELAY, CLEANUP_PERIOD).await {
        error!("Failed to schedule maintenance: {}", e);
    }
}

/// `chrome.runtime.onInstalled` with the event's `reason`
#[wasm_bindgen]
pub async fn handle_install(reason: String) {
    match install_defaults(&ChromeStorage, Utc::now()).await {
        Ok(written) => info!("Installed ({}), wrote defaults for {:?}", reason, written),
        Err(e) => error!("Failed to write install defaults: {}", e),
    }

    if reason == "install" {
        chrome::notify(
            "LinkedIn Scraper Installed",
            "Extension ready! Click the icon to start scraping.",
        );
    }
}

/// `chrome.alarms.onAlarm`
#[wasm_bindgen]
pub async fn handle_alarm(name: String) {
    if name != MAINTENANCE_ALARM {
        return;
    }
    match run_maintenance(Rc::new(ChromeStorage), Utc::now()).await {
        Ok(report) => info!(
            "Maintenance removed {} contacts, {} remain",
            report.removed_count, report.remaining_count
        ),
        Err(e) => error!("Maintenance failed: {}", e),
    }
}

/// `chrome.tabs.onUpdated` once a tab finishes loading
#[wasm_bindgen]
pub fn handle_tab_updated(tab_id: i32, url: String) {
    let badge = if is_site_url(&url) {
        PageType::from_url(&url).badge()
    } else {
        None
    };
    chrome::set_badge(tab_id, badge);
}
