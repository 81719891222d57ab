/// Popup UI: scrape the current profile, run bulk sessions, export history

use crate::chrome::{self, js_message, ChromeStorage};
use crate::contact::{ContactRecord, PageType};
use crate::error::ScrapeError;
use crate::export::{export, export_filename};
use crate::messages::{Request, Response};
use crate::settings::{ExportFormat, Settings, MAX_DELAY_SECS, MIN_DELAY_SECS};
use crate::storage::{ContactBook, ContactStore};
use crate::ui::components::{ContactCard, ContactRow, StatCounter};
use crate::walker::{WalkerState, WalkerStatus};
use chrono::Utc;
use log::warn;
use patternfly_yew::prelude::*;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

const STATUS_POLL: Duration = Duration::from_secs(1);
const RECENT_COUNT: usize = 10;

// Import JS bridge functions
#[wasm_bindgen(module = "/bridge/popup_bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn sendMessage(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    fn exportToFile(data: &str, filename: &str, mime_type: &str) -> Result<(), JsValue>;
}

#[derive(Clone, PartialEq)]
enum AppState {
    Idle,
    Loading(String),
    Done(String),
    Error(String),
}

#[derive(Clone, PartialEq)]
enum ActiveTab {
    Profile,
    Bulk,
    History,
}

#[derive(Clone, Copy, PartialEq)]
struct PageStatus {
    page_type: PageType,
    on_site: bool,
    logged_in: bool,
}

impl PageStatus {
    /// Status line text and whether scraping can proceed
    fn summary(&self) -> (&'static str, bool) {
        if !self.on_site {
            ("Not on LinkedIn", false)
        } else if !self.logged_in {
            ("Please login to LinkedIn", false)
        } else {
            ("Ready", true)
        }
    }

    fn can_bulk(&self) -> bool {
        self.summary().1 && self.page_type == PageType::Search
    }
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| AppState::Idle);
    let active_tab = use_state(|| ActiveTab::Profile);
    let page = use_state(|| None::<PageStatus>);
    let last_profile = use_state(|| None::<ContactRecord>);
    // Result of the queue preview taken when the Bulk tab opens
    let queued = use_state(|| None::<Result<usize, String>>);
    let bulk = use_state(|| None::<WalkerStatus>);
    let delay = use_state(|| Settings::default().auto_scrape_delay);
    let history = use_state(ContactBook::new);

    // Page status, settings and history on mount
    {
        let page = page.clone();
        let delay = delay.clone();
        let history = history.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                match send(Request::PageInfo).await {
                    Ok(Response::PageInfo {
                        page_type,
                        on_site,
                        is_logged_in,
                    }) => page.set(Some(PageStatus {
                        page_type,
                        on_site,
                        logged_in: is_logged_in,
                    })),
                    Ok(_) => {}
                    Err(e) => warn!("Page check failed: {}", e),
                }

                match Settings::load(&ChromeStorage).await {
                    Ok(settings) => delay.set(settings.auto_scrape_delay),
                    Err(e) => warn!("Failed to load settings: {}", e),
                }

                if let Ok(book) = load_history().await {
                    history.set(book);
                }
            });
            || ()
        });
    }

    // Poll bulk status while the popup is open
    {
        let bulk = bulk.clone();
        let history = history.clone();
        use_effect_with((), move |_| {
            let alive = Rc::new(Cell::new(true));
            let polling = alive.clone();
            spawn_local(async move {
                while polling.get() {
                    if let Ok(Response::Bulk { status }) = send(Request::BulkStatus).await {
                        if status.state == WalkerState::Running {
                            if let Ok(book) = load_history().await {
                                history.set(book);
                            }
                        }
                        bulk.set(Some(status));
                    }
                    chrome::sleep(STATUS_POLL).await;
                }
            });
            move || alive.set(false)
        });
    }

    // Scrape current profile handler
    let on_scrape = {
        let state = state.clone();
        let last_profile = last_profile.clone();
        let history = history.clone();

        Callback::from(move |_| {
            let state = state.clone();
            let last_profile = last_profile.clone();
            let history = history.clone();

            state.set(AppState::Loading("Scraping profile...".to_string()));

            spawn_local(async move {
                match send(Request::ScrapeProfile).await {
                    Ok(Response::Profile { contact }) => {
                        last_profile.set(Some(contact));
                        if let Ok(book) = load_history().await {
                            history.set(book);
                        }
                        state.set(AppState::Done("Profile scraped successfully".to_string()));
                    }
                    Ok(_) => state.set(AppState::Error("Unexpected response".to_string())),
                    Err(e) => state.set(AppState::Error(format!("Failed to scrape: {}", e))),
                }
            });
        })
    };

    // Open site handler
    let on_open_site = {
        let state = state.clone();
        Callback::from(move |_| {
            let state = state.clone();
            spawn_local(async move {
                if let Err(e) = send(Request::OpenSiteTab).await {
                    state.set(AppState::Error(e));
                }
            });
        })
    };

    let on_delay = {
        let delay = delay.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            if let Ok(secs) = input.value().parse::<u32>() {
                delay.set(secs);
            }
        })
    };

    // Start bulk handler
    let on_start = {
        let state = state.clone();
        let bulk = bulk.clone();
        let delay = delay.clone();

        Callback::from(move |_| {
            let state = state.clone();
            let bulk = bulk.clone();
            let delay_secs = *delay;

            state.set(AppState::Loading("Reading search results...".to_string()));

            spawn_local(async move {
                let request = Request::StartBulk {
                    delay_secs: Some(delay_secs),
                };
                match send(request).await {
                    Ok(Response::Bulk { status }) => {
                        state.set(AppState::Done(format!("Bulk scrape started: {} profiles", status.queue_len)));
                        bulk.set(Some(status));
                    }
                    Ok(_) => state.set(AppState::Error("Unexpected response".to_string())),
                    Err(e) => state.set(AppState::Error(format!("Failed to start: {}", e))),
                }
            });
        })
    };

    let on_pause = bulk_command(Request::PauseBulk, "Failed to pause", state.clone(), bulk.clone());
    let on_resume = bulk_command(Request::ResumeBulk, "Failed to resume", state.clone(), bulk.clone());

    // Tab click handlers
    let on_tab_click = {
        let active_tab = active_tab.clone();
        let queued = queued.clone();
        move |tab: ActiveTab| {
            let active_tab = active_tab.clone();
            let queued = queued.clone();
            Callback::from(move |_| {
                if tab == ActiveTab::Bulk {
                    let queued = queued.clone();
                    spawn_local(async move {
                        match send(Request::PreviewQueue).await {
                            Ok(Response::Queue { entries }) => queued.set(Some(Ok(entries.len()))),
                            Ok(_) => queued.set(None),
                            Err(e) => queued.set(Some(Err(e))),
                        }
                    });
                }
                active_tab.set(tab.clone());
            })
        }
    };

    // Export handlers
    let on_export = {
        let state = state.clone();
        move |format: ExportFormat| {
            let state = state.clone();
            Callback::from(move |_| {
                let state = state.clone();
                spawn_local(async move {
                    match export_history(format).await {
                        Ok(count) => state.set(AppState::Done(format!(
                            "Exported {} contacts as {}",
                            count,
                            format.ext().to_uppercase()
                        ))),
                        Err(e) => state.set(AppState::Error(e)),
                    }
                });
            })
        }
    };

    // Clear history handler
    let on_clear = {
        let state = state.clone();
        let history = history.clone();
        Callback::from(move |_| {
            let confirmed = web_sys::window()
                .and_then(|w| {
                    w.confirm_with_message("Are you sure you want to clear all scraped data?")
                        .ok()
                })
                .unwrap_or(false);
            if !confirmed {
                return;
            }

            let state = state.clone();
            let history = history.clone();
            spawn_local(async move {
                match contact_store().clear().await {
                    Ok(()) => {
                        history.set(ContactBook::new());
                        state.set(AppState::Done("History cleared".to_string()));
                    }
                    Err(e) => state.set(AppState::Error(format!("Failed to clear: {}", e))),
                }
            });
        })
    };

    // Retention purge handler
    let on_purge = {
        let state = state.clone();
        let history = history.clone();
        Callback::from(move |_| {
            let state = state.clone();
            let history = history.clone();
            spawn_local(async move {
                match send(Request::CleanupOldData { days_to_keep: None }).await {
                    Ok(Response::Cleanup { report }) => {
                        if let Ok(book) = load_history().await {
                            history.set(book);
                        }
                        state.set(AppState::Done(format!(
                            "Removed {} old contacts, {} remain",
                            report.removed_count, report.remaining_count
                        )));
                    }
                    Ok(_) => state.set(AppState::Error("Unexpected response".to_string())),
                    Err(e) => state.set(AppState::Error(format!("Cleanup failed: {}", e))),
                }
            });
        })
    };

    let is_busy = matches!(*state, AppState::Loading(_));
    let can_scrape = (*page).as_ref().is_some_and(|p| p.summary().1);
    let bulk_state = (*bulk).as_ref().map(|s| s.state).unwrap_or(WalkerState::Idle);
    let bulk_blocked = bulk_blocker((*page).as_ref(), (*queued).as_ref());
    let can_start = !is_busy
        && bulk_blocked.is_none()
        && (*page).as_ref().is_some_and(PageStatus::can_bulk);

    let tab_class = |tab: ActiveTab| {
        if *active_tab == tab {
            "pf-v5-c-tabs__item pf-m-current"
        } else {
            "pf-v5-c-tabs__item"
        }
    };

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"LinkedIn Scraper"}</h1>

            // Page status
            {match &*page {
                Some(status) => {
                    let (text, ready) = status.summary();
                    html! {
                        <p class={if ready { "status-ready" } else { "status-error" }}>
                            {text}
                            if ready && status.page_type != PageType::Other {
                                {format!(" ({})", status.page_type.as_str())}
                            }
                        </p>
                    }
                }
                None => html! { <p class="status-unknown">{"Checking page..."}</p> },
            }}

            if (*page).as_ref().is_some_and(|p| !p.on_site) {
                <Button onclick={on_open_site} variant={ButtonVariant::Link}>
                    {"Open LinkedIn"}
                </Button>
            }

            // Tab navigation
            <div class="pf-v5-c-tabs tabs-nav">
                <ul class="pf-v5-c-tabs__list">
                    <li class={tab_class(ActiveTab::Profile)}>
                        <button class="pf-v5-c-tabs__link" onclick={on_tab_click(ActiveTab::Profile)}>
                            <span class="pf-v5-c-tabs__item-text">{"Profile"}</span>
                        </button>
                    </li>
                    <li class={tab_class(ActiveTab::Bulk)}>
                        <button class="pf-v5-c-tabs__link" onclick={on_tab_click(ActiveTab::Bulk)}>
                            <span class="pf-v5-c-tabs__item-text">{"Bulk"}</span>
                        </button>
                    </li>
                    <li class={tab_class(ActiveTab::History)}>
                        <button class="pf-v5-c-tabs__link" onclick={on_tab_click(ActiveTab::History)}>
                            <span class="pf-v5-c-tabs__item-text">{"History"}</span>
                        </button>
                    </li>
                </ul>
            </div>

            // Status display
            {match &*state {
                AppState::Loading(msg) => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{msg}</p>
                    </div>
                },
                AppState::Done(msg) => html! {
                    <div class="message-top-margin">
                        <Alert r#type={AlertType::Success} title={msg.clone()} inline={true}>
                        </Alert>
                    </div>
                },
                AppState::Error(err) => html! {
                    <div class="message-top-margin">
                        <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                            {err.clone()}
                        </Alert>
                    </div>
                },
                AppState::Idle => html! {}
            }}

            // Tab content
            <div class="tab-pane-content">
                {match &*active_tab {
                    ActiveTab::Profile => html! {
                        <div class="flex-column-gap">
                            <Button onclick={on_scrape} disabled={is_busy || !can_scrape} variant={ButtonVariant::Primary} block={true}>
                                {"Scrape Current Profile"}
                            </Button>
                            if let Some(contact) = (*last_profile).clone() {
                                <ContactCard contact={contact} />
                            }
                        </div>
                    },
                    ActiveTab::Bulk => html! {
                        <div class="flex-column-gap">
                            <div class="stats-box">
                                <StatCounter label="Queued" value={(*bulk).as_ref().map(|s| s.queue_len).filter(|n| *n > 0).or((*queued).clone().and_then(|q| q.ok())).unwrap_or(0)} />
                                <StatCounter label="Scraped" value={(*bulk).as_ref().map(|s| s.stored).unwrap_or(0)} />
                            </div>

                            <label class="delay-label">
                                {format!("Delay between profiles: {}s", *delay)}
                                <input
                                    type="range"
                                    min={MIN_DELAY_SECS.to_string()}
                                    max={MAX_DELAY_SECS.to_string()}
                                    value={delay.to_string()}
                                    oninput={on_delay}
                                    disabled={bulk_state == WalkerState::Running}
                                />
                            </label>

                            if let Some(status) = (*bulk).clone() {
                                if status.state != WalkerState::Idle {
                                    <div class="message-top-margin">
                                        <p class="message-text">{bulk_message(&status)}</p>
                                        <Progress value={status.progress() as f64} />
                                        if let Some(failure) = bulk_warning(&status) {
                                            <Alert r#type={AlertType::Warning} title={"Last profile failed"} inline={true}>
                                                {failure}
                                            </Alert>
                                        }
                                    </div>
                                }
                            }

                            {match bulk_state {
                                WalkerState::Running => html! {
                                    <Button onclick={on_pause} variant={ButtonVariant::Secondary} block={true}>
                                        {"Pause"}
                                    </Button>
                                },
                                WalkerState::Paused => html! {
                                    <Button onclick={on_resume} variant={ButtonVariant::Primary} block={true}>
                                        {"Resume"}
                                    </Button>
                                },
                                WalkerState::Idle | WalkerState::Completed => html! {
                                    <>
                                        if let Some(reason) = bulk_blocked.clone() {
                                            <Alert r#type={AlertType::Info} title={reason} inline={true}>
                                            </Alert>
                                        }
                                        <Button onclick={on_start} disabled={!can_start} variant={ButtonVariant::Primary} block={true}>
                                            {"Start Bulk Scrape"}
                                        </Button>
                                    </>
                                },
                            }}
                        </div>
                    },
                    ActiveTab::History => html! {
                        <div class="flex-column-gap">
                            <StatCounter label="Total contacts" value={history.len()} />

                            <div class="stats-container">
                                <h2 class="stats-title">{"Recent"}</h2>
                                <div class="stats-box">
                                    if history.is_empty() {
                                        <p class="message-text">{"No contacts scraped yet"}</p>
                                    }
                                    {for history.recent(RECENT_COUNT).into_iter().map(|contact| html! {
                                        <ContactRow contact={contact} />
                                    })}
                                </div>
                            </div>

                            <Button onclick={on_export(ExportFormat::Csv)} disabled={is_busy} variant={ButtonVariant::Secondary} block={true}>
                                {"Export CSV"}
                            </Button>
                            <Button onclick={on_export(ExportFormat::Json)} disabled={is_busy} variant={ButtonVariant::Secondary} block={true}>
                                {"Export JSON"}
                            </Button>
                            <Button onclick={on_purge} disabled={is_busy} variant={ButtonVariant::Secondary} block={true}>
                                {"Remove Old Contacts"}
                            </Button>
                            <Button onclick={on_clear} disabled={is_busy} variant={ButtonVariant::Danger} block={true}>
                                {"Clear History"}
                            </Button>
                        </div>
                    },
                }}
            </div>

            <p class="footer-popup">
                {"LinkedIn Scraper v0.1.0"}
            </p>
        </div>
    }
}

// Helper functions

/// Send `request` to the background worker; error responses become `Err`
async fn send(request: Request) -> Result<Response, String> {
    let message = chrome::to_js(&request).map_err(|e| e.to_string())?;
    let reply = sendMessage(message)
        .await
        .map_err(|e| format!("Background unavailable: {}", js_message(&e)))?;

    match serde_wasm_bindgen::from_value::<Response>(reply) {
        Ok(Response::Error { message }) => Err(message),
        Ok(response) => Ok(response),
        Err(e) => Err(format!("Failed to parse response: {}", e)),
    }
}

fn bulk_command(
    request: Request,
    failure: &'static str,
    state: UseStateHandle<AppState>,
    bulk: UseStateHandle<Option<WalkerStatus>>,
) -> Callback<MouseEvent> {
    Callback::from(move |_| {
        let request = request.clone();
        let state = state.clone();
        let bulk = bulk.clone();
        spawn_local(async move {
            match send(request).await {
                Ok(Response::Bulk { status }) => {
                    state.set(AppState::Idle);
                    bulk.set(Some(status));
                }
                Ok(_) => state.set(AppState::Error("Unexpected response".to_string())),
                Err(e) => state.set(AppState::Error(format!("{}: {}", failure, e))),
            }
        });
    })
}

/// Why a bulk session cannot start from the current page, if anything
fn bulk_blocker(page: Option<&PageStatus>, preview: Option<&Result<usize, String>>) -> Option<String> {
    if let Some(page) = page {
        if page.summary().1 && page.page_type != PageType::Search {
            return Some(ScrapeError::NotSearchPage.to_string());
        }
    }
    match preview {
        Some(Err(e)) => Some(e.clone()),
        _ => None,
    }
}

/// Most recent per-profile failure of the session
fn bulk_warning(status: &WalkerStatus) -> Option<String> {
    if status.state == WalkerState::Idle {
        return None;
    }
    status.last_error.clone()
}

fn bulk_message(status: &WalkerStatus) -> String {
    let position = format!("{}/{}", status.cursor.min(status.queue_len), status.queue_len);
    match (status.state, &status.current) {
        (WalkerState::Running, Some(current)) => format!("Scraping {} ({})", current, position),
        (WalkerState::Paused, _) => format!("Paused at {}", position),
        (WalkerState::Completed, _) => format!("Completed: {} contacts stored", status.stored),
        _ => position,
    }
}

fn contact_store() -> ContactStore {
    ContactStore::new(Rc::new(ChromeStorage))
}

async fn load_history() -> Result<ContactBook, String> {
    contact_store().get_all().await.map_err(|e| {
        warn!("Failed to load history: {}", e);
        format!("Failed to load history: {}", e)
    })
}

async fn export_history(format: ExportFormat) -> Result<usize, String> {
    let book = load_history().await?;
    if book.is_empty() {
        return Err("No data to export".to_string());
    }

    let data = export(&book.contacts, format).map_err(|e| format!("Export failed: {}", e))?;
    exportToFile(&data, &export_filename(format, Utc::now()), format.mime_type())
        .map_err(|e| format!("Download failed: {}", js_message(&e)))?;

    Ok(book.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: WalkerState, cursor: usize) -> WalkerStatus {
        WalkerStatus {
            state,
            session_id: None,
            cursor,
            queue_len: 4,
            stored: 2,
            current: Some("Jane".to_string()),
            last_error: None,
        }
    }

    #[test]
    fn test_page_summary() {
        let mut page = PageStatus {
            page_type: PageType::Profile,
            on_site: false,
            logged_in: false,
        };
        assert_eq!(page.summary(), ("Not on LinkedIn", false));

        page.on_site = true;
        assert_eq!(page.summary(), ("Please login to LinkedIn", false));

        page.logged_in = true;
        assert_eq!(page.summary(), ("Ready", true));
    }

    #[test]
    fn test_bulk_message() {
        assert_eq!(bulk_message(&status(WalkerState::Running, 1)), "Scraping Jane (1/4)");
        assert_eq!(bulk_message(&status(WalkerState::Paused, 2)), "Paused at 2/4");
        assert_eq!(
            bulk_message(&status(WalkerState::Completed, 4)),
            "Completed: 2 contacts stored"
        );
    }

    #[test]
    fn test_bulk_warning() {
        let mut running = status(WalkerState::Running, 3);
        assert_eq!(bulk_warning(&running), None);

        running.last_error = Some("Storage error: quota exceeded".to_string());
        assert_eq!(
            bulk_warning(&running).as_deref(),
            Some("Storage error: quota exceeded")
        );

        running.state = WalkerState::Idle;
        assert_eq!(bulk_warning(&running), None);
    }

    #[test]
    fn test_bulk_blocked_off_search_pages() {
        let mut page = PageStatus {
            page_type: PageType::Profile,
            on_site: true,
            logged_in: true,
        };
        assert_eq!(
            bulk_blocker(Some(&page), None).as_deref(),
            Some("Navigate to LinkedIn search results to use bulk scrape")
        );
        assert!(!page.can_bulk());

        page.page_type = PageType::Search;
        assert!(page.can_bulk());
        assert_eq!(bulk_blocker(Some(&page), Some(&Ok(10))), None);
        assert_eq!(
            bulk_blocker(Some(&page), Some(&Err("No search results found".to_string()))).as_deref(),
            Some("No search results found")
        );

        // logged out pages are reported by the status line instead
        page.page_type = PageType::Feed;
        page.logged_in = false;
        assert_eq!(bulk_blocker(Some(&page), None), None);
    }
}
