/// chrome.* APIs behind the host traits
use crate::contact::{PageSnapshot, PageState};
use crate::error::{Result, ScrapeError};
use crate::host::{KeyValueStore, ScrapeHost};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use wasm_bindgen::JsValue;
use wasm_bindgen::JsCast;

mod bridge {
    use wasm_bindgen::prelude::*;

    #[wasm_bindgen(module = "/bridge/chrome_bridge.js")]
    extern "C" {
        #[wasm_bindgen(catch)]
        pub async fn getStorage(key: &str) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch)]
        pub async fn setStorage(key: &str, value: JsValue) -> Result<(), JsValue>;

        #[wasm_bindgen(catch)]
        pub async fn activeTab() -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch)]
        pub async fn updateTab(tab_id: i32, url: &str) -> Result<(), JsValue>;

        #[wasm_bindgen(catch)]
        pub async fn createTab(url: &str) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch)]
        pub async fn pageState(tab_id: i32) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch)]
        pub async fn pageSnapshot(tab_id: i32) -> Result<JsValue, JsValue>;

        #[wasm_bindgen(catch)]
        pub async fn sleep(ms: u32) -> Result<(), JsValue>;

        #[wasm_bindgen(catch)]
        pub async fn ensureAlarm(name: &str, delay_minutes: f64, period_minutes: f64) -> Result<(), JsValue>;

        pub fn showNotification(title: &str, message: &str);

        pub fn setBadge(tab_id: i32, text: &str, color: &str);
    }
}

/// Readable message for a rejected promise
pub fn js_message(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

/// Plain JS value for `value`; maps become objects, not `Map`s
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}

/// chrome.storage.local
pub struct ChromeStorage;

#[async_trait(?Send)]
impl KeyValueStore for ChromeStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let value = bridge::getStorage(key)
            .await
            .map_err(|e| ScrapeError::Storage(js_message(&e)))?;

        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        Ok(Some(serde_wasm_bindgen::from_value(value)?))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        bridge::setStorage(key, to_js(&value)?)
            .await
            .map_err(|e| ScrapeError::Storage(js_message(&e)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveTab {
    pub id: i32,
    pub url: String,
}

pub async fn active_tab() -> Result<ActiveTab> {
    let tab = bridge::activeTab()
        .await
        .map_err(|e| ScrapeError::Host(js_message(&e)))?;

    if tab.is_null() || tab.is_undefined() {
        return Err(ScrapeError::Host("No active tab".to_string()));
    }
    Ok(serde_wasm_bindgen::from_value(tab)?)
}

pub async fn open_tab(url: &str) -> Result<()> {
    bridge::createTab(url)
        .await
        .map(|_| ())
        .map_err(|e| ScrapeError::Host(js_message(&e)))
}

pub async fn sleep(duration: Duration) {
    let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
    // setTimeout never rejects
    let _ = bridge::sleep(ms).await;
}

pub fn notify(title: &str, message: &str) {
    bridge::showNotification(title, message);
}

/// Badge for `tab_id`; `None` clears it
pub fn set_badge(tab_id: i32, badge: Option<(&str, &str)>) {
    match badge {
        Some((text, color)) => bridge::setBadge(tab_id, text, color),
        None => bridge::setBadge(tab_id, "", ""),
    }
}

/// Create the named alarm unless it is already scheduled
pub async fn ensure_alarm(name: &str, delay: Duration, period: Duration) -> Result<()> {
    let minutes = |d: Duration| d.as_secs_f64() / 60.0;
    bridge::ensureAlarm(name, minutes(delay), minutes(period))
        .await
        .map_err(|e| ScrapeError::Host(js_message(&e)))
}

/// One browser tab driven through chrome.tabs and chrome.scripting
pub struct TabHost {
    tab_id: i32,
}

impl TabHost {
    pub fn new(tab_id: i32) -> Self {
        TabHost { tab_id }
    }

    pub fn tab_id(&self) -> i32 {
        self.tab_id
    }
}

#[async_trait(?Send)]
impl ScrapeHost for TabHost {
    async fn navigate(&self, url: &str) -> Result<()> {
        bridge::updateTab(self.tab_id, url)
            .await
            .map_err(|e| ScrapeError::Navigation {
                url: url.to_string(),
                message: js_message(&e),
            })
    }

    async fn page_state(&self) -> Result<PageState> {
        let state = bridge::pageState(self.tab_id)
            .await
            .map_err(|e| ScrapeError::Host(js_message(&e)))?;
        Ok(serde_wasm_bindgen::from_value(state)?)
    }

    async fn snapshot(&self) -> Result<PageSnapshot> {
        let snapshot = bridge::pageSnapshot(self.tab_id)
            .await
            .map_err(|e| ScrapeError::Host(js_message(&e)))?;
        Ok(serde_wasm_bindgen::from_value(snapshot)?)
    }

    async fn sleep(&self, duration: Duration) {
        sleep(duration).await;
    }

    async fn notify(&self, title: &str, message: &str) {
        notify(title, message);
    }
}
