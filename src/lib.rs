/// LinkedIn Scraper - Chrome Extension for collecting contact profiles
/// Built with Rust + WASM + Yew

pub mod background;
pub mod chrome;
pub mod contact;
pub mod error;
pub mod export;
pub mod extractor;
pub mod host;
pub mod listing;
pub mod messages;
pub mod rules;
pub mod settings;
pub mod storage;
pub mod ui;
pub mod walker;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}
