/// Transaction Extractor - Chrome extension that lifts transaction records off a merchant dashboard
/// Built with Rust + WASM + Yew

mod bridge;
mod cache;
mod codec;
mod dom;
mod error;
mod extractor;
mod operations;
mod orchestrator;
mod repair;
mod settings;
mod storage;
mod sync;
mod transaction;
pub mod ui;

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use ui::Services;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export the id repair for JavaScript access
#[wasm_bindgen]
pub fn repair_transaction_id(raw: &str) -> String {
    repair::repair(raw).unwrap_or_else(|| transaction::NOT_AVAILABLE.to_string())
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    spawn_local(async {
        let services = Services::load().await;
        yew::Renderer::<ui::popup::App>::with_props(ui::popup::AppProps { services }).render();
    });
}

// Start the Yew app for the detached window
#[wasm_bindgen]
pub fn start_detached() {
    spawn_local(async {
        let services = Services::load().await;
        yew::Renderer::<ui::detached::DetachedApp>::with_props(ui::detached::DetachedAppProps { services }).render();
    });
}
