/// Bindings to the `chrome.*` helpers in bridge.js
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::dom::DomNode;
use crate::error::{HostError, StorageError};
use crate::orchestrator::TabHost;
use crate::storage::KeyValueStorage;
use crate::transaction::TabInfo;

// Import JS bridge functions
#[wasm_bindgen(module = "/bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getActiveTab() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getAllTabs() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn snapshotTab(tab_id: i32, text_classes: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageGet(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageSet(key: &str, value: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageRemove(keys: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageKeys() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn openDetachedWindow() -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn focusDetachedWindow() -> Result<JsValue, JsValue>;

    fn closeCurrentWindow();

    fn exportToFile(data: &str, filename: &str);
}

fn host_error(e: JsValue) -> HostError {
    let message = e
        .dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .or_else(|| e.as_string())
        .unwrap_or_else(|| format!("{:?}", e));
    HostError(message)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, HostError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| HostError(format!("Failed to serialize: {:?}", e)))
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, HostError> {
    serde_wasm_bindgen::from_value(value).map_err(|e| HostError(format!("Failed to parse: {:?}", e)))
}

/// `chrome.tabs` + `chrome.scripting`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChromeTabs;

impl TabHost for ChromeTabs {
    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError> {
        let tab = getActiveTab().await.map_err(host_error)?;
        if tab.is_null() || tab.is_undefined() {
            Ok(None)
        } else {
            from_js(tab).map(Some)
        }
    }

    async fn all_tabs(&self) -> Result<Vec<TabInfo>, HostError> {
        from_js(getAllTabs().await.map_err(host_error)?)
    }

    async fn snapshot(&self, tab_id: i32, text_classes: &[String]) -> Result<DomNode, HostError> {
        let root = snapshotTab(tab_id, to_js(text_classes)?).await.map_err(host_error)?;
        if root.is_null() || root.is_undefined() {
            return Err(HostError("Page returned no document".to_string()));
        }
        from_js(root)
    }
}

/// `chrome.storage.local`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChromeStorage;

impl KeyValueStorage for ChromeStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let value = storageGet(key).await.map_err(host_error)?;
        if value.is_null() || value.is_undefined() {
            Ok(None)
        } else {
            Ok(Some(from_js(value)?))
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        storageSet(key, to_js(&value)?).await.map_err(host_error)?;
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        storageRemove(to_js(keys)?).await.map_err(host_error)?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(from_js(storageKeys().await.map_err(host_error)?)?)
    }
}

pub async fn open_detached_window() -> Result<(), HostError> {
    openDetachedWindow().await.map_err(host_error)
}

/// Focus an existing detached window; false when there is none
pub async fn focus_detached_window() -> Result<bool, HostError> {
    let focused = focusDetachedWindow().await.map_err(host_error)?;
    Ok(focused.as_bool().unwrap_or(false))
}

pub fn close_current_window() {
    closeCurrentWindow();
}

pub fn export_to_file(data: &str, filename: &str) {
    exportToFile(data, filename);
}

/// Repeating timer that is cleared when dropped
pub struct IntervalGuard {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

impl IntervalGuard {
    pub fn start(interval_ms: u32, callback: impl FnMut() + 'static) -> Result<IntervalGuard, HostError> {
        let window = web_sys::window().ok_or_else(|| HostError("No window".to_string()))?;
        let callback = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
        let handle = window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                interval_ms as i32,
            )
            .map_err(host_error)?;

        Ok(IntervalGuard {
            handle,
            _callback: callback,
        })
    }
}

impl Drop for IntervalGuard {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            window.clear_interval_with_handle(self.handle);
        }
    }
}

/// Listener on the current window that is removed when dropped
pub struct WindowListener {
    event: &'static str,
    callback: Closure<dyn FnMut()>,
}

impl WindowListener {
    pub fn add(event: &'static str, callback: impl FnMut() + 'static) -> Result<WindowListener, HostError> {
        let window = web_sys::window().ok_or_else(|| HostError("No window".to_string()))?;
        let callback = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
        window
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .map_err(host_error)?;

        Ok(WindowListener { event, callback })
    }
}

impl Drop for WindowListener {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            let _ = window.remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref());
        }
    }
}
