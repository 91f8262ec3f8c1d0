//! `localStorage` backend.

use pc_editor::{StorageBackend, StorageError};
use wasm_bindgen::JsValue;

pub struct LocalStorage {
    storage: Option<web_sys::Storage>,
}

impl LocalStorage {
    /// Grab `window.localStorage`. Access itself may throw (privacy modes,
    /// sandboxed iframes); that leaves the backend unavailable.
    pub fn open() -> Self {
        let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten());
        if storage.is_none() {
            log::warn!("window.localStorage is not accessible");
        }
        Self { storage }
    }

    fn storage(&self) -> Result<&web_sys::Storage, StorageError> {
        self.storage.as_ref().ok_or(StorageError::Unavailable)
    }
}

fn to_storage_error(e: JsValue) -> StorageError {
    let name = js_sys::Reflect::get(&e, &JsValue::from_str("name"))
        .ok()
        .and_then(|n| n.as_string());
    match name.as_deref() {
        Some("QuotaExceededError") => StorageError::QuotaExceeded,
        Some("SecurityError") => StorageError::Unavailable,
        _ => StorageError::Backend(format!("{e:?}")),
    }
}

impl StorageBackend for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?.get_item(key).map_err(to_storage_error)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?.set_item(key, value).map_err(to_storage_error)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.storage()?.remove_item(key).map_err(to_storage_error)
    }
}
