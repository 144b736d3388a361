/// Key-value storage capability and clock used by the cache and sync layers
///
/// The extension's persistent storage (`chrome.storage.local`) and the
/// in-memory tier both implement `KeyValueStorage`; the cache composes them.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StorageError;

/// Async string-keyed storage of JSON values
#[allow(async_fn_in_trait)]
pub trait KeyValueStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError>;

    /// Every key currently stored, in no particular order
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key).await? {
            Some(value) if !value.is_null() => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StorageError::Decode {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            _ => Ok(None),
        }
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.set(key, serde_json::to_value(value)?).await
    }
}

impl<S: KeyValueStorage> KeyValueStorage for Rc<S> {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.as_ref().get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.as_ref().set(key, value).await
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        self.as_ref().remove(keys).await
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.as_ref().keys().await
    }
}

/// Storage held entirely in this process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RefCell<BTreeMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    pub fn get_now(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    pub fn insert_now(&self, key: &str, value: Value) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    pub fn remove_now(&self, key: &str) -> Option<Value> {
        self.values.borrow_mut().remove(key)
    }

    pub fn keys_now(&self) -> Vec<String> {
        self.values.borrow().keys().cloned().collect()
    }

    pub fn retain(&self, keep: impl FnMut(&String, &mut Value) -> bool) {
        self.values.borrow_mut().retain(keep);
    }
}

impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.get_now(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.insert_now(key, value);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        for key in keys {
            self.remove_now(key);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.keys_now())
    }
}

/// Source of the current time in epoch milliseconds
pub trait Clock {
    fn now_ms(&self) -> f64;
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now_ms(&self) -> f64 {
        self.as_ref().now_ms()
    }
}

/// Wall clock: `Date.now()` in the browser, the system time elsewhere
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as f64)
            .unwrap_or(0.0)
    }
}

/// Clock that only moves when told to
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock {
    now: std::cell::Cell<f64>,
}

#[cfg(test)]
impl ManualClock {
    pub fn at(now: f64) -> Rc<ManualClock> {
        Rc::new(ManualClock {
            now: std::cell::Cell::new(now),
        })
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::InstanceMarker;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        storage.set("a", Value::from(1)).await.unwrap();
        storage.set("b", Value::from("two")).await.unwrap();

        assert_eq!(storage.get("a").await.unwrap(), Some(Value::from(1)));
        assert_eq!(storage.keys().await.unwrap(), vec!["a".to_string(), "b".to_string()]);

        storage.remove(&["a".to_string()]).await.unwrap();
        assert_eq!(storage.get("a").await.unwrap(), None);
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let storage = MemoryStorage::new();
        let marker = InstanceMarker {
            id: "abc".to_string(),
            timestamp: 5.0,
        };

        storage.set_json("marker", &marker).await.unwrap();
        let back: Option<InstanceMarker> = storage.get_json("marker").await.unwrap();
        assert_eq!(back, Some(marker));

        let missing: Option<InstanceMarker> = storage.get_json("nope").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_get_json_decode_error() {
        let storage = MemoryStorage::new();
        storage.insert_now("marker", Value::from("not a marker"));

        let result: Result<Option<InstanceMarker>, _> = storage.get_json("marker").await;
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_shared_storage_through_rc() {
        let shared = Rc::new(MemoryStorage::new());
        let other = shared.clone();

        shared.set("k", Value::Bool(true)).await.unwrap();
        assert_eq!(other.get("k").await.unwrap(), Some(Value::Bool(true)));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::at(100.0);
        clock.advance(50.0);
        assert_eq!(clock.now_ms(), 150.0);
        assert!(SystemClock.now_ms() > 0.0);
    }
}
