/// Two-tier TTL cache for extracted transactions
///
/// Reads go to the in-memory tier first and fall back to the persistent
/// tier, which survives popup and window restarts. Every failure in here is
/// logged and absorbed: a broken cache must never stop a fresh extraction.
use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec;
use crate::error::StorageError;
use crate::storage::{Clock, KeyValueStorage, MemoryStorage, SystemClock};
use crate::transaction::Transaction;

/// Prefix of every persistent key this cache owns
pub const STORE_PREFIX: &str = "txn_cache_";

/// Persistent key holding the most recent write, whatever its URL
pub const LATEST_KEY: &str = "txn_cache_latest";

/// URL used when neither the caller nor the store knows the source page
pub const DEFAULT_URL: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: f64,
    pub max_entries: usize,
    pub compress: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_ms: 10.0 * 60.0 * 1000.0,
            max_entries: 50,
            compress: true,
        }
    }
}

/// A timestamped, URL-scoped payload. Never modified after creation;
/// a newer write replaces the whole entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl<T> CacheEntry<T> {
    pub fn is_expired(&self, now: f64, ttl_ms: f64) -> bool {
        now - self.timestamp > ttl_ms
    }

    fn matches_url(&self, url: Option<&str>) -> bool {
        url.is_none_or(|url| self.url.as_deref() == Some(url))
    }
}

type TransactionEntry = CacheEntry<Vec<Transaction>>;

/// Diagnostic snapshot of both tiers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub persistent_entries: usize,
    pub approx_bytes: usize,
    pub oldest: Option<f64>,
    pub newest: Option<f64>,
}

/// 32-bit shift-and-subtract hash, rendered as hex. Used to tell payloads
/// apart, not for security.
pub fn content_hash(s: &str) -> String {
    let hash = s
        .chars()
        .fold(0u32, |h, c| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as u32));
    format!("{:08x}", hash)
}

/// Key part derived from the path and query of the source URL, or a
/// sanitized copy of the raw string when it does not parse
pub fn url_key(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let path_and_query = match parsed.query() {
                Some(query) => format!("{}?{}", parsed.path(), query),
                None => parsed.path().to_string(),
            };
            content_hash(&path_and_query)
        }
        Err(_) => url
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect(),
    }
}

pub fn cache_key(url: &str, hash: Option<&str>) -> String {
    match hash {
        Some(hash) => format!("{}_{}", url_key(url), hash),
        None => url_key(url),
    }
}

/// The cache itself. Construct one per surface and share it by reference.
pub struct CacheStore<P, C = SystemClock> {
    memory: MemoryStorage,
    persistent: P,
    clock: C,
    config: CacheConfig,
    current_url: RefCell<Option<String>>,
}

impl<P: KeyValueStorage> CacheStore<P, SystemClock> {
    pub fn new(persistent: P, config: CacheConfig) -> Self {
        CacheStore::with_clock(persistent, config, SystemClock)
    }
}

impl<P: KeyValueStorage, C: Clock> CacheStore<P, C> {
    pub fn with_clock(persistent: P, config: CacheConfig, clock: C) -> Self {
        CacheStore {
            memory: MemoryStorage::new(),
            persistent,
            clock,
            config,
            current_url: RefCell::new(None),
        }
    }

    /// Remember the page the surface is looking at, for writes without a URL
    pub fn set_current_url(&self, url: &str) {
        *self.current_url.borrow_mut() = Some(url.to_string());
    }

    fn resolve_url(&self, url: Option<&str>) -> String {
        url.map(str::to_string)
            .or_else(|| self.current_url.borrow().clone())
            .unwrap_or_else(|| DEFAULT_URL.to_string())
    }

    /// Store a copy of `data` in both tiers
    pub async fn set(&self, data: &[Transaction], url: Option<&str>) {
        let url = self.resolve_url(url);
        let serialized = match serde_json::to_string(data) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Cache write skipped, payload did not serialize: {}", e);
                return;
            }
        };
        let hash = content_hash(&serialized);
        let key = cache_key(&url, Some(&hash));

        let entry = CacheEntry {
            data: data.to_vec(),
            timestamp: self.clock.now_ms(),
            url: Some(url),
            hash: Some(hash),
        };
        let value = match serde_json::to_value(&entry) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Cache write skipped: {}", e);
                return;
            }
        };

        let encoded = Value::String(codec::encode(&value.to_string(), self.config.compress));
        self.memory.insert_now(&key, value);
        self.prune_memory();

        let persistent_key = format!("{}{}", STORE_PREFIX, key);
        for target in [persistent_key.as_str(), LATEST_KEY] {
            if let Err(e) = self.persistent.set(target, encoded.clone()).await {
                log::warn!("Cache persist failed for {}: {}", target, e);
            }
        }

        log::debug!("Cached {} transactions under {}", data.len(), key);
    }

    /// Newest non-expired entry for `url` (or for any URL), memory tier first
    pub async fn get(&self, url: Option<&str>) -> Option<Vec<Transaction>> {
        let now = self.clock.now_ms();

        if let Some(entry) = self.newest_in_memory(url, now) {
            log::debug!("Cache hit (memory)");
            return Some(entry.data);
        }

        let entry = self.newest_in_persistent(url, now).await?;
        log::debug!("Cache hit (persistent)");

        if let (Some(entry_url), Ok(value)) = (entry.url.as_deref(), serde_json::to_value(&entry)) {
            self.memory.insert_now(&cache_key(entry_url, entry.hash.as_deref()), value);
            self.prune_memory();
        }

        Some(entry.data)
    }

    pub async fn has(&self, url: Option<&str>) -> bool {
        self.get(url).await.is_some()
    }

    /// Drop the entries for `url`, or everything this cache owns
    pub async fn clear(&self, url: Option<&str>) {
        match url {
            None => self.memory.retain(|_, _| false),
            Some(url) => self.memory.retain(|_, value| {
                !decode_memory(value).is_some_and(|entry| entry.url.as_deref() == Some(url))
            }),
        }

        let mut doomed = Vec::new();
        for (key, decoded) in self.persistent_entries().await {
            let remove = match (url, decoded) {
                (None, _) => true,
                (Some(url), Ok(entry)) => entry.url.as_deref() == Some(url),
                (Some(_), Err(_)) => false,
            };
            if remove {
                doomed.push(key);
            }
        }

        self.remove_persistent(&doomed).await;
    }

    /// Evict every expired or undecodable entry from both tiers.
    /// Returns how many entries were removed.
    pub async fn cleanup(&self) -> usize {
        let now = self.clock.now_ms();
        let ttl = self.config.ttl_ms;

        let before = self.memory.len();
        self.memory
            .retain(|_, value| decode_memory(value).is_some_and(|entry| !entry.is_expired(now, ttl)));
        let mut removed = before - self.memory.len();

        let mut doomed = Vec::new();
        for (key, decoded) in self.persistent_entries().await {
            match decoded {
                Ok(entry) if !entry.is_expired(now, ttl) => {}
                Ok(_) => doomed.push(key),
                Err(e) => {
                    log::warn!("Evicting corrupt cache entry: {}", e);
                    doomed.push(key);
                }
            }
        }
        removed += doomed.len();
        self.remove_persistent(&doomed).await;

        if removed > 0 {
            log::info!("Cache cleanup removed {} entries", removed);
        }
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            memory_entries: self.memory.len(),
            ..CacheStats::default()
        };

        let mut timestamps: Vec<f64> = self
            .memory
            .keys_now()
            .iter()
            .filter_map(|key| self.memory.get_now(key))
            .filter_map(|value| decode_memory(&value))
            .map(|entry| entry.timestamp)
            .collect();

        for key in self.persistent_keys().await {
            if let Ok(Some(Value::String(stored))) = self.persistent.get(&key).await {
                stats.persistent_entries += 1;
                stats.approx_bytes += stored.len();
                if let Ok(entry) = decode_persistent(&key, &Value::String(stored)) {
                    timestamps.push(entry.timestamp);
                }
            }
        }

        stats.oldest = timestamps.iter().copied().reduce(f64::min);
        stats.newest = timestamps.iter().copied().reduce(f64::max);
        stats
    }

    fn newest_in_memory(&self, url: Option<&str>, now: f64) -> Option<TransactionEntry> {
        let mut corrupt = Vec::new();
        let mut best: Option<TransactionEntry> = None;

        for key in self.memory.keys_now() {
            let Some(value) = self.memory.get_now(&key) else { continue };
            match decode_memory(&value) {
                Some(entry) => {
                    if !entry.is_expired(now, self.config.ttl_ms)
                        && entry.matches_url(url)
                        && best.as_ref().is_none_or(|b| entry.timestamp > b.timestamp)
                    {
                        best = Some(entry);
                    }
                }
                None => corrupt.push(key),
            }
        }

        for key in corrupt {
            self.memory.remove_now(&key);
        }
        best
    }

    async fn newest_in_persistent(&self, url: Option<&str>, now: f64) -> Option<TransactionEntry> {
        let mut corrupt = Vec::new();
        let mut best: Option<TransactionEntry> = None;

        for (key, decoded) in self.persistent_entries().await {
            match decoded {
                Ok(entry) => {
                    if !entry.is_expired(now, self.config.ttl_ms)
                        && entry.matches_url(url)
                        && best.as_ref().is_none_or(|b| entry.timestamp > b.timestamp)
                    {
                        best = Some(entry);
                    }
                }
                Err(e) => {
                    log::warn!("Treating corrupt cache entry as a miss: {}", e);
                    corrupt.push(key);
                }
            }
        }

        self.remove_persistent(&corrupt).await;
        best
    }

    async fn persistent_keys(&self) -> Vec<String> {
        match self.persistent.keys().await {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(STORE_PREFIX)).collect(),
            Err(e) => {
                log::warn!("Could not list cache keys: {}", e);
                Vec::new()
            }
        }
    }

    async fn persistent_entries(&self) -> Vec<(String, Result<TransactionEntry, StorageError>)> {
        let mut entries = Vec::new();
        for key in self.persistent_keys().await {
            let decoded = match self.persistent.get(&key).await {
                Ok(Some(value)) => decode_persistent(&key, &value),
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Could not read cache entry {}: {}", key, e);
                    continue;
                }
            };
            entries.push((key, decoded));
        }
        entries
    }

    async fn remove_persistent(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        if let Err(e) = self.persistent.remove(keys).await {
            log::warn!("Could not remove cache entries: {}", e);
        }
    }

    fn prune_memory(&self) {
        while self.memory.len() > self.config.max_entries {
            let oldest = self
                .memory
                .keys_now()
                .into_iter()
                .map(|key| {
                    let timestamp = self
                        .memory
                        .get_now(&key)
                        .and_then(|value| decode_memory(&value))
                        .map_or(f64::NEG_INFINITY, |entry| entry.timestamp);
                    (key, timestamp)
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));

            match oldest {
                Some((key, _)) => {
                    self.memory.remove_now(&key);
                }
                None => break,
            }
        }
    }
}

fn decode_memory(value: &Value) -> Option<TransactionEntry> {
    serde_json::from_value(value.clone()).ok()
}

fn decode_persistent(key: &str, value: &Value) -> Result<TransactionEntry, StorageError> {
    let corrupt = |reason: String| StorageError::Decode {
        key: key.to_string(),
        reason,
    };

    match value {
        Value::String(stored) => {
            let json = codec::decode(stored).ok_or_else(|| corrupt("bad compression".to_string()))?;
            serde_json::from_str(&json).map_err(|e| corrupt(e.to_string()))
        }
        other => serde_json::from_value(other.clone()).map_err(|e| corrupt(e.to_string())),
    }
}
