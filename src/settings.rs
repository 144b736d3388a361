/// Runtime settings, overridable from extension storage
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::extractor::PageSignature;
use crate::repair::RepairTables;
use crate::storage::KeyValueStorage;
use crate::sync::LivenessConfig;

/// Storage key holding user overrides
pub const SETTINGS_KEY: &str = "txn_extractor_settings";

/// How the detached window recognizes the target page among open tabs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetMatch {
    pub url_patterns: Vec<String>,
    pub title_patterns: Vec<String>,
}

impl Default for TargetMatch {
    fn default() -> Self {
        TargetMatch {
            url_patterns: vec!["clover.com".to_string()],
            title_patterns: vec!["clover".to_string()],
        }
    }
}

impl TargetMatch {
    pub fn matches(&self, url: &str, title: &str) -> bool {
        let url = url.to_lowercase();
        let title = title.to_lowercase();
        self.url_patterns.iter().any(|p| url.contains(&p.to_lowercase()))
            || self.title_patterns.iter().any(|p| title.contains(&p.to_lowercase()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub signature: PageSignature,
    pub repair: RepairTables,
    pub cache: CacheConfig,
    pub liveness: LivenessConfig,
    pub target: TargetMatch,
}

impl Settings {
    /// Stored overrides on top of the defaults. Missing or unreadable
    /// settings fall back to the defaults.
    pub async fn load<S: KeyValueStorage>(storage: &S) -> Settings {
        match storage.get_json::<Settings>(SETTINGS_KEY).await {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                log::warn!("Using default settings: {}", e);
                Settings::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let storage = MemoryStorage::new();
        assert_eq!(Settings::load(&storage).await, Settings::default());
    }

    #[tokio::test]
    async fn test_partial_override() {
        let storage = MemoryStorage::new();
        storage.insert_now(
            SETTINGS_KEY,
            json!({
                "cache": { "ttl_ms": 1000.0 },
                "signature": { "container": { "tag": "li", "classes": ["row"] } }
            }),
        );

        let settings = Settings::load(&storage).await;
        assert_eq!(settings.cache.ttl_ms, 1000.0);
        assert_eq!(settings.cache.max_entries, CacheConfig::default().max_entries);
        assert_eq!(settings.signature.container.tag.as_deref(), Some("li"));
        assert_eq!(settings.signature.subtitle, PageSignature::default().subtitle);
    }

    #[tokio::test]
    async fn test_corrupt_settings_fall_back() {
        let storage = MemoryStorage::new();
        storage.insert_now(SETTINGS_KEY, json!("garbage"));

        assert_eq!(Settings::load(&storage).await, Settings::default());
    }

    #[test]
    fn test_target_match() {
        let target = TargetMatch::default();
        assert!(target.matches("https://www.clover.com/dashboard", ""));
        assert!(target.matches("https://example.com", "Clover Dashboard"));
        assert!(!target.matches("https://example.com", "Example"));
    }
}
