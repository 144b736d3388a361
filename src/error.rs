/// Error types
use thiserror::Error;

/// Failure of a whole extraction run. Per-record problems never end up here;
/// they become sentinel values on the record instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("No transactions page is open. Open the transactions page and try again.")]
    NoTargetTab,

    #[error("Permission denied for this page: {0}. Check the extension's site access.")]
    InjectionPermission(String),

    #[error("Could not read the page: {0}")]
    InjectionFailed(String),
}

impl ExtractError {
    /// Classify a raw host failure message
    pub fn from_host(error: HostError) -> ExtractError {
        let lower = error.0.to_lowercase();
        if lower.contains("no tab with id") || lower.contains("no target tab") {
            ExtractError::NoTargetTab
        } else if lower.contains("cannot access")
            || lower.contains("permission")
            || lower.contains("host permissions")
        {
            ExtractError::InjectionPermission(error.0)
        } else {
            ExtractError::InjectionFailed(error.0)
        }
    }
}

/// Raw failure reported by a host capability call
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct HostError(pub String);

/// Failure inside the cache layer. Logged and absorbed, never shown to the user.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage host error: {0}")]
    Host(#[from] HostError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt entry {key}: {reason}")]
    Decode { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_permission() {
        let error = ExtractError::from_host(HostError(
            "Cannot access contents of the page. Extension manifest must request permission to access the respective host.".to_string(),
        ));
        assert!(matches!(error, ExtractError::InjectionPermission(_)));
    }

    #[test]
    fn test_classify_missing_tab() {
        let error = ExtractError::from_host(HostError("No tab with id: 42.".to_string()));
        assert_eq!(error, ExtractError::NoTargetTab);
    }

    #[test]
    fn test_classify_other() {
        let error = ExtractError::from_host(HostError("Frame with ID 0 was removed.".to_string()));
        assert_eq!(error, ExtractError::InjectionFailed("Frame with ID 0 was removed.".to_string()));
    }

    #[test]
    fn test_messages_are_distinct() {
        let no_tab = ExtractError::NoTargetTab.to_string();
        let permission = ExtractError::InjectionPermission("x".to_string()).to_string();
        let other = ExtractError::InjectionFailed("x".to_string()).to_string();

        assert_ne!(no_tab, permission);
        assert_ne!(permission, other);
        assert!(permission.contains("Permission"));
    }
}
