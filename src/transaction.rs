/// Data structures shared by the extractor, the cache and both UI surfaces
use serde::{Deserialize, Serialize};

/// Placeholder for any field the page did not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Placeholder customer when the transaction has no customer attached
pub const NO_CUSTOMER: &str = "No customer selected";

/// Fixed width of a transaction identifier
pub const TRANSACTION_ID_LEN: usize = 13;

/// A single transaction scraped from the page.
///
/// Every field is always populated; a missing value is one of the sentinels
/// above, never an empty option.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub customer: String,
    pub date: String,
    pub amount: String,
    pub transaction_id: String,
}

impl Transaction {
    pub fn new(customer: String, date: String, amount: String, transaction_id: String) -> Transaction {
        Transaction {
            customer,
            date,
            amount,
            transaction_id,
        }
    }

    pub fn has_transaction_id(&self) -> bool {
        self.transaction_id != NOT_AVAILABLE
    }
}

/// Which UI surface is running
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    Popup,
    Detached,
}

impl SurfaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceKind::Popup => "popup",
            SurfaceKind::Detached => "detached",
        }
    }

    pub fn other(&self) -> SurfaceKind {
        match self {
            SurfaceKind::Popup => SurfaceKind::Detached,
            SurfaceKind::Detached => SurfaceKind::Popup,
        }
    }
}

/// Snapshot handed from one surface to the other when control moves between them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub transactions: Vec<Transaction>,
    pub search_term: String,
    pub privacy_mode: bool,
    pub clover_mode: bool,
    pub timestamp: f64,
}

impl SyncState {
    pub fn with_transactions(transactions: Vec<Transaction>, timestamp: f64) -> SyncState {
        SyncState {
            transactions,
            timestamp,
            ..SyncState::default()
        }
    }
}

/// Liveness record written by a running surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceMarker {
    pub id: String,
    pub timestamp: f64,
}

/// Information about a browser tab, as reported by the host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabInfo {
    pub id: i32,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub active: bool,
}

#[cfg(test)]
impl TabInfo {
    pub fn new(id: i32, url: String, title: String, active: bool) -> TabInfo {
        TabInfo { id, url, title, active }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_serializes_camel_case() {
        let tx = Transaction::new(
            "John Doe".to_string(),
            "Oct 5, 2024".to_string(),
            "$12.50".to_string(),
            "EEP86556NRJ4C".to_string(),
        );

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"transactionId\":\"EEP86556NRJ4C\""));

        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_has_transaction_id() {
        let mut tx = Transaction::new(
            NO_CUSTOMER.to_string(),
            NOT_AVAILABLE.to_string(),
            NOT_AVAILABLE.to_string(),
            NOT_AVAILABLE.to_string(),
        );
        assert!(!tx.has_transaction_id());

        tx.transaction_id = "ABCDEF1234567".to_string();
        assert!(tx.has_transaction_id());
    }

    #[test]
    fn test_surface_kind() {
        assert_eq!(SurfaceKind::Popup.other(), SurfaceKind::Detached);
        assert_eq!(SurfaceKind::Detached.as_str(), "detached");
        assert_eq!(serde_json::to_string(&SurfaceKind::Popup).unwrap(), "\"popup\"");
    }

    #[test]
    fn test_sync_state_field_names() {
        let state = SyncState {
            search_term: "john".to_string(),
            privacy_mode: true,
            ..SyncState::default()
        };

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["searchTerm"], "john");
        assert_eq!(value["privacyMode"], true);
        assert_eq!(value["cloverMode"], false);
    }
}
