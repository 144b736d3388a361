/// Transaction operations for display: searching, redaction, date formatting

use chrono::{NaiveDate, NaiveDateTime};

use crate::transaction::{NO_CUSTOMER, NOT_AVAILABLE, Transaction};

/// Keep transactions whose customer, date, amount or id contains `term`,
/// ignoring case. Order is preserved.
pub fn filter_transactions(transactions: &[Transaction], term: &str) -> Vec<Transaction> {
    let query = term.trim().to_lowercase();
    if query.is_empty() {
        return transactions.to_vec();
    }

    transactions
        .iter()
        .filter(|tx| {
            [&tx.customer, &tx.date, &tx.amount, &tx.transaction_id]
                .iter()
                .any(|field| field.to_lowercase().contains(&query))
        })
        .cloned()
        .collect()
}

/// Mask personal details for screen sharing
pub fn redact(tx: &Transaction) -> Transaction {
    Transaction {
        customer: redact_customer(&tx.customer),
        transaction_id: redact_id(&tx.transaction_id),
        ..tx.clone()
    }
}

fn redact_customer(customer: &str) -> String {
    if customer == NO_CUSTOMER {
        return customer.to_string();
    }

    customer
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => std::iter::once(first).chain(chars.map(|_| '*')).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn redact_id(id: &str) -> String {
    if id == NOT_AVAILABLE {
        return id.to_string();
    }

    let len = id.chars().count();
    id.chars()
        .enumerate()
        .map(|(i, c)| if i + 4 < len { '*' } else { c })
        .collect()
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%b %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%m/%d/%Y %I:%M %p",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%d %b %Y"];

/// Render a raw page date as `MM/DD/YYYY`. Text that is not a recognizable
/// date comes back unchanged.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();

    let parsed = DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok().map(|dt| dt.date()))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        });

    match parsed {
        Some(date) => date.format("%m/%d/%Y").to_string(),
        None => raw.to_string(),
    }
}

/// Rows as shown: filtered by the search term, then redacted if asked
pub fn visible_transactions(transactions: &[Transaction], term: &str, privacy_mode: bool) -> Vec<Transaction> {
    let filtered = filter_transactions(transactions, term);
    if privacy_mode {
        filtered.iter().map(redact).collect()
    } else {
        filtered
    }
}

/// Pretty JSON export of the given rows, dates normalized
pub fn export_json(transactions: &[Transaction]) -> serde_json::Result<String> {
    let rows: Vec<Transaction> = transactions
        .iter()
        .map(|tx| Transaction {
            date: normalize_date(&tx.date),
            ..tx.clone()
        })
        .collect();
    serde_json::to_string_pretty(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_transaction(customer: &str, id: &str) -> Transaction {
        Transaction::new(
            customer.to_string(),
            "Oct 5, 2024".to_string(),
            "$10.00".to_string(),
            id.to_string(),
        )
    }

    fn people() -> Vec<Transaction> {
        vec![
            create_test_transaction("John Doe", "AAAAB12345678"),
            create_test_transaction("Jane Smith", "BBBBC12345678"),
            create_test_transaction("Bob Johnson", "CCCCD12345678"),
        ]
    }

    #[test]
    fn test_filter_is_case_insensitive_and_ordered() {
        let filtered = filter_transactions(&people(), "john");

        let names: Vec<&str> = filtered.iter().map(|tx| tx.customer.as_str()).collect();
        assert_eq!(names, vec!["John Doe", "Bob Johnson"]);

        assert_eq!(filter_transactions(&people(), "John").len(), 2);
    }

    #[test]
    fn test_filter_matches_other_fields() {
        assert_eq!(filter_transactions(&people(), "bbbbc")[0].customer, "Jane Smith");
    }

    #[test]
    fn test_empty_filter_returns_all() {
        assert_eq!(filter_transactions(&people(), "   ").len(), 3);
    }

    #[test]
    fn test_redact() {
        let redacted = redact(&create_test_transaction("John Doe", "EEP86556NRJ4C"));

        assert_eq!(redacted.customer, "J*** D**");
        assert_eq!(redacted.transaction_id, "*********RJ4C");
        assert_eq!(redacted.amount, "$10.00");
        assert_eq!(redacted.date, "Oct 5, 2024");
    }

    #[test]
    fn test_redact_keeps_sentinels() {
        let redacted = redact(&create_test_transaction(NO_CUSTOMER, NOT_AVAILABLE));

        assert_eq!(redacted.customer, NO_CUSTOMER);
        assert_eq!(redacted.transaction_id, NOT_AVAILABLE);
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("Oct 5, 2024"), "10/05/2024");
        assert_eq!(normalize_date("October 5, 2024"), "10/05/2024");
        assert_eq!(normalize_date("Oct 5, 2024 3:45 PM"), "10/05/2024");
        assert_eq!(normalize_date("2024-10-05"), "10/05/2024");
        assert_eq!(normalize_date("10/5/2024"), "10/05/2024");
        assert_eq!(normalize_date("10/5/24"), "10/05/2024");
        assert_eq!(normalize_date("N/A"), "N/A");
        assert_eq!(normalize_date("yesterday"), "yesterday");
    }

    #[test]
    fn test_visible_transactions() {
        let visible = visible_transactions(&people(), "jane", true);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].customer, "J*** S****");
    }

    #[test]
    fn test_export_json_normalizes_dates() {
        let json = export_json(&people()[..1]).unwrap();

        assert!(json.contains("\"date\": \"10/05/2024\""));
        assert!(json.contains("\"transactionId\": \"AAAAB12345678\""));
    }
}
