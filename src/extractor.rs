/// Transaction extraction from a page snapshot
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dom::{DomNode, ElementMatcher};
use crate::repair::{RepairTables, find_embedded_id, is_clean_id, repair_with};
use crate::transaction::{NO_CUSTOMER, NOT_AVAILABLE, Transaction};

static ID_IN_HREF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z0-9]{13}").unwrap());

/// Structural markers for the current build of the target page.
///
/// These change whenever the page ships a new build, so they live in
/// settings rather than in the extraction code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PageSignature {
    /// One transaction row
    pub container: ElementMatcher,
    /// Customer (first match) and date (second match)
    pub subtitle: ElementMatcher,
    /// Amount
    pub success: ElementMatcher,
    /// Link to the transaction detail page
    pub anchor: ElementMatcher,
    /// Element that renders the identifier text
    pub identifier: ElementMatcher,
    /// Attributes that sometimes hold the identifier, in the order tried
    pub identifier_attributes: Vec<String>,
}

impl Default for PageSignature {
    fn default() -> Self {
        PageSignature {
            container: ElementMatcher::new("div", &["transaction-list-item"]),
            subtitle: ElementMatcher::new("span", &["text-subtitle"]),
            success: ElementMatcher::new("span", &["text-success"]),
            anchor: ElementMatcher::tag("a"),
            identifier: ElementMatcher::new("span", &["transaction-id"]),
            identifier_attributes: vec!["data-id".to_string(), "id".to_string(), "value".to_string()],
        }
    }
}

impl PageSignature {
    /// Classes whose elements must keep their rendered text in the snapshot
    pub fn rendered_text_classes(&self) -> Vec<String> {
        self.identifier.classes.clone()
    }
}

/// Extract every transaction on the page, in document order.
///
/// A page with no matching containers yields an empty list. Missing fields
/// fall back to their sentinels and never abort the rest of the page.
pub fn extract_all(root: &DomNode, signature: &PageSignature, tables: &RepairTables) -> Vec<Transaction> {
    let containers = root.select(&signature.container);
    if containers.is_empty() {
        log::info!("No transaction containers found");
        return Vec::new();
    }

    let transactions: Vec<Transaction> = containers
        .into_iter()
        .map(|container| extract_transaction(container, signature, tables))
        .collect();

    let missing = transactions.iter().filter(|tx| !tx.has_transaction_id()).count();
    log::info!(
        "Extracted {} transactions ({} without a recoverable id)",
        transactions.len(),
        missing
    );

    transactions
}

/// Extract the four fields of one container
pub fn extract_transaction(container: &DomNode, signature: &PageSignature, tables: &RepairTables) -> Transaction {
    let subtitles = container.select(&signature.subtitle);
    let customer = subtitles
        .first()
        .and_then(|node| non_empty_text(node))
        .unwrap_or_else(|| NO_CUSTOMER.to_string());
    let date = subtitles
        .get(1)
        .and_then(|node| non_empty_text(node))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let amount = container
        .select(&signature.success)
        .first()
        .and_then(|node| non_empty_text(node))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let transaction_id = recover_transaction_id(container, signature, tables).unwrap_or_else(|| {
        log::debug!("No recoverable transaction id for customer {:?}", customer);
        NOT_AVAILABLE.to_string()
    });

    Transaction::new(customer, date, amount, transaction_id)
}

/// Try each identifier source, most reliable first
fn recover_transaction_id(container: &DomNode, signature: &PageSignature, tables: &RepairTables) -> Option<String> {
    id_from_href(container, &signature.anchor)
        .or_else(|| id_from_identifier_text(container, signature, tables))
        .or_else(|| find_embedded_id(&container.text_content()))
}

/// Hrefs are not virtualized the way rendered text is
fn id_from_href(container: &DomNode, anchor: &ElementMatcher) -> Option<String> {
    container
        .select(anchor)
        .into_iter()
        .filter_map(|node| node.attr("href"))
        .find_map(|href| ID_IN_HREF.find(href).map(|m| m.as_str().to_string()))
}

fn id_from_identifier_text(container: &DomNode, signature: &PageSignature, tables: &RepairTables) -> Option<String> {
    container.select(&signature.identifier).into_iter().find_map(|node| {
        let attributes = signature
            .identifier_attributes
            .iter()
            .filter_map(|name| node.attr(name).map(str::to_string));

        std::iter::once(node.rendered_text().to_string())
            .chain(std::iter::once(node.tree_text()))
            .chain(attributes)
            .find_map(|candidate| accept_or_repair(&candidate, tables))
    })
}

fn accept_or_repair(candidate: &str, tables: &RepairTables) -> Option<String> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return None;
    }

    if is_clean_id(trimmed) {
        return Some(trimmed.to_string());
    }

    let repaired = repair_with(trimmed, tables);
    if let Some(id) = &repaired {
        log::debug!("Repaired transaction id {:?} -> {}", trimmed, id);
    }
    repaired
}

fn non_empty_text(node: &DomNode) -> Option<String> {
    let text = node.text_content();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subtitle(text: &str) -> DomNode {
        DomNode::element("span", &["text-subtitle"])
            .with_rendered_text(text)
            .with_child(DomNode::text_node(text))
    }

    fn amount(text: &str) -> DomNode {
        DomNode::element("span", &["text-success"]).with_child(DomNode::text_node(text))
    }

    fn id_span(rendered: &str) -> DomNode {
        DomNode::element("span", &["transaction-id"])
            .with_rendered_text(rendered)
            .with_child(DomNode::text_node(rendered))
    }

    fn row(children: Vec<DomNode>) -> DomNode {
        children
            .into_iter()
            .fold(DomNode::element("div", &["transaction-list-item"]), DomNode::with_child)
    }

    fn page(rows: Vec<DomNode>) -> DomNode {
        rows.into_iter()
            .fold(DomNode::element("body", &[]), DomNode::with_child)
    }

    fn extract(root: &DomNode) -> Vec<Transaction> {
        extract_all(root, &PageSignature::default(), &RepairTables::default())
    }

    #[test]
    fn test_three_rows_clean_repaired_and_unrecoverable() {
        let root = page(vec![
            row(vec![subtitle("John Doe"), subtitle("Oct 5, 2024"), amount("$12.50"), id_span("ABCDEF1234567")]),
            row(vec![
                subtitle("Jane Smith"),
                subtitle("Oct 6, 2024"),
                amount("$7.00"),
                id_span(&format!("EEP8{}NRJ4C", "6".repeat(12))),
            ]),
            row(vec![subtitle("Bob Johnson"), subtitle("Oct 7, 2024"), amount("$3.25"), id_span("??garbled??????")]),
        ]);

        let transactions = extract(&root);

        assert_eq!(transactions.len(), 3);
        assert_eq!(transactions[0].transaction_id, "ABCDEF1234567");
        assert_eq!(transactions[1].transaction_id, "EEP86556NRJ4C");
        assert_eq!(transactions[2].transaction_id, NOT_AVAILABLE);
        assert_eq!(transactions[2].customer, "Bob Johnson");
        assert_eq!(transactions[1].amount, "$7.00");
    }

    #[test]
    fn test_missing_fields_use_sentinels() {
        let root = page(vec![row(vec![])]);
        let transactions = extract(&root);

        assert_eq!(
            transactions,
            vec![Transaction::new(
                NO_CUSTOMER.to_string(),
                NOT_AVAILABLE.to_string(),
                NOT_AVAILABLE.to_string(),
                NOT_AVAILABLE.to_string(),
            )]
        );
    }

    #[test]
    fn test_no_containers_is_empty() {
        let root = page(vec![DomNode::element("div", &["something-else"])]);
        assert!(extract(&root).is_empty());
    }

    #[test]
    fn test_href_wins_over_text() {
        let anchor = DomNode::element("a", &[]).with_attr("href", "/payments/ZZZZ99998888Q?tab=1");
        let root = page(vec![row(vec![subtitle("John Doe"), anchor, id_span("ABCDEF1234567")])]);

        assert_eq!(extract(&root)[0].transaction_id, "ZZZZ99998888Q");
    }

    #[test]
    fn test_split_text_nodes_use_tree_walk() {
        let split = DomNode::element("span", &["transaction-id"])
            .with_rendered_text("")
            .with_child(DomNode::text_node("ABCDEF"))
            .with_child(DomNode::element("b", &[]).with_child(DomNode::text_node("1234567")));
        let root = page(vec![row(vec![split])]);

        assert_eq!(extract(&root)[0].transaction_id, "ABCDEF1234567");
    }

    #[test]
    fn test_identifier_from_attribute() {
        let node = DomNode::element("span", &["transaction-id"]).with_attr("data-id", "QWERTY1234567");
        let root = page(vec![row(vec![node])]);

        assert_eq!(extract(&root)[0].transaction_id, "QWERTY1234567");
    }

    #[test]
    fn test_container_wide_fallback() {
        let note = DomNode::element("p", &[]).with_child(DomNode::text_node("Ref: MNBVCX0987654 paid"));
        let root = page(vec![row(vec![subtitle("John Doe"), note])]);

        assert_eq!(extract(&root)[0].transaction_id, "MNBVCX0987654");
    }

    #[test]
    fn test_extract_is_idempotent_and_ordered() {
        let root = page(vec![
            row(vec![subtitle("B"), id_span("BBBBB12345678")]),
            row(vec![subtitle("A"), id_span("AAAAA12345678")]),
        ]);

        let first = extract(&root);
        let second = extract(&root);

        assert_eq!(first, second);
        assert_eq!(first[0].customer, "B");
        assert_eq!(first[1].customer, "A");
    }

    #[test]
    fn test_custom_signature() {
        let signature = PageSignature {
            container: ElementMatcher::tag("li").with_class_prefix("Row_"),
            ..PageSignature::default()
        };
        let root = DomNode::element("ul", &[])
            .with_child(DomNode::element("li", &["Row_x8f2"]).with_child(subtitle("Custom")));

        let transactions = extract_all(&root, &signature, &RepairTables::default());
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].customer, "Custom");
    }
}
