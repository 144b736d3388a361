/// Serializable snapshot of the target page's DOM
///
/// The bridge walks the live document inside the tab and hands back this tree
/// as JSON. Extraction then runs on the snapshot in Rust, so it can be tested
/// against hand-built fixture trees.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tag used for text nodes in the snapshot
pub const TEXT_TAG: &str = "#text";

/// One node of the snapshot. Text nodes carry their content in `text`;
/// elements carry their rendered text (what `innerText` reported) there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DomNode {
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<DomNode>,
}

impl DomNode {
    pub fn element(tag: &str, classes: &[&str]) -> DomNode {
        DomNode {
            tag: tag.to_lowercase(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            ..DomNode::default()
        }
    }

    pub fn text_node(text: &str) -> DomNode {
        DomNode {
            tag: TEXT_TAG.to_string(),
            text: text.to_string(),
            ..DomNode::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> DomNode {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_rendered_text(mut self, text: &str) -> DomNode {
        self.text = text.to_string();
        self
    }

    pub fn with_child(mut self, child: DomNode) -> DomNode {
        self.children.push(child);
        self
    }

    pub fn is_text(&self) -> bool {
        self.tag == TEXT_TAG
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Text as rendered by the page for this element
    pub fn rendered_text(&self) -> &str {
        &self.text
    }

    /// Concatenation of every descendant text node, in document order
    pub fn tree_text(&self) -> String {
        if self.is_text() {
            return self.text.clone();
        }

        self.children.iter().map(DomNode::tree_text).collect()
    }

    /// Full text of the subtree, preferring the text nodes over the rendered text
    pub fn text_content(&self) -> String {
        let tree = self.tree_text();
        if tree.trim().is_empty() {
            self.text.clone()
        } else {
            tree
        }
    }

    /// Every element in this subtree (including `self`) that matches, in
    /// document order
    pub fn select<'a>(&'a self, matcher: &ElementMatcher) -> Vec<&'a DomNode> {
        let mut found = Vec::new();
        self.collect_matching(matcher, &mut found);
        found
    }

    fn collect_matching<'a>(&'a self, matcher: &ElementMatcher, found: &mut Vec<&'a DomNode>) {
        if matcher.matches(self) {
            found.push(self);
        }
        for child in &self.children {
            child.collect_matching(matcher, found);
        }
    }
}

/// Structural signature of an element: tag plus class markers.
///
/// `classes` must all be present verbatim; each entry of `class_prefixes`
/// must be the prefix of at least one class, which covers the hashed class
/// names minified builds emit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ElementMatcher {
    pub tag: Option<String>,
    pub classes: Vec<String>,
    pub class_prefixes: Vec<String>,
}

impl ElementMatcher {
    pub fn new(tag: &str, classes: &[&str]) -> ElementMatcher {
        ElementMatcher {
            tag: Some(tag.to_lowercase()),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            class_prefixes: Vec::new(),
        }
    }

    pub fn tag(tag: &str) -> ElementMatcher {
        ElementMatcher::new(tag, &[])
    }

    pub fn with_class_prefix(mut self, prefix: &str) -> ElementMatcher {
        self.class_prefixes.push(prefix.to_string());
        self
    }

    pub fn matches(&self, node: &DomNode) -> bool {
        if node.is_text() {
            return false;
        }

        if let Some(tag) = &self.tag {
            if !node.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        self.classes.iter().all(|class| node.classes.contains(class))
            && self
                .class_prefixes
                .iter()
                .all(|prefix| node.classes.iter().any(|class| class.starts_with(prefix.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DomNode {
        DomNode::element("div", &["root"])
            .with_child(
                DomNode::element("span", &["label", "sc-a1b2"])
                    .with_rendered_text("Hello")
                    .with_child(DomNode::text_node("Hel"))
                    .with_child(DomNode::text_node("lo")),
            )
            .with_child(DomNode::element("span", &["label"]).with_child(DomNode::text_node(" world")))
    }

    #[test]
    fn test_tree_text_concatenates_in_order() {
        assert_eq!(sample().tree_text(), "Hello world");
    }

    #[test]
    fn test_text_content_falls_back_to_rendered_text() {
        let node = DomNode::element("span", &[]).with_rendered_text("only rendered");
        assert_eq!(node.text_content(), "only rendered");
    }

    #[test]
    fn test_select_document_order() {
        let root = sample();
        let labels = root.select(&ElementMatcher::new("span", &["label"]));
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].rendered_text(), "Hello");
    }

    #[test]
    fn test_select_includes_self() {
        let root = sample();
        assert_eq!(root.select(&ElementMatcher::new("div", &["root"])).len(), 1);
    }

    #[test]
    fn test_matcher_class_prefix() {
        let root = sample();
        let matcher = ElementMatcher::tag("span").with_class_prefix("sc-");
        assert_eq!(root.select(&matcher).len(), 1);
    }

    #[test]
    fn test_matcher_ignores_text_nodes() {
        let matcher = ElementMatcher::default();
        assert!(!matcher.matches(&DomNode::text_node("x")));
        assert!(matcher.matches(&DomNode::element("p", &[])));
    }

    #[test]
    fn test_deserialize_partial_snapshot() {
        let json = r##"{"tag":"a","attributes":{"href":"/t/ABCDEF1234567"},"children":[{"tag":"#text","text":"x"}]}"##;
        let node: DomNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.attr("href"), Some("/t/ABCDEF1234567"));
        assert!(node.children[0].is_text());
        assert!(node.classes.is_empty());
    }
}
