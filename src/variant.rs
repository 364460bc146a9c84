//! Supported dashboard products and how to recognize them.

use crate::constants::{kibana, opensearch, rows::TEST_SUBJ_ATTR};
use crate::dom::{Document, Selector};
use std::fmt;

/// A dashboard product the detector can attach to
pub trait DashboardVariant: fmt::Debug + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Element present on every page of this product
    fn container_root_selector(&self) -> Selector;

    /// Document viewer containers, most specific first
    fn viewer_selectors(&self) -> Vec<Selector>;

    fn detect(&self, document: &Document) -> bool {
        document
            .query_selector(&self.container_root_selector())
            .is_some()
    }
}

#[derive(Debug)]
pub struct Kibana;

impl DashboardVariant for Kibana {
    fn name(&self) -> &'static str {
        "kibana"
    }

    fn container_root_selector(&self) -> Selector {
        Selector::id(kibana::ROOT_ID)
    }

    fn viewer_selectors(&self) -> Vec<Selector> {
        vec![
            Selector::attr_equals(TEST_SUBJ_ATTR, kibana::VIEWER_TEST_SUBJ),
            Selector::class(kibana::VIEWER_CLASS),
        ]
    }
}

#[derive(Debug)]
pub struct OpenSearch;

impl DashboardVariant for OpenSearch {
    fn name(&self) -> &'static str {
        "opensearch-dashboards"
    }

    fn container_root_selector(&self) -> Selector {
        Selector::id(opensearch::ROOT_ID)
    }

    fn viewer_selectors(&self) -> Vec<Selector> {
        vec![Selector::class(opensearch::VIEWER_CLASS)]
    }
}

/// Variants tried in order during identification
pub static SUPPORTED: [&dyn DashboardVariant; 2] = [&Kibana, &OpenSearch];

/// First supported variant whose root marker is in the document
pub fn identify(document: &Document) -> Option<&'static dyn DashboardVariant> {
    SUPPORTED.iter().copied().find(|variant| variant.detect(document))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_with_root(id: &str) -> Document {
        let doc = Document::new("http://localhost/");
        let root = doc.create_element("div");
        root.set_attribute("id", id);
        doc.body().append_child(&root);
        doc
    }

    #[test]
    fn test_identify_kibana() {
        let doc = document_with_root("kibana-body");
        assert_eq!(identify(&doc).map(|v| v.name()), Some("kibana"));
    }

    #[test]
    fn test_identify_opensearch() {
        let doc = document_with_root("opensearch-dashboards-body");
        assert_eq!(identify(&doc).map(|v| v.name()), Some("opensearch-dashboards"));
    }

    #[test]
    fn test_identify_unknown_page() {
        let doc = document_with_root("grafana");
        assert!(identify(&doc).is_none());
    }

    #[test]
    fn test_kibana_viewer_selectors_cover_both_generations() {
        let doc = Document::new("http://localhost/");
        let modern = doc.create_element("div");
        modern.set_attribute("data-test-subj", "kbnDocViewer");
        let legacy = doc.create_element("div");
        legacy.add_class("kbnDocViewer");

        let selectors = Kibana.viewer_selectors();
        assert!(selectors[0].matches(&modern));
        assert!(selectors[1].matches(&legacy));
        assert!(!OpenSearch.viewer_selectors()[0].matches(&legacy));
    }
}
