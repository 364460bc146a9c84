//! JSON page snapshots loaded into a [`Document`].
//!
//! A snapshot is a tree of elements and text:
//!
//! ```json
//! {"tag": "div", "attrs": {"id": "kibana-body"}, "children": ["text", {"tag": "span"}]}
//! ```

use super::{Document, Element};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSnapshot {
    Text(String),
    Element(ElementSnapshot),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(default)]
    pub attrs: IndexMap<String, String>,
    #[serde(default)]
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    /// Read a snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read page snapshot from {:?}", path))?;
        let snapshot: NodeSnapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse page snapshot from {:?}", path))?;
        debug!(path = ?path, "Loaded page snapshot");
        Ok(snapshot)
    }

    /// Build a detached node tree owned by `document`
    pub fn build(&self, document: &Document) -> Element {
        match self {
            NodeSnapshot::Text(text) => document.create_text(text),
            NodeSnapshot::Element(snapshot) => {
                let element = document.create_element(&snapshot.tag);
                for (name, value) in &snapshot.attrs {
                    element.set_attribute(name, value);
                }
                for child in &snapshot.children {
                    element.append_child(&child.build(document));
                }
                element
            }
        }
    }
}
