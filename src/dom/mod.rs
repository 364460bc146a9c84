//! Single-threaded document model the detector observes and mutates.
//!
//! Nodes are reference counted and owned by their parent; parents and the
//! owning document are held weakly. Appending children to a node that is
//! attached to the document notifies every observer.

pub mod selector;
pub mod snapshot;

pub use selector::{AttrMatch, Selector};

use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tokio::sync::mpsc;
use tracing::trace;

/// Identity of a node within its document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Child-list change delivered to observers
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<Element>,
}

impl MutationRecord {
    /// Whether any added node is an element (text-only changes are noise)
    pub fn adds_elements(&self) -> bool {
        self.added.iter().any(Element::is_element)
    }
}

enum NodeKind {
    Element {
        tag: String,
        attributes: RefCell<IndexMap<String, String>>,
    },
    Text(RefCell<String>),
}

struct Node {
    id: NodeId,
    kind: NodeKind,
    children: RefCell<Vec<Element>>,
    parent: RefCell<Weak<Node>>,
    owner: Weak<DocumentInner>,
}

/// Handle to an element or text node
#[derive(Clone)]
pub struct Element(Rc<Node>);

/// Non-owning handle, used by registries that must not keep nodes alive
#[derive(Clone)]
pub struct WeakElement(Weak<Node>);

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.0.upgrade().map(Element)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Element { tag, attributes } => {
                write!(f, "<{tag} {}", self.0.id)?;
                for (name, value) in attributes.borrow().iter() {
                    write!(f, " {name}=\"{value}\"")?;
                }
                write!(f, ">")
            }
            NodeKind::Text(text) => write!(f, "{:?}", text.borrow()),
        }
    }
}

impl Element {
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element { .. })
    }

    /// Lowercase tag name, `None` for text nodes
    pub fn tag_name(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        match &self.0.kind {
            NodeKind::Element { attributes, .. } => attributes.borrow().get(name).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        match &self.0.kind {
            NodeKind::Element { attributes, .. } => attributes.borrow().contains_key(name),
            NodeKind::Text(_) => false,
        }
    }

    /// Set an attribute. Ignored on text nodes.
    pub fn set_attribute(&self, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &self.0.kind {
            attributes.borrow_mut().insert(name.to_string(), value.to_string());
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attribute("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let classes = match self.get_attribute("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attribute("class", &classes);
    }

    /// Concatenated text of this node and all descendants
    pub fn text_content(&self) -> String {
        match &self.0.kind {
            NodeKind::Text(text) => text.borrow().clone(),
            NodeKind::Element { .. } => self
                .descendants()
                .iter()
                .filter_map(|node| match &node.0.kind {
                    NodeKind::Text(text) => Some(text.borrow().clone()),
                    NodeKind::Element { .. } => None,
                })
                .collect(),
        }
    }

    /// Replace all children with a single text node (or set the text of a
    /// text node)
    pub fn set_text_content(&self, text: &str) {
        match &self.0.kind {
            NodeKind::Text(current) => *current.borrow_mut() = text.to_string(),
            NodeKind::Element { .. } => {
                let Some(document) = self.owner_document() else {
                    return;
                };
                self.replace_children(vec![document.create_text(text)]);
            }
        }
    }

    /// All child nodes, text included
    pub fn children(&self) -> Vec<Element> {
        self.0.children.borrow().clone()
    }

    /// Element children only
    pub fn element_children(&self) -> Vec<Element> {
        self.0
            .children
            .borrow()
            .iter()
            .filter(|child| child.is_element())
            .cloned()
            .collect()
    }

    pub fn parent(&self) -> Option<Element> {
        self.0.parent.borrow().upgrade().map(Element)
    }

    pub fn owner_document(&self) -> Option<Document> {
        self.0.owner.upgrade().map(Document)
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement(Rc::downgrade(&self.0))
    }

    /// Whether this node is reachable from its document's root
    pub fn is_connected(&self) -> bool {
        let Some(root) = self.owner_document().map(|doc| doc.document_element()) else {
            return false;
        };
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node == root {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Append a child, moving it out of any previous parent
    pub fn append_child(&self, child: &Element) {
        self.insert_children(vec![child.clone()]);
    }

    /// Replace every child with `nodes`. Observers see one record.
    pub fn replace_children(&self, nodes: Vec<Element>) {
        let old = std::mem::take(&mut *self.0.children.borrow_mut());
        for node in &old {
            *node.0.parent.borrow_mut() = Weak::new();
        }
        self.insert_children(nodes);
    }

    /// Detach from the parent. Removals are not reported to observers.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.0.children.borrow_mut().retain(|c| c != self);
        }
        *self.0.parent.borrow_mut() = Weak::new();
    }

    fn insert_children(&self, nodes: Vec<Element>) {
        for node in &nodes {
            node.remove();
            *node.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        }
        self.0.children.borrow_mut().extend(nodes.iter().cloned());

        if nodes.is_empty() || !self.is_connected() {
            return;
        }
        if let Some(document) = self.owner_document() {
            document.notify(MutationRecord {
                target: self.id(),
                added: nodes,
            });
        }
    }

    /// Nearest inclusive ancestor matching `selector`
    pub fn closest(&self, selector: &Selector) -> Option<Element> {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if selector.matches(&node) {
                return Some(node);
            }
            current = node.parent();
        }
        None
    }

    /// Descendants (not self) matching `selector`, in document order
    pub fn query_selector_all(&self, selector: &Selector) -> Vec<Element> {
        self.descendants()
            .into_iter()
            .filter(|node| selector.matches(node))
            .collect()
    }

    pub fn query_selector(&self, selector: &Selector) -> Option<Element> {
        self.descendants()
            .into_iter()
            .find(|node| selector.matches(node))
    }

    /// Pre-order list of all descendants
    fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        let mut stack: Vec<Element> = self.children().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            stack.extend(node.children().into_iter().rev());
            out.push(node);
        }
        out
    }
}

fn element_kind(tag: &str) -> NodeKind {
    NodeKind::Element {
        tag: tag.to_ascii_lowercase(),
        attributes: RefCell::new(IndexMap::new()),
    }
}

struct DocumentInner {
    root: Element,
    observers: RefCell<Vec<mpsc::UnboundedSender<MutationRecord>>>,
    next_id: Cell<u64>,
    location: RefCell<String>,
}

/// Page document: an `html` root with a `body` child and a location URL
#[derive(Clone)]
pub struct Document(Rc<DocumentInner>);

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("location", &self.0.location.borrow())
            .finish_non_exhaustive()
    }
}

impl Document {
    pub fn new(location: impl Into<String>) -> Self {
        let inner = Rc::new_cyclic(|owner: &Weak<DocumentInner>| DocumentInner {
            root: Element(Rc::new(Node {
                id: NodeId(0),
                kind: element_kind("html"),
                children: RefCell::new(Vec::new()),
                parent: RefCell::new(Weak::new()),
                owner: owner.clone(),
            })),
            observers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            location: RefCell::new(location.into()),
        });
        let document = Document(inner);
        document
            .document_element()
            .append_child(&document.create_element("body"));
        document
    }

    fn next_id(&self) -> NodeId {
        let id = self.0.next_id.get();
        self.0.next_id.set(id + 1);
        NodeId(id)
    }

    fn create_node(&self, kind: NodeKind) -> Element {
        Element(Rc::new(Node {
            id: self.next_id(),
            kind,
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            owner: Rc::downgrade(&self.0),
        }))
    }

    /// Create a detached element
    pub fn create_element(&self, tag: &str) -> Element {
        self.create_node(element_kind(tag))
    }

    /// Create a detached text node
    pub fn create_text(&self, text: &str) -> Element {
        self.create_node(NodeKind::Text(RefCell::new(text.to_string())))
    }

    /// The `html` element
    pub fn document_element(&self) -> Element {
        self.0.root.clone()
    }

    pub fn body(&self) -> Element {
        let root = self.document_element();
        root.query_selector(&Selector::tag("body")).unwrap_or(root)
    }

    pub fn location(&self) -> String {
        self.0.location.borrow().clone()
    }

    /// Navigate without reloading (single-page app routing)
    pub fn set_location(&self, location: impl Into<String>) {
        *self.0.location.borrow_mut() = location.into();
    }

    /// Register an observer of child-list changes in the whole tree
    pub fn observe(&self) -> mpsc::UnboundedReceiver<MutationRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.0.observers.borrow_mut().push(tx);
        rx
    }

    /// Matching elements, the root included, in document order
    pub fn query_selector_all(&self, selector: &Selector) -> Vec<Element> {
        let root = self.document_element();
        let mut found = Vec::new();
        if selector.matches(&root) {
            found.push(root.clone());
        }
        found.extend(root.query_selector_all(selector));
        found
    }

    pub fn query_selector(&self, selector: &Selector) -> Option<Element> {
        let root = self.document_element();
        if selector.matches(&root) {
            return Some(root);
        }
        root.query_selector(selector)
    }

    fn notify(&self, record: MutationRecord) {
        let mut observers = self.0.observers.borrow_mut();
        // drop observers whose receiver is gone
        observers.retain(|tx| tx.send(record.clone()).is_ok());
        trace!(target_node = %record.target, observers = observers.len(), "Mutation delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_body() {
        let doc = Document::new("http://localhost/");
        assert_eq!(doc.document_element().tag_name(), Some("html"));
        assert_eq!(doc.body().tag_name(), Some("body"));
        assert!(doc.body().is_connected());
    }

    #[test]
    fn test_attributes_and_classes() {
        let doc = Document::new("http://localhost/");
        let div = doc.create_element("DIV");
        assert_eq!(div.tag_name(), Some("div"));

        div.set_attribute("data-test-subj", "row");
        assert_eq!(div.get_attribute("data-test-subj").as_deref(), Some("row"));

        div.add_class("a");
        div.add_class("b");
        div.add_class("a");
        assert_eq!(div.get_attribute("class").as_deref(), Some("a b"));
        assert!(div.has_class("b"));
        assert!(!div.has_class("c"));
        assert!(!div.has_attribute("id"));
    }

    #[test]
    fn test_text_content_and_replace() {
        let doc = Document::new("http://localhost/");
        let div = doc.create_element("div");
        let span = doc.create_element("span");
        span.append_child(&doc.create_text("hello "));
        div.append_child(&span);
        div.append_child(&doc.create_text("world"));
        assert_eq!(div.text_content(), "hello world");

        div.set_text_content("replaced");
        assert_eq!(div.text_content(), "replaced");
        assert!(span.parent().is_none());
        assert_eq!(div.element_children().len(), 0);
    }

    #[test]
    fn test_append_moves_node() {
        let doc = Document::new("http://localhost/");
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let child = doc.create_element("span");
        a.append_child(&child);
        b.append_child(&child);
        assert!(a.children().is_empty());
        assert_eq!(child.parent(), Some(b));
    }

    #[test]
    fn test_observer_sees_connected_additions_only() {
        let doc = Document::new("http://localhost/");
        let mut rx = doc.observe();

        let detached = doc.create_element("div");
        detached.append_child(&doc.create_element("span"));
        assert!(rx.try_recv().is_err());

        doc.body().append_child(&detached);
        let record = rx.try_recv().unwrap();
        assert_eq!(record.target, doc.body().id());
        assert!(record.adds_elements());

        detached.set_attribute("class", "x");
        assert!(rx.try_recv().is_err());

        detached.append_child(&doc.create_text("t"));
        let record = rx.try_recv().unwrap();
        assert!(!record.adds_elements());

        detached.remove();
        assert!(!detached.is_connected());
        detached.append_child(&doc.create_element("p"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let doc = Document::new("http://localhost/");
        let rx = doc.observe();
        drop(rx);
        doc.body().append_child(&doc.create_element("div"));
        assert!(doc.0.observers.borrow().is_empty());
    }

    #[test]
    fn test_queries_and_closest() {
        let doc = Document::new("http://localhost/");
        let outer = doc.create_element("div");
        outer.set_attribute("id", "kibana-body");
        let inner = doc.create_element("div");
        inner.add_class("kbnDocViewer");
        let row = doc.create_element("td");
        inner.append_child(&row);
        outer.append_child(&inner);
        doc.body().append_child(&outer);

        assert_eq!(doc.query_selector(&Selector::id("kibana-body")), Some(outer.clone()));
        assert_eq!(doc.query_selector_all(&Selector::tag("html")).len(), 1);
        assert_eq!(row.closest(&Selector::class("kbnDocViewer")), Some(inner.clone()));
        assert_eq!(row.closest(&Selector::tag("td")), Some(row.clone()));
        assert_eq!(row.closest(&Selector::tag("table")), None);
        assert_eq!(outer.query_selector_all(&Selector::tag("div")), vec![inner]);
    }

    #[test]
    fn test_weak_element() {
        let doc = Document::new("http://localhost/");
        let div = doc.create_element("div");
        let weak = div.downgrade();
        assert_eq!(weak.upgrade(), Some(div.clone()));
        drop(div);
        assert!(!weak.is_alive());
    }
}
