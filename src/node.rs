//! The host document contract.
//!
//! Expressions evaluate against any tree whose nodes implement
//! [`DocumentNode`]. The trait is read-only: the engine never mutates the
//! document. [`SimpleNode`] is a bundled implementation used by the CLI and
//! by tests; hosts with their own tree types implement the trait instead.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::value::Attribute;

/// A read-only view of one node in the host document tree.
pub trait DocumentNode {
    /// The node's tag name.
    fn name(&self) -> String;

    /// The node's textual content.
    fn string_value(&self) -> String;

    /// Whether the node is an element (only elements carry attributes and
    /// match named steps).
    fn is_element(&self) -> bool;

    fn children(&self) -> Vec<NodeRef>;

    fn parent(&self) -> Option<NodeRef>;

    fn attributes(&self) -> Vec<Attribute>;
}

/// A shared handle to a document node. Identity is pointer identity.
pub type NodeRef = Rc<dyn DocumentNode>;

/// Whether two handles refer to the same node.
pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// An owned in-memory element tree implementing [`DocumentNode`].
pub struct SimpleNode {
    name: String,
    text: RefCell<String>,
    attributes: RefCell<Vec<Attribute>>,
    children: RefCell<Vec<Rc<SimpleNode>>>,
    parent: RefCell<Weak<SimpleNode>>,
}

impl SimpleNode {
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(SimpleNode {
            name: name.into(),
            text: RefCell::new(String::new()),
            attributes: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
        })
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.borrow_mut() = text.into();
    }

    /// Set or replace an attribute.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let mut attrs = self.attributes.borrow_mut();
        if let Some(attr) = attrs.iter_mut().find(|a| a.name == name) {
            attr.value = value;
        } else {
            attrs.push(Attribute::new(name, value));
        }
    }

    pub fn append_child(self: &Rc<Self>, child: Rc<SimpleNode>) {
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(child);
    }

    /// Build a tree from a JSON description.
    ///
    /// Objects take the form `{"name": .., "text": .., "attributes": {..},
    /// "children": [..]}`; a bare string is a nameless text node and the
    /// `name` field defaults to `"node"`.
    pub fn from_json(value: &serde_json::Value) -> Rc<SimpleNode> {
        match value {
            serde_json::Value::String(s) => {
                let node = SimpleNode::new("node");
                node.set_text(s.clone());
                node
            }
            serde_json::Value::Object(map) => {
                let name = map
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("node");
                let node = SimpleNode::new(name);
                if let Some(text) = map.get("text").and_then(|v| v.as_str()) {
                    node.set_text(text);
                }
                if let Some(serde_json::Value::Object(attrs)) = map.get("attributes") {
                    for (k, v) in attrs {
                        let text = match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        node.set_attribute(k.clone(), text);
                    }
                }
                if let Some(serde_json::Value::Array(children)) = map.get("children") {
                    for child in children {
                        node.append_child(SimpleNode::from_json(child));
                    }
                }
                node
            }
            other => {
                let node = SimpleNode::new("node");
                node.set_text(other.to_string());
                node
            }
        }
    }
}

impl DocumentNode for SimpleNode {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn string_value(&self) -> String {
        self.text.borrow().clone()
    }

    fn is_element(&self) -> bool {
        true
    }

    fn children(&self) -> Vec<NodeRef> {
        self.children
            .borrow()
            .iter()
            .map(|c| c.clone() as NodeRef)
            .collect()
    }

    fn parent(&self) -> Option<NodeRef> {
        self.parent.borrow().upgrade().map(|p| p as NodeRef)
    }

    fn attributes(&self) -> Vec<Attribute> {
        self.attributes.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_building() {
        let root = SimpleNode::new("playlist");
        let item = SimpleNode::new("item");
        item.set_attribute("id", "1");
        item.set_text("first");
        root.append_child(item.clone());

        assert_eq!(root.children().len(), 1);
        let child = &root.children()[0];
        assert_eq!(child.name(), "item");
        assert_eq!(child.string_value(), "first");
        assert_eq!(child.attributes(), vec![Attribute::new("id", "1")]);
        assert_eq!(item.parent().map(|p| p.name()), Some("playlist".to_string()));
    }

    #[test]
    fn test_set_attribute_replaces() {
        let node = SimpleNode::new("n");
        node.set_attribute("k", "a");
        node.set_attribute("k", "b");
        assert_eq!(node.attributes(), vec![Attribute::new("k", "b")]);
    }

    #[test]
    fn test_from_json() {
        let doc: serde_json::Value = serde_json::from_str(
            r#"{"name": "list", "children": [
                 {"name": "item", "text": "a", "attributes": {"id": "1"}},
                 {"name": "item", "text": "b", "attributes": {"id": 2}}
               ]}"#,
        )
        .unwrap();
        let root = SimpleNode::from_json(&doc);
        assert_eq!(root.name(), "list");
        let children = root.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].string_value(), "a");
        assert_eq!(children[1].attributes(), vec![Attribute::new("id", "2")]);
    }
}
