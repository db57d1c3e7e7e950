//! Context items and sequences.
//!
//! A [`NodeValue`] is one item of evaluation context: a document node, an
//! attribute of a node, or a plain string produced by a function. A
//! [`Sequence`] is the ordered list of such items that paths, predicates and
//! the sequence functions pass around.

use std::fmt;

use crate::node::{NodeRef, same_node};

/// A named attribute of a document node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One item of evaluation context.
///
/// An item is a node, an attribute of a node, or a bare string. Its string
/// value is the attribute value when present, else the node's string value,
/// else the literal string, else `""`.
#[derive(Clone, Default)]
pub struct NodeValue {
    pub node: Option<NodeRef>,
    pub attr: Option<Attribute>,
    pub string: Option<String>,
}

impl NodeValue {
    pub fn node(node: NodeRef) -> Self {
        NodeValue {
            node: Some(node),
            attr: None,
            string: None,
        }
    }

    pub fn attribute(node: NodeRef, attr: Attribute) -> Self {
        NodeValue {
            node: Some(node),
            attr: Some(attr),
            string: None,
        }
    }

    pub fn literal(string: impl Into<String>) -> Self {
        NodeValue {
            node: None,
            attr: None,
            string: Some(string.into()),
        }
    }

    pub fn of(node: Option<NodeRef>) -> Self {
        NodeValue {
            node,
            attr: None,
            string: None,
        }
    }

    /// The item's string value.
    pub fn value(&self) -> String {
        if let Some(attr) = &self.attr {
            attr.value.clone()
        } else if let Some(node) = &self.node {
            node.string_value()
        } else if let Some(string) = &self.string {
            string.clone()
        } else {
            String::new()
        }
    }

    /// Whether two items denote the same context: same node identity and, for
    /// attribute items, the same attribute.
    pub fn same_as(&self, other: &NodeValue) -> bool {
        match (&self.node, &other.node) {
            (Some(a), Some(b)) => same_node(a, b) && self.attr == other.attr,
            (None, None) => self.string == other.string,
            _ => false,
        }
    }
}

impl fmt::Debug for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(attr) = &self.attr {
            write!(f, "@{}={}", attr.name, attr.value)
        } else if let Some(node) = &self.node {
            write!(f, "<{}>", node.name())
        } else {
            write!(f, "{:?}", self.string.as_deref().unwrap_or(""))
        }
    }
}

/// An ordered sequence of context items.
#[derive(Clone, Default)]
pub struct Sequence {
    items: Vec<NodeValue>,
}

impl Sequence {
    pub fn new() -> Self {
        Sequence { items: Vec::new() }
    }

    pub fn append(&mut self, item: NodeValue) {
        self.items.push(item);
    }

    /// Remove the first item denoting the same context, if any.
    pub fn remove(&mut self, item: &NodeValue) {
        if let Some(pos) = self.items.iter().position(|i| i.same_as(item)) {
            self.items.remove(pos);
        }
    }

    /// Insert all of `other` at `at`, or at the end when `at` is `None`.
    pub fn splice(&mut self, at: Option<usize>, other: Sequence) {
        let at = at.unwrap_or(self.items.len()).min(self.items.len());
        self.items.splice(at..at, other.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&NodeValue> {
        self.items.first()
    }

    pub fn get(&self, index: usize) -> Option<&NodeValue> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeValue> {
        self.items.iter()
    }

    pub fn items(&self) -> &[NodeValue] {
        &self.items
    }

    pub fn into_items(self) -> Vec<NodeValue> {
        self.items
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl FromIterator<NodeValue> for Sequence {
    fn from_iter<T: IntoIterator<Item = NodeValue>>(iter: T) -> Self {
        Sequence {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SimpleNode;

    #[test]
    fn test_value_precedence() {
        let node = SimpleNode::new("item");
        node.set_text("body");
        let plain = NodeValue::node(node.clone());
        assert_eq!(plain.value(), "body");

        let with_attr = NodeValue::attribute(node, Attribute::new("id", "7"));
        assert_eq!(with_attr.value(), "7");

        assert_eq!(NodeValue::literal("raw").value(), "raw");
        assert_eq!(NodeValue::default().value(), "");
    }

    #[test]
    fn test_remove_by_identity() {
        let a = SimpleNode::new("a");
        let b = SimpleNode::new("b");
        let mut seq = Sequence::new();
        seq.append(NodeValue::node(a.clone()));
        seq.append(NodeValue::node(b.clone()));
        seq.remove(&NodeValue::node(a));
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.first().map(|v| v.value()), Some(String::new()));
        seq.remove(&NodeValue::node(SimpleNode::new("b")));
        // A distinct node with the same name is not the same item.
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn test_splice() {
        let mut seq: Sequence = ["a", "d"].iter().map(|s| NodeValue::literal(*s)).collect();
        let mid: Sequence = ["b", "c"].iter().map(|s| NodeValue::literal(*s)).collect();
        seq.splice(Some(1), mid);
        let order: Vec<String> = seq.iter().map(|v| v.value()).collect();
        assert_eq!(order, ["a", "b", "c", "d"]);

        let tail: Sequence = [NodeValue::literal("e")].into_iter().collect();
        seq.splice(None, tail);
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.get(4).map(|v| v.value()), Some("e".to_string()));
    }
}
