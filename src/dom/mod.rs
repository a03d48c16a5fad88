//! Minimal arena-backed document tree.
//!
//! Stands in for the host page's live DOM: elements with attributes and text
//! nodes, addressed by [`NodeId`]. Removed nodes stay in the arena, detached,
//! so ids held by callers never dangle; they simply stop being reachable from
//! the root.
pub mod layout;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::text::{byte_offset, char_len};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("node {0} is not a text node")]
    NotAText(NodeId),

    #[error("node {0} is not attached to a parent")]
    Detached(NodeId),
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document whose root is a `body` element.
    pub fn new() -> Self {
        let root = Node {
            kind: NodeKind::Element {
                tag: "body".to_string(),
                attributes: BTreeMap::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::NodeNotFound(id))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    // ── Construction ────────────────────────────────────────────────

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_string(),
            attributes: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// Create an element and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId, DomError> {
        let id = self.create_element(tag);
        self.append_child(parent, id)?;
        Ok(id)
    }

    /// Create a text node and append it to `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, DomError> {
        let id = self.create_text(text);
        self.append_child(parent, id)?;
        Ok(id)
    }

    // ── Tree mutation ───────────────────────────────────────────────

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. A child already attached elsewhere is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if !self.is_element(parent) {
            return Err(DomError::NotAnElement(parent));
        }
        self.node(child)?;
        self.detach(child)?;

        let index = match reference {
            Some(r) => {
                let siblings = &self.node(parent)?.children;
                siblings
                    .iter()
                    .position(|&c| c == r)
                    .ok_or(DomError::Detached(r))?
            }
            None => self.node(parent)?.children.len(),
        };
        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach `node` from its parent. Detaching a detached node is a no-op.
    pub fn detach(&mut self, node: NodeId) -> Result<(), DomError> {
        if let Some(parent) = self.node(node)?.parent {
            self.node_mut(parent)?.children.retain(|&c| c != node);
            self.node_mut(node)?.parent = None;
        }
        Ok(())
    }

    /// Detach `node`, failing if it was not attached.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        if self.node(node)?.parent.is_none() {
            return Err(DomError::Detached(node));
        }
        self.detach(node)
    }

    /// Split a text node at char `offset`, like `Text.splitText`: the node
    /// keeps `[0, offset)` and a new following sibling gets the rest.
    pub fn split_text(&mut self, node: NodeId, offset: usize) -> Result<NodeId, DomError> {
        let text = self.text(node).ok_or(DomError::NotAText(node))?;
        let parent = self.parent(node).ok_or(DomError::Detached(node))?;
        let at = byte_offset(text, offset);
        let tail = text[at..].to_string();
        let head = text[..at].to_string();

        self.set_text(node, &head)?;
        let new_node = self.create_text(&tail);
        let next = self.next_sibling(node);
        self.insert_before(parent, new_node, next)?;
        Ok(new_node)
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.kind {
            NodeKind::Text(t) => {
                *t = text.to_string();
                Ok(())
            }
            NodeKind::Element { .. } => Err(DomError::NotAText(node)),
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.kind {
            NodeKind::Element { attributes, .. } => {
                attributes.insert(name.to_string(), value.to_string());
                Ok(())
            }
            NodeKind::Text(_) => Err(DomError::NotAnElement(node)),
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.kind {
            NodeKind::Element { attributes, .. } => {
                attributes.remove(name);
                Ok(())
            }
            NodeKind::Text(_) => Err(DomError::NotAnElement(node)),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn exists(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.node(node).map(|n| &n.kind), Ok(NodeKind::Element { .. }))
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.node(node).map(|n| &n.kind), Ok(NodeKind::Text(_)))
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.node(node).ok()?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.node(node).ok()?.kind {
            NodeKind::Text(t) => Some(t),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.node(node).ok()?.kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|c| c.split_whitespace().any(|name| name == class))
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).ok()?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&c| c == node)
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let index = self.index_in_parent(node)?;
        let parent = self.parent(node)?;
        index.checked_sub(1).map(|i| self.children(parent)[i])
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let index = self.index_in_parent(node)?;
        let parent = self.parent(node)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Ancestors of `node`, nearest first, not including `node`.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(node);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// `node` is `ancestor` or lies beneath it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    /// Pre-order descendants of `node`, not including `node`.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    pub fn text_nodes(&self, node: NodeId) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|&n| self.is_text(n))
            .collect()
    }

    /// Concatenated text of every text node under `node`, in document order.
    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(t) = self.text(node) {
            return t.to_string();
        }
        self.text_nodes(node)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    pub fn text_len(&self, node: NodeId) -> usize {
        char_len(&self.text_content(node))
    }

    /// Count of nodes under `node` (not including it).
    pub fn subtree_size(&self, node: NodeId) -> usize {
        self.descendants(node).len()
    }

    /// Elements under `node` carrying `class`, in document order.
    pub fn elements_with_class(&self, node: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|&n| self.has_class(n, class))
            .collect()
    }

    /// HTML-ish serialization, for debugging and tests.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Ok(n) = self.node(node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(t) => out.push_str(&escape(t)),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {name}=\"{}\"", escape(value)));
                }
                out.push('>');
                for &child in &n.children {
                    self.write_html(child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
