//! Change-tracking, annotatable view over nested JSON data.
//!
//! A [`Document`] owns a tree of JSON values. Every object and array in it is an
//! arena node addressed by a stable [`NodeId`]; scalars live inline in their
//! parent. Reads and writes go through the document with a node id and a key.
//!
//! Each node remembers the value it had when it entered the document (its
//! baseline). A write marks its key dirty when the new value differs
//! structurally from the baseline, and clean again when it is put back. A node
//! has changed when it has a dirty key or a changed child container, so
//! [`Document::has_changed`] on the root answers "are there unsaved edits?"
//! without walking the tree.
//!
//! Nodes also carry notes: small payloads keyed by kind (validation errors,
//! provenance, ...) that are invalidated in bulk with [`Document::clear_notes`]
//! and gathered into a tree with [`Document::export_notes`].
//!
//! ```
//! use fieldbook::document::{Document, Field};
//! use serde_json::json;
//!
//! let mut doc = Document::wrap(json!({"site": {"name": "North"}, "count": 3})).unwrap();
//! let root = doc.root();
//! let site = doc.child(root, "site").unwrap().unwrap();
//!
//! doc.set(site, "name", json!("South")).unwrap();
//! assert!(doc.has_changed(root).unwrap());
//!
//! doc.set(site, "name", json!("North")).unwrap();
//! assert!(!doc.has_changed(root).unwrap());
//! assert_eq!(doc.get(root, "count").unwrap(), Some(Field::Value(&json!(3))));
//! ```

mod errors;
mod notes;
mod state;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};

pub use errors::DocumentError;
pub use notes::NoteExport;
pub use state::FormState;

use crate::Result;

static NEXT_DOCUMENT: AtomicU64 = AtomicU64::new(1);

/// Handle to one container node of one [`Document`].
///
/// Ids are only meaningful to the document that issued them; passing one to
/// another document fails with [`DocumentError::UnmanagedNode`]. A container
/// that is replaced or removed gives up its node, so its id stops resolving too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    document: u64,
    index: usize,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.document, self.index, self.generation)
    }
}

/// What a key of a node holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    /// A nested object or array.
    Node(NodeId),
    /// A scalar (`null`, bool, number or string).
    Value(&'a Value),
}

impl<'a> Field<'a> {
    /// The node id, if this field is a container.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Field::Node(id) => Some(*id),
            Field::Value(_) => None,
        }
    }

    /// The scalar, if this field is not a container.
    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            Field::Node(_) => None,
            Field::Value(v) => Some(v),
        }
    }
}

#[derive(Debug)]
enum Slot {
    Value(Value),
    Node(usize),
}

#[derive(Debug)]
enum Container {
    Object(BTreeMap<String, Slot>),
    Array(Vec<Slot>),
}

impl Container {
    fn kind(&self) -> &'static str {
        match self {
            Container::Object(_) => "object",
            Container::Array(_) => "array",
        }
    }

    fn get(&self, key: &str) -> Option<&Slot> {
        match self {
            Container::Object(map) => map.get(key),
            Container::Array(items) => array_index(key).and_then(|i| items.get(i)),
        }
    }

    fn len(&self) -> usize {
        match self {
            Container::Object(map) => map.len(),
            Container::Array(items) => items.len(),
        }
    }

    fn keys(&self) -> Vec<String> {
        match self {
            Container::Object(map) => map.keys().cloned().collect(),
            Container::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        }
    }

    fn child_nodes(&self) -> Vec<(String, usize)> {
        let node_of = |slot: &Slot| match slot {
            Slot::Node(index) => Some(*index),
            Slot::Value(_) => None,
        };
        match self {
            Container::Object(map) => map
                .iter()
                .filter_map(|(k, slot)| node_of(slot).map(|i| (k.clone(), i)))
                .collect(),
            Container::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(k, slot)| node_of(slot).map(|i| (k.to_string(), i)))
                .collect(),
        }
    }
}

#[derive(Debug)]
struct Node {
    /// Bumped each time the slot is freed.
    generation: u32,
    container: Container,
    /// The value this node is compared against.
    baseline: Value,
    /// `None` for the root and for freed slots.
    parent: Option<(usize, String)>,
    dirty: BTreeSet<String>,
    changed_children: BTreeSet<String>,
    notes: HashMap<String, notes::Note>,
}

impl Node {
    fn is_changed(&self) -> bool {
        !self.dirty.is_empty() || !self.changed_children.is_empty()
    }

    fn mark(&mut self, key: &str, dirty: bool, child_changed: bool) {
        if dirty {
            self.dirty.insert(key.to_string());
        } else {
            self.dirty.remove(key);
        }
        if child_changed {
            self.changed_children.insert(key.to_string());
        } else {
            self.changed_children.remove(key);
        }
    }
}

/// A change-tracking tree of JSON values.
#[derive(Debug)]
pub struct Document {
    id: u64,
    nodes: Vec<Node>,
    /// Freed node slots, reused before the arena grows.
    free: Vec<usize>,
    /// Current generation per note kind.
    generations: HashMap<String, u64>,
}

impl Document {
    /// Wrap `value`, which becomes the baseline of every node.
    ///
    /// Only objects and arrays can be wrapped.
    pub fn wrap(value: Value) -> Result<Self> {
        if !is_container(&value) {
            return Err(DocumentError::NotAContainer {
                found: json_kind(&value),
            }
            .into());
        }
        let mut document = Self {
            id: NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            free: Vec::new(),
            generations: HashMap::new(),
        };
        let baseline = value.clone();
        document.insert_node(value, baseline, None);
        Ok(document)
    }

    /// The wrapped root container.
    pub fn root(&self) -> NodeId {
        self.node_id(0)
    }

    /// Materialize the whole document as plain JSON.
    pub fn raw(&self) -> Value {
        self.materialize(0)
    }

    /// Materialize one node as plain JSON.
    pub fn value(&self, node: NodeId) -> Result<Value> {
        let index = self.resolve(node)?;
        Ok(self.materialize(index))
    }

    /// Read `key` of `node`. Absent keys (and non-index keys on arrays) are `None`.
    pub fn get(&self, node: NodeId, key: &str) -> Result<Option<Field<'_>>> {
        let index = self.resolve(node)?;
        Ok(self.nodes[index].container.get(key).map(|slot| match slot {
            Slot::Value(v) => Field::Value(v),
            Slot::Node(child) => Field::Node(self.node_id(*child)),
        }))
    }

    /// The container stored under `key`, if that key holds one.
    pub fn child(&self, node: NodeId, key: &str) -> Result<Option<NodeId>> {
        Ok(self.get(node, key)?.and_then(|field| field.as_node()))
    }

    /// Follow `path` from the root, one key per level.
    pub fn node_at(&self, path: &[&str]) -> Result<Option<NodeId>> {
        let mut node = self.root();
        for key in path {
            match self.child(node, key)? {
                Some(next) => node = next,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }

    /// The keys of `node`: sorted keys for objects, indices for arrays.
    pub fn keys(&self, node: NodeId) -> Result<Vec<String>> {
        let index = self.resolve(node)?;
        Ok(self.nodes[index].container.keys())
    }

    /// Number of entries in `node`.
    pub fn len(&self, node: NodeId) -> Result<usize> {
        let index = self.resolve(node)?;
        Ok(self.nodes[index].container.len())
    }

    /// Check if `node` has no entries.
    pub fn is_empty(&self, node: NodeId) -> Result<bool> {
        Ok(self.len(node)? == 0)
    }

    /// Check if `node` is still reachable from the root.
    ///
    /// Ids of replaced or removed containers answer `false`; ids from another
    /// document fail.
    pub fn is_attached(&self, node: NodeId) -> Result<bool> {
        if node.document != self.id {
            return Err(self.unmanaged(node));
        }
        Ok(self.resolve(node).is_ok())
    }

    /// Number of live container nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Store `value` under `key` of `node`.
    ///
    /// Objects and arrays inside `value` become fresh nodes. On arrays, `key` must
    /// be an existing index or the current length (which appends).
    pub fn set(&mut self, node: NodeId, key: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.resolve(node)?;
        let value = value.into();
        if let Container::Array(items) = &self.nodes[index].container {
            match array_index(key) {
                Some(i) if i <= items.len() => {}
                Some(i) => {
                    return Err(DocumentError::InvalidKey {
                        key: key.to_string(),
                        reason: format!("index {i} is past the end of an array of {}", items.len()),
                    }
                    .into());
                }
                None => {
                    return Err(DocumentError::InvalidKey {
                        key: key.to_string(),
                        reason: "arrays only accept index keys".to_string(),
                    }
                    .into());
                }
            }
        }

        let before = self.nodes[index].is_changed();
        let (slot, dirty, child_changed) = self.make_slot(index, key, value);
        let previous = match &mut self.nodes[index].container {
            Container::Object(map) => map.insert(key.to_string(), slot),
            Container::Array(items) => match array_index(key) {
                Some(i) if i < items.len() => Some(std::mem::replace(&mut items[i], slot)),
                _ => {
                    items.push(slot);
                    None
                }
            },
        };
        if let Some(Slot::Node(old)) = previous {
            self.release(old);
        }
        self.nodes[index].mark(key, dirty, child_changed);
        self.propagate(index, before);
        Ok(())
    }

    /// Append `value` to the array `node`, returning its index.
    pub fn push(&mut self, node: NodeId, value: impl Into<Value>) -> Result<usize> {
        let index = self.resolve(node)?;
        let len = match &self.nodes[index].container {
            Container::Array(items) => items.len(),
            other => {
                return Err(DocumentError::WrongContainer {
                    expected: "array",
                    found: other.kind(),
                }
                .into());
            }
        };
        self.set(node, &len.to_string(), value)?;
        Ok(len)
    }

    /// Remove `key` from the object `node`, returning what it held.
    ///
    /// The key is dirty afterwards exactly when the baseline had it.
    pub fn remove(&mut self, node: NodeId, key: &str) -> Result<Option<Value>> {
        let index = self.resolve(node)?;
        let before = self.nodes[index].is_changed();
        let removed = match &mut self.nodes[index].container {
            Container::Object(map) => map.remove(key),
            other => {
                return Err(DocumentError::WrongContainer {
                    expected: "object",
                    found: other.kind(),
                }
                .into());
            }
        };
        let Some(removed) = removed else {
            return Ok(None);
        };
        let value = match removed {
            Slot::Value(v) => v,
            Slot::Node(child) => {
                let value = self.materialize(child);
                self.release(child);
                value
            }
        };
        let had_key = baseline_entry(&self.nodes[index].baseline, key).is_some();
        self.nodes[index].mark(key, had_key, false);
        self.propagate(index, before);
        Ok(Some(value))
    }

    /// Check if `node` has a dirty key or a changed child container.
    pub fn has_changed(&self, node: NodeId) -> Result<bool> {
        let index = self.resolve(node)?;
        Ok(self.nodes[index].is_changed())
    }

    /// Check if `key` of `node` differs from its baseline.
    pub fn is_dirty(&self, node: NodeId, key: &str) -> Result<bool> {
        let index = self.resolve(node)?;
        Ok(self.nodes[index].dirty.contains(key))
    }

    /// The dirty keys of `node`, sorted.
    pub fn dirty_keys(&self, node: NodeId) -> Result<Vec<String>> {
        let index = self.resolve(node)?;
        Ok(self.nodes[index].dirty.iter().cloned().collect())
    }

    fn node_id(&self, index: usize) -> NodeId {
        NodeId {
            document: self.id,
            index,
            generation: self.nodes[index].generation,
        }
    }

    fn resolve(&self, node: NodeId) -> Result<usize> {
        match self.nodes.get(node.index) {
            Some(slot) if node.document == self.id && slot.generation == node.generation => {
                Ok(node.index)
            }
            _ => Err(self.unmanaged(node)),
        }
    }

    fn unmanaged(&self, node: NodeId) -> crate::Error {
        DocumentError::UnmanagedNode {
            node: node.to_string(),
        }
        .into()
    }

    /// Free `index` and every container below it.
    fn release(&mut self, index: usize) {
        let mut pending = vec![index];
        while let Some(index) = pending.pop() {
            let node = &mut self.nodes[index];
            let container = std::mem::replace(&mut node.container, Container::Object(BTreeMap::new()));
            pending.extend(container.child_nodes().into_iter().map(|(_, child)| child));
            node.generation = node.generation.wrapping_add(1);
            node.baseline = Value::Null;
            node.parent = None;
            node.dirty.clear();
            node.changed_children.clear();
            node.notes.clear();
            self.free.push(index);
        }
    }

    /// Add a container node for `value`, computing its dirty state against `baseline`.
    fn insert_node(&mut self, value: Value, baseline: Value, parent: Option<(usize, String)>) -> usize {
        let container = match &value {
            Value::Array(_) => Container::Array(Vec::new()),
            _ => Container::Object(BTreeMap::new()),
        };
        let index = match self.free.pop() {
            Some(index) => {
                let node = &mut self.nodes[index];
                node.container = container;
                node.baseline = baseline;
                node.parent = parent;
                index
            }
            None => {
                self.nodes.push(Node {
                    generation: 0,
                    container,
                    baseline,
                    parent,
                    dirty: BTreeSet::new(),
                    changed_children: BTreeSet::new(),
                    notes: HashMap::new(),
                });
                self.nodes.len() - 1
            }
        };

        let entries: Vec<(String, Value)> = match value {
            Value::Object(map) => map.into_iter().collect(),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => Vec::new(),
        };
        for (key, item) in entries {
            let (slot, dirty, child_changed) = self.make_slot(index, &key, item);
            let node = &mut self.nodes[index];
            match &mut node.container {
                Container::Object(map) => {
                    map.insert(key.clone(), slot);
                }
                Container::Array(items) => items.push(slot),
            }
            node.mark(&key, dirty, child_changed);
        }

        // Baseline keys the new value does not have.
        let node = &mut self.nodes[index];
        let missing: Vec<String> = match &node.baseline {
            Value::Object(map) => map
                .keys()
                .filter(|k| node.container.get(k).is_none())
                .cloned()
                .collect(),
            Value::Array(items) => (node.container.len()..items.len())
                .map(|i| i.to_string())
                .collect(),
            _ => Vec::new(),
        };
        node.dirty.extend(missing);
        index
    }

    /// Turn `value` into a slot of `parent` under `key`.
    ///
    /// Returns the slot, whether `key` is dirty, and whether a new child node
    /// starts out changed.
    fn make_slot(&mut self, parent: usize, key: &str, value: Value) -> (Slot, bool, bool) {
        let base = baseline_entry(&self.nodes[parent].baseline, key).cloned();
        if is_container(&value) {
            let (child_baseline, same_kind) = match base {
                Some(b) if same_container_kind(&b, &value) => (b, true),
                _ => (Value::Null, false),
            };
            let child = self.insert_node(value, child_baseline, Some((parent, key.to_string())));
            let child_changed = self.nodes[child].is_changed();
            (Slot::Node(child), !same_kind, child_changed)
        } else {
            let dirty = base.as_ref() != Some(&value);
            (Slot::Value(value), dirty, false)
        }
    }

    /// Walk up from `index` while the changed state keeps flipping.
    fn propagate(&mut self, mut index: usize, mut before: bool) {
        loop {
            let after = self.nodes[index].is_changed();
            if before == after {
                return;
            }
            let Some((parent, key)) = self.nodes[index].parent.clone() else {
                return;
            };
            before = self.nodes[parent].is_changed();
            let siblings = &mut self.nodes[parent].changed_children;
            if after {
                siblings.insert(key);
            } else {
                siblings.remove(&key);
            }
            index = parent;
        }
    }

    fn materialize(&self, index: usize) -> Value {
        let slot_value = |slot: &Slot| match slot {
            Slot::Value(v) => v.clone(),
            Slot::Node(child) => self.materialize(*child),
        };
        match &self.nodes[index].container {
            Container::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, slot)| (k.clone(), slot_value(slot)))
                    .collect::<Map<String, Value>>(),
            ),
            Container::Array(items) => Value::Array(items.iter().map(slot_value).collect()),
        }
    }
}

/// Canonical decimal index, so "01" and "+1" never alias "1".
fn array_index(key: &str) -> Option<usize> {
    key.parse::<usize>()
        .ok()
        .filter(|i| i.to_string() == key)
}

fn baseline_entry<'a>(baseline: &'a Value, key: &str) -> Option<&'a Value> {
    match baseline {
        Value::Object(map) => map.get(key),
        Value::Array(items) => array_index(key).and_then(|i| items.get(i)),
        _ => None,
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn same_container_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
    )
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
