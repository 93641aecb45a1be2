//! Per-node annotations with generation-based bulk invalidation.

use std::collections::BTreeMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Document, NodeId};
use crate::Result;

#[derive(Debug, Clone)]
pub(super) struct Note {
    generation: u64,
    payload: Value,
}

/// Notes of one node and of the containers below it.
///
/// Subtrees without a single live note are left out, so an export of a
/// document with no notes is `None` rather than an empty tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteExport {
    /// Live note payloads of this node, by kind.
    #[serde(default)]
    pub notes: BTreeMap<String, Value>,
    /// Exports of child containers, by key.
    #[serde(default)]
    pub children: BTreeMap<String, NoteExport>,
}

impl NoteExport {
    /// The export for the container under `key`.
    pub fn child(&self, key: &str) -> Option<&NoteExport> {
        self.children.get(key)
    }

    /// The payload of kind `kind` on this node.
    pub fn note(&self, kind: &str) -> Option<&Value> {
        self.notes.get(kind)
    }

    /// Follow `path` down through the children.
    pub fn at(&self, path: &[&str]) -> Option<&NoteExport> {
        path.iter().try_fold(self, |export, key| export.child(key))
    }
}

impl Document {
    /// The note of kind `kind` on `node`, created from `default` when missing.
    ///
    /// A note left over from before the last [`clear_notes`](Self::clear_notes)
    /// of its kind counts as missing and is replaced.
    pub fn open_note(&mut self, node: NodeId, kind: &str, default: Value) -> Result<&mut Value> {
        let index = self.resolve(node)?;
        let generation = self.generation(kind);
        let note = match self.nodes[index].notes.entry(kind.to_string()) {
            Entry::Occupied(entry) => {
                let note = entry.into_mut();
                if note.generation != generation {
                    *note = Note {
                        generation,
                        payload: default,
                    };
                }
                note
            }
            Entry::Vacant(entry) => entry.insert(Note {
                generation,
                payload: default,
            }),
        };
        Ok(&mut note.payload)
    }

    /// The live note of kind `kind` on `node`, without creating one.
    pub fn note(&self, node: NodeId, kind: &str) -> Result<Option<&Value>> {
        let index = self.resolve(node)?;
        let generation = self.generation(kind);
        Ok(self.nodes[index]
            .notes
            .get(kind)
            .filter(|note| note.generation == generation)
            .map(|note| &note.payload))
    }

    /// Invalidate every note of kind `kind` at once.
    ///
    /// Payloads are not touched; they become stale and are replaced or skipped
    /// the next time they are opened or exported.
    pub fn clear_notes(&mut self, kind: &str) {
        *self.generations.entry(kind.to_string()).or_insert(0) += 1;
    }

    /// Gather every live, non-empty note of the attached tree.
    pub fn export_notes(&self) -> Option<NoteExport> {
        self.export_node(0)
    }

    fn generation(&self, kind: &str) -> u64 {
        self.generations.get(kind).copied().unwrap_or(0)
    }

    fn export_node(&self, index: usize) -> Option<NoteExport> {
        let node = &self.nodes[index];
        let notes: BTreeMap<String, Value> = node
            .notes
            .iter()
            .filter(|(kind, note)| {
                note.generation == self.generation(kind) && !is_blank(&note.payload)
            })
            .map(|(kind, note)| (kind.clone(), note.payload.clone()))
            .collect();
        let children: BTreeMap<String, NoteExport> = node
            .container
            .child_nodes()
            .into_iter()
            .filter_map(|(key, child)| self.export_node(child).map(|export| (key, export)))
            .collect();

        if notes.is_empty() && children.is_empty() {
            None
        } else {
            Some(NoteExport { notes, children })
        }
    }
}

fn is_blank(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
