//! Form-level change state on top of a [`Document`].

use serde_json::Value;

use super::Document;
use crate::Result;

/// A document being edited through a form.
///
/// A form counts as changed only once the user has interacted with it, and
/// then either the document differs from its baseline or a change was forced
/// (for example after a repeat group was added and removed again).
#[derive(Debug)]
pub struct FormState {
    document: Document,
    force_changed: bool,
    has_interaction: bool,
}

impl FormState {
    /// Start tracking a freshly wrapped document.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            force_changed: false,
            has_interaction: false,
        }
    }

    /// Wrap `value` and start tracking it.
    pub fn wrap(value: Value) -> Result<Self> {
        Ok(Self::new(Document::wrap(value)?))
    }

    /// The tracked document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The tracked document, for editing.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Stop tracking and hand the document back.
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Record that the user touched the form.
    pub fn mark_interaction(&mut self) {
        self.has_interaction = true;
    }

    /// Treat the form as changed even if the document matches its baseline.
    ///
    /// A forced change is itself an interaction.
    pub fn mark_change(&mut self) {
        self.force_changed = true;
        self.has_interaction = true;
    }

    /// Check if the user has touched the form.
    pub fn has_interaction(&self) -> bool {
        self.has_interaction
    }

    /// Check if the form has unsaved changes worth prompting about.
    pub fn has_changed(&self) -> bool {
        if !self.has_interaction {
            return false;
        }
        self.force_changed || self.document.has_changed(self.document.root()).unwrap_or(false)
    }

    /// Replace the document after a save, forgetting every flag.
    pub fn reset(&mut self, value: Value) -> Result<()> {
        self.document = Document::wrap(value)?;
        self.force_changed = false;
        self.has_interaction = false;
        Ok(())
    }
}
