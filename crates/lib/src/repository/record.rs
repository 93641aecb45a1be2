//! Record types and their two stored facets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::NoteExport;
use crate::id::RecordId;
use crate::order::Hint;

/// One saved form submission.
///
/// Stored as two facets under the same compound key: the index facet
/// (everything except `values`) and the field blob (`values`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub table: String,
    /// Number of times the record has been saved.
    #[serde(default)]
    pub version: u64,
    /// RFC3339 time of the first save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctime: Option<String>,
    /// RFC3339 time of the latest save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Short human-readable description for record lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Notes exported from the form document (validation errors and the like).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<NoteExport>,
    /// Variable values, by variable key.
    #[serde(default)]
    pub values: Map<String, Value>,
}

impl Record {
    /// An unsaved record with no values.
    pub fn new(id: RecordId, table: impl Into<String>) -> Self {
        Self {
            id,
            table: table.into(),
            version: 0,
            ctime: None,
            mtime: None,
            tags: Vec::new(),
            summary: None,
            notes: None,
            values: Map::new(),
        }
    }

    /// Check if the record has never been saved.
    pub fn is_new(&self) -> bool {
        self.version == 0
    }

    pub(crate) fn index(&self) -> RecordIndex {
        RecordIndex {
            id: self.id.clone(),
            table: self.table.clone(),
            version: self.version,
            ctime: self.ctime.clone(),
            mtime: self.mtime.clone(),
            tags: self.tags.clone(),
            summary: self.summary.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// The index facet: a record without its values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RecordIndex {
    pub(crate) id: RecordId,
    pub(crate) table: String,
    #[serde(default)]
    pub(crate) version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) ctime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) mtime: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) notes: Option<NoteExport>,
}

impl RecordIndex {
    pub(crate) fn into_record(self, values: Map<String, Value>) -> Record {
        Record {
            id: self.id,
            table: self.table,
            version: self.version,
            ctime: self.ctime,
            mtime: self.mtime,
            tags: self.tags,
            summary: self.summary,
            notes: self.notes,
            values,
        }
    }
}

/// The field blob facet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct FieldBlob {
    #[serde(default)]
    pub(crate) values: Map<String, Value>,
}

/// A variable of the form a record was saved from, as passed to `save`.
///
/// The order of the list passed to `save` is the form's authoring order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub key: String,
    /// Group (section) the variable belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// The variable is not present in the form any more; its stored value is dropped.
    #[serde(default)]
    pub missing: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// The variable can hold several values.
    #[serde(default)]
    pub multi: bool,
}

impl VariableInfo {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Set the group.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the variable type.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Flag the variable as removed from the form.
    pub fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    /// Flag the variable as multi-valued.
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }
}

/// A stored variable descriptor with its neighbors at the latest save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub table: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub missing: bool,
    /// Key of the variable right before this one.
    #[serde(default)]
    pub before: Option<String>,
    /// Key of the variable right after this one.
    #[serde(default)]
    pub after: Option<String>,
}

impl VariableDescriptor {
    /// Describe every variable of `variables`, with neighbor hints from list order.
    pub(crate) fn from_list(table: &str, variables: &[VariableInfo]) -> Vec<Self> {
        variables
            .iter()
            .enumerate()
            .map(|(i, info)| Self {
                table: table.to_string(),
                key: info.key.clone(),
                group: info.group.clone(),
                kind: info.kind.clone(),
                multi: info.multi,
                missing: info.missing,
                before: i
                    .checked_sub(1)
                    .and_then(|prev| variables.get(prev))
                    .map(|v| v.key.clone()),
                after: variables.get(i + 1).map(|v| v.key.clone()),
            })
            .collect()
    }

    /// The neighbor hints of this descriptor.
    pub fn hint(&self) -> Hint {
        Hint {
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}
