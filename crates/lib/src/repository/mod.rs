//! Record persistence on top of the transaction queue.
//!
//! Every record is stored as two facets sharing the compound key
//! `"{table}:{id}"`: the index facet in [`RECORD_ENTRIES`] and the field blob in
//! [`RECORD_DATA`]. Listing a table reads only the index facets' key range plus
//! the blobs' range, so record lists never deserialize more than they show.
//! Variable descriptors live in [`RECORD_VARIABLES`] under `"{table}:{key}"`,
//! each carrying the keys of its neighbors at the latest save; see
//! [`order`](crate::order) for how column order is rebuilt from them.

mod errors;
mod record;

use std::sync::Arc;

use serde_json::Map;
use tracing::{debug, info};

pub use errors::RepositoryError;
pub use record::{Record, VariableDescriptor, VariableInfo};

use crate::Result;
use crate::backend::KeyRange;
use crate::clock::{Clock, SystemClock};
use crate::constants::{
    KEY_SEPARATOR, KEY_SEPARATOR_END, RECORD_DATA, RECORD_ENTRIES, RECORD_VARIABLES,
};
use crate::id::{IdGenerator, RecordId};
use crate::order::{Fragment, order_variables};
use crate::queue::Queue;
use record::{FieldBlob, RecordIndex};

/// Saves, loads and lists records.
///
/// Cloning a `Repository` is cheap; clones share the queue and id generator.
#[derive(Debug, Clone)]
pub struct Repository {
    queue: Queue,
    clock: Arc<dyn Clock>,
    ids: Arc<IdGenerator>,
}

impl Repository {
    /// Create a repository using the system clock.
    pub fn new(queue: Queue) -> Self {
        Self::with_clock(queue, Arc::new(SystemClock))
    }

    /// Create a repository reading ids and timestamps from `clock`.
    pub fn with_clock(queue: Queue, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue,
            ids: Arc::new(IdGenerator::new(clock.clone())),
            clock,
        }
    }

    /// The queue records are stored through.
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// A new, unsaved record for `table` with a fresh id.
    pub fn create(&self, table: &str) -> Result<Record> {
        check_table(table)?;
        Ok(Record::new(self.ids.next_id(), table))
    }

    /// Save `record` and the descriptors of `variables` in one transaction.
    ///
    /// The stored values become the previously stored values overlaid with
    /// `record.values`, minus every variable flagged `missing`. `variables` is
    /// taken to be in form order. Returns the record as stored.
    pub async fn save(&self, record: &Record, variables: &[VariableInfo]) -> Result<Record> {
        let key = compound_key(&record.table, &record.id)?;
        let now = self.clock.now_rfc3339();

        let mut index = record.index();
        index.version += 1;
        index.ctime.get_or_insert_with(|| now.clone());
        index.mtime = Some(now);

        let incoming = record.values.clone();
        let missing: Vec<String> = variables
            .iter()
            .filter(|v| v.missing)
            .map(|v| v.key.clone())
            .collect();
        let descriptors = VariableDescriptor::from_list(&record.table, variables);
        let descriptor_keys: Vec<String> = descriptors
            .iter()
            .map(|d| descriptor_key(&d.table, &d.key))
            .collect();

        let blob = self
            .queue
            .transaction(|t| {
                let _ = t.save(RECORD_ENTRIES, key.as_str(), &index);
                let blob = t.update::<FieldBlob, _>(RECORD_DATA, key.as_str(), move |current| {
                    let mut blob = current.unwrap_or_default();
                    blob.values.extend(incoming);
                    for variable in &missing {
                        blob.values.remove(variable);
                    }
                    Some(blob)
                });
                if !descriptors.is_empty() {
                    let _ = t.save_all(
                        RECORD_VARIABLES,
                        descriptor_keys.into_iter().zip(descriptors.iter()),
                    );
                }
                blob
            })
            .await?
            .await?;

        debug!(%key, version = index.version, "Saved record");
        Ok(index.into_record(blob.map(|b| b.values).unwrap_or_default()))
    }

    /// Remove both facets of one record.
    pub async fn delete(&self, table: &str, id: &RecordId) -> Result<()> {
        let key = compound_key(table, id)?;
        let (entry, data) = self
            .queue
            .transaction(|t| (t.delete(RECORD_ENTRIES, key.as_str()), t.delete(RECORD_DATA, key.as_str())))
            .await?;
        entry.await?;
        data.await?;
        debug!(%key, "Deleted record");
        Ok(())
    }

    /// Remove every record and variable descriptor of `table`.
    pub async fn clear(&self, table: &str) -> Result<()> {
        let range = table_range(table)?;
        let (entries, data, variables) = self
            .queue
            .transaction(|t| {
                (
                    t.delete_all(RECORD_ENTRIES, range.clone()),
                    t.delete_all(RECORD_DATA, range.clone()),
                    t.delete_all(RECORD_VARIABLES, range.clone()),
                )
            })
            .await?;
        entries.await?;
        data.await?;
        variables.await?;
        info!(table, "Cleared table");
        Ok(())
    }

    /// Load one record, or `None` unless both of its facets exist.
    pub async fn load(&self, table: &str, id: &RecordId) -> Result<Option<Record>> {
        let key = compound_key(table, id)?;
        let (index, blob) = self
            .queue
            .transaction(|t| {
                (
                    t.load::<RecordIndex>(RECORD_ENTRIES, key.as_str()),
                    t.load::<FieldBlob>(RECORD_DATA, key.as_str()),
                )
            })
            .await?;
        match (index.await?, blob.await?) {
            (Some(index), Some(blob)) => Ok(Some(index.into_record(blob.values))),
            _ => Ok(None),
        }
    }

    /// Load every record of `table`, oldest first.
    ///
    /// Records whose blob is missing still appear, with empty values.
    pub async fn load_all(&self, table: &str) -> Result<Vec<Record>> {
        let range = table_range(table)?;
        let (entries, blobs) = self
            .queue
            .transaction(|t| {
                (
                    t.load_all::<RecordIndex>(RECORD_ENTRIES, range.clone()),
                    t.load_all::<FieldBlob>(RECORD_DATA, range.clone()),
                )
            })
            .await?;
        let (entries, blobs) = (entries.await?, blobs.await?);

        // Both sides are sorted by key: one forward pass pairs them up.
        let mut blobs = blobs.into_iter().peekable();
        let mut records = Vec::with_capacity(entries.len());
        for (key, index) in entries {
            while blobs.next_if(|(blob_key, _)| *blob_key < key).is_some() {}
            let values = match blobs.next_if(|(blob_key, _)| *blob_key == key) {
                Some((_, blob)) => blob.values,
                None => Map::new(),
            };
            records.push(index.into_record(values));
        }
        Ok(records)
    }

    /// Every stored variable descriptor of `table`, in key order.
    pub async fn list_variables(&self, table: &str) -> Result<Vec<VariableDescriptor>> {
        let range = table_range(table)?;
        let rows = self
            .queue
            .load_all::<VariableDescriptor>(RECORD_VARIABLES, range)
            .await?;
        Ok(rows.into_iter().map(|(_, descriptor)| descriptor).collect())
    }

    /// The variable keys of `table` in reconstructed form order.
    pub async fn ordered_variables(&self, table: &str) -> Result<Vec<String>> {
        let descriptors = self.list_variables(table).await?;
        let fragment: Fragment = descriptors
            .iter()
            .map(|d| (d.key.clone(), d.hint()))
            .collect();
        Ok(order_variables(&[fragment]))
    }
}

fn check_table(table: &str) -> Result<()> {
    if table.is_empty() {
        return Err(RepositoryError::InvalidTable {
            table: table.to_string(),
            reason: "must not be empty",
        }
        .into());
    }
    if table.contains(KEY_SEPARATOR) {
        return Err(RepositoryError::InvalidTable {
            table: table.to_string(),
            reason: "must not contain ':'",
        }
        .into());
    }
    Ok(())
}

fn compound_key(table: &str, id: &RecordId) -> Result<String> {
    check_table(table)?;
    if id.as_str().is_empty() {
        return Err(RepositoryError::InvalidId {
            id: String::new(),
            reason: "must not be empty",
        }
        .into());
    }
    Ok(format!("{table}{KEY_SEPARATOR}{id}"))
}

fn descriptor_key(table: &str, variable: &str) -> String {
    format!("{table}{KEY_SEPARATOR}{variable}")
}

/// Every key of `table` and nothing else.
///
/// Table names cannot contain the separator, so the half-open range up to the
/// next character after it cannot reach another table.
fn table_range(table: &str) -> Result<KeyRange> {
    check_table(table)?;
    Ok(KeyRange::half_open(
        format!("{table}{KEY_SEPARATOR}"),
        format!("{table}{KEY_SEPARATOR_END}"),
    ))
}
