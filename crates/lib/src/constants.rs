//! Constants used throughout the Fieldbook library.
//!
//! Store tables used by the record repository and the separator that builds
//! compound keys out of a table name and a record id.

/// Store table holding the index facet of every record.
pub const RECORD_ENTRIES: &str = "rec_entries";

/// Store table holding the field blob (variable values) of every record.
pub const RECORD_DATA: &str = "rec_data";

/// Store table holding variable descriptors and their neighbor hints.
pub const RECORD_VARIABLES: &str = "rec_variables";

/// Separator between the table name and the record id in compound keys.
pub const KEY_SEPARATOR: char = ':';

/// The character directly after [`KEY_SEPARATOR`], used as the exclusive upper
/// bound of a table's key range.
pub const KEY_SEPARATOR_END: char = ';';

/// All store tables touched by the record repository.
pub const RECORD_TABLES: [&str; 3] = [RECORD_ENTRIES, RECORD_DATA, RECORD_VARIABLES];
