//! Sortable record identifiers.
//!
//! A [`RecordId`] is a ULID: 26 characters of Crockford base32 holding 48 bits
//! of milliseconds since the Unix epoch followed by 80 random bits. Ids sort
//! lexically in creation order, which is what makes a table's key range come
//! back oldest first. Ids issued by one [`IdGenerator`] within the same
//! millisecond increment the random part instead of drawing a new one, so they
//! stay strictly increasing.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::clock::Clock;

const RANDOM_MASK: u128 = (1 << 80) - 1;

/// Identifier of one record within its table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Milliseconds since the Unix epoch encoded in a generated id.
    ///
    /// `None` for ids that were not produced by an [`IdGenerator`].
    pub fn timestamp_millis(&self) -> Option<u64> {
        Ulid::from_string(&self.0).ok().map(|ulid| ulid.timestamp_ms())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<Ulid> for RecordId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid.to_string())
    }
}

impl PartialEq<str> for RecordId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RecordId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Issues strictly increasing [`RecordId`]s.
#[derive(Debug)]
pub struct IdGenerator {
    clock: Arc<dyn Clock>,
    last: Mutex<Ulid>,
}

impl IdGenerator {
    /// Create a generator reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: Mutex::new(Ulid::nil()),
        }
    }

    /// Issue the next id.
    pub fn next_id(&self) -> RecordId {
        let millis = self.clock.now_millis();

        // A poisoned lock still holds a valid last id.
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = if last.timestamp_ms() >= millis {
            // Same millisecond (or the clock went backwards): keep counting up.
            last.increment()
                .unwrap_or_else(|| Ulid::from_parts(last.timestamp_ms() + 1, 0))
        } else {
            Ulid::from_parts(millis, rand::random::<u128>() & RANDOM_MASK)
        };
        *last = next;
        next.into()
    }
}
