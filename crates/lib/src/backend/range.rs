//! Key ranges for scans and bulk deletes.

use std::ops::Bound;

use serde::{Deserialize, Serialize};

/// A contiguous interval of keys within one table.
///
/// Bounds compare keys lexically by their UTF-8 bytes, the same order every
/// backend sorts keys in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    lower: Bound<String>,
    upper: Bound<String>,
}

impl Default for KeyRange {
    fn default() -> Self {
        Self::all()
    }
}

impl KeyRange {
    /// Every key in the table.
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// Exactly one key.
    pub fn only(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            lower: Bound::Included(key.clone()),
            upper: Bound::Included(key),
        }
    }

    /// Keys between `lower` and `upper`, each end optionally excluded.
    pub fn bound(
        lower: impl Into<String>,
        upper: impl Into<String>,
        lower_open: bool,
        upper_open: bool,
    ) -> Self {
        let (lower, upper) = (lower.into(), upper.into());
        Self {
            lower: if lower_open {
                Bound::Excluded(lower)
            } else {
                Bound::Included(lower)
            },
            upper: if upper_open {
                Bound::Excluded(upper)
            } else {
                Bound::Included(upper)
            },
        }
    }

    /// Keys from `start` (included) up to `end` (excluded).
    pub fn half_open(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self::bound(start, end, false, true)
    }

    /// Keys at or above `lower`.
    pub fn at_least(lower: impl Into<String>) -> Self {
        Self {
            lower: Bound::Included(lower.into()),
            upper: Bound::Unbounded,
        }
    }

    /// Keys at or below `upper`.
    pub fn at_most(upper: impl Into<String>) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Included(upper.into()),
        }
    }

    /// Every key that starts with `prefix`.
    ///
    /// The upper bound is `prefix` with its last character bumped by one code
    /// point, so `"t:"` covers `["t:", "t;")`.
    pub fn prefix(prefix: &str) -> Self {
        let mut chars: Vec<char> = prefix.chars().collect();
        while let Some(last) = chars.pop() {
            if let Some(next) = next_char(last) {
                chars.push(next);
                let upper: String = chars.into_iter().collect();
                return Self::half_open(prefix, upper);
            }
        }
        // Empty prefix, or one made only of the highest code point.
        Self::at_least(prefix)
    }

    /// The lower bound.
    pub fn lower(&self) -> Bound<&str> {
        as_str_bound(&self.lower)
    }

    /// The upper bound.
    pub fn upper(&self) -> Bound<&str> {
        as_str_bound(&self.upper)
    }

    /// Check if the range places no restriction on keys at all.
    pub fn is_unbounded(&self) -> bool {
        matches!(
            (&self.lower, &self.upper),
            (Bound::Unbounded, Bound::Unbounded)
        )
    }

    /// Check if no key can fall inside this range.
    pub fn is_empty(&self) -> bool {
        match (self.lower(), self.upper()) {
            (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
            (Bound::Included(lo), Bound::Excluded(hi))
            | (Bound::Excluded(lo), Bound::Included(hi))
            | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
            _ => false,
        }
    }

    /// Check if `key` falls inside this range.
    pub fn contains(&self, key: &str) -> bool {
        let above = match self.lower() {
            Bound::Included(lo) => key >= lo,
            Bound::Excluded(lo) => key > lo,
            Bound::Unbounded => true,
        };
        let below = match self.upper() {
            Bound::Included(hi) => key <= hi,
            Bound::Excluded(hi) => key < hi,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Both bounds as a pair, suitable for `BTreeMap::range`.
    ///
    /// Callers must check [`is_empty`](Self::is_empty) first, since
    /// `BTreeMap::range` panics on inverted bounds.
    pub fn as_bounds(&self) -> (Bound<&str>, Bound<&str>) {
        (self.lower(), self.upper())
    }
}

/// The next Unicode scalar value after `c`, stepping over the surrogate block.
fn next_char(c: char) -> Option<char> {
    match c {
        '\u{D7FF}' => Some('\u{E000}'),
        c => char::from_u32(c as u32 + 1),
    }
}

fn as_str_bound(bound: &Bound<String>) -> Bound<&str> {
    match bound {
        Bound::Included(s) => Bound::Included(s.as_str()),
        Bound::Excluded(s) => Bound::Excluded(s.as_str()),
        Bound::Unbounded => Bound::Unbounded,
    }
}
