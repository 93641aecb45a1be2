//! Column order reconstruction from neighbor hints.
//!
//! Every save stores, for each variable, the keys of the variables directly
//! before and after it in the form at that moment. Forms change over time, so
//! the hints of different saves can disagree, point at variables that no
//! longer exist, or even contradict each other. [`order_variables`] merges
//! any number of such [`Fragment`]s into one total order that respects as
//! many hints as it can, and never fails.
//!
//! ```
//! use fieldbook::order::{Fragment, order_variables};
//!
//! let old = Fragment::from_keys(["a", "b"]);
//! let new = Fragment::from_keys(["a", "c", "b"]);
//! assert_eq!(order_variables(&[old, new]), vec!["a", "c", "b"]);
//! ```

use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// The neighbors of one variable when its fragment was recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hint {
    /// Key of the variable right before this one.
    pub before: Option<String>,
    /// Key of the variable right after this one.
    pub after: Option<String>,
}

impl Hint {
    pub fn new(before: Option<&str>, after: Option<&str>) -> Self {
        Self {
            before: before.map(str::to_string),
            after: after.map(str::to_string),
        }
    }
}

/// One observed ordering: variables with their neighbor hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    entries: Vec<(String, Hint)>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fragment for keys in the given order, each hinting at its neighbors.
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.iter()
            .enumerate()
            .map(|(i, key)| {
                let before = i.checked_sub(1).and_then(|p| keys.get(p)).cloned();
                let after = keys.get(i + 1).cloned();
                (key.clone(), Hint { before, after })
            })
            .collect()
    }

    /// Add a variable with explicit hints.
    pub fn push(&mut self, key: impl Into<String>, hint: Hint) {
        self.entries.push((key.into(), hint));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Hint)> {
        self.entries.iter().map(|(k, h)| (k.as_str(), h))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Hint)> for Fragment {
    fn from_iter<T: IntoIterator<Item = (String, Hint)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Hint graph over every key observed in any fragment.
struct HintGraph<'a> {
    /// Keys in first-encounter order.
    keys: Vec<&'a str>,
    /// Whether a key has a "before" hint naming a known key.
    anchored: Vec<bool>,
    /// Keys that must come after each key.
    successors: Vec<BTreeSet<usize>>,
    /// Keys whose "before" hint names each key, in encounter order.
    followers: Vec<Vec<usize>>,
}

impl<'a> HintGraph<'a> {
    fn build(fragments: &'a [Fragment]) -> Self {
        let mut position: HashMap<&'a str, usize> = HashMap::new();
        let mut keys = Vec::new();
        for fragment in fragments {
            for (key, _) in &fragment.entries {
                position.entry(key.as_str()).or_insert_with(|| {
                    keys.push(key.as_str());
                    keys.len() - 1
                });
            }
        }

        let mut graph = Self {
            anchored: vec![false; keys.len()],
            successors: vec![BTreeSet::new(); keys.len()],
            followers: vec![Vec::new(); keys.len()],
            keys,
        };
        for fragment in fragments {
            for (key, hint) in &fragment.entries {
                let node = position[key.as_str()];
                if let Some(&before) = hint.before.as_deref().and_then(|b| position.get(b)) {
                    graph.anchored[node] = true;
                    graph.successors[before].insert(node);
                    if !graph.followers[before].contains(&node) {
                        graph.followers[before].push(node);
                    }
                }
                if let Some(&after) = hint.after.as_deref().and_then(|a| position.get(a)) {
                    graph.successors[node].insert(after);
                }
            }
        }
        graph
    }
}

/// Merge `fragments` into one order containing every observed key exactly once.
///
/// Keys without a usable "before" hint start the order. Each generation of keys
/// is placed so that a key comes before everything its hints say follows it;
/// then the keys hinted to come right after the placed ones form the next
/// generation. Contradictory hints are broken by placing the lexically
/// smallest key first, so the result is deterministic. Keys that no generation
/// reaches (for example a cycle of "before" hints) are appended in the order
/// they were first seen.
pub fn order_variables(fragments: &[Fragment]) -> Vec<String> {
    let graph = HintGraph::build(fragments);
    let total = graph.keys.len();
    let mut placed = vec![false; total];
    let mut order: Vec<String> = Vec::with_capacity(total);

    let heads: Vec<usize> = (0..total).filter(|&k| !graph.anchored[k]).collect();
    let mut worklist: VecDeque<Vec<usize>> = VecDeque::new();
    if !heads.is_empty() {
        worklist.push_back(heads);
    }

    while let Some(set) = worklist.pop_front() {
        let mut remaining: Vec<usize> = Vec::with_capacity(set.len());
        for member in set {
            if !placed[member] && !remaining.contains(&member) {
                remaining.push(member);
            }
        }

        let mut placed_now = Vec::new();
        while !remaining.is_empty() {
            let mut block = Vec::new();
            while let Some(at) = remaining.iter().rposition(|&m| {
                !graph.successors[m]
                    .iter()
                    .any(|succ| remaining.contains(succ))
            }) {
                block.push(remaining.remove(at));
            }
            if block.is_empty() {
                // Every member waits on another: break the cycle deterministically.
                let at = (0..remaining.len())
                    .min_by_key(|&i| graph.keys[remaining[i]])
                    .unwrap_or(0);
                block.push(remaining.remove(at));
            }
            block.reverse();
            for member in block {
                placed[member] = true;
                order.push(graph.keys[member].to_string());
                placed_now.push(member);
            }
        }

        for member in placed_now {
            let next: Vec<usize> = graph.followers[member]
                .iter()
                .copied()
                .filter(|&f| !placed[f])
                .collect();
            if !next.is_empty() {
                worklist.push_back(next);
            }
        }
    }

    for (index, key) in graph.keys.iter().enumerate() {
        if !placed[index] {
            order.push(key.to_string());
        }
    }
    order
}
