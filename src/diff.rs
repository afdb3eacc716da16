//! Change detection between consecutive snapshots

use serde_json::Value;

use crate::models::{ChangeSet, Snapshot};

/// Fields of `current` that are new or differ from `previous`.
///
/// Keys present only in `previous` are never emitted. Numbers compare by
/// value, so `60` and `60.0` are equal.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (key, value) in current.iter() {
        let changed = match previous.get(key) {
            Some(old) => !values_equal(old, value),
            None => true,
        };
        if changed {
            changes.insert(key.clone(), value.clone());
        }
    }

    changes
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            // Integers compare exactly; f64 only once a float is involved
            if x.is_f64() || y.is_f64() {
                x.as_f64() == y.as_f64()
            } else {
                x.as_i64() == y.as_i64() && x.as_u64() == y.as_u64()
            }
        }
        _ => a == b,
    }
}

/// Owns the retained baseline snapshot.
///
/// Single writer: only `advance` replaces the baseline, and it always does,
/// whatever happens to the returned change-set downstream.
#[derive(Debug, Default)]
pub struct Differ {
    baseline: Snapshot,
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `current` against the baseline, then make it the new baseline
    pub fn advance(&mut self, current: Snapshot) -> ChangeSet {
        let changes = diff(&self.baseline, &current);
        self.baseline = current;
        changes
    }

    #[cfg(test)]
    pub fn baseline(&self) -> &Snapshot {
        &self.baseline
    }
}
