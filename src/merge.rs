//! Field-level merging of definitions
//!
//! Two modes cover every structural edit the compiler makes:
//!
//! - **fill** (`overwrite = false`): right-hand values only land where the
//!   left side is missing or null. Used by include, extends and the
//!   dictionary.
//! - **overwrite**: right-hand values replace differing left-hand ones.
//!   Used by extension merges and annotations.
//!
//! In both modes nested objects merge recursively, arrays merge as an
//! order-preserving union, null never overwrites anything, and `profile`
//! tags from both sides are combined into a list.

use serde_json::{Map, Value};

use crate::repository::definition::PROFILE_KEY;

/// Options for one merge
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions<'a> {
    pub overwrite: bool,
    /// Top-level keys that are never merged
    pub ignored: &'a [&'a str],
    /// When set, only these top-level keys are merged
    pub allowed: Option<&'a [&'a str]>,
}

impl<'a> MergeOptions<'a> {
    pub fn fill() -> Self {
        Self::default()
    }

    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            ..Self::default()
        }
    }

    pub fn ignoring(mut self, keys: &'a [&'a str]) -> Self {
        self.ignored = keys;
        self
    }

    pub fn only(mut self, keys: &'a [&'a str]) -> Self {
        self.allowed = Some(keys);
        self
    }

    fn admits(&self, key: &str) -> bool {
        !self.ignored.contains(&key) && self.allowed.map(|a| a.contains(&key)).unwrap_or(true)
    }
}

/// Merge `right` into `left`, returning the dotted paths that changed
pub fn merge(left: &mut Map<String, Value>, right: &Map<String, Value>, options: MergeOptions<'_>) -> Vec<String> {
    let mut changes = Vec::new();
    for (key, value) in right {
        if options.admits(key) {
            merge_key(left, key, value, options.overwrite, key, &mut changes);
        }
    }
    changes
}

fn merge_key(
    left: &mut Map<String, Value>,
    key: &str,
    right: &Value,
    overwrite: bool,
    path: &str,
    changes: &mut Vec<String>,
) {
    if right.is_null() {
        return;
    }

    if left.get(key).map(Value::is_null).unwrap_or(true) {
        left.insert(key.to_string(), right.clone());
        changes.push(path.to_string());
        return;
    }
    let Some(existing) = left.get_mut(key) else {
        return;
    };

    if key == PROFILE_KEY {
        if let Some(tags) = union_tags(existing, right) {
            *existing = tags;
            changes.push(path.to_string());
        }
        return;
    }

    match (existing, right) {
        (Value::Object(l), Value::Object(r)) => {
            for (k, v) in r {
                let child = format!("{}.{}", path, k);
                merge_key(l, k, v, overwrite, &child, changes);
            }
        }
        (Value::Array(l), Value::Array(r)) => {
            let mut changed = false;
            for item in r {
                if !l.contains(item) {
                    l.push(item.clone());
                    changed = true;
                }
            }
            if changed {
                changes.push(path.to_string());
            }
        }
        (existing, right) => {
            if overwrite && existing != right {
                *existing = right.clone();
                changes.push(path.to_string());
            }
        }
    }
}

/// Combined profile tags, or `None` if `right` adds nothing
fn union_tags(left: &Value, right: &Value) -> Option<Value> {
    let mut tags = tag_list(left);
    let mut changed = false;
    for tag in tag_list(right) {
        if !tags.contains(&tag) {
            tags.push(tag);
            changed = true;
        }
    }
    if !changed {
        return None;
    }
    Some(Value::Array(tags.into_iter().map(Value::String).collect()))
}

fn tag_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}
