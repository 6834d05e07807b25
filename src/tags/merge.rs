use super::{TagChange, TagDiff, TagSet};

/// Result of overlaying requested tags onto the current tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub merged: TagSet,
    pub changed: bool,
    pub diff: TagDiff,
}

/// Overlay every non-blank requested value onto `current`.
///
/// Keys present only in `current` are carried over verbatim: this is a merge,
/// never a replace. Keys and values are compared as exact strings.
pub fn merge(current: &TagSet, requested: &TagSet) -> MergeResult {
    let requested = requested.without_blanks();
    let mut merged = current.clone();
    let mut diff = TagDiff::default();

    for (key, value) in requested.iter() {
        let old = current.get(key);
        if old != Some(value) {
            diff.changes.push(TagChange {
                key: key.to_string(),
                old: old.map(str::to_string),
                new: value.to_string(),
            });
        }
        merged.insert(key, value);
    }

    let changed = merged != *current;
    MergeResult {
        merged,
        changed,
        diff,
    }
}
