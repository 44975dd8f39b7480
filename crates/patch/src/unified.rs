use devbench_protocol::FileContent;
use similar::TextDiff;
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder path for the missing side of a created or deleted file.
pub const DEV_NULL: &str = "/dev/null";

/// Lines of context around each change.
pub const CONTEXT_RADIUS: usize = 3;

/// Unified diff of one file; empty when the contents are identical.
pub fn file_diff(old: &str, new: &str, old_path: &str, new_path: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(CONTEXT_RADIUS)
        .header(old_path, new_path)
        .to_string()
}

/// Unified diff taking the skeleton file set to the reference file set.
///
/// Paths are visited in sorted order over the union of both sets. Files present only in the
/// reference are diffed from `/dev/null`, files present only in the skeleton to `/dev/null`.
/// Unchanged files are omitted. The result always ends with a newline; with no changes it is
/// exactly `"\n"`.
pub fn generate_patch(skeleton: &[FileContent], reference: &[FileContent]) -> String {
    let before: BTreeMap<&str, &str> = skeleton
        .iter()
        .map(|f| (f.filepath.as_str(), f.content.as_str()))
        .collect();
    let after: BTreeMap<&str, &str> = reference
        .iter()
        .map(|f| (f.filepath.as_str(), f.content.as_str()))
        .collect();
    let paths: BTreeSet<&str> = before.keys().chain(after.keys()).copied().collect();

    let mut patch = String::new();
    for path in paths {
        let diff = match (before.get(path), after.get(path)) {
            (None, Some(new)) => file_diff("", new, DEV_NULL, path),
            (Some(old), None) => file_diff(old, "", path, DEV_NULL),
            (Some(old), Some(new)) => file_diff(old, new, path, path),
            (None, None) => continue,
        };
        if diff.is_empty() {
            log::debug!("{path}: no changes");
            continue;
        }
        patch.push_str(&diff);
    }

    if !patch.ends_with('\n') {
        patch.push('\n');
    }
    patch
}
