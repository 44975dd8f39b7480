use crate::error::{PatchError, Result};
use crate::parse::{parse_patch, FilePatch, HunkLine};
use std::collections::BTreeMap;

/// Apply a unified diff to an in-memory file set, returning the patched set.
///
/// Context and deleted lines must match exactly (line terminators included).
pub fn apply_patch(
    files: &BTreeMap<String, String>,
    patch: &str,
) -> Result<BTreeMap<String, String>> {
    let mut out = files.clone();
    for file in parse_patch(patch)? {
        if file.is_creation() {
            if out.contains_key(&file.new_path) {
                return Err(PatchError::FileExists(file.new_path));
            }
            let content = apply_file("", &file)?;
            out.insert(file.new_path, content);
        } else if file.is_deletion() {
            let current = out
                .get(&file.old_path)
                .ok_or_else(|| PatchError::MissingFile(file.old_path.clone()))?;
            let remaining = apply_file(current, &file)?;
            if !remaining.is_empty() {
                return Err(PatchError::ContextMismatch {
                    path: file.old_path,
                    line: 1,
                });
            }
            out.remove(&file.old_path);
        } else {
            let current = out
                .get(&file.old_path)
                .ok_or_else(|| PatchError::MissingFile(file.old_path.clone()))?;
            let content = apply_file(current, &file)?;
            if file.new_path != file.old_path {
                out.remove(&file.old_path);
            }
            out.insert(file.new_path, content);
        }
    }
    Ok(out)
}

fn apply_file(content: &str, file: &FilePatch) -> Result<String> {
    let old: Vec<&str> = content.split_inclusive('\n').collect();
    let mut out = String::with_capacity(content.len());
    let mut pos = 0usize;

    for hunk in &file.hunks {
        // Empty ranges name the line after which the change goes.
        let start = if hunk.old_len == 0 {
            hunk.old_start
        } else {
            hunk.old_start.saturating_sub(1)
        };
        if start < pos || start > old.len() {
            return Err(PatchError::ContextMismatch {
                path: file.display_path().to_string(),
                line: hunk.old_start,
            });
        }
        old[pos..start].iter().for_each(|line| out.push_str(line));
        pos = start;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(text) | HunkLine::Delete(text) => {
                    if old.get(pos) != Some(&text.as_str()) {
                        return Err(PatchError::ContextMismatch {
                            path: file.display_path().to_string(),
                            line: pos + 1,
                        });
                    }
                    if matches!(line, HunkLine::Context(_)) {
                        out.push_str(text);
                    }
                    pos += 1;
                }
                HunkLine::Insert(text) => out.push_str(text),
            }
        }
    }

    old[pos..].iter().for_each(|line| out.push_str(line));
    Ok(out)
}
