//! Search/replace block format.
//!
//! ````text
//! ```replace: pkg/a.py
//! <<<<<<< SEARCH
//! def f():
//!     ...
//! =======
//! >>>>>>> REPLACE
//! def f():
//!     return 1
//! ```
//! ````
//!
//! Each hunk of a unified diff becomes one block: its pre-image (context and deletions)
//! followed by its post-image (context and additions). Sentinels are fixed and never escaped.

use crate::error::{PatchError, Result};
use crate::parse::parse_patch;
use std::collections::BTreeMap;

pub const FILE_OPEN: &str = "```replace: ";
pub const FILE_CLOSE: &str = "```";
pub const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
pub const DIVIDER: &str = "=======";
pub const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceBlock {
    pub search: Vec<String>,
    pub replace: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceFile {
    pub filepath: String,
    pub blocks: Vec<ReplaceBlock>,
}

fn bare(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
        .unwrap_or(line)
}

/// Convert a unified diff into search/replace blocks.
///
/// Files without hunks are skipped. Lines lose their terminators and the output is joined
/// with `\n`, without a trailing newline.
pub fn patch_to_replace(patch: &str) -> Result<String> {
    let mut out: Vec<String> = Vec::new();
    for file in parse_patch(patch)? {
        if file.hunks.is_empty() {
            continue;
        }
        out.push(format!("{FILE_OPEN}{}", file.display_path()));
        for hunk in &file.hunks {
            out.push(SEARCH_MARKER.to_string());
            out.extend(hunk.old_lines().map(|line| bare(line).to_string()));
            out.push(DIVIDER.to_string());
            out.push(REPLACE_MARKER.to_string());
            out.extend(hunk.new_lines().map(|line| bare(line).to_string()));
        }
        out.push(FILE_CLOSE.to_string());
    }
    Ok(out.join("\n"))
}

enum Section {
    Outside,
    Search,
    Divider,
    Replace,
}

fn malformed(line: usize, reason: impl Into<String>) -> PatchError {
    PatchError::MalformedReplace {
        line,
        reason: reason.into(),
    }
}

/// Parse search/replace text back into per-file blocks.
///
/// A line equal to one of the sentinels always acts as a sentinel.
pub fn parse_replace(text: &str) -> Result<Vec<ReplaceFile>> {
    let mut files: Vec<ReplaceFile> = Vec::new();
    let mut section = Section::Outside;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        match section {
            Section::Outside => {
                if let Some(path) = raw.strip_prefix(FILE_OPEN) {
                    let path = path.trim();
                    if path.is_empty() {
                        return Err(malformed(line_no, "missing file path"));
                    }
                    files.push(ReplaceFile {
                        filepath: path.to_string(),
                        blocks: Vec::new(),
                    });
                    section = Section::Replace;
                } else if !raw.trim().is_empty() {
                    return Err(malformed(line_no, "text outside a replace section"));
                }
            }
            Section::Search => {
                let block = current_block(&mut files, line_no)?;
                if raw == DIVIDER {
                    section = Section::Divider;
                } else {
                    block.search.push(raw.to_string());
                }
            }
            Section::Divider => {
                if raw != REPLACE_MARKER {
                    return Err(malformed(line_no, format!("expected '{REPLACE_MARKER}'")));
                }
                section = Section::Replace;
            }
            Section::Replace => {
                if raw == SEARCH_MARKER {
                    let file = files
                        .last_mut()
                        .ok_or_else(|| malformed(line_no, "block outside a file"))?;
                    file.blocks.push(ReplaceBlock::default());
                    section = Section::Search;
                } else if raw == FILE_CLOSE {
                    section = Section::Outside;
                } else {
                    let file = files
                        .last_mut()
                        .ok_or_else(|| malformed(line_no, "text outside a file"))?;
                    let block = file
                        .blocks
                        .last_mut()
                        .ok_or_else(|| malformed(line_no, "text before the first block"))?;
                    block.replace.push(raw.to_string());
                }
            }
        }
    }

    match section {
        Section::Outside => Ok(files),
        _ => Err(malformed(text.lines().count(), "unterminated replace section")),
    }
}

fn current_block(files: &mut [ReplaceFile], line_no: usize) -> Result<&mut ReplaceBlock> {
    files
        .last_mut()
        .and_then(|file| file.blocks.last_mut())
        .ok_or_else(|| malformed(line_no, "search text outside a block"))
}

/// Apply search/replace blocks to an in-memory file set.
///
/// Blocks of a file are applied in order, each searched from the end of the previous
/// replacement and matched on whole lines. A missing file is treated as empty, and a file
/// left empty by its blocks is removed.
///
/// The block format drops line terminators, so two reference states cannot be told apart:
///
/// - a change to the final newline alone: replacing `x = 1\n` with `x = 2` yields `x = 2\n`,
///   since replacement lines reuse the terminator of the matched line;
/// - an existing empty file and a deleted one: a file emptied by its blocks is removed, not
///   kept as `""`.
///
/// Use [`apply_patch`](crate::apply_patch) when the exact bytes matter.
pub fn apply_replace(
    files: &BTreeMap<String, String>,
    text: &str,
) -> Result<BTreeMap<String, String>> {
    let mut out = files.clone();
    for file in parse_replace(text)? {
        let existing = out.get(&file.filepath).map(String::as_str).unwrap_or("");
        let mut lines: Vec<String> = existing.split_inclusive('\n').map(str::to_string).collect();
        let mut cursor = 0usize;

        for (idx, block) in file.blocks.iter().enumerate() {
            let at = find_lines(&lines, &block.search, cursor).ok_or_else(|| {
                PatchError::SearchNotFound {
                    path: file.filepath.clone(),
                    block: idx + 1,
                }
            })?;
            let matched = &lines[at..at + block.search.len()];
            let eol = matched
                .first()
                .map(|line| if line.ends_with("\r\n") { "\r\n" } else { "\n" })
                .unwrap_or("\n");
            let unterminated_tail = matched.last().is_some_and(|line| !line.ends_with('\n'));

            let mut replacement: Vec<String> = block
                .replace
                .iter()
                .map(|line| format!("{line}{eol}"))
                .collect();
            if unterminated_tail {
                if let Some(last) = replacement.last_mut() {
                    last.truncate(last.len() - eol.len());
                }
            }

            cursor = at + replacement.len();
            lines.splice(at..at + block.search.len(), replacement);
        }

        let content = lines.concat();
        if content.is_empty() && !file.blocks.is_empty() {
            log::debug!("{}: emptied by replace blocks, removing", file.filepath);
            out.remove(&file.filepath);
        } else {
            out.insert(file.filepath, content);
        }
    }
    Ok(out)
}

fn find_lines(lines: &[String], search: &[String], from: usize) -> Option<usize> {
    if search.is_empty() {
        return (from <= lines.len()).then_some(from);
    }
    if lines.len() < search.len() {
        return None;
    }
    (from..=lines.len() - search.len()).find(|&start| {
        lines[start..start + search.len()]
            .iter()
            .zip(search)
            .all(|(line, wanted)| bare(line) == wanted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn converts_hunks_into_blocks() {
        let patch = "--- pkg/a.py\n+++ pkg/a.py\n@@ -1,2 +1,2 @@\n def f():\n-    ...\n+    return 1\n";
        assert_eq!(
            patch_to_replace(patch).unwrap(),
            "```replace: pkg/a.py\n<<<<<<< SEARCH\ndef f():\n    ...\n=======\n>>>>>>> REPLACE\ndef f():\n    return 1\n```"
        );
    }

    #[test]
    fn deleted_file_is_named_by_old_path() {
        let patch = "--- gone.py\n+++ /dev/null\n@@ -1 +0,0 @@\n-x\n";
        assert_eq!(
            patch_to_replace(patch).unwrap(),
            "```replace: gone.py\n<<<<<<< SEARCH\nx\n=======\n>>>>>>> REPLACE\n```"
        );
    }

    #[test]
    fn empty_patch_converts_to_empty_text() {
        assert_eq!(patch_to_replace("\n").unwrap(), "");
    }

    #[test]
    fn no_newline_marker_is_dropped() {
        let patch = "--- a.py\n+++ a.py\n@@ -1 +1 @@\n-x = 1\n\\ No newline at end of file\n+x = 2\n\\ No newline at end of file\n";
        assert_eq!(
            patch_to_replace(patch).unwrap(),
            "```replace: a.py\n<<<<<<< SEARCH\nx = 1\n=======\n>>>>>>> REPLACE\nx = 2\n```"
        );
    }

    #[test]
    fn parses_multiple_blocks() {
        let text = "```replace: a.py\n<<<<<<< SEARCH\na\n=======\n>>>>>>> REPLACE\nb\n<<<<<<< SEARCH\nc\n=======\n>>>>>>> REPLACE\n```";
        let files = parse_replace(text).unwrap();
        assert_eq!(
            files,
            vec![ReplaceFile {
                filepath: "a.py".into(),
                blocks: vec![
                    ReplaceBlock {
                        search: vec!["a".into()],
                        replace: vec!["b".into()],
                    },
                    ReplaceBlock {
                        search: vec!["c".into()],
                        replace: vec![],
                    },
                ],
            }]
        );
    }

    #[test]
    fn unterminated_section_is_rejected() {
        let err = parse_replace("```replace: a.py\n<<<<<<< SEARCH\na\n").unwrap_err();
        assert!(matches!(err, PatchError::MalformedReplace { .. }));
    }

    #[test]
    fn blocks_apply_in_order_from_cursor() {
        let files = BTreeMap::from([("a.py".to_string(), "x\ny\nx\ny\n".to_string())]);
        let text = "```replace: a.py\n<<<<<<< SEARCH\nx\n=======\n>>>>>>> REPLACE\none\n<<<<<<< SEARCH\nx\n=======\n>>>>>>> REPLACE\ntwo\n```";
        let out = apply_replace(&files, text).unwrap();
        assert_eq!(out["a.py"], "one\ny\ntwo\ny\n");
    }

    #[test]
    fn missing_search_is_reported_with_block_number() {
        let files = BTreeMap::from([("a.py".to_string(), "x\n".to_string())]);
        let text = "```replace: a.py\n<<<<<<< SEARCH\nx\n=======\n>>>>>>> REPLACE\ny\n<<<<<<< SEARCH\nx\n=======\n>>>>>>> REPLACE\nz\n```";
        assert_eq!(
            apply_replace(&files, text).unwrap_err(),
            PatchError::SearchNotFound {
                path: "a.py".into(),
                block: 2,
            }
        );
    }

    #[test]
    fn trailing_newline_and_empty_file_are_not_representable() {
        let skeleton = BTreeMap::from([
            ("a.py".to_string(), "x = 1\n".to_string()),
            ("b.py".to_string(), "y\n".to_string()),
        ]);
        let reference = BTreeMap::from([
            ("a.py".to_string(), "x = 2".to_string()),
            ("b.py".to_string(), String::new()),
        ]);
        let patch = "--- a.py\n+++ a.py\n@@ -1 +1 @@\n-x = 1\n+x = 2\n\\ No newline at end of file\n\
                     --- b.py\n+++ b.py\n@@ -1 +0,0 @@\n-y\n";
        assert_eq!(crate::apply_patch(&skeleton, patch).unwrap(), reference);

        let replaced = apply_replace(&skeleton, &patch_to_replace(patch).unwrap()).unwrap();
        assert_eq!(
            replaced,
            BTreeMap::from([("a.py".to_string(), "x = 2\n".to_string())])
        );
    }

    #[test]
    fn empty_search_creates_and_empty_result_removes() {
        let files = BTreeMap::from([("old.py".to_string(), "gone\n".to_string())]);
        let text = "```replace: new.py\n<<<<<<< SEARCH\n=======\n>>>>>>> REPLACE\nfresh\n```\n```replace: old.py\n<<<<<<< SEARCH\ngone\n=======\n>>>>>>> REPLACE\n```";
        let out = apply_replace(&files, text).unwrap();
        assert_eq!(
            out,
            BTreeMap::from([("new.py".to_string(), "fresh\n".to_string())])
        );
    }
}
