use crate::error::{PatchError, Result};
use crate::unified::DEV_NULL;

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Delete(String),
    Insert(String),
}

impl HunkLine {
    pub fn text(&self) -> &str {
        match self {
            HunkLine::Context(text) | HunkLine::Delete(text) | HunkLine::Insert(text) => text,
        }
    }

    fn text_mut(&mut self) -> &mut String {
        match self {
            HunkLine::Context(text) | HunkLine::Delete(text) | HunkLine::Insert(text) => text,
        }
    }
}

/// One `@@` section. Line texts keep their original terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Pre-image: context and deleted lines.
    pub fn old_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            HunkLine::Context(text) | HunkLine::Delete(text) => Some(text.as_str()),
            HunkLine::Insert(_) => None,
        })
    }

    /// Post-image: context and inserted lines.
    pub fn new_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            HunkLine::Context(text) | HunkLine::Insert(text) => Some(text.as_str()),
            HunkLine::Delete(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    pub fn is_creation(&self) -> bool {
        self.old_path == DEV_NULL
    }

    pub fn is_deletion(&self) -> bool {
        self.new_path == DEV_NULL
    }

    /// Path the change is reported under: the new path unless the file is deleted.
    pub fn display_path(&self) -> &str {
        if self.is_deletion() {
            &self.old_path
        } else {
            &self.new_path
        }
    }
}

fn strip_terminator(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
        .unwrap_or(line)
}

fn header_path(line: &str, prefix: &str) -> Option<String> {
    let rest = strip_terminator(line).strip_prefix(prefix)?;
    // Drop an optional tab-separated timestamp.
    let path = rest.split('\t').next().unwrap_or(rest);
    Some(path.trim().to_string())
}

fn parse_range(raw: &str, sign: char, line_no: usize) -> Result<(usize, usize)> {
    let body = raw
        .strip_prefix(sign)
        .ok_or_else(|| PatchError::malformed(line_no, format!("expected '{sign}' range")))?;
    let (start, len) = match body.split_once(',') {
        Some((start, len)) => (start, len),
        None => (body, "1"),
    };
    let parse = |value: &str| {
        value
            .parse::<usize>()
            .map_err(|_| PatchError::malformed(line_no, format!("bad range '{raw}'")))
    };
    Ok((parse(start)?, parse(len)?))
}

fn parse_hunk_header(line: &str, line_no: usize) -> Result<Hunk> {
    let inner = strip_terminator(line)
        .strip_prefix("@@ ")
        .and_then(|rest| rest.split(" @@").next())
        .ok_or_else(|| PatchError::malformed(line_no, "bad hunk header"))?;
    let mut ranges = inner.split_whitespace();
    let old = ranges
        .next()
        .ok_or_else(|| PatchError::malformed(line_no, "missing old range"))?;
    let new = ranges
        .next()
        .ok_or_else(|| PatchError::malformed(line_no, "missing new range"))?;
    let (old_start, old_len) = parse_range(old, '-', line_no)?;
    let (new_start, new_len) = parse_range(new, '+', line_no)?;
    Ok(Hunk {
        old_start,
        old_len,
        new_start,
        new_len,
        lines: Vec::new(),
    })
}

/// Parse a unified diff into per-file hunks.
///
/// Hunk bodies are consumed by their declared line counts, so content lines that happen to
/// start with `---` are not mistaken for file headers.
pub fn parse_patch(patch: &str) -> Result<Vec<FilePatch>> {
    let lines: Vec<&str> = patch.split_inclusive('\n').collect();
    let mut files: Vec<FilePatch> = Vec::new();
    let mut idx = 0usize;

    while idx < lines.len() {
        let line = lines[idx];
        if let Some(old_path) = header_path(line, "--- ") {
            let new_path = lines
                .get(idx + 1)
                .and_then(|next| header_path(next, "+++ "))
                .ok_or_else(|| PatchError::malformed(idx + 2, "expected '+++' header"))?;
            files.push(FilePatch {
                old_path,
                new_path,
                hunks: Vec::new(),
            });
            idx += 2;
            continue;
        }

        if line.starts_with("@@ ") {
            let file = files
                .last_mut()
                .ok_or_else(|| PatchError::malformed(idx + 1, "hunk before file header"))?;
            let mut hunk = parse_hunk_header(line, idx + 1)?;
            idx += 1;

            let (mut old_seen, mut new_seen) = (0usize, 0usize);
            while old_seen < hunk.old_len || new_seen < hunk.new_len {
                let Some(raw) = lines.get(idx) else {
                    return Err(PatchError::malformed(idx + 1, "hunk ends early"));
                };
                let body = raw.get(1..).unwrap_or_default().to_string();
                let entry = match raw.chars().next() {
                    Some(' ') => {
                        old_seen += 1;
                        new_seen += 1;
                        HunkLine::Context(body)
                    }
                    Some('-') => {
                        old_seen += 1;
                        HunkLine::Delete(body)
                    }
                    Some('+') => {
                        new_seen += 1;
                        HunkLine::Insert(body)
                    }
                    Some('\\') => {
                        idx += 1;
                        strip_last_newline(&mut hunk)?;
                        continue;
                    }
                    // Some tools emit bare newlines for empty context lines.
                    Some('\n') | Some('\r') => {
                        old_seen += 1;
                        new_seen += 1;
                        HunkLine::Context((*raw).to_string())
                    }
                    _ => return Err(PatchError::malformed(idx + 1, "unexpected hunk line")),
                };
                hunk.lines.push(entry);
                idx += 1;
            }

            if lines
                .get(idx)
                .is_some_and(|raw| strip_terminator(raw) == NO_NEWLINE_MARKER)
            {
                strip_last_newline(&mut hunk)?;
                idx += 1;
            }

            file.hunks.push(hunk);
            continue;
        }

        // Blank separators and unknown preamble lines are ignored.
        idx += 1;
    }

    Ok(files)
}

fn strip_last_newline(hunk: &mut Hunk) -> Result<()> {
    let last = hunk
        .lines
        .last_mut()
        .ok_or_else(|| PatchError::malformed(0, "no-newline marker without a preceding line"))?;
    let text = last.text_mut();
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(())
}
