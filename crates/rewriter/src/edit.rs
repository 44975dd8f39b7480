use crate::error::{Result, RewriteError};

/// Replace `source[start..end]` with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl Edit {
    pub fn replace(start: usize, end: usize, replacement: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
        }
    }

    pub fn delete(start: usize, end: usize) -> Self {
        Self::replace(start, end, String::new())
    }
}

/// Rebuild `source` with non-overlapping edits applied; bytes outside edits are copied as-is.
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> Result<String> {
    edits.sort_by_key(|edit| (edit.start, edit.end));

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for edit in &edits {
        if edit.start < cursor {
            return Err(RewriteError::OverlappingEdits {
                start: edit.start,
                previous_end: cursor,
            });
        }
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.replacement);
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_in_offset_order() {
        let out = apply_edits(
            "abcdef",
            vec![Edit::replace(4, 5, "E"), Edit::delete(0, 1), Edit::replace(2, 2, "+")],
        )
        .unwrap();
        assert_eq!(out, "b+cdEf");
    }

    #[test]
    fn rejects_overlap() {
        let err = apply_edits("abcdef", vec![Edit::delete(0, 3), Edit::delete(2, 4)]).unwrap_err();
        assert!(matches!(err, RewriteError::OverlappingEdits { start: 2, previous_end: 3 }));
    }

    #[test]
    fn no_edits_is_identity() {
        assert_eq!(apply_edits("x = 1\n", vec![]).unwrap(), "x = 1\n");
    }
}
