//! Docstring layout: paragraph wrapping, indentation and literal quoting.

/// Greedy word wrap of a single line.
///
/// Whitespace runs count as chunks; tabs expand to 8-column stops and every whitespace
/// character becomes a space. Words longer than `width` are never broken and never split on
/// hyphens. Leading whitespace of the first output line is kept; whitespace at line breaks is
/// dropped.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let normalized = normalize_whitespace(line);
    let mut chunks = split_chunks(&normalized).into_iter().peekable();
    let mut lines: Vec<String> = Vec::new();

    while chunks.peek().is_some() {
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        if !lines.is_empty() && chunks.peek().is_some_and(|c| is_blank(c)) {
            chunks.next();
        }

        while let Some(chunk) = chunks.peek() {
            let len = chunk.chars().count();
            if current_len + len <= width {
                current_len += len;
                current.push(chunk);
                chunks.next();
            } else {
                break;
            }
        }

        // Over-long word on an empty line goes through unbroken.
        if current.is_empty() {
            if let Some(chunk) = chunks.next() {
                current.push(chunk);
            }
        }

        if current.last().is_some_and(|c| is_blank(c)) {
            current.pop();
        }

        if !current.is_empty() {
            lines.push(current.concat());
        }
    }

    lines
}

/// Trim, wrap each non-blank line at `width`, and indent every non-blank output line.
pub fn format_docstring(docstring: &str, indent: &str, width: usize) -> String {
    docstring
        .trim()
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                wrap_line(line, width)
                    .iter()
                    .map(|wrapped| format!("{indent}{wrapped}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Triple-quoted literal with the text on its own lines and the closing quotes at `indent`.
pub fn docstring_literal(docstring: &str, indent: &str, width: usize) -> String {
    let body = format_docstring(&escape_docstring(docstring), indent, width);
    format!("\"\"\"\n{body}\n{indent}\"\"\"")
}

/// Escape text so it can sit inside a `"""` literal.
pub fn escape_docstring(text: &str) -> String {
    text.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}

fn is_blank(chunk: &str) -> bool {
    chunk.chars().all(char::is_whitespace)
}

fn normalize_whitespace(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0usize;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = 8 - column % 8;
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else if ch.is_whitespace() {
            out.push(' ');
            column += 1;
        } else {
            out.push(ch);
            column += 1;
        }
    }
    out
}

fn split_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut in_space: Option<bool> = None;
    for (idx, ch) in text.char_indices() {
        let space = ch == ' ';
        match in_space {
            Some(prev) if prev != space => {
                chunks.push(&text[start..idx]);
                start = idx;
            }
            _ => {}
        }
        in_space = Some(space);
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}
