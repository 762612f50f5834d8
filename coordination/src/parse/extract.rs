//! Balanced object-span extraction from free text.
//!
//! Providers are told to answer with a bare JSON object but routinely wrap it
//! in commentary or markdown. The scanner below finds the leftmost `{ ... }`
//! span whose braces balance, treating double-quoted strings as opaque.

/// Return the first balanced `{ ... }` span in `text`.
///
/// Scanning starts at the first opening brace. If the braces opened there never
/// balance, scanning restarts at the next opening brace, so the leftmost span
/// that does balance wins.
pub fn extract_object_span(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&text[start..]) {
            return Some(&text[start..start + end]);
        }
        search_from = start + 1;
    }
    None
}

/// Byte length of the balanced object starting at `text[0]` (which must be `{`),
/// or `None` if the input ends before depth returns to zero.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escape_next {
                escape_next = false;
            } else if c == '\\' {
                escape_next = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Strip a surrounding markdown code fence (with optional language tag).
///
/// Only the fence lines go: the opening line with its info string, and the
/// closing line with the newline that precedes it. Body indentation and
/// interior whitespace are kept. Code that is not fenced is returned untouched.
pub fn strip_code_fences(code: &str) -> &str {
    let Some(rest) = code.trim_start().strip_prefix("```") else {
        return code;
    };

    let Some(newline) = rest.find('\n') else {
        // Single-line fence: ```x = 1```
        return rest.strip_suffix("```").unwrap_or(rest).trim();
    };
    let body = &rest[newline + 1..];

    let closed = body.trim_end();
    let Some(head) = closed.strip_suffix("```") else {
        return body;
    };
    let line_start = head.rfind('\n').map_or(0, |i| i + 1);
    if !head[line_start..].trim().is_empty() {
        // Fence glued to the last code line.
        return head;
    }
    let body = &head[..line_start];
    body.strip_suffix('\n')
        .map(|b| b.strip_suffix('\r').unwrap_or(b))
        .unwrap_or(body)
}
