//! One-shot repair pass for object spans that fail to parse.
//!
//! Both rewrites are idempotent: text that already parses as JSON string
//! content is never changed by a second application.

/// Characters that may legally follow a backslash inside a JSON string.
fn is_escape_char(c: char) -> bool {
    matches!(c, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')
}

/// Double every backslash that does not start a recognised escape sequence.
///
/// A recognised pair (`\\`, `\"`, `\n`, ...) is consumed as a unit, so `\\x`
/// stays `\\x` instead of being rewritten a second time.
pub fn repair_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&next) if is_escape_char(next) => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push_str("\\\\"),
        }
    }

    out
}

/// Escape raw control characters that appear inside string literals.
///
/// Characters outside strings (structural whitespace) are left alone.
pub fn escape_control_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escape_next = false;

    for c in text.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        if escape_next {
            escape_next = false;
            out.push(c);
            continue;
        }

        match c {
            '\\' => {
                escape_next = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() && (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }

    out
}

/// The full repair pass applied before the second parse attempt.
pub fn repair_span(span: &str) -> String {
    escape_control_chars(&repair_escapes(span))
}
