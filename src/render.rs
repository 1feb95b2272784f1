//! Markdown-to-safe-inline rendering for transcript display.

/// Renders a message body to HTML and escapes the result for single-line
/// embedding in a host document. Pure; no state, no side effects.
///
/// Backslashes and both quote styles are escaped, newlines become literal
/// `\n`, and carriage returns are removed, so the output can sit inside a
/// quoted string without breaking out of it.
pub fn render_to_safe_inline(text: &str) -> String {
    let html = markdown::to_html(text);
    escape_inline(html.trim_end())
}

fn escape_inline(html: &str) -> String {
    let mut escaped = String::with_capacity(html.len());
    for ch in html.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            other => escaped.push(other),
        }
    }
    escaped
}
