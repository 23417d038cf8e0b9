//! The page-embedded context marker.
//!
//! Servers render the header payload into a `<meta>` element so client code can
//! read it synchronously on page load; the browser unescapes the attribute and
//! hands the client the same JSON the header carries.

/// Escape text for use inside HTML element content or a quoted attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render `<meta name="{name}" content="{content}">` with both attributes escaped.
pub fn render_meta_tag(name: &str, content: &str) -> String {
    format!(
        r#"<meta name="{}" content="{}">"#,
        escape_html(name),
        escape_html(content)
    )
}
