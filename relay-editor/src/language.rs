pub const PLAIN_TEXT: &str = "plaintext";

/// Map a server-side language tag to the editor library's language id.
///
/// Matching is case-insensitive; unknown or empty tags fall back to plain text.
pub fn to_monaco_language(tag: Option<&str>) -> &'static str {
    let tag = match tag {
        Some(t) => t.to_lowercase(),
        None => return PLAIN_TEXT,
    };
    match tag.as_str() {
        "json" => "json",
        "xml" => "xml",
        "javascript" | "js" => "javascript",
        "html" => "html",
        "java" => "java",
        "sql" => "sql",
        "python" | "py" => "python",
        "yaml" | "yml" => "yaml",
        "properties" => "ini",
        _ => PLAIN_TEXT,
    }
}
