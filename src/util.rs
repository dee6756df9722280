use regex::Regex;

lazy_static::lazy_static! {
    /// `{{token}}` left in a fragment for the assembler to fill.
    pub static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{\s*([A-Za-z_]\w*)\s*\}\}").unwrap();
    /// Verb inside an OData-style operation label, e.g. `Create(POST)`.
    pub static ref OPERATION_VERB_RE: Regex = Regex::new(r"\(\s*([A-Za-z]+)\s*\)").unwrap();
    pub static ref HTTP_VERB_RE: Regex =
        Regex::new(r"^(?i)(GET|POST|PUT|PATCH|DELETE|MERGE|HEAD)$").unwrap();
}

/// Escape text for element content and attribute values. Braces are escaped too so user
/// content can never be mistaken for a placeholder token.
pub fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            c if (c as u32) < 0x20 && !matches!(c, '\n' | '\r' | '\t') => {}
            c => out.push(c),
        }
    }
    out
}

/// Turn free text into an XML-name-safe identifier fragment.
pub fn slugify(raw: &str) -> String {
    let mut out = String::new();
    for (idx, ch) in raw.trim().chars().enumerate() {
        let safe = if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.' {
            ch
        } else {
            '_'
        };
        if idx == 0 && !(safe.is_ascii_alphabetic() || safe == '_') {
            out.push('_');
        }
        out.push(safe);
    }
    if out.is_empty() { "_".to_string() } else { out }
}
