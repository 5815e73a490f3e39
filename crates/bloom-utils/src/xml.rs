//! XML escaping and markup cleanup helpers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Escape special characters in XML text content.
///
/// Every user-supplied string (author names, titles) must pass through here
/// before being spliced into markup.
pub fn escape_xml_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape special characters in XML attribute values.
pub fn escape_xml_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

static DEFAULT_XMLNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#" xmlns=["'][^"']*["']"#).expect("static regex"));

/// Remove default-namespace declarations from a markup fragment.
///
/// Fragments lifted out of an XHTML page carry `xmlns="..."` on their root
/// element, which would conflict with the host document's namespace when
/// re-inserted.
pub fn strip_default_xmlns(markup: &str) -> String {
    DEFAULT_XMLNS.replace_all(markup, "").into_owned()
}
