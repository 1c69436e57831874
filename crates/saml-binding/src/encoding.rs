//! Output and transport encoding helpers.
//!
//! HTML-attribute escaping for values placed into rendered forms, Base64
//! transport encoding for messages and artifacts, and query-string building
//! for redirect URLs.

use std::fmt::Write as _;

use base64::Engine;
use url::Url;

use crate::error::{BindingError, BindingResult};

/// Characters other than ASCII alphanumerics that are safe in any quoted
/// or unquoted attribute context.
const ATTRIBUTE_IMMUNE: &[char] = &[',', '.', '-', '_'];

/// Replacement for characters that are not allowed in HTML at all.
const REPLACEMENT_ENTITY: &str = "&#xfffd;";

/// Escapes a value for inclusion in an HTML attribute.
///
/// Works from an allow-list: ASCII alphanumerics and `, . - _` pass through
/// unchanged, `&`, `<`, `>` and `"` become named entities, control characters
/// that HTML forbids become `&#xfffd;`, and every other character becomes a
/// hexadecimal character reference.
#[must_use]
pub fn escape_for_html_attribute(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || ATTRIBUTE_IMMUNE.contains(&c) {
            out.push(c);
            continue;
        }
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c if is_disallowed_control(c) => out.push_str(REPLACEMENT_ENTITY),
            c => {
                let _ = write!(out, "&#x{:x};", u32::from(c));
            }
        }
    }
    out
}

/// Control characters with no valid representation in an HTML document.
fn is_disallowed_control(c: char) -> bool {
    let cp = u32::from(c);
    (cp <= 0x1f && !matches!(c, '\t' | '\n' | '\r')) || (0x7f..=0x9f).contains(&cp)
}

/// Base64-encodes bytes with the standard alphabet and no line breaks.
#[must_use]
pub fn base64_encode(bytes: impl AsRef<[u8]>) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decodes standard Base64.
///
/// ASCII whitespace is ignored, since browsers and some peers wrap long
/// form values.
pub fn base64_decode(encoded: &str) -> BindingResult<Vec<u8>> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

/// Parses an absolute endpoint URL.
pub fn parse_endpoint_url(location: &str) -> BindingResult<Url> {
    Url::parse(location)
        .map_err(|e| BindingError::MissingEndpoint(format!("invalid endpoint URL '{location}': {e}")))
}

/// Appends query parameters to a URL, keeping any existing query pairs.
///
/// Values are form-urlencoded; no other escaping is applied.
pub fn append_query_params<'a>(url: &mut Url, params: impl IntoIterator<Item = (&'a str, &'a str)>) {
    let mut pairs = url.query_pairs_mut();
    for (name, value) in params {
        pairs.append_pair(name, value);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn escape_empty_string() {
        assert_eq!(escape_for_html_attribute(""), "");
    }

    #[test]
    fn escape_keeps_alphanumerics() {
        assert_eq!(escape_for_html_attribute("abc_XYZ-0.9,"), "abc_XYZ-0.9,");
    }

    #[test]
    fn escape_special_chars() {
        assert_eq!(
            escape_for_html_attribute(r#"a&b"c"#),
            "a&amp;b&quot;c"
        );
        assert_eq!(escape_for_html_attribute("<'>"), "&lt;&#x27;&gt;");
        assert_eq!(escape_for_html_attribute("a b"), "a&#x20;b");
    }

    #[test]
    fn escape_url() {
        assert_eq!(
            escape_for_html_attribute("https://sp.example.com/acs?x=1"),
            "https&#x3a;&#x2f;&#x2f;sp.example.com&#x2f;acs&#x3f;x&#x3d;1"
        );
    }

    #[test]
    fn escape_control_chars() {
        assert_eq!(escape_for_html_attribute("a\u{0}b"), "a&#xfffd;b");
        assert_eq!(escape_for_html_attribute("\u{85}"), "&#xfffd;");
        assert_eq!(escape_for_html_attribute("\t"), "&#x9;");
    }

    #[test]
    fn escape_non_ascii() {
        assert_eq!(escape_for_html_attribute("é"), "&#xe9;");
    }

    #[test]
    fn base64_decode_rejects_garbage() {
        let err = base64_decode("not*base64!").unwrap_err();
        assert!(matches!(err, BindingError::Base64Decode(_)));
    }

    #[test]
    fn base64_decode_ignores_line_breaks() {
        let encoded = base64_encode(b"a longer payload that wraps");
        let (head, tail) = encoded.split_at(10);
        let wrapped = format!("{head}\r\n{tail}");
        assert_eq!(base64_decode(&wrapped).unwrap(), b"a longer payload that wraps");
    }

    #[test]
    fn base64_encode_has_no_line_breaks() {
        let encoded = base64_encode(vec![0xAB; 512]);
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn append_query_params_keeps_existing_query() {
        let mut url = parse_endpoint_url("https://sp.example.com/acs?existing=param").unwrap();
        append_query_params(&mut url, [("SAMLart", "AAQ+/="), ("RelayState", "a&b")]);
        assert_eq!(
            url.as_str(),
            "https://sp.example.com/acs?existing=param&SAMLart=AAQ%2B%2F%3D&RelayState=a%26b"
        );
    }

    #[test]
    fn parse_endpoint_url_rejects_relative() {
        let err = parse_endpoint_url("/acs").unwrap_err();
        assert!(matches!(err, BindingError::MissingEndpoint(_)));
    }

    proptest! {
        #[test]
        fn escaped_output_has_no_breakout_chars(raw in ".*") {
            let escaped = escape_for_html_attribute(&raw);
            prop_assert!(!escaped.contains('"'));
            prop_assert!(!escaped.contains('\''));
            prop_assert!(!escaped.contains('<'));
            prop_assert!(!escaped.contains('>'));
            for (idx, _) in escaped.match_indices('&') {
                let rest = &escaped[idx..];
                let end = rest.find(';');
                prop_assert!(end.is_some(), "unterminated entity in {}", escaped);
            }
        }

        #[test]
        fn base64_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let encoded = base64_encode(&bytes);
            prop_assert_eq!(base64_decode(&encoded).unwrap(), bytes);
        }
    }
}
