//! Attribute lexing for view tags
//!
//! Follows the HTML attribute syntax: double-quoted, single-quoted, unquoted
//! and bare attributes, with character references decoded in values and
//! names ASCII-lowercased. Unlike an HTML tokenizer, every occurrence of a
//! repeated name is kept, in document order, so two tags that differ only in
//! a repeated attribute never share a fingerprint.

use regex::Regex;
use std::sync::OnceLock;

use super::Attribute;

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
            .expect("Invalid attribute regex")
    })
}

/// Parse the raw attribute text of one occurrence into ordered pairs
///
/// Anything between attributes other than whitespace (a stray quote, a
/// dangling `=`) is rejected.
pub(super) fn parse_attributes(raw: &str) -> Result<Vec<Attribute>, String> {
    let mut attributes = Vec::new();
    let mut cursor = 0;

    for caps in attribute_pattern().captures_iter(raw) {
        let Some(whole) = caps.get(0) else { continue };
        check_separator(&raw[cursor..whole.start()])?;
        cursor = whole.end();

        let name = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
        let value = (2..=4)
            .find_map(|group| caps.get(group))
            .map_or("", |m| m.as_str());
        attributes.push(Attribute::new(
            name,
            html_escape::decode_html_entities(value),
        ));
    }

    check_separator(&raw[cursor..])?;
    Ok(attributes)
}

fn check_separator(text: &str) -> Result<(), String> {
    let stray = text.trim();
    if stray.is_empty() {
        Ok(())
    } else {
        Err(format!("unexpected `{stray}` in attribute list"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_attribute_text() {
        assert!(parse_attributes("").unwrap().is_empty());
        assert!(parse_attributes("   ").unwrap().is_empty());
    }

    #[test]
    fn test_attribute_order_is_preserved() {
        let attrs = parse_attributes(r#" module="m" id="e""#).unwrap();
        assert_eq!(
            attrs,
            vec![Attribute::new("module", "m"), Attribute::new("id", "e")]
        );
    }

    #[test]
    fn test_quoting_styles_and_bare_attributes() {
        let attrs = parse_attributes(r#" a='1' b=2 hidden c="x &amp; y" d = "spaced""#).unwrap();
        assert_eq!(
            attrs,
            vec![
                Attribute::new("a", "1"),
                Attribute::new("b", "2"),
                Attribute::new("hidden", ""),
                Attribute::new("c", "x & y"),
                Attribute::new("d", "spaced"),
            ]
        );
    }

    #[test]
    fn test_duplicate_names_are_kept_in_order() {
        let attrs = parse_attributes(r#" a="1" b="x" a="2""#).unwrap();
        assert_eq!(
            attrs,
            vec![
                Attribute::new("a", "1"),
                Attribute::new("b", "x"),
                Attribute::new("a", "2"),
            ]
        );
    }

    #[test]
    fn test_names_are_lowercased() {
        let attrs = parse_attributes(r#" Module="Shop""#).unwrap();
        assert_eq!(attrs, vec![Attribute::new("module", "Shop")]);
    }

    #[test]
    fn test_empty_quoted_value() {
        let attrs = parse_attributes(r#" a="""#).unwrap();
        assert_eq!(attrs, vec![Attribute::new("a", "")]);
    }

    #[test]
    fn test_stray_characters_are_rejected() {
        assert!(parse_attributes(r#" a="1" "oops""#).is_err());
        assert!(parse_attributes(" =x").is_err());
        assert!(parse_attributes(r#" a="unterminated"#).is_err());
    }
}
