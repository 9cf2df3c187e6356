//! View tag discovery
//!
//! For each registered tag name the parser first extracts paired occurrences
//! (`<name attrs>content</name>`), removes them from a working copy of the
//! template, and then extracts self-closed occurrences (`<name attrs/>`) from
//! what remains. Occurrences are grouped by [`Fingerprint`].

use regex::Regex;
use std::collections::HashMap;

use super::attributes::parse_attributes;
use super::{Fingerprint, ParseError, ViewTag};

/// Compiled patterns for one tag name
#[derive(Debug, Clone)]
struct TagPattern {
    name: String,
    paired: Regex,
    self_closed: Regex,
}

impl TagPattern {
    fn compile(name: &str) -> Result<Self, ParseError> {
        validate_tag_name(name)?;

        let escaped = regex::escape(name);
        // Attribute text may not contain `/` or `>` and must start with
        // whitespace, so `<blockquote>` never matches `block`.
        let paired = Regex::new(&format!(r"(?s)<{escaped}(\s[^/>]*)?>(.*?)</{escaped}>"))
            .map_err(|e| ParseError::new(name, "", e.to_string()))?;
        let self_closed = Regex::new(&format!(r"<{escaped}(\s[^/>]*)?/>"))
            .map_err(|e| ParseError::new(name, "", e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            paired,
            self_closed,
        })
    }
}

/// Check that `name` is usable as a view tag name
///
/// Names start with an ASCII letter and continue with ASCII alphanumerics,
/// `-`, `_`, `:` or `.`.
pub(crate) fn validate_tag_name(name: &str) -> Result<(), ParseError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));

    if valid {
        Ok(())
    } else {
        Err(ParseError::new(name, "", "invalid view tag name"))
    }
}

/// Precompiled view tag parser for a fixed set of tag names
///
/// Parsing is a pure function of the template, so one parser can be shared
/// freely across threads and render calls.
///
/// # Examples
///
/// ```rust
/// use acton_compose::view_tag::TagParser;
///
/// let parser = TagParser::new(["block"])?;
/// let tags = parser.parse("Hello, <block/>!")?;
///
/// assert_eq!(tags.len(), 1);
/// assert_eq!(tags[0].needles(), ["<block/>"]);
/// # Ok::<(), acton_compose::view_tag::ParseError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct TagParser {
    patterns: Vec<TagPattern>,
}

impl TagParser {
    /// Compile patterns for the given tag names
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if a tag name is not a valid element name.
    pub fn new<I, S>(tag_names: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = tag_names
            .into_iter()
            .map(|name| TagPattern::compile(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Tag names this parser recognizes, in compile order
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|pattern| pattern.name.as_str())
    }

    /// Whether the parser recognizes no tag names at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Discover every view tag occurrence in `template`
    ///
    /// Results are ordered by tag name (compile order) and then by first
    /// discovery, paired occurrences before self-closed ones. Each group keeps
    /// its needles in discovery order.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the attributes of any occurrence cannot be
    /// parsed. No partial result is returned.
    pub fn parse(&self, template: &str) -> Result<Vec<ViewTag>, ParseError> {
        let mut tags = Vec::new();
        for pattern in &self.patterns {
            tags.extend(parse_one(pattern, template)?);
        }
        Ok(tags)
    }
}

fn parse_one(pattern: &TagPattern, template: &str) -> Result<Vec<ViewTag>, ParseError> {
    let mut groups: Vec<ViewTag> = Vec::new();
    let mut index: HashMap<Fingerprint, usize> = HashMap::new();

    let mut record = |needle: &str, raw_attrs: &str, content: &str| -> Result<(), ParseError> {
        let attributes = parse_attributes(raw_attrs)
            .map_err(|reason| ParseError::new(&pattern.name, needle, reason))?;
        let tag = ViewTag::new(pattern.name.as_str(), content, attributes);

        match index.get(tag.fingerprint()) {
            Some(&slot) => groups[slot].push_needle(needle.to_string()),
            None => {
                index.insert(tag.fingerprint().clone(), groups.len());
                groups.push(tag.with_needle(needle));
            }
        }
        Ok(())
    };

    for caps in pattern.paired.captures_iter(template) {
        let needle = caps.get(0).map_or("", |m| m.as_str());
        let raw_attrs = caps.get(1).map_or("", |m| m.as_str());
        let content = caps.get(2).map_or("", |m| m.as_str());
        record(needle, raw_attrs, content)?;
    }

    let remainder = pattern.paired.replace_all(template, "");
    for caps in pattern.self_closed.captures_iter(&remainder) {
        let needle = caps.get(0).map_or("", |m| m.as_str());
        let raw_attrs = caps.get(1).map_or("", |m| m.as_str());
        record(needle, raw_attrs, "")?;
    }

    Ok(groups)
}

/// Discover view tags for `tag_names` in `template`
///
/// Convenience wrapper compiling a [`TagParser`] for a single call.
///
/// # Errors
///
/// Returns [`ParseError`] for an invalid tag name or unparsable attributes.
pub fn parse<I, S>(template: &str, tag_names: I) -> Result<Vec<ViewTag>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    TagParser::new(tag_names)?.parse(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_tag::Attribute;
    use proptest::prelude::*;

    #[test]
    fn test_self_closed_without_attributes() {
        let tags = parse("Hello, <block/>!", ["block"]).unwrap();

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name(), "block");
        assert_eq!(tags[0].content(), "");
        assert!(tags[0].attributes().is_empty());
        assert_eq!(tags[0].needles(), ["<block/>"]);
    }

    #[test]
    fn test_paired_with_attributes() {
        let tags = parse(r#"<block module="m" id="e">foo</block>"#, ["block"]).unwrap();

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].content(), "foo");
        assert_eq!(
            tags[0].attributes(),
            [Attribute::new("module", "m"), Attribute::new("id", "e")]
        );
    }

    #[test]
    fn test_paired_with_whitespace_only_attributes() {
        let tags = parse("<block   >foo</block>", ["block"]).unwrap();

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].content(), "foo");
        assert!(tags[0].attributes().is_empty());
    }

    #[test]
    fn test_distinct_tags_get_distinct_groups() {
        let tags = parse(r#"<block a="1"/> <block a="2">x</block>"#, ["block"]).unwrap();

        assert_eq!(tags.len(), 2);
        assert_ne!(tags[0].fingerprint(), tags[1].fingerprint());
        // paired occurrences are discovered first
        assert_eq!(tags[0].content(), "x");
        assert_eq!(tags[1].attr("a"), Some("1"));
    }

    #[test]
    fn test_identical_occurrences_are_grouped() {
        let template = r#"<block a="1">x</block> and <block a="1">x</block>"#;
        let tags = parse(template, ["block"]).unwrap();

        assert_eq!(tags.len(), 1);
        assert_eq!(
            tags[0].needles(),
            [r#"<block a="1">x</block>"#, r#"<block a="1">x</block>"#]
        );
    }

    #[test]
    fn test_spelling_variants_share_a_group() {
        // different raw text, same structure
        let template = r#"<block a="1"/> <block a='1' />"#;
        let tags = parse(template, ["block"]).unwrap();

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].needles(), [r#"<block a="1"/>"#, "<block a='1' />"]);
    }

    #[test]
    fn test_paired_opening_is_not_read_as_self_closed() {
        let tags = parse(r#"<block a="1">inner</block>"#, ["block"]).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].content(), "inner");
    }

    #[test]
    fn test_nested_same_name_is_captured_verbatim() {
        let template = "<block>outer <block/> tail</block>";
        let tags = parse(template, ["block"]).unwrap();

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].content(), "outer <block/> tail");
        assert_eq!(tags[0].needles(), [template]);
    }

    #[test]
    fn test_multiline_content() {
        let template = "<block>\n  <p>line</p>\n</block>";
        let tags = parse(template, ["block"]).unwrap();
        assert_eq!(tags[0].content(), "\n  <p>line</p>\n");
    }

    #[test]
    fn test_unregistered_and_prefixed_names_are_ignored() {
        let template = "<blockquote>q</blockquote><widget/><blocks/>";
        assert!(parse(template, ["block"]).unwrap().is_empty());
    }

    #[test]
    fn test_results_follow_tag_name_order() {
        let template = "<widget/><block/>";
        let tags = parse(template, ["widget", "block"]).unwrap();

        let names: Vec<_> = tags.iter().map(ViewTag::name).collect();
        assert_eq!(names, ["widget", "block"]);
    }

    #[test]
    fn test_no_tag_names_yields_nothing() {
        let parser = TagParser::new(Vec::<String>::new()).unwrap();
        assert!(parser.is_empty());
        assert!(parser.parse("<block/>").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_tag_names_are_rejected() {
        assert!(TagParser::new([""]).is_err());
        assert!(TagParser::new(["1block"]).is_err());
        assert!(TagParser::new(["bl ock"]).is_err());
        assert!(TagParser::new(["ns:block", "my-block", "my_block.v2"]).is_ok());
    }

    #[test]
    fn test_attribute_failure_aborts_parse() {
        let err = parse(r#"<block a="1"/> <block id="row" "x"/>"#, ["block"]).unwrap_err();
        assert_eq!(err.tag, "block");
        assert_eq!(err.needle, r#"<block id="row" "x"/>"#);
    }

    #[test]
    fn test_duplicate_attribute_keys_are_kept() {
        let tags = parse(r#"<block a="1" a="2"/>"#, ["block"]).unwrap();

        assert_eq!(tags.len(), 1);
        assert_eq!(
            tags[0].attributes(),
            [Attribute::new("a", "1"), Attribute::new("a", "2")]
        );
        assert_eq!(tags[0].attr("a"), Some("1"));
    }

    #[test]
    fn test_tags_differing_in_repeated_key_are_not_grouped() {
        let tags = parse(r#"<block a="1" a="2"/> <block a="1" a="3"/>"#, ["block"]).unwrap();

        assert_eq!(tags.len(), 2);
        assert_ne!(tags[0].fingerprint(), tags[1].fingerprint());
        assert_eq!(tags[0].needles(), [r#"<block a="1" a="2"/>"#]);
        assert_eq!(tags[1].needles(), [r#"<block a="1" a="3"/>"#]);
    }

    #[test]
    fn test_html_structural_names_are_usable() {
        let template = r#"<tr id="row"/><body x="1">b</body>"#;
        let tags = parse(template, ["tr", "body", "td"]).unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].attributes(), [Attribute::new("id", "row")]);
        assert_eq!(tags[1].content(), "b");
        assert_eq!(tags[1].attr("x"), Some("1"));
    }

    proptest! {
        #[test]
        fn prop_repeated_tag_forms_one_group(count in 1usize..8, value in "[a-z0-9]{1,8}") {
            let needle = format!(r#"<block key="{value}"/>"#);
            let template = vec![needle.clone(); count].join(" | ");

            let tags = parse(&template, ["block"]).unwrap();
            prop_assert_eq!(tags.len(), 1);
            prop_assert_eq!(tags[0].needles().len(), count);
            prop_assert!(tags[0].needles().iter().all(|n| n == &needle));
        }

        #[test]
        fn prop_text_without_markup_has_no_tags(text in "[a-zA-Z0-9 ,.!?]*") {
            prop_assert!(parse(&text, ["block"]).unwrap().is_empty());
        }
    }
}
