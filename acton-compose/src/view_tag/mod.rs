//! View tag data model
//!
//! A view tag is a custom element embedded in otherwise ordinary template text,
//! such as `<block module="shop" name="Banner"/>`. Tags are discovered by the
//! [`TagParser`], resolved by a [`Retriever`](crate::retriever::Retriever) and
//! replaced in the template by the resolved [`CacheableContent`].
//!
//! Occurrences that are structurally identical (same tag name, same attributes
//! in the same order, same inner content) are grouped into a single
//! [`ViewTag`] so the composition engine resolves them once.

mod attributes;
mod parser;

pub use parser::{parse, TagParser};
pub(crate) use parser::validate_tag_name;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Error raised while discovering view tags in a template
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to parse <{tag}> in `{needle}`: {reason}")]
pub struct ParseError {
    /// Tag name being parsed
    pub tag: String,
    /// Raw occurrence that failed (empty when the tag name itself is invalid)
    pub needle: String,
    /// Human readable cause
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(
        tag: impl Into<String>,
        needle: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            needle: needle.into(),
            reason: reason.into(),
        }
    }
}

/// A single `key="value"` pair read from a view tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub key: String,
    /// Attribute value (empty for bare attributes)
    pub value: String,
}

impl Attribute {
    /// Create a new attribute
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Deterministic digest of a view tag's identity
///
/// SHA-256 over a length-prefixed encoding of the tag name, inner content and
/// ordered attributes. Two structurally identical tags always share a
/// fingerprint, which makes it usable both as the grouping key during parsing
/// and as a cache key for resolved content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a tag's identity
    #[must_use]
    pub fn of(name: &str, content: &str, attributes: &[Attribute]) -> Self {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, name);
        update_field(&mut hasher, content);
        hasher.update((attributes.len() as u64).to_le_bytes());
        for attribute in attributes {
            update_field(&mut hasher, &attribute.key);
            update_field(&mut hasher, &attribute.value);
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex-encoded digest
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn update_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One or more content-identical view tag occurrences found in a template
///
/// The identity fields are immutable once constructed so the cached
/// [`Fingerprint`] can never drift from the data it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewTag {
    name: String,
    content: String,
    attributes: Vec<Attribute>,
    needles: Vec<String>,
    fingerprint: Fingerprint,
}

impl ViewTag {
    /// Create a view tag with no recorded occurrences
    ///
    /// # Examples
    ///
    /// ```rust
    /// use acton_compose::view_tag::{Attribute, ViewTag};
    ///
    /// let tag = ViewTag::new("block", "", vec![Attribute::new("name", "Bar")]);
    /// assert_eq!(tag.attr("name"), Some("Bar"));
    /// assert!(tag.needles().is_empty());
    /// ```
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        attributes: Vec<Attribute>,
    ) -> Self {
        let name = name.into();
        let content = content.into();
        let fingerprint = Fingerprint::of(&name, &content, &attributes);
        Self {
            name,
            content,
            attributes,
            needles: Vec::new(),
            fingerprint,
        }
    }

    /// Record another raw occurrence of this tag
    #[must_use]
    pub fn with_needle(mut self, needle: impl Into<String>) -> Self {
        self.needles.push(needle.into());
        self
    }

    pub(crate) fn push_needle(&mut self, needle: String) {
        self.needles.push(needle);
    }

    /// Tag name, e.g. `block`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inner content of a paired tag (empty for self-closed tags)
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Attributes in document order
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Value of the first attribute named `key`
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.key == key)
            .map(|attribute| attribute.value.as_str())
    }

    /// Exact raw substrings of the template that produced this tag
    #[must_use]
    pub fn needles(&self) -> &[String] {
        &self.needles
    }

    /// First recorded occurrence, used in diagnostics
    #[must_use]
    pub fn example_needle(&self) -> &str {
        self.needles.first().map_or("", String::as_str)
    }

    /// Identity digest of this tag
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// Resolved value of a view tag
///
/// `tags` carries invalidation labels; the composition engine only ever reads
/// `content`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheableContent {
    /// Markup that replaces every occurrence of the tag
    pub content: String,
    /// Invalidation labels
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CacheableContent {
    /// Content without invalidation labels
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tags: Vec::new(),
        }
    }

    /// Attach an invalidation label
    #[must_use]
    pub fn with_tag(mut self, label: impl Into<String>) -> Self {
        self.tags.push(label.into());
        self
    }
}
