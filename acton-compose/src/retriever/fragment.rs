//! Filesystem-backed fragment retriever
//!
//! Resolves tags such as `<block module="shop" name="Banner"/>` by loading
//! `<root>/shop/Banner.html`. The `module` attribute is optional; without it
//! the fragment is looked up directly under the root directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::Retriever;
use crate::config::FragmentSettings;
use crate::view_tag::{CacheableContent, ViewTag};
use crate::BoxError;

/// Errors raised while loading a fragment
#[derive(Debug, Error)]
pub enum FragmentError {
    /// The tag does not carry the key attribute
    #[error("<{tag}> is missing the `{attribute}` attribute")]
    MissingKey {
        /// Tag name
        tag: String,
        /// Expected attribute name
        attribute: String,
    },

    /// An attribute value cannot be used as a path segment
    #[error("invalid fragment path segment: {0:?}")]
    InvalidSegment(String),

    /// No fragment exists and the tag has no fallback content
    #[error("fragment not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Fragment file could not be read
    #[error("failed to read fragment {}: {source}", path.display())]
    ReadFailed {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Loads stored content fragments from a directory tree
///
/// # Examples
///
/// ```rust,no_run
/// use acton_compose::retriever::{FragmentRetriever, RetrieverRegistry};
///
/// # fn example() -> anyhow::Result<()> {
/// let registry = RetrieverRegistry::builder()
///     .register("block", FragmentRetriever::new("./fragments"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FragmentRetriever {
    root: PathBuf,
    extension: String,
    key_attribute: String,
    module_attribute: String,
}

impl FragmentRetriever {
    /// Retriever rooted at `root` with default settings
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_settings(&FragmentSettings {
            root: root.into(),
            ..FragmentSettings::default()
        })
    }

    /// Retriever configured from [`FragmentSettings`]
    #[must_use]
    pub fn from_settings(settings: &FragmentSettings) -> Self {
        Self {
            root: settings.root.clone(),
            extension: settings.extension.clone(),
            key_attribute: settings.key_attribute.clone(),
            module_attribute: settings.module_attribute.clone(),
        }
    }

    /// Root directory fragments are loaded from
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a tag resolves to
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError`] if the key attribute is missing or an
    /// attribute value would escape the root directory.
    pub fn fragment_path(&self, tag: &ViewTag) -> Result<PathBuf, FragmentError> {
        let name = tag
            .attr(&self.key_attribute)
            .ok_or_else(|| FragmentError::MissingKey {
                tag: tag.name().to_string(),
                attribute: self.key_attribute.clone(),
            })?;

        let mut path = self.root.clone();
        if let Some(module) = tag.attr(&self.module_attribute) {
            path.push(checked_segment(module)?);
        }
        path.push(format!("{}.{}", checked_segment(name)?, self.extension));
        Ok(path)
    }

    fn label(&self, tag: &ViewTag) -> String {
        let name = tag.attr(&self.key_attribute).unwrap_or_default();
        tag.attr(&self.module_attribute).map_or_else(
            || format!("fragment:{name}"),
            |module| format!("fragment:{module}/{name}"),
        )
    }

    async fn load(&self, tag: &ViewTag) -> Result<CacheableContent, FragmentError> {
        let path = self.fragment_path(tag)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                tracing::trace!(path = %path.display(), "Loaded fragment");
                Ok(CacheableContent::new(content).with_tag(self.label(tag)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if tag.content().is_empty() {
                    Err(FragmentError::NotFound(path))
                } else {
                    tracing::debug!(path = %path.display(), "Fragment missing, using inline content");
                    Ok(CacheableContent::new(tag.content()).with_tag(self.label(tag)))
                }
            }
            Err(source) => Err(FragmentError::ReadFailed { path, source }),
        }
    }
}

fn checked_segment(segment: &str) -> Result<&str, FragmentError> {
    let invalid = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0']);

    if invalid {
        Err(FragmentError::InvalidSegment(segment.to_string()))
    } else {
        Ok(segment)
    }
}

#[async_trait]
impl Retriever for FragmentRetriever {
    async fn retrieve(&self, tag: &ViewTag) -> Result<CacheableContent, BoxError> {
        Ok(self.load(tag).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_tag::Attribute;
    use tempfile::TempDir;

    fn block(attrs: &[(&str, &str)], content: &str) -> ViewTag {
        ViewTag::new(
            "block",
            content,
            attrs.iter().map(|(k, v)| Attribute::new(*k, *v)).collect(),
        )
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("foo")).unwrap();
        std::fs::write(dir.path().join("foo").join("Bar.html"), "World").unwrap();
        std::fs::write(dir.path().join("Top.html"), "<p>top</p>").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_loads_module_fragment() {
        let dir = fixture();
        let retriever = FragmentRetriever::new(dir.path());

        let content = retriever
            .retrieve(&block(&[("module", "foo"), ("name", "Bar")], ""))
            .await
            .unwrap();

        assert_eq!(content.content, "World");
        assert_eq!(content.tags, vec!["fragment:foo/Bar"]);
    }

    #[tokio::test]
    async fn test_loads_root_fragment() {
        let dir = fixture();
        let retriever = FragmentRetriever::new(dir.path());

        let content = retriever.retrieve(&block(&[("name", "Top")], "")).await.unwrap();
        assert_eq!(content.content, "<p>top</p>");
        assert_eq!(content.tags, vec!["fragment:Top"]);
    }

    #[tokio::test]
    async fn test_missing_fragment_falls_back_to_inline_content() {
        let dir = fixture();
        let retriever = FragmentRetriever::new(dir.path());

        let content = retriever
            .retrieve(&block(&[("name", "Nope")], "default"))
            .await
            .unwrap();
        assert_eq!(content.content, "default");

        let err = retriever.load(&block(&[("name", "Nope")], "")).await.unwrap_err();
        assert!(matches!(err, FragmentError::NotFound(_)));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let retriever = FragmentRetriever::new("/srv/fragments");

        for name in ["..", "../etc/passwd", "a/b", "", "."] {
            let result = retriever.fragment_path(&block(&[("name", name)], ""));
            assert!(matches!(result, Err(FragmentError::InvalidSegment(_))), "{name}");
        }

        let result = retriever.fragment_path(&block(&[("module", ".."), ("name", "x")], ""));
        assert!(matches!(result, Err(FragmentError::InvalidSegment(_))));
    }

    #[test]
    fn test_missing_key_attribute() {
        let retriever = FragmentRetriever::new("/srv/fragments");
        let result = retriever.fragment_path(&block(&[("id", "1")], ""));
        assert!(matches!(result, Err(FragmentError::MissingKey { .. })));
    }

    #[test]
    fn test_custom_settings() {
        let settings = FragmentSettings {
            root: PathBuf::from("/srv/views"),
            extension: "hbs".to_string(),
            key_attribute: "src".to_string(),
            module_attribute: "pkg".to_string(),
        };
        let retriever = FragmentRetriever::from_settings(&settings);

        let path = retriever
            .fragment_path(&block(&[("pkg", "shop"), ("src", "cart")], ""))
            .unwrap();
        assert_eq!(path, PathBuf::from("/srv/views/shop/cart.hbs"));
    }
}
