//! Retrievers resolve view tags into content
//!
//! A [`Retriever`] is the single-method capability the composition engine
//! calls for every distinct view tag. Retrievers are registered per tag name
//! in a [`RetrieverRegistry`], which is built once by the embedding
//! application and then shared read-only with every
//! [`Renderer`](crate::renderer::Renderer).
//!
//! # Example
//!
//! ```rust
//! use acton_compose::retriever::{Retriever, RetrieverRegistry};
//! use acton_compose::view_tag::{CacheableContent, ViewTag};
//! use acton_compose::BoxError;
//! use async_trait::async_trait;
//!
//! struct Greeting;
//!
//! #[async_trait]
//! impl Retriever for Greeting {
//!     async fn retrieve(&self, tag: &ViewTag) -> Result<CacheableContent, BoxError> {
//!         let name = tag.attr("name").unwrap_or("World");
//!         Ok(CacheableContent::new(format!("Hello, {name}!")))
//!     }
//! }
//!
//! let registry = RetrieverRegistry::builder()
//!     .register("greeting", Greeting)
//!     .build()?;
//!
//! assert!(registry.get("greeting").is_some());
//! # Ok::<(), acton_compose::retriever::RegistryError>(())
//! ```

pub mod fragment;

pub use fragment::{FragmentError, FragmentRetriever};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::view_tag::{validate_tag_name, CacheableContent, ParseError, TagParser, ViewTag};
use crate::BoxError;

/// Capability resolving one view tag into content
///
/// The engine calls `retrieve` once per distinct tag per pass, never once per
/// occurrence. Implementations may perform I/O.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Resolve `tag` into content
    ///
    /// # Errors
    ///
    /// Any error aborts the enclosing render.
    async fn retrieve(&self, tag: &ViewTag) -> Result<CacheableContent, BoxError>;
}

#[async_trait]
impl<R: Retriever + ?Sized> Retriever for Arc<R> {
    async fn retrieve(&self, tag: &ViewTag) -> Result<CacheableContent, BoxError> {
        (**self).retrieve(tag).await
    }
}

/// Errors raised while building a [`RetrieverRegistry`]
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Tag name cannot be used as an element name
    #[error("invalid view tag name: {0:?}")]
    InvalidTagName(String),

    /// The same tag name was registered twice
    #[error("view tag <{0}> is already registered")]
    DuplicateTag(String),

    /// Tag patterns failed to compile
    #[error(transparent)]
    Parser(#[from] ParseError),
}

/// Immutable table mapping tag names to retrievers
///
/// Also owns the precompiled [`TagParser`] for its tag names, so renderers
/// sharing one registry never recompile patterns.
#[derive(Clone, Default)]
pub struct RetrieverRegistry {
    retrievers: BTreeMap<String, Arc<dyn Retriever>>,
    parser: TagParser,
}

impl fmt::Debug for RetrieverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrieverRegistry")
            .field("tags", &self.retrievers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RetrieverRegistry {
    /// Start building a registry
    #[must_use]
    pub fn builder() -> RetrieverRegistryBuilder {
        RetrieverRegistryBuilder::default()
    }

    /// Registry without any tag names
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Retriever registered for `tag_name`
    #[must_use]
    pub fn get(&self, tag_name: &str) -> Option<&Arc<dyn Retriever>> {
        self.retrievers.get(tag_name)
    }

    /// Registered tag names in sorted order
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.retrievers.keys().map(String::as_str)
    }

    /// Whether no tag names are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.retrievers.is_empty()
    }

    /// Number of registered tag names
    #[must_use]
    pub fn len(&self) -> usize {
        self.retrievers.len()
    }

    /// Parser recognizing every registered tag name
    #[must_use]
    pub const fn parser(&self) -> &TagParser {
        &self.parser
    }
}

/// Builder for [`RetrieverRegistry`]
///
/// Registration errors are collected and reported by [`build`](Self::build)
/// so the builder can be chained.
#[derive(Default)]
pub struct RetrieverRegistryBuilder {
    retrievers: BTreeMap<String, Arc<dyn Retriever>>,
    errors: Vec<RegistryError>,
}

impl RetrieverRegistryBuilder {
    /// Register `retriever` for `tag_name`
    #[must_use]
    pub fn register(self, tag_name: impl Into<String>, retriever: impl Retriever + 'static) -> Self {
        self.register_shared(tag_name, Arc::new(retriever))
    }

    /// Register an already shared retriever for `tag_name`
    #[must_use]
    pub fn register_shared(
        mut self,
        tag_name: impl Into<String>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        let tag_name = tag_name.into();
        if validate_tag_name(&tag_name).is_err() {
            self.errors.push(RegistryError::InvalidTagName(tag_name));
        } else if self.retrievers.contains_key(&tag_name) {
            self.errors.push(RegistryError::DuplicateTag(tag_name));
        } else {
            self.retrievers.insert(tag_name, retriever);
        }
        self
    }

    /// Finish the registry
    ///
    /// # Errors
    ///
    /// Returns the first registration error, if any.
    pub fn build(self) -> Result<RetrieverRegistry, RegistryError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let parser = TagParser::new(self.retrievers.keys())?;
        tracing::debug!(tags = self.retrievers.len(), "Retriever registry built");

        Ok(RetrieverRegistry {
            retrievers: self.retrievers,
            parser,
        })
    }
}
