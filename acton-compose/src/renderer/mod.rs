//! Composition engine
//!
//! A [`Renderer`] turns a template into final HTML in passes. Each pass
//! interpolates variables, discovers view tags, resolves every distinct tag
//! once through the [`RetrieverRegistry`] and substitutes all of its
//! occurrences. Resolved content may contain further view tags or
//! placeholders, so passes repeat until one finds no view tags. A pass
//! ceiling stops content that keeps reproducing its own tags.
//!
//! # Example
//!
//! ```rust
//! use acton_compose::prelude::*;
//! use async_trait::async_trait;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct World;
//!
//! #[async_trait]
//! impl Retriever for World {
//!     async fn retrieve(&self, _tag: &ViewTag) -> Result<CacheableContent, BoxError> {
//!         Ok(CacheableContent::new("{{greeting}} World"))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let registry = RetrieverRegistry::builder().register("block", World).build()?;
//! let mut renderer = Renderer::new(Arc::new(registry));
//! renderer.add_context([json!({"greeting": "Hello,"})]);
//!
//! let html = renderer.render(r#"<p><block name="w"/>!</p>"#, &[]).await?;
//! assert_eq!(html, "<p>Hello, World!</p>");
//! # Ok(())
//! # }
//! ```

use futures_util::{stream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::cancellation::CancellationToken;
use crate::config::RenderSettings;
use crate::error::ComposeError;
use crate::interpolate::{self, Interpolator, MustacheInterpolator};
use crate::retriever::RetrieverRegistry;
use crate::view_tag::{CacheableContent, ViewTag};
use crate::BoxError;

/// Template composition engine
///
/// The binding context is instance state: [`add_context`](Self::add_context)
/// and [`set_context`](Self::set_context) take `&mut self`, rendering takes
/// `&self`. Share one registry between many renderers and keep one renderer
/// per logical request.
#[derive(Debug)]
pub struct Renderer<I = MustacheInterpolator> {
    interpolator: I,
    retrievers: Arc<RetrieverRegistry>,
    settings: RenderSettings,
    context: Vec<Value>,
}

impl Renderer<MustacheInterpolator> {
    /// Renderer using the mustache interpolator and default settings
    #[must_use]
    pub fn new(retrievers: Arc<RetrieverRegistry>) -> Self {
        Self::with_interpolator(MustacheInterpolator::new(), retrievers)
    }
}

impl Renderer<Box<dyn Interpolator>> {
    /// Renderer configured from [`RenderSettings`]
    ///
    /// The interpolator follows `syntax` and `strict_interpolation`.
    #[must_use]
    pub fn from_settings(retrievers: Arc<RetrieverRegistry>, settings: RenderSettings) -> Self {
        Self::with_interpolator(interpolate::from_settings(&settings), retrievers)
            .with_settings(settings)
    }
}

impl<I: Interpolator> Renderer<I> {
    /// Renderer using a custom interpolation layer
    pub fn with_interpolator(interpolator: I, retrievers: Arc<RetrieverRegistry>) -> Self {
        Self {
            interpolator,
            retrievers,
            settings: RenderSettings::default(),
            context: Vec::new(),
        }
    }

    /// Replace the engine settings
    #[must_use]
    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current engine settings
    pub const fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Append bindings to the stored context
    pub fn add_context(&mut self, bindings: impl IntoIterator<Item = Value>) {
        self.context.extend(bindings);
    }

    /// Replace the stored context
    pub fn set_context(&mut self, bindings: impl IntoIterator<Item = Value>) {
        self.context = bindings.into_iter().collect();
    }

    /// Stored context, in precedence order (later wins)
    pub fn context(&self) -> &[Value] {
        &self.context
    }

    /// Compose `template` into final output
    ///
    /// `extra` bindings are appended after the stored context and take
    /// precedence over it. They are applied on every pass, so resolved
    /// fragments may use them too.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError`] on the first failure; no partial output is
    /// ever returned.
    pub async fn render(&self, template: &str, extra: &[Value]) -> Result<String, ComposeError> {
        self.render_until_cancelled(template, extra, &CancellationToken::new())
            .await
    }

    /// Compose `template`, stopping promptly when `token` is cancelled
    ///
    /// The configured render deadline, if any, applies as well.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Cancelled`] or
    /// [`ComposeError::DeadlineExceeded`] when stopped from outside, otherwise
    /// the first failure of the render.
    pub async fn render_until_cancelled(
        &self,
        template: &str,
        extra: &[Value],
        token: &CancellationToken,
    ) -> Result<String, ComposeError> {
        let compose = self.compose(template, extra, token);

        match self.settings.render_timeout() {
            Some(deadline) => tokio::time::timeout(deadline, compose)
                .await
                .map_err(|_| ComposeError::DeadlineExceeded(deadline))?,
            None => compose.await,
        }
    }

    async fn compose(
        &self,
        template: &str,
        extra: &[Value],
        token: &CancellationToken,
    ) -> Result<String, ComposeError> {
        let bindings: Vec<Value> = self.context.iter().chain(extra).cloned().collect();
        let mut current = template.to_string();
        let mut pass = 0;

        loop {
            pass += 1;
            if token.is_cancelled() {
                return Err(ComposeError::Cancelled);
            }

            let intermediate = self
                .interpolator
                .interpolate(&current, &bindings)
                .map_err(|source| ComposeError::Interpolation { pass, source })?;

            if self.retrievers.is_empty() {
                return Ok(intermediate);
            }

            let tags = self.retrievers.parser().parse(&intermediate)?;
            if tags.is_empty() {
                trace!(pass, "No view tags left");
                return Ok(intermediate);
            }

            if pass > self.settings.max_passes {
                return Err(ComposeError::RecursionLimitExceeded {
                    limit: self.settings.max_passes,
                    needle: tags[0].example_needle().to_string(),
                });
            }

            debug!(pass, tags = tags.len(), "Resolving view tags");
            let resolved = self.resolve_all(&tags, token).await?;
            current = substitute(intermediate, &tags, &resolved);
        }
    }

    /// Resolve every tag once, keeping results in parse order
    async fn resolve_all(
        &self,
        tags: &[ViewTag],
        token: &CancellationToken,
    ) -> Result<Vec<CacheableContent>, ComposeError> {
        let concurrency = self.settings.max_concurrent_retrievals.max(1);

        stream::iter(tags)
            .map(|tag| self.resolve_one(tag, token))
            .buffered(concurrency)
            .try_collect()
            .await
    }

    async fn resolve_one(
        &self,
        tag: &ViewTag,
        token: &CancellationToken,
    ) -> Result<CacheableContent, ComposeError> {
        let retriever_error = |source: BoxError| ComposeError::Retriever {
            tag: tag.name().to_string(),
            needle: tag.example_needle().to_string(),
            source,
        };

        let retriever = self
            .retrievers
            .get(tag.name())
            .ok_or_else(|| retriever_error("no retriever registered".into()))?;

        trace!(tag = tag.name(), fingerprint = %tag.fingerprint(), "Retrieving view tag");
        token
            .run_until_cancelled(retriever.retrieve(tag))
            .await
            .map_err(|_| ComposeError::Cancelled)?
            .map_err(retriever_error)
    }
}

/// Replace every needle of every tag with its resolved content
///
/// Applied in parse order so overlapping occurrences always resolve the same
/// way.
fn substitute(mut text: String, tags: &[ViewTag], resolved: &[CacheableContent]) -> String {
    for (tag, content) in tags.iter().zip(resolved) {
        for needle in tag.needles() {
            if text.contains(needle.as_str()) {
                text = text.replace(needle.as_str(), &content.content);
            }
        }
    }
    text
}
