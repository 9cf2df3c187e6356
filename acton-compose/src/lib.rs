//! acton-compose: view-tag composition engine for HTML templates
//!
//! Templates mix ordinary variable interpolation with custom *view tags*,
//! elements such as `<block module="shop" name="Banner"/>` that stand for
//! content resolved elsewhere. The engine:
//!
//! 1. interpolates variables and sections through an [`Interpolator`]
//!    (mustache by default),
//! 2. discovers registered view tags with the [`TagParser`],
//! 3. resolves every distinct tag exactly once through its [`Retriever`],
//! 4. substitutes every occurrence, and
//! 5. repeats until a pass finds no more view tags, up to a configurable
//!    pass ceiling.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use acton_compose::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Build the capability table once at startup
//!     let registry = RetrieverRegistry::builder()
//!         .register("block", FragmentRetriever::new("./fragments"))
//!         .build()?;
//!     let registry = Arc::new(registry);
//!
//!     // One renderer per request
//!     let mut renderer = Renderer::new(Arc::clone(&registry));
//!     renderer.add_context([json!({"site": "Acton"})]);
//!
//!     let html = renderer
//!         .render(
//!             r#"<h1>{{site}}</h1><block module="shop" name="Banner"/>"#,
//!             &[json!({"user": "ann"})],
//!         )
//!         .await?;
//!     println!("{html}");
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` - the `acton-compose` command line front end (default)
//!
//! [`Interpolator`]: interpolate::Interpolator
//! [`TagParser`]: view_tag::TagParser
//! [`Retriever`]: retriever::Retriever

pub mod cache;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod interpolate;
pub mod observability;
pub mod renderer;
pub mod retriever;
pub mod view_tag;

/// Boxed error type crossing the retriever, cache and interpolator boundaries
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! # Examples
    //!
    //! ```rust
    //! use acton_compose::prelude::*;
    //! ```

    // Engine
    pub use crate::cancellation::CancellationToken;
    pub use crate::renderer::Renderer;

    // View tags
    pub use crate::view_tag::{parse, Attribute, CacheableContent, Fingerprint, TagParser, ViewTag};

    // Retrieval
    pub use crate::cache::{CachedRetriever, ContentCache, MemoryCache};
    pub use crate::retriever::{FragmentRetriever, Retriever, RetrieverRegistry};

    // Interpolation
    pub use crate::interpolate::{HandlebarsInterpolator, Interpolator, MustacheInterpolator};

    // Configuration
    pub use crate::config::{ComposeConfig, RenderSettings, TemplateSyntax};

    // Error types
    pub use crate::error::ComposeError;
    pub use crate::view_tag::ParseError;
    pub use crate::BoxError;
}
