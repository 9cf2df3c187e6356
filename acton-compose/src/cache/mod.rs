//! Content cache for resolved view tags
//!
//! The composition engine already resolves each distinct tag once per pass.
//! A [`ContentCache`] extends that across render calls: wrapping a retriever
//! in [`CachedRetriever`] consults the cache by [`Fingerprint`] before doing
//! any work.
//!
//! # Example
//!
//! ```rust
//! use acton_compose::cache::{CachedRetriever, MemoryCache};
//! use acton_compose::retriever::{FragmentRetriever, RetrieverRegistry};
//! use std::sync::Arc;
//!
//! let cache = Arc::new(MemoryCache::with_caching(true));
//! let registry = RetrieverRegistry::builder()
//!     .register(
//!         "block",
//!         CachedRetriever::new(FragmentRetriever::new("./fragments"), Arc::clone(&cache)),
//!     )
//!     .build()?;
//!
//! // after editing a fragment on disk
//! cache.invalidate_label("fragment:shop/Banner");
//! # Ok::<(), acton_compose::retriever::RegistryError>(())
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::retriever::Retriever;
use crate::view_tag::{CacheableContent, Fingerprint, ViewTag};
use crate::BoxError;

/// Key/value store for resolved view tag content
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentCache: Send + Sync {
    /// Cached content for `key`, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    async fn get(&self, key: &Fingerprint) -> Result<Option<CacheableContent>, BoxError>;

    /// Store content under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    async fn set(&self, key: &Fingerprint, value: CacheableContent) -> Result<(), BoxError>;
}

#[async_trait]
impl<C: ContentCache + ?Sized> ContentCache for Arc<C> {
    async fn get(&self, key: &Fingerprint) -> Result<Option<CacheableContent>, BoxError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &Fingerprint, value: CacheableContent) -> Result<(), BoxError> {
        (**self).set(key, value).await
    }
}

/// In-process content cache
///
/// Can be created with caching disabled, in which case every lookup misses
/// and every store is a no-op.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<Fingerprint, CacheableContent>>>,
    cache_enabled: bool,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Create a new cache
    ///
    /// Caching is disabled in debug builds and enabled in release builds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_caching(!cfg!(debug_assertions))
    }

    /// Create a new cache with explicit cache control
    #[must_use]
    pub fn with_caching(cache_enabled: bool) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            cache_enabled,
        }
    }

    /// Drop every entry carrying `label`, returning how many were removed
    pub fn invalidate_label(&self, label: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, content| !content.tags.iter().any(|tag| tag == label));
        let removed = before - entries.len();
        tracing::debug!(label, removed, "Cache entries invalidated");
        removed
    }

    /// Drop a single entry
    pub fn remove(&self, key: &Fingerprint) -> Option<CacheableContent> {
        self.entries.write().remove(key)
    }

    /// Clear all cached content
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Check if caching is enabled
    #[must_use]
    pub const fn is_caching_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ContentCache for MemoryCache {
    async fn get(&self, key: &Fingerprint) -> Result<Option<CacheableContent>, BoxError> {
        if !self.cache_enabled {
            return Ok(None);
        }
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &Fingerprint, value: CacheableContent) -> Result<(), BoxError> {
        if self.cache_enabled {
            self.entries.write().insert(key.clone(), value);
        }
        Ok(())
    }
}

/// Retriever decorator consulting a [`ContentCache`] first
///
/// Cache failures are logged and treated as misses; only the inner
/// retriever's errors reach the renderer.
#[derive(Debug, Clone)]
pub struct CachedRetriever<R, C> {
    inner: R,
    cache: C,
}

impl<R, C> CachedRetriever<R, C> {
    /// Wrap `inner` with `cache`
    pub const fn new(inner: R, cache: C) -> Self {
        Self { inner, cache }
    }

    /// Wrapped retriever
    pub const fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: Retriever, C: ContentCache> Retriever for CachedRetriever<R, C> {
    async fn retrieve(&self, tag: &ViewTag) -> Result<CacheableContent, BoxError> {
        let key = tag.fingerprint();

        match self.cache.get(key).await {
            Ok(Some(content)) => {
                tracing::trace!(tag = tag.name(), %key, "Cache hit");
                return Ok(content);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(tag = tag.name(), %key, error = %e, "Cache lookup failed"),
        }

        let content = self.inner.retrieve(tag).await?;
        if let Err(e) = self.cache.set(key, content.clone()).await {
            tracing::warn!(tag = tag.name(), %key, error = %e, "Cache store failed");
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::MockRetriever;
    use crate::view_tag::Attribute;

    fn tag(name: &str) -> ViewTag {
        ViewTag::new("block", "", vec![Attribute::new("name", name)])
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::with_caching(true);
        let key = tag("a").fingerprint().clone();

        assert!(cache.get(&key).await.unwrap().is_none());
        cache.set(&key, CacheableContent::new("A")).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().unwrap().content, "A");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_cache_disabled() {
        let cache = MemoryCache::with_caching(false);
        let key = tag("a").fingerprint().clone();

        cache.set(&key, CacheableContent::new("A")).await.unwrap();
        assert!(cache.is_empty());
        assert!(cache.get(&key).await.unwrap().is_none());
        assert!(!cache.is_caching_enabled());
    }

    #[tokio::test]
    async fn test_invalidate_by_label() {
        let cache = MemoryCache::with_caching(true);
        let shop = CacheableContent::new("shop").with_tag("module:shop");
        let blog = CacheableContent::new("blog").with_tag("module:blog");

        cache.set(tag("a").fingerprint(), shop.clone()).await.unwrap();
        cache.set(tag("b").fingerprint(), shop).await.unwrap();
        cache.set(tag("c").fingerprint(), blog).await.unwrap();

        assert_eq!(cache.invalidate_label("module:shop"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(tag("c").fingerprint()).await.unwrap().is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cached_retriever_skips_inner_on_hit() {
        let mut inner = MockRetriever::new();
        inner
            .expect_retrieve()
            .times(1)
            .returning(|_| Ok(CacheableContent::new("resolved")));

        let retriever = CachedRetriever::new(inner, MemoryCache::with_caching(true));
        let tag = tag("a");

        assert_eq!(retriever.retrieve(&tag).await.unwrap().content, "resolved");
        assert_eq!(retriever.retrieve(&tag).await.unwrap().content, "resolved");
    }

    #[tokio::test]
    async fn test_cached_retriever_does_not_cache_errors() {
        let mut inner = MockRetriever::new();
        inner
            .expect_retrieve()
            .times(2)
            .returning(|_| Err("backend down".into()));

        let cache = MemoryCache::with_caching(true);
        let retriever = CachedRetriever::new(inner, cache.clone());
        let tag = tag("a");

        assert!(retriever.retrieve(&tag).await.is_err());
        assert!(retriever.retrieve(&tag).await.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_failure_falls_through() {
        let mut cache = MockContentCache::new();
        cache.expect_get().returning(|_| Err("cache offline".into()));
        cache.expect_set().returning(|_, _| Err("cache offline".into()));

        let mut inner = MockRetriever::new();
        inner
            .expect_retrieve()
            .times(1)
            .returning(|_| Ok(CacheableContent::new("fresh")));

        let retriever = CachedRetriever::new(inner, cache);
        assert_eq!(retriever.retrieve(&tag("a")).await.unwrap().content, "fresh");
    }
}
