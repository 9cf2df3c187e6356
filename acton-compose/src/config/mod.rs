//! Configuration management for acton-compose
//!
//! Settings are layered with clear precedence:
//!
//! 1. Environment variables (highest priority, `ACTON_COMPOSE_` prefix, `__`
//!    separates nested keys)
//! 2. A TOML file (`./acton-compose.toml` by default)
//! 3. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # acton-compose.toml
//! [render]
//! max_passes = 16
//! max_concurrent_retrievals = 8
//! render_timeout_ms = 2000
//!
//! [cache]
//! enabled = true
//!
//! [fragments]
//! root = "./fragments"
//! extension = "html"
//! ```
//!
//! Overriding from the environment:
//!
//! ```bash
//! ACTON_COMPOSE_RENDER__MAX_PASSES=4 acton-compose render page.html
//! ```

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "acton-compose.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ACTON_COMPOSE_";

/// Composition engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderSettings {
    /// Maximum number of resolution passes before a render is aborted
    ///
    /// Must be at least 1; loading rejects 0. A renderer built with 0
    /// directly fails every render that still contains a view tag.
    pub max_passes: usize,

    /// Retrievals allowed in flight within a single pass
    pub max_concurrent_retrievals: usize,

    /// Deadline for a whole render call in milliseconds
    pub render_timeout_ms: Option<u64>,

    /// Template grammar used for interpolation
    pub syntax: TemplateSyntax,

    /// Fail interpolation on missing variables instead of rendering nothing
    /// (Handlebars only)
    pub strict_interpolation: bool,
}

/// Interpolation grammar
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateSyntax {
    /// Mustache variables, sections, inverted sections and lists
    #[default]
    Mustache,
    /// Handlebars with its built-in helpers
    Handlebars,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_passes: 32,
            max_concurrent_retrievals: 4,
            render_timeout_ms: None,
            syntax: TemplateSyntax::Mustache,
            strict_interpolation: false,
        }
    }
}

impl RenderSettings {
    /// Render deadline as a [`Duration`]
    #[must_use]
    pub fn render_timeout(&self) -> Option<Duration> {
        self.render_timeout_ms.map(Duration::from_millis)
    }
}

/// Content cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache resolved view tags across render calls
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: !cfg!(debug_assertions),
        }
    }
}

/// Fragment retriever settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FragmentSettings {
    /// Directory containing stored fragments
    pub root: PathBuf,

    /// File extension of fragment files
    pub extension: String,

    /// Attribute naming the fragment
    pub key_attribute: String,

    /// Attribute naming the fragment's subdirectory
    pub module_attribute: String,
}

impl Default for FragmentSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./fragments"),
            extension: "html".to_string(),
            key_attribute: "name".to_string(),
            module_attribute: "module".to_string(),
        }
    }
}

/// Complete acton-compose configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ComposeConfig {
    /// Composition engine settings
    #[serde(default)]
    pub render: RenderSettings,

    /// Content cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Fragment retriever settings
    #[serde(default)]
    pub fragments: FragmentSettings,
}

impl ComposeConfig {
    /// Load configuration from `./acton-compose.toml` and the environment
    ///
    /// A missing file is not an error; defaults apply.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use acton_compose::config::ComposeConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = ComposeConfig::load()?;
    /// let passes = config.render.max_passes;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file and the environment
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use acton_compose::config::ComposeConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = ComposeConfig::load_from("./config/production.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "Configuration loaded");
        Ok(config)
    }

    /// Check settings the engine cannot work with
    ///
    /// # Errors
    ///
    /// Returns an error if `render.max_passes` is 0.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.render.max_passes > 0,
            "render.max_passes must be at least 1"
        );
        Ok(())
    }

    /// Provider chain used by [`load_from`](Self::load_from)
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = ComposeConfig::default();
        assert_eq!(config.render.max_passes, 32);
        assert_eq!(config.render.max_concurrent_retrievals, 4);
        assert!(config.render.render_timeout().is_none());
        assert!(!config.render.strict_interpolation);
        assert_eq!(config.fragments.root, PathBuf::from("./fragments"));
        assert_eq!(config.fragments.extension, "html");
    }

    #[test]
    fn test_cache_defaults() {
        // caching is off in debug builds, on in release
        #[cfg(debug_assertions)]
        assert!(!CacheSettings::default().enabled);

        #[cfg(not(debug_assertions))]
        assert!(CacheSettings::default().enabled);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [render]
                max_passes = 3
                render_timeout_ms = 250
                syntax = "handlebars"

                [fragments]
                extension = "hbs"
                "#,
            )?;

            let config = ComposeConfig::load_from("custom.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.render.max_passes, 3);
            assert_eq!(config.render.render_timeout(), Some(Duration::from_millis(250)));
            assert_eq!(config.render.max_concurrent_retrievals, 4);
            assert_eq!(config.render.syntax, TemplateSyntax::Handlebars);
            assert_eq!(config.fragments.extension, "hbs");
            assert_eq!(config.fragments.key_attribute, "name");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let config = ComposeConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config, ComposeConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "[render]\nmax_passes = 3\n")?;
            jail.set_env("ACTON_COMPOSE_RENDER__MAX_PASSES", "7");
            jail.set_env("ACTON_COMPOSE_FRAGMENTS__ROOT", "/srv/fragments");

            let config = ComposeConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.render.max_passes, 7);
            assert_eq!(config.fragments.root, PathBuf::from("/srv/fragments"));

            let direct: ComposeConfig = ComposeConfig::figment(Path::new(DEFAULT_CONFIG_FILE)).extract()?;
            assert_eq!(direct, config);
            Ok(())
        });
    }

    #[test]
    fn test_zero_max_passes_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("ACTON_COMPOSE_RENDER__MAX_PASSES", "0");

            let err = ComposeConfig::load().unwrap_err();
            assert!(err.to_string().contains("max_passes"));
            Ok(())
        });
    }
}
