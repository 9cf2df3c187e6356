//! Observability (logging and tracing)
//!
//! The engine itself only emits `tracing` events: registry construction at
//! `debug`, each resolution pass at `debug`, individual retrievals and cache
//! hits at `trace`, cache failures at `warn`. Applications decide where they
//! go; [`init`] installs a sensible default subscriber.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, multi-line output
    Pretty,
    /// One JSON object per event
    Json,
    /// Pretty in debug builds, JSON in release builds
    #[default]
    Auto,
}

/// Initialize the tracing subscriber
///
/// Honors `RUST_LOG`; without it, debug builds log `debug` (and `trace` for
/// this crate) while release builds log `info`. Events are written to stderr
/// so composed output on stdout stays clean.
///
/// # Example
///
/// ```rust,no_run
/// use acton_compose::observability::{self, LogFormat};
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init(LogFormat::Auto)?;
/// tracing::info!("Composer started");
/// # Ok(())
/// # }
/// ```
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    let json = match format {
        LogFormat::Pretty => false,
        LogFormat::Json => true,
        LogFormat::Auto => !cfg!(debug_assertions),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

fn default_filter() -> EnvFilter {
    if cfg!(debug_assertions) {
        EnvFilter::new("debug,acton_compose=trace")
    } else {
        EnvFilter::new("info")
    }
}
