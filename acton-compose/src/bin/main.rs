//! acton-compose CLI - compose HTML templates with stored fragments
//!
//! # Usage
//!
//! ```bash
//! # Render a page, resolving <block .../> tags from ./fragments
//! acton-compose render page.html --bindings site.json --bindings page.json
//!
//! # List the view tags a template contains
//! acton-compose parse page.html --tag block --tag widget
//! ```

use acton_compose::cache::{CachedRetriever, MemoryCache};
use acton_compose::config::ComposeConfig;
use acton_compose::observability::{self, LogFormat};
use acton_compose::renderer::Renderer;
use acton_compose::retriever::{FragmentRetriever, RetrieverRegistry};
use acton_compose::view_tag::TagParser;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "acton-compose")]
#[command(version)]
#[command(about = "Compose HTML templates by resolving view tags", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./acton-compose.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogOutput::Auto)]
    log_format: LogOutput,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogOutput {
    Auto,
    Pretty,
    Json,
}

impl From<LogOutput> for LogFormat {
    fn from(output: LogOutput) -> Self {
        match output {
            LogOutput::Auto => Self::Auto,
            LogOutput::Pretty => Self::Pretty,
            LogOutput::Json => Self::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template to stdout
    Render {
        /// Template file
        template: PathBuf,

        /// JSON file with bindings; repeat to layer, later files win
        #[arg(long = "bindings", short = 'b')]
        bindings: Vec<PathBuf>,

        /// View tag names resolved from the fragment directory
        #[arg(long = "tag", short = 't', default_value = "block")]
        tags: Vec<String>,

        /// Fragment directory (overrides configuration)
        #[arg(long)]
        fragments: Option<PathBuf>,

        /// Pass ceiling (overrides configuration)
        #[arg(long)]
        max_passes: Option<usize>,
    },

    /// Print the view tags found in a template as JSON
    Parse {
        /// Template file
        template: PathBuf,

        /// View tag names to look for
        #[arg(long = "tag", short = 't', default_value = "block")]
        tags: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    observability::init(cli.log_format.into())?;

    let config = match &cli.config {
        Some(path) => ComposeConfig::load_from(path)?,
        None => ComposeConfig::load()?,
    };

    match cli.command {
        Commands::Render {
            template,
            bindings,
            tags,
            fragments,
            max_passes,
        } => {
            let mut config = config;
            if let Some(root) = fragments {
                config.fragments.root = root;
            }
            if let Some(max_passes) = max_passes {
                config.render.max_passes = max_passes;
            }
            config.validate()?;
            render(&config, &template, &bindings, &tags).await
        }
        Commands::Parse { template, tags } => parse(&template, &tags),
    }
}

async fn render(
    config: &ComposeConfig,
    template: &Path,
    bindings: &[PathBuf],
    tags: &[String],
) -> Result<()> {
    let source = read_template(template)?;
    let extra = bindings
        .iter()
        .map(|path| read_bindings(path))
        .collect::<Result<Vec<_>>>()?;

    let fragments = FragmentRetriever::from_settings(&config.fragments);
    let cache = Arc::new(MemoryCache::with_caching(config.cache.enabled));

    let registry = tags
        .iter()
        .fold(RetrieverRegistry::builder(), |builder, tag| {
            builder.register(
                tag.as_str(),
                CachedRetriever::new(fragments.clone(), Arc::clone(&cache)),
            )
        })
        .build()?;

    let renderer = Renderer::from_settings(Arc::new(registry), config.render.clone());
    let html = renderer
        .render(&source, &extra)
        .await
        .with_context(|| format!("failed to render {}", template.display()))?;

    println!("{html}");
    Ok(())
}

fn parse(template: &Path, tags: &[String]) -> Result<()> {
    let source = read_template(template)?;
    let found = TagParser::new(tags)?.parse(&source)?;
    println!("{}", serde_json::to_string_pretty(&found)?);
    Ok(())
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))
}

fn read_bindings(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read bindings {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}
