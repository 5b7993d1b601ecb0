use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use confref::{
    CacheConfig, CachingResolver, ConfigValue, EnvResolver, GlobalCache, ResolutionEngine,
    ResolutionOptions, ResolverRegistry,
};

#[derive(Parser)]
#[command(name = "confref")]
#[command(about = "Resolve external references in a configuration file", long_about = None)]
struct Cli {
    /// JSON or YAML configuration file
    file: PathBuf,

    /// Input format (detected from the file extension by default)
    #[arg(short, long)]
    format: Option<Format>,

    /// Return the configuration without resolving any reference
    #[arg(long)]
    no_external: bool,

    /// Disable resolution for a protocol (repeatable)
    #[arg(long = "disable", value_name = "PROTOCOL")]
    disabled: Vec<String>,

    /// Print cache and engine statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, env = "CONFREF_ENV_FILE")]
    env_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Format::Yaml,
            _ => Format::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "confref=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let raw = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;
    let format = cli.format.unwrap_or_else(|| Format::detect(&cli.file));
    let config: ConfigValue = match format {
        Format::Json => serde_json::from_str(&raw).context("Invalid JSON input")?,
        Format::Yaml => serde_yaml::from_str(&raw).context("Invalid YAML input")?,
    };

    let cache_config = CacheConfig::from_env().context("Invalid cache configuration")?;
    let cache = GlobalCache::new(cache_config);

    let registry = Arc::new(ResolverRegistry::new());
    registry
        .register(Arc::new(CachingResolver::new(EnvResolver::new(), cache.clone())))
        .await?;
    info!("Registered protocols: {:?}", registry.protocols().await);

    let mut options = if cli.no_external {
        ResolutionOptions::without_external()
    } else {
        ResolutionOptions::default()
    };
    for protocol in &cli.disabled {
        options = options.disable(protocol);
    }

    let engine = ResolutionEngine::new(registry.clone());
    let resolved = engine.resolve(&config, &options).await?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
        Format::Yaml => print!("{}", serde_yaml::to_string(&resolved)?),
    }

    if cli.stats {
        eprintln!("{}", cache.get_stats().await);
        eprintln!("{}", engine.stats().await);
    }

    registry.cleanup().await;
    cache.cleanup().await;

    Ok(())
}
