//! mvn-mirror main entry point
//!
//! This is the command-line interface for the repository mirror.

use anyhow::Context;
use clap::Parser;
use mvn_mirror::config::{
    hash_content, load_config_with_hash, validate, Config, ExcludeEntry, TraversalStrategy,
};
use mvn_mirror::crawler::Coordinator;
use mvn_mirror::output::print_summary;
use mvn_mirror::repo::RepoPath;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// mvn-mirror: a resumable mirror for Maven-style repositories
///
/// Downloads everything below SEED, follows the dependencies declared in
/// downloaded descriptors, and tries configured mirrors before the origin.
/// Interrupted runs pick up where they left off.
#[derive(Parser, Debug)]
#[command(name = "mvn-mirror")]
#[command(version)]
#[command(about = "A resumable mirror for Maven-style repositories", long_about = None)]
struct Cli {
    /// Directory to start from, relative to the repository root (e.g. org/slf4j)
    #[arg(value_name = "SEED")]
    seed: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Output directory (overrides output.root)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Number of directory listing workers
    #[arg(long, value_name = "N")]
    listing_workers: Option<u32>,

    /// Number of file fetch workers
    #[arg(long, value_name = "N")]
    fetch_workers: Option<u32>,

    /// Dependency hops followed with the depth-bounded strategy
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// How dependencies are scheduled
    #[arg(long, value_parser = ["flat", "depth-bounded"])]
    strategy: Option<String>,

    /// Exclude a dotted group/artifact pattern (repeatable, e.g. org.*.internal)
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume pending work from the last run (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Ignore saved pending work and start from SEED
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate configuration and show what would be mirrored, then exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            (Config::default(), hash_content(""))
        }
    };

    apply_overrides(&mut config, &cli);
    validate(&config).context("invalid configuration")?;

    let seed = RepoPath::seed(&cli.seed).with_context(|| format!("invalid seed '{}'", cli.seed))?;

    if cli.dry_run {
        handle_dry_run(&config, &seed);
        return Ok(());
    }

    handle_mirror(config, seed, cli.fresh, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("mvn_mirror=info,warn"),
            1 => EnvFilter::new("mvn_mirror=debug,info"),
            2 => EnvFilter::new("mvn_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Command-line flags win over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(output) = &cli.output {
        config.output.root = output.display().to_string();
    }
    if let Some(n) = cli.listing_workers {
        config.crawler.listing_workers = n;
    }
    if let Some(n) = cli.fetch_workers {
        config.crawler.fetch_workers = n;
    }
    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = depth;
    }
    match cli.strategy.as_deref() {
        Some("flat") => config.crawler.strategy = TraversalStrategy::Flat,
        Some("depth-bounded") => config.crawler.strategy = TraversalStrategy::DepthBounded,
        _ => {}
    }
    config.exclude.extend(
        cli.exclude
            .iter()
            .map(|pattern| ExcludeEntry {
                pattern: pattern.clone(),
            }),
    );
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, seed: &RepoPath) {
    println!("=== mvn-mirror Dry Run ===\n");

    println!("Seed: {}", seed);
    println!("Output: {}", config.output.root);

    println!("\nMirrors:");
    println!("  Origin: {}", config.mirrors.origin);
    println!("  Index mirrors ({}):", config.mirrors.index.len());
    for mirror in &config.mirrors.index {
        println!("    - {}", mirror);
    }
    println!("  Download mirrors ({}):", config.mirrors.download.len());
    for mirror in &config.mirrors.download {
        println!("    - {}", mirror);
    }

    println!("\nCrawler:");
    println!("  Listing workers: {}", config.crawler.listing_workers);
    println!("  Fetch workers: {}", config.crawler.fetch_workers);
    println!("  Strategy: {:?}", config.crawler.strategy);
    if config.crawler.strategy == TraversalStrategy::DepthBounded {
        println!("  Max depth: {}", config.crawler.max_depth);
    }
    println!("  Expand dependencies to: {:?}", config.crawler.expand_to);

    println!("\nExcluded patterns ({}):", config.exclude.len());
    for entry in &config.exclude {
        println!("  - {}", entry.pattern);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main mirror operation
async fn handle_mirror(
    config: Config,
    seed: RepoPath,
    fresh: bool,
    config_hash: String,
) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh run from {} (ignoring saved pending work)", seed);
    } else {
        tracing::info!("Starting run from {} (will resume pending work if any)", seed);
    }

    let mut coordinator = Coordinator::new(config, seed, fresh, Some(config_hash))
        .context("failed to initialize mirror")?;

    let handle = coordinator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight files (Ctrl-C again to abort)");
            handle.stop();

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::error!("Second interrupt, aborting without saving");
                std::process::exit(130);
            }
        }
    });

    let summary = coordinator.run().await.context("mirror failed")?;
    print_summary(&summary);

    Ok(())
}
