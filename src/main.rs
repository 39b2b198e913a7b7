use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mirrorsync::{Config, FailurePolicy, HealthCheck, SyncEngine, SyncOutcome, SyncSummary};

#[derive(Parser)]
#[command(name = "mirrorsync")]
#[command(about = "Keep a directory of bare git mirrors in sync with a GitHub account")]
#[command(
    long_about = "Keep a directory of bare git mirrors in sync with a GitHub account.\n\n\
                  Do not run two instances against the same mirror root at once."
)]
#[command(version)]
#[command(subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Account whose repositories are mirrored
    #[arg(required = true)]
    account: Option<String>,

    /// Repository to skip, with or without the .git suffix (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "NAME")]
    exclude: Vec<String>,

    /// Delete local mirrors whose repository no longer exists remotely
    #[arg(short, long)]
    delete: bool,

    /// Keep syncing the remaining repositories after one fails
    #[arg(short, long)]
    keep_going: bool,

    /// Directory holding the mirrors (overrides mirror_root)
    #[arg(short, long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Listing API base URL (overrides github.api_url)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// System health check and diagnostics
    Doctor,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    apply_overrides(&mut config, &cli);

    init_logging(cli.verbose, &config.logging.level)?;
    info!("Starting mirrorsync v{}", env!("CARGO_PKG_VERSION"));

    match (cli.command, cli.account) {
        (Some(Commands::Doctor), _) => cmd_doctor(&config),
        (None, Some(account)) => cmd_sync(&account, config).await,
        (None, None) => bail!("An account name is required"),
    }
}

/// Initialize logging: RUST_LOG wins, then --verbose, then the configured level
fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Command-line flags take precedence over the config file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(root) = &cli.root {
        config.mirror_root = root.to_string_lossy().into_owned();
    }
    if let Some(api_url) = &cli.api_url {
        config.github.api_url = api_url.clone();
    }
    config.mirror.exclude.extend(cli.exclude.iter().cloned());
    if cli.delete {
        config.mirror.prune = true;
    }
    if cli.keep_going {
        config.mirror.on_failure = FailurePolicy::Continue;
    }
}

/// Mirror every repository of an account
async fn cmd_sync(account: &str, config: Config) -> Result<()> {
    let health = HealthCheck::run(&config);
    if !health.all_passed() {
        print_health_report(&health);
        bail!("Preflight checks failed");
    }

    let engine = SyncEngine::new(config)?;
    let summary = engine.run_sync(account).await?;

    print_summary(&summary);

    if summary.has_failures() {
        bail!("{} repositories failed to sync", summary.failed);
    }

    Ok(())
}

fn print_summary(summary: &SyncSummary) {
    println!("🎉 Mirror sync complete");
    println!("   📊 Repositories listed: {}", summary.total_repositories);
    println!("   📥 Mirrored: {}", summary.mirrored);
    println!("   🔄 Updated: {}", summary.updated);
    println!("   ⏭️  Excluded: {}", summary.excluded);
    println!("   🗑️  Pruned: {}", summary.pruned);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.has_failures() {
        println!("\n🔍 Failed Operations:");
        for result in &summary.results {
            if let SyncOutcome::Failed { url, error } = result {
                println!("   ❌ {}: {}", url, error);
            }
        }
    }
}

/// System health check and diagnostics
fn cmd_doctor(config: &Config) -> Result<()> {
    let health = HealthCheck::run(config);
    print_health_report(&health);
    if !health.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    use mirrorsync::health::CheckResult;

    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 mirrorsync System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    if health.all_passed() {
        println!("✅ All checks passed");
    } else {
        println!("❌ Some checks failed");
    }
}
