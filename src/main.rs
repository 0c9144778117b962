use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use talking_head_resilience::error::{ConsolePresenter, RetryConfigRecord, RetryStatus};
use talking_head_resilience::*;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "th-resilience")]
#[command(about = "Inspect and exercise the retry policies of the talking-head service calls")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to ./talking-head.toml or the user config directory)
    #[arg(long, global = true, env = "TALKING_HEAD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective retry profile of every capability as JSON
    Profiles,

    /// Show the waits a fully failing call would go through
    Schedule {
        /// Capability whose profile to use (e.g. speech_synthesis)
        #[arg(short, long)]
        capability: Capability,

        /// Override the attempt budget
        #[arg(short, long)]
        attempts: Option<u32>,
    },

    /// List every error kind with its title and default retryability
    Kinds,

    /// GET a URL through the retry engine and report the outcome
    Probe {
        url: String,

        /// Capability whose profile to use
        #[arg(short, long, default_value = "voice_catalog")]
        capability: Capability,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => SettingsLoader::new().with_file(path).load(),
        None => SettingsLoader::load_default(),
    }
    .context("Failed to load settings")?;

    init_tracing(&settings.logging, cli.debug)
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    match cli.command {
        Commands::Profiles => show_profiles(&settings)?,
        Commands::Schedule {
            capability,
            attempts,
        } => show_schedule(&settings, capability, attempts)?,
        Commands::Kinds => show_kinds(),
        Commands::Probe { url, capability } => {
            if !probe(&settings, &url, capability).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn show_profiles(settings: &Settings) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&settings.retry)?);
    Ok(())
}

fn show_schedule(settings: &Settings, capability: Capability, attempts: Option<u32>) -> Result<()> {
    let mut config = settings.retry.for_capability(capability).clone();
    if let Some(attempts) = attempts {
        let mut record = RetryConfigRecord::from(config);
        record.max_attempts = attempts;
        config = RetryConfig::try_from(record)?;
    }

    println!(
        "{} ({} attempts, factor {}, ceiling {})",
        capability.to_string().bold(),
        config.max_attempts(),
        config.backoff_factor(),
        humantime::format_duration(config.max_delay())
    );

    let schedule = config.schedule();
    for (i, delay) in schedule.iter().enumerate() {
        println!(
            "  attempt {} fails → wait {}",
            i + 1,
            humantime::format_duration(*delay)
        );
    }
    println!("  attempt {} fails → give up", config.max_attempts());

    let total = schedule.iter().sum::<std::time::Duration>();
    println!("  total waiting: {}", humantime::format_duration(total));
    if config.jitter_factor() > 0.0 {
        println!(
            "  each wait varies by ±{:.0}%",
            config.jitter_factor() * 100.0
        );
    }

    Ok(())
}

fn show_kinds() {
    println!("{:<26} {:<28} {}", "KIND", "TITLE", "RETRIED BY DEFAULT");
    for kind in ErrorKind::ALL {
        let retried = if kind.is_retryable_by_default() {
            "yes".green()
        } else {
            "no".red()
        };
        println!("{:<26} {:<28} {}", kind.as_str(), kind.title(), retried);
    }
}

/// True when the call eventually succeeded
async fn probe(settings: &Settings, url: &str, capability: Capability) -> Result<bool> {
    let adapter = HttpAdapter::new(&settings.http)?.with_profiles(settings.retry.clone());
    let handler = ErrorHandler::new(ConsolePresenter::default());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, stopping after the current attempt...");
            on_ctrl_c.cancel();
        }
    });

    let report = |status: &RetryStatus| {
        eprintln!(
            "{} attempt {} failed ({}), retrying in {} ({} left)",
            "↻".yellow(),
            status.attempt,
            status.error.kind(),
            humantime::format_duration(status.delay),
            status.remaining
        );
    };

    match adapter
        .call_bytes_with(capability, Some(&cancel), report, |client| client.get(url))
        .await
    {
        Ok(body) => {
            println!("{} {} bytes from {}", "✔".green(), body.len(), url);
            Ok(true)
        }
        Err(error) => {
            handler.handle_retry(error);
            Ok(false)
        }
    }
}
