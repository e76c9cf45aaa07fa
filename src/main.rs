//! pathoracle CLI - path selection backed by a path oracle.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tokio::signal;

use pathoracle::cli::*;
use pathoracle::config::{init_logging, Config, LoggingConfig};
use pathoracle::oracle::{OracleApi, OracleClient, OracleConfig};
use pathoracle::selection::{PathSelector, ScoreSource};
use pathoracle::types::Path;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        let fatal = e
            .downcast_ref::<pathoracle::Error>()
            .is_some_and(pathoracle::Error::is_fatal);
        let label = if fatal { "fatal:".red().bold() } else { "error:".red() };
        eprintln!("{label} {e:#}");
        std::process::exit(if fatal { 2 } else { 1 });
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging
    let log_config = LoggingConfig {
        level: cli.log_level.clone(),
        color: !cli.no_color,
        ..Default::default()
    };
    init_logging(&log_config)?;
    if cli.no_color {
        colored::control::set_override(false);
    }

    // Load config if specified
    let config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else if Config::default_path().exists() {
        Config::load(Config::default_path())?
    } else {
        Config::default()
    };

    // Dispatch command
    match cli.command {
        Commands::Scores(args) => run_scores(args, config, cli.format).await,
        Commands::Select(args) => run_select(args, config, cli.format).await,
        Commands::Config(args) => run_config(args),
    }
}

fn oracle_config(config: &Config, location: Option<String>) -> OracleConfig {
    let mut oracle = config.oracle.clone();
    if let Some(location) = location {
        oracle.location = location;
    }
    oracle
}

/// Print the oracle's scores for one destination, best first.
async fn run_scores(args: ScoresArgs, config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let client = OracleClient::new(&oracle_config(&config, args.oracle))
        .context("no oracle location, use --oracle or the [oracle] config section")?;
    let score = args.score.unwrap_or(config.selector.score_name);

    let source = ScoreSource::new(Arc::new(client), score.clone());
    let mut scores: Vec<_> = source.fetch(args.remote).await?.into_iter().collect();
    scores.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = scores
                .iter()
                .map(|(fp, value)| serde_json::json!({ "fingerprint": fp, score.as_str(): value }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            println!(
                "{} {} towards {}",
                "Scores:".bright_white().bold(),
                score,
                args.remote.to_string().bright_cyan()
            );
            if scores.is_empty() {
                println!("  {}", "no scored paths".yellow());
            }
            for (fp, value) in &scores {
                println!("  {value:>14.0}  {fp}");
            }
        }
    }
    Ok(())
}

/// Run a policy over paths read from a JSON file and show its choice.
async fn run_select(args: SelectArgs, config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.paths)
        .with_context(|| format!("failed to read {}", args.paths.display()))?;
    let paths: Vec<Path> =
        serde_json::from_str(&content).context("failed to parse candidate paths")?;

    let mut selector_config = config.selector.clone();
    if let Some(kind) = args.selector {
        selector_config.kind = kind;
    }
    if args.pinned.is_some() {
        selector_config.pinned_fingerprint = args.pinned;
    }
    if let Some(div) = args.div {
        selector_config.norm_divisor = div;
    }

    let oracle_config = oracle_config(&config, args.oracle);
    let oracle: Option<Arc<dyn OracleApi>> = if oracle_config.is_configured() {
        Some(Arc::new(OracleClient::new(&oracle_config)?))
    } else {
        None
    };

    let selector = PathSelector::new(&selector_config, oracle)?;
    let mut changes = selector.subscribe();
    selector.initialize(&args.local, &args.remote, paths).await?;
    changes.latest();

    print_selection(&selector, format)?;

    if args.watch {
        loop {
            tokio::select! {
                _ = signal::ctrl_c() => break,
                changed = changes.changed() => {
                    if !changed {
                        break;
                    }
                    print_change(changes.latest().as_ref(), format)?;
                }
            }
        }
    }

    selector.close()?;
    Ok(())
}

fn print_selection(selector: &PathSelector, format: OutputFormat) -> anyhow::Result<()> {
    let selected = selector.path();
    let candidates = selector.candidates();

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "selector": selector.kind(),
                "selected": selected,
                "candidates": candidates,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{} {}", "Selector:".bright_white().bold(), selector.kind());
            for (rank, path) in candidates.iter().enumerate() {
                let marker = if selected.as_ref() == Some(path) {
                    "*".green().bold()
                } else {
                    " ".normal()
                };
                println!("  {marker} {rank:>3}  {}  ({} hops)", path.fingerprint, path.hops());
            }
            if selected.is_none() {
                println!("  {}", "no path selected".yellow());
            }
        }
    }
    Ok(())
}

fn print_change(path: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&path)?),
        OutputFormat::Text => match path {
            Some(path) => println!("{} {}", "→".bright_cyan(), path),
            None => println!("{} {}", "→".bright_cyan(), "no path".yellow()),
        },
    }
    Ok(())
}

/// Print or write the example configuration.
fn run_config(args: ConfigArgs) -> anyhow::Result<()> {
    let example = Config::example();

    if let Some(path) = args.output {
        example.save(&path)?;
        println!("{} Wrote example configuration to {}", "✓".green(), path.display());
    } else {
        println!("{}", toml::to_string_pretty(&example)?);
    }
    Ok(())
}
