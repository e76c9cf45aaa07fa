//! Command line interface for pathoracle.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::selection::SelectorKind;
use crate::types::{Endpoint, IsdAs};

/// pathoracle - path selection backed by a path oracle
#[derive(Parser, Debug)]
#[command(
    name = "pathoracle",
    author,
    version,
    about = "Path selection and bandwidth telemetry for multipath connections",
    long_about = r#"
pathoracle picks the active path of a multipath connection and measures
the throughput each path delivers:

  - Random, shortest, pinned, normal-distributed or oracle-ranked selection
  - Per-path bandwidth windows written to CSV and reported to the oracle

QUICK START:
  Example config:  pathoracle config --output pathoracle.toml
  Oracle scores:   pathoracle scores 1-ff00:0:111 --oracle 127.0.0.1:8080
  Dry run:         pathoracle select paths.json --selector shortest
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Query the oracle for path scores towards a destination
    Scores(ScoresArgs),

    /// Run a selection policy over a set of candidate paths
    Select(SelectArgs),

    /// Show example configuration
    Config(ConfigArgs),
}

/// Scores command arguments
#[derive(Args, Debug)]
pub struct ScoresArgs {
    /// Destination ISD-AS, e.g. 1-ff00:0:111
    pub remote: IsdAs,

    /// Oracle location (host:port), overrides the config file
    #[arg(long)]
    pub oracle: Option<String>,

    /// Score to query, overrides the config file
    #[arg(long)]
    pub score: Option<String>,
}

/// Select command arguments
#[derive(Args, Debug)]
pub struct SelectArgs {
    /// JSON file with an array of candidate paths
    pub paths: PathBuf,

    /// Selection policy (random, shortest, constant, norm, oracle)
    #[arg(short, long)]
    pub selector: Option<SelectorKind>,

    /// Local endpoint, e.g. 1-ff00:0:110,[127.0.0.1]:4000
    #[arg(long, default_value = "1-ff00:0:110,[127.0.0.1]:0")]
    pub local: Endpoint,

    /// Remote endpoint, e.g. 1-ff00:0:111,[127.0.0.1]:4000
    #[arg(long, default_value = "1-ff00:0:111,[127.0.0.1]:0")]
    pub remote: Endpoint,

    /// Fingerprint to pin (constant policy)
    #[arg(long)]
    pub pinned: Option<String>,

    /// Spread divisor (norm policy)
    #[arg(long)]
    pub div: Option<f64>,

    /// Oracle location (host:port), overrides the config file
    #[arg(long)]
    pub oracle: Option<String>,

    /// Keep running and print every selection change until interrupted
    #[arg(short, long)]
    pub watch: bool,
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_select() {
        let cli = Cli::parse_from([
            "pathoracle",
            "select",
            "paths.json",
            "--selector",
            "norm",
            "--div",
            "4",
            "--remote",
            "2-ff00:0:222,[10.0.0.1]:443",
        ]);
        let Commands::Select(args) = cli.command else {
            panic!("expected select command");
        };
        assert_eq!(args.selector, Some(SelectorKind::Norm));
        assert_eq!(args.div, Some(4.0));
        assert_eq!(args.remote.ia, IsdAs::new(2, 0xff00_0000_0222));
        assert_eq!(args.remote.addr.port(), 443);
    }

    #[test]
    fn test_parse_scores() {
        let cli = Cli::parse_from(["pathoracle", "--format", "json", "scores", "1-ff00:0:111"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Scores(_)));
    }
}
