//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Address to try first instead of a random one
    #[arg(short, long)]
    pub address: Option<String>,

    /// Seed for address generation and call ids
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print app events as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive session against the simulated network
    Interactive,
    /// Run a short scripted tour: chat, call, record, hang up
    Demo,
    /// Print an example configuration file
    ExampleConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "peerline",
            "--verbose",
            "--address",
            "123456",
            "--seed",
            "7",
            "interactive",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.address.as_deref(), Some("123456"));
        assert_eq!(cli.seed, Some(7));
        assert!(matches!(cli.command, Commands::Interactive));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["peerline"]).is_err());
    }
}
