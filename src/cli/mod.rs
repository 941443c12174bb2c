//! Command-line interface.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

pub use commands::Commands;

#[derive(Parser, Debug)]
#[command(name = "mbuild", version, about = "Incremental builds for dialogue and NLU models")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Machine-readable JSON output on stdout
    #[arg(long, global = true, env = "MBUILD_ROBOT")]
    pub robot: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress logs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Explicit config file (skips global and project config)
    #[arg(id = "config_file", long = "config-file", global = true)]
    pub config_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_config_does_not_leak_into_config_file() {
        let cli = Cli::try_parse_from(["mbuild", "train", "--config", "config.yml"]).unwrap();
        assert!(cli.config_file.is_none());
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        assert_eq!(args.config, Some(PathBuf::from("config.yml")));

        let cli = Cli::try_parse_from([
            "mbuild",
            "--config-file",
            "mbuild.toml",
            "train",
            "--config",
            "config.yml",
        ])
        .unwrap();
        assert_eq!(cli.config_file, Some(PathBuf::from("mbuild.toml")));
    }
}
