//! The `seed-server` CLI surface: a thin `clap` wrapper whose only real job
//! is to pick a config file and start serving (§6).

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "seed-server", version, about = "Seed agent orchestration kernel server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the server (default when no subcommand is given).
    Serve,
    /// Parse the config file and report any errors, without starting the server.
    CheckConfig,
}

/// Load the config from `SEED_CONFIG` (or `config.toml` if unset),
/// falling back to built-in defaults when the file doesn't exist.
pub fn load_config() -> anyhow::Result<(seed_domain::Config, String)> {
    let config_path = std::env::var("SEED_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        seed_domain::Config::load(&config_path).map_err(|e| anyhow::anyhow!("{e}"))?
    } else {
        seed_domain::Config::default()
    };
    config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn no_subcommand_parses_to_none() {
        let cli = Cli::parse_from(["seed-server"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn check_config_subcommand_parses() {
        let cli = Cli::parse_from(["seed-server", "check-config"]);
        assert!(matches!(cli.command, Some(Command::CheckConfig)));
    }
}
