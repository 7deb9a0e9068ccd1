//! Command-line interface definitions

use clap::{Parser, Subcommand};

/// Wallgrid control plane launcher
#[derive(Parser, Debug)]
#[command(
    name = "wallgrid",
    version,
    about = "Wallgrid video-wall control plane",
    long_about = "Launches one of the Wallgrid control-plane services: the \
management API, the configuration authority, the policy engine, or the \
standalone audit service. All configuration is environment-driven \
(WALLGRID_* variables)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the Management Service (CRUD, tokens, reconciler)
    Mgmt,
    /// Run the Configuration Authority (YAML watcher + config API)
    Config,
    /// Run the Policy Engine (rule evaluation)
    Policy,
    /// Run the standalone audit service (ingest/query/verify/export)
    Audit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
        let cli = Cli::parse_from(["wallgrid", "mgmt"]);
        assert!(matches!(cli.command, Command::Mgmt));
        let cli = Cli::parse_from(["wallgrid", "policy"]);
        assert!(matches!(cli.command, Command::Policy));
    }
}
