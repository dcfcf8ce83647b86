use std::path::PathBuf;

use clap::Parser;

use crate::cli::styles;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// `crishim` inspects and maintains the durable state of the CRI shim
#[derive(Debug, Parser)]
#[command(name = "crishim", author, version, styles=styles::styles())]
pub struct CrishimArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<CrishimSubcommand>,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the root directory of the shim state
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Debug, Parser)]
pub enum CrishimSubcommand {
    /// Inspect or clean up sandbox checkpoints
    #[command(name = "checkpoints", subcommand)]
    Checkpoints(CheckpointsSubcommand),

    /// Inspect the configuration
    #[command(name = "config", subcommand)]
    Config(ConfigSubcommand),
}

/// Subcommands operating on sandbox checkpoints
#[derive(Debug, Parser)]
pub enum CheckpointsSubcommand {
    /// List checkpoints with the pod they belong to
    #[command(name = "list")]
    List,

    /// Print a checkpoint as JSON
    #[command(name = "show")]
    Show {
        /// The sandbox id the checkpoint is stored under
        #[arg(required = true)]
        id: String,
    },

    /// Delete checkpoints that fail to decode or verify
    #[command(name = "prune")]
    Prune,
}

/// Subcommands operating on the configuration
#[derive(Debug, Parser)]
pub enum ConfigSubcommand {
    /// Print the resolved configuration as TOML
    #[command(name = "show")]
    Show,
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_crishim_args_are_consistent() {
        CrishimArgs::command().debug_assert();
    }

    #[test]
    fn test_crishim_args_parse_checkpoints() -> anyhow::Result<()> {
        let args =
            CrishimArgs::try_parse_from(["crishim", "checkpoints", "show", "abc", "--root", "/tmp/x"])?;
        assert_eq!(args.root, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(
            args.subcommand,
            Some(CrishimSubcommand::Checkpoints(CheckpointsSubcommand::Show { ref id })) if id == "abc"
        ));

        let args = CrishimArgs::try_parse_from(["crishim", "-v", "config", "show"])?;
        assert!(args.verbose);
        assert!(matches!(
            args.subcommand,
            Some(CrishimSubcommand::Config(ConfigSubcommand::Show))
        ));

        assert!(CrishimArgs::try_parse_from(["crishim", "checkpoints", "show"]).is_err());

        Ok(())
    }
}
