use clap::{CommandFactory, Parser};
use crishim::{
    checkpoint::CheckpointManager,
    cli::{AnsiStyles, CheckpointsSubcommand, ConfigSubcommand, CrishimArgs, CrishimSubcommand},
    config::ShimConfig,
};
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CrishimArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let Some(subcommand) = args.subcommand else {
        CrishimArgs::command().print_help()?;
        return Ok(());
    };

    let mut config = ShimConfig::load(args.config.as_deref()).await?;
    if let Some(root) = args.root {
        tracing::debug!("using root directory from the command line: {}", root.display());
        config = config.with_root_dir(root);
    }

    match subcommand {
        CrishimSubcommand::Checkpoints(CheckpointsSubcommand::List) => {
            list_checkpoints(&config).await?;
        }
        CrishimSubcommand::Checkpoints(CheckpointsSubcommand::Show { id }) => {
            tracing::trace!("showing checkpoint: id={id}");
            let manager = CheckpointManager::open(config.checkpoint_dir()).await?;
            let checkpoint = manager.get_checkpoint(&id).await?;
            println!("{}", serde_json::to_string_pretty(&checkpoint)?);
        }
        CrishimSubcommand::Checkpoints(CheckpointsSubcommand::Prune) => {
            prune_checkpoints(&config).await?;
        }
        CrishimSubcommand::Config(ConfigSubcommand::Show) => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: *
//--------------------------------------------------------------------------------------------------

async fn list_checkpoints(config: &ShimConfig) -> anyhow::Result<()> {
    let manager = CheckpointManager::open(config.checkpoint_dir()).await?;
    let keys = manager.list_checkpoints().await?;
    if keys.is_empty() {
        println!("no checkpoints in {}", manager.dir().display());
        return Ok(());
    }

    println!("{:<66} {}", "SANDBOX ID".header(), "POD".header());
    for key in keys {
        match manager.get_checkpoint(&key).await {
            Ok(checkpoint) => {
                let pod = format!("{}/{}", checkpoint.get_namespace(), checkpoint.get_name());
                println!("{:<66} {}", key.as_str().literal(), pod);
            }
            Err(e) if e.is_corrupt_checkpoint() => {
                println!("{:<66} {}", key.as_str().literal(), "corrupt".invalid());
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

async fn prune_checkpoints(config: &ShimConfig) -> anyhow::Result<()> {
    let manager = CheckpointManager::open(config.checkpoint_dir()).await?;
    let mut pruned = 0;
    for key in manager.list_checkpoints().await? {
        match manager.get_checkpoint(&key).await {
            Ok(_) => {}
            Err(e) if e.is_corrupt_checkpoint() => {
                tracing::info!("removing corrupt checkpoint {}", key);
                manager.remove_checkpoint(&key).await?;
                pruned += 1;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }

    println!("{} {} corrupt checkpoint(s)", "pruned".valid(), pruned);
    Ok(())
}
