mod commands;

use clap::{Parser, Subcommand};
use clusterbase::Step;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clusterbase")]
#[command(about = "Deploy the base Azure resources of a managed cluster", long_about = None)]
struct Cli {
    /// Directory holding `.clusterbase/clusters/` (defaults to the settings
    /// `state_dir`, then the current directory)
    #[arg(long, global = true, env = "CLUSTERBASE_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Cluster resource id
    #[arg(short, long, global = true, env = "CLUSTERBASE_CLUSTER")]
    cluster: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every install step in order
    Install,
    /// Run a single install step
    Step {
        #[arg(value_enum)]
        step: Step,
    },
    /// Generate an infra ID without touching any state
    InfraId {
        base: String,
        #[arg(long, default_value_t = clusterbase::INFRA_ID_MAX_LEN)]
        max_len: usize,
        #[arg(long, default_value_t = clusterbase::INFRA_ID_RANDOM_LEN)]
        random_len: usize,
    },
    /// Print the base resource template without deploying it
    Template,
    /// Create the cluster document from a cluster JSON file
    Import { file: PathBuf },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // infra-id needs no settings or credentials
    if let Commands::InfraId {
        base,
        max_len,
        random_len,
    } = &cli.command
    {
        commands::infra_id::handle(base, *max_len, *random_len);
        return Ok(());
    }

    let settings = clusterbase_config::load_settings()?;
    let session = commands::Session::new(settings, cli.state_dir, cli.cluster);
    let command = cli.command;

    let run = async {
        match command {
            Commands::Install => commands::install::handle(&session).await,
            Commands::Step { step } => commands::step::handle(&session, step).await,
            Commands::Template => commands::template::handle(&session).await,
            Commands::Import { file } => commands::import::handle(&session, &file).await,
            Commands::InfraId { .. } => Ok(()),
        }
    };

    tokio::select! {
        result = run => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{}", "Interrupted".yellow());
            anyhow::bail!("interrupted")
        }
    }
}
