use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{build, inspect, verify, RunContext};

#[derive(Parser)]
#[command(name = "nftsnap")]
#[command(about = "Token ledger snapshots and live reconciliation", long_about = None)]
struct Cli {
    /// Settings YAML layers in merge order (later files override earlier ones)
    #[arg(long = "settings", global = true)]
    settings: Vec<String>,

    /// Refuse settings keys the engine does not read instead of warning
    #[arg(long, global = true, default_value_t = false)]
    strict_settings: bool,

    /// Project name in the registry
    #[arg(long, env = "CURRENT_PROJECT", global = true)]
    project: Option<String>,

    /// Soneium | Sepolia | AstarZkEvm
    #[arg(long, env = "CHAIN_NAME", global = true)]
    chain: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explorer instance list -> ownership snapshot
    Instances {
        /// Every project in the registry, one after another
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Explorer holders -> balance snapshot
    Holders {
        #[arg(long, default_value_t = false)]
        all: bool,

        /// Drain each token id's holders instead of the token-wide listing
        #[arg(long, default_value_t = false)]
        per_instance: bool,
    },

    /// Explorer transfer log -> replayed ownership snapshot
    Transfers {
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// ownerOf(i) index walk -> ownership snapshot
    Onchain {
        /// Ignore totalSupply and stop at the first token that does not exist
        #[arg(long, default_value_t = false)]
        until_not_found: bool,
    },

    /// Ownership snapshot + tokenURI -> metadata-annotated snapshot
    Uris,

    /// Check a persisted ownership snapshot against ownerOf
    VerifyOwners {
        #[command(flatten)]
        args: VerifyArgs,
    },

    /// Check a persisted balance snapshot against balanceOf
    VerifyBalances {
        #[command(flatten)]
        args: VerifyArgs,
    },

    /// Check a metadata-annotated snapshot against tokenURI
    VerifyUris {
        #[command(flatten)]
        args: VerifyArgs,
    },

    /// Compare two persisted snapshots (no network)
    Diff {
        old: PathBuf,
        new: PathBuf,

        /// Files are balance snapshots (address,tokenId,balance)
        #[arg(long, default_value_t = false)]
        balances: bool,
    },

    /// Probe every registry contract: name, totalSupply, paused, tokenURI
    Status,

    /// Print the effective settings hash + canonical JSON
    SettingsHash,
}

#[derive(clap::Args, Clone, Debug)]
pub struct VerifyArgs {
    /// Check a seeded random fraction of the records, in (0, 1]
    #[arg(long)]
    sample: Option<f64>,

    /// Seed for --sample
    #[arg(long)]
    seed: Option<u64>,

    /// Snapshot file (default: the project's file in the snapshot dir)
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real environment wins.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let settings = commands::load_engine_settings(&cli.settings, cli.strict_settings)?;

    if let Commands::SettingsHash = cli.cmd {
        println!("settings_hash={}", settings.settings_hash);
        println!("{}", settings.canonical_json);
        return Ok(());
    }
    if let Commands::Diff { old, new, balances } = &cli.cmd {
        return inspect::diff(old, new, *balances);
    }

    let needs_project = match &cli.cmd {
        Commands::Instances { all }
        | Commands::Holders { all, .. }
        | Commands::Transfers { all } => !*all,
        Commands::Status => false,
        _ => true,
    };
    let ctx = RunContext::resolve(
        needs_project,
        cli.project.clone(),
        cli.chain.clone(),
        settings,
    )?;

    match cli.cmd {
        Commands::Instances { all } => build::per_project(&ctx, all, build::Kind::Instances).await,
        Commands::Holders { all, per_instance } => {
            build::per_project(&ctx, all, build::Kind::Holders { per_instance }).await
        }
        Commands::Transfers { all } => build::per_project(&ctx, all, build::Kind::Transfers).await,
        Commands::Onchain { until_not_found } => build::onchain(&ctx, until_not_found).await,
        Commands::Uris => build::uris(&ctx).await,
        Commands::VerifyOwners { args } => verify::owners(&ctx, &args).await,
        Commands::VerifyBalances { args } => verify::balances(&ctx, &args).await,
        Commands::VerifyUris { args } => verify::uris(&ctx, &args).await,
        Commands::Status => inspect::status(&ctx).await,
        Commands::Diff { .. } | Commands::SettingsHash => Ok(()),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
