//! `quarry`: scan a project, report asset states and transform assets.

mod assets;
mod error;

use crate::assets::JsonAssets;
use crate::error::{ErrorKind, Result};
use clap::{ArgAction, Parser, Subcommand};
use exn::{OptionExt, ResultExt};
use quarry_config::Config;
use quarry_curator::{
    Curator, CuratorOptions, Dependency, DependencyKind, DocumentManagerRegistry, Guid, TransformFlags, TransformState,
};
use quarry_storage::BackendHandle;
use quarry_storage::backend::{LocalBackend, ReadOnlyBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quarry", version, about = "Incremental asset curator")]
struct Cli {
    /// Project configuration file (TOML, YAML or JSON).
    #[arg(short, long, value_name = "PATH", env = "QUARRY_CONFIG")]
    config: Option<PathBuf>,
    /// Increase log verbosity (repeatable). Ignored when RUST_LOG is set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Never write to data directories or the cache.
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the state of every asset.
    Status {
        /// Only list assets in this state.
        #[arg(long)]
        only: Option<String>,
    },
    /// Transform assets (all of them if none are given).
    Transform {
        /// Transform even if the output is up to date.
        #[arg(short, long)]
        force: bool,
        /// Profile to transform for instead of the active one.
        #[arg(short, long)]
        profile: Option<String>,
        /// Asset GUIDs or project paths.
        assets: Vec<String>,
    },
    /// List the assets depending on an asset or file.
    Uses {
        target: String,
        #[arg(short, long)]
        transitive: bool,
    },
    /// List everything an asset depends on, directly or indirectly.
    Hull {
        asset: String,
        /// Follow package dependencies too.
        #[arg(long)]
        packages: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn,quarry=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn backends(config: &Config, dry_run: bool) -> Result<Vec<BackendHandle>> {
    config
        .data_directories
        .iter()
        .map(|directory| -> Result<BackendHandle> {
            let local = LocalBackend::new(&directory.name, &directory.path)
                .or_raise(|| ErrorKind::DataDirectory(directory.name.clone()))?;
            let backend: BackendHandle = Arc::new(local);
            if dry_run {
                return Ok(Arc::new(ReadOnlyBackend::new(backend)));
            }
            Ok(backend)
        })
        .collect()
}

/// Resolve a GUID or project path given on the command line to a known asset.
fn find_asset(curator: &Curator, reference: &str) -> Result<Guid> {
    let dependency = reference.parse::<Dependency>().or_raise(|| ErrorKind::UnknownAsset(reference.to_string()))?;
    let lock = curator.lock();
    let guid = match &dependency {
        Dependency::Asset(guid) => lock.asset_info(*guid).map(|info| info.guid),
        Dependency::File(path) => lock.asset_at(path).map(|info| info.guid),
    };
    guid.ok_or_raise(|| ErrorKind::UnknownAsset(reference.to_string()))
}

fn describe(curator: &Curator, guid: Guid) -> String {
    curator.lock().asset_info(guid).map_or_else(|| guid.to_string(), |info| format!("{guid}  {}", info.path))
}

fn print_status(curator: &Curator, only: Option<&str>) {
    let lock = curator.lock();
    let mut assets: Vec<_> = lock
        .assets()
        .filter(|info| only.is_none_or(|state| info.transform_state.to_string().eq_ignore_ascii_case(state)))
        .collect();
    assets.sort_by(|a, b| a.path.cmp(&b.path));
    for info in assets {
        let state = info.transform_state.to_string();
        println!("{state:<28} {:016x}  {}", info.asset_hash, info.path);
        for entry in &info.log {
            println!("    {entry}");
        }
    }
    println!();
    for (state, count) in lock.state_counts() {
        if count > 0 {
            println!("{:<28} {count}", state.to_string());
        }
    }
}

/// The assets of `guids` a transform for `profile` would actually process.
async fn pending_transforms(curator: &Curator, guids: Vec<Guid>, force: bool, profile: Option<&str>) -> Vec<Guid> {
    let mut pending = Vec::new();
    for guid in guids {
        let state = curator.transform_state_for(guid, profile).await;
        if force || state.is_some_and(TransformState::needs_work) {
            pending.push(guid);
        }
    }
    pending
}

async fn transform(curator: &Curator, force: bool, profile: Option<&str>, assets: &[String], dry_run: bool) -> Result<()> {
    let flags = TransformFlags { force, triggered_manually: true, ..TransformFlags::default() };
    let guids = match assets {
        [] => curator.lock().known_assets(),
        assets => assets.iter().map(|asset| find_asset(curator, asset)).collect::<Result<Vec<_>>>()?,
    };
    if dry_run {
        for guid in pending_transforms(curator, guids, force, profile).await {
            println!("would transform {}", describe(curator, guid));
        }
        return Ok(());
    }
    let mut failed = 0;
    for guid in guids {
        let status = curator.transform_asset(guid, flags, profile).await;
        if !status.is_success() {
            failed += 1;
            println!("{status}: {}", describe(curator, guid));
        }
    }
    if failed > 0 {
        exn::bail!(ErrorKind::TransformsFailed(failed));
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let mut options = CuratorOptions::from_config(&config).or_raise(|| ErrorKind::Config)?;
    options.background_updates = false;
    options.dry_run = cli.dry_run;
    let managers = DocumentManagerRegistry::new().with(Arc::new(JsonAssets)).or_raise(|| ErrorKind::Curator)?;
    let curator = Curator::new(options, backends(&config, cli.dry_run)?, managers).or_raise(|| ErrorKind::Curator)?;

    curator.start_initialize();
    curator.wait_for_initialize().await.or_raise(|| ErrorKind::Curator)?;
    let processed = curator.process_pending_updates().await;
    tracing::debug!(processed, "processed pending updates");

    let result = execute(&curator, &cli).await;
    curator.shutdown().await.or_raise(|| ErrorKind::Curator)?;
    result
}

async fn execute(curator: &Curator, cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Status { only } => {
            print_status(curator, only.as_deref());
            Ok(())
        },
        Command::Transform { force, profile, assets } => {
            transform(curator, *force, profile.as_deref(), assets, cli.dry_run).await
        },
        Command::Uses { target, transitive } => {
            let dependency = target.parse::<Dependency>().or_raise(|| ErrorKind::UnknownAsset(target.to_string()))?;
            for guid in curator.find_all_uses(&dependency, *transitive) {
                println!("{}", describe(curator, guid));
            }
            Ok(())
        },
        Command::Hull { asset, packages } => {
            let guid = find_asset(curator, asset)?;
            let kinds: &[DependencyKind] = if *packages { &DependencyKind::ALL } else { &DependencyKind::HASHED };
            for dependency in curator.generate_transitive_hull(&Dependency::Asset(guid), kinds) {
                match dependency {
                    Dependency::Asset(guid) => println!("{}", describe(curator, guid)),
                    Dependency::File(path) => println!("{path}"),
                }
            }
            Ok(())
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli).await
}
