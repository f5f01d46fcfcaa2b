use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use unimig::common::namespace::namespace_for_org;
use unimig::config::UnifiedStorageConfig;
use unimig::database::connection::{establish_connection, get_database_url};
use unimig::services::{MigrateOptions, OrgOutcome};
use unimig::unified::MemoryResourceStore;
use unimig::AppContext;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count legacy rows of every registered resource
    Count {
        #[clap(short, long, env = "UNIMIG_DATABASE")]
        database: String,
        /// Only this organization
        #[clap(short, long)]
        org: Option<i64>,
    },
    /// Show where each resource is served from per organization
    Status {
        #[clap(short, long, env = "UNIMIG_DATABASE")]
        database: String,
        #[clap(short, long)]
        config: Option<PathBuf>,
    },
    /// Run the startup migrations against an in-memory unified store
    Rehearse {
        #[clap(short, long, env = "UNIMIG_DATABASE")]
        database: String,
        #[clap(short, long)]
        config: Option<PathBuf>,
        /// Replay dashboard history and trash
        #[clap(long)]
        history: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<UnifiedStorageConfig> {
    let config = match path {
        Some(path) => UnifiedStorageConfig::load(path)?,
        None => UnifiedStorageConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

/// Connects to the legacy database. A rehearsal keeps its migration log in
/// memory so it never marks organizations as migrated.
async fn build_context(
    database: &str,
    config: UnifiedStorageConfig,
    rehearsal: bool,
) -> Result<(AppContext, Arc<MemoryResourceStore>)> {
    let database_url = get_database_url(Some(database));
    let db = establish_connection(&database_url)
        .await
        .with_context(|| format!("cannot connect to {}", database))?;
    let store = Arc::new(MemoryResourceStore::spawn());
    let context = if rehearsal {
        AppContext::rehearsal(db, &database_url, config, store.clone())
    } else {
        AppContext::new(db, &database_url, config, store.clone())
    };
    Ok((context, store))
}

async fn count(database: &str, org: Option<i64>) -> Result<()> {
    let (context, _store) = build_context(database, UnifiedStorageConfig::default(), false).await?;
    let service = context.migration_service();
    let resources: Vec<_> = context
        .registry()
        .all()
        .iter()
        .flat_map(|definition| definition.group_resources())
        .collect();

    let org_ids: Vec<i64> = match org {
        Some(org_id) => vec![org_id],
        None => service.source().orgs().await?.into_iter().map(|org| org.id).collect(),
    };

    let cancel = CancellationToken::new();
    for org_id in org_ids {
        let options = MigrateOptions::new(namespace_for_org(org_id), resources.clone()).count_only();
        let response = service.migrate(options, &cancel).await?;
        for summary in &response.summary {
            println!(
                "{}\t{}\t{}",
                summary.namespace,
                summary.group_resource(),
                summary.count
            );
        }
    }
    Ok(())
}

async fn status(database: &str, config: Option<&PathBuf>) -> Result<()> {
    let (context, _store) = build_context(database, load_config(config)?, false).await?;
    let resolver = context.storage_mode_service();
    let orgs = context.migration_service().source().orgs().await?;

    for org in &orgs {
        let namespace = namespace_for_org(org.id);
        for definition in context.registry().all() {
            for group_resource in definition.group_resources() {
                let mode = resolver.get_storage_mode(&group_resource, &namespace).await;
                println!("{}\t{}\t{}", namespace, group_resource, mode);
            }
        }
    }
    Ok(())
}

async fn rehearse(database: &str, config: Option<&PathBuf>, history: bool) -> Result<()> {
    let (context, _store) = build_context(database, load_config(config)?, true).await?;
    let startup = Arc::new(context.startup_service(history));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling migrations");
            on_signal.cancel();
        }
    });

    let report = startup.spawn(cancel).await??;
    if report.disabled {
        println!("migrations are disabled");
        return Ok(());
    }

    for entry in &report.entries {
        let outcome = match &entry.outcome {
            OrgOutcome::Migrated { processed, rejected } => {
                format!("migrated ({} processed, {} rejected)", processed, rejected)
            }
            OrgOutcome::AlreadyMigrated => "already migrated".to_string(),
            OrgOutcome::SkippedDisabled => "skipped (disabled)".to_string(),
            OrgOutcome::SkippedThreshold {
                resource,
                rows,
                threshold,
            } => format!("skipped ({} has {} rows, threshold {})", resource, rows, threshold),
            OrgOutcome::Failed { error, retryable } => {
                format!("failed (retryable: {}): {}", retryable, error)
            }
        };
        println!("{}\t{} ({})\t{}", entry.definition_id, entry.org_id, entry.org_name, outcome);
    }
    info!("{} of {} runs migrated", report.migrated(), report.entries.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Count { database, org } => {
            info!("Counting legacy rows in {}", database);
            count(&database, org).await?;
        }
        Commands::Status { database, config } => {
            status(&database, config.as_ref()).await?;
        }
        Commands::Rehearse {
            database,
            config,
            history,
        } => {
            info!("Rehearsing migrations for {}", database);
            rehearse(&database, config.as_ref(), history).await?;
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
