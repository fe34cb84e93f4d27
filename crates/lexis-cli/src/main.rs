//! lexis-fields: command-line access to the field reconciliation engine.
//!
//! Works against a JSON snapshot file (`--snapshot`) or a PostgreSQL
//! database (`--database-url` / `DATABASE_URL`). Results are printed to
//! stdout as JSON; logs go to stderr. Mutations against a snapshot are
//! written back to the file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use lexis_db::{Database, MemoryEntityRepository, MemoryTemplateRepository, PoolConfig, Snapshot};
use lexis_fields::{
    AttributeValue, BulkControl, BulkMergeRequest, EngineConfig, EntityRepository, Error,
    FieldEngine, FieldService, MergeRequest, TemplateRepository,
};

#[derive(Parser)]
#[command(name = "lexis-fields")]
#[command(author, version, about = "Field reconciliation for third-party records")]
#[command(propagate_version = true)]
struct Cli {
    /// JSON snapshot file holding entities and templates (takes precedence over the database)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// PostgreSQL connection URL
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Company scoping type-wide commands
    #[arg(long, global = true)]
    company: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the aggregated field requirements of a third-party type
    Requirements {
        /// Third-party type (e.g. proveedor, cliente)
        #[arg(short = 't', long = "type")]
        third_party_type: String,
    },

    /// Reconcile one entity against its type's requirements
    Analyze {
        /// Entity ID
        entity_id: Uuid,
    },

    /// Completion overview of every entity of a type
    Completion {
        #[arg(short = 't', long = "type")]
        third_party_type: String,
    },

    /// Rename one entity's attribute keys to canonical form
    Migrate {
        entity_id: Uuid,

        /// Report the changes without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Rename attribute keys of every entity of a type
    MigrateAll {
        #[arg(short = 't', long = "type")]
        third_party_type: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Suggest fields the entity's cohort commonly carries
    Suggest {
        entity_id: Uuid,
    },

    /// Merge several attribute keys of one entity into one
    Merge {
        entity_id: Uuid,

        /// Key to merge (repeat for each key)
        #[arg(short, long = "key", required = true, num_args = 1..)]
        keys: Vec<String>,

        /// Name of the merged key
        #[arg(long)]
        target: String,

        /// Explicit value for the merged key
        #[arg(long)]
        value: Option<String>,

        /// Keep the source keys next to the merged one
        #[arg(long)]
        keep_originals: bool,
    },

    /// Merge matching keys on every entity of a type
    BulkMerge {
        #[arg(short = 't', long = "type")]
        third_party_type: String,

        /// Raw key name to merge (repeat for each name)
        #[arg(short, long = "name", required = true, num_args = 1..)]
        names: Vec<String>,

        #[arg(long)]
        target: String,

        #[arg(long)]
        keep_originals: bool,
    },

    /// Apply pending database migrations
    DbMigrate,
}

impl Commands {
    fn mutates(&self) -> bool {
        match self {
            Commands::Migrate { dry_run, .. } | Commands::MigrateAll { dry_run, .. } => !dry_run,
            Commands::Merge { .. } | Commands::BulkMerge { .. } => true,
            _ => false,
        }
    }
}

/// Where entities and templates come from.
enum Backend {
    Snapshot {
        path: PathBuf,
        entities: Arc<MemoryEntityRepository>,
        templates: Arc<MemoryTemplateRepository>,
    },
    Postgres(Database),
}

impl Backend {
    async fn open(cli: &Cli, pool: PoolConfig) -> anyhow::Result<Self> {
        if let Some(path) = &cli.snapshot {
            let (entities, templates) = Snapshot::load(path).await?.into_repositories();
            return Ok(Backend::Snapshot {
                path: path.clone(),
                entities: Arc::new(entities),
                templates: Arc::new(templates),
            });
        }
        match &cli.database_url {
            Some(url) => Ok(Backend::Postgres(
                Database::connect_with_config(url, pool).await?,
            )),
            None => Err(anyhow!(
                "no data source: pass --snapshot <file> or --database-url / DATABASE_URL"
            )),
        }
    }

    fn repositories(&self) -> (Arc<dyn EntityRepository>, Arc<dyn TemplateRepository>) {
        let (entities, templates): (Arc<dyn EntityRepository>, Arc<dyn TemplateRepository>) =
            match self {
                Backend::Snapshot {
                    entities,
                    templates,
                    ..
                } => (entities.clone(), templates.clone()),
                Backend::Postgres(db) => (Arc::new(db.entities()), Arc::new(db.templates())),
            };
        (entities, templates)
    }

    /// Persist snapshot changes back to the file.
    async fn flush(&self) -> anyhow::Result<()> {
        if let Backend::Snapshot {
            path,
            entities,
            templates,
        } = self
        {
            Snapshot::capture(entities, templates)
                .await
                .save(path)
                .await?;
        }
        Ok(())
    }
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lexis_cli=info,lexis_fields=info,lexis_db=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Structured failure document for an error.
///
/// Failures raised outside the engine are reported as [`Error::Internal`].
fn failure_document(err: &anyhow::Error) -> serde_json::Value {
    let internal;
    let e = match err.downcast_ref::<Error>() {
        Some(e) => e,
        None => {
            internal = Error::Internal(format!("{:#}", err));
            &internal
        }
    };
    json!({
        "error": e.kind(),
        "message": e.to_string(),
        "keys": e.offending_keys(),
    })
}

fn require_company(cli: &Cli) -> anyhow::Result<Uuid> {
    cli.company
        .ok_or_else(|| Error::validation("--company is required for type-wide commands").into())
}

fn load_engine(path: Option<&Path>) -> anyhow::Result<FieldEngine> {
    let config = EngineConfig::load(path).map_err(Error::from)?;
    Ok(FieldEngine::new(config).map_err(Error::from)?)
}

/// Bulk control cancelled by Ctrl-C.
fn cancellable() -> BulkControl {
    let control = BulkControl::new();
    let handle = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing records in flight");
            handle.cancel();
        }
    });
    control
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}", failure_document(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::DbMigrate = cli.command {
        let backend = Backend::open(&cli, PoolConfig::default()).await?;
        return match &backend {
            Backend::Postgres(db) => {
                db.migrate().await?;
                info!("Database migrations applied");
                print_json(&json!({ "migrated": true }))
            }
            Backend::Snapshot { .. } => Err(anyhow!("db-migrate requires --database-url")),
        };
    }

    let engine = load_engine(cli.config.as_deref()).context("loading engine configuration")?;
    let pool = PoolConfig::for_bulk_concurrency(engine.config().bulk.concurrency);
    let backend = Backend::open(&cli, pool).await?;
    let (entities, templates) = backend.repositories();
    let service = FieldService::new(entities, templates, engine);

    match &cli.command {
        Commands::Requirements { third_party_type } => {
            let company = require_company(&cli)?;
            let requirements = service.requirements(third_party_type, company).await?;
            print_json(&requirements.values().collect::<Vec<_>>())?;
        }
        Commands::Analyze { entity_id } => {
            print_json(&service.analyze(*entity_id).await?)?;
        }
        Commands::Completion { third_party_type } => {
            let company = require_company(&cli)?;
            print_json(&service.cohort_completion(third_party_type, company).await?)?;
        }
        Commands::Migrate { entity_id, dry_run } => {
            print_json(&service.migrate_entity(*entity_id, *dry_run).await?)?;
        }
        Commands::MigrateAll {
            third_party_type,
            dry_run,
        } => {
            let company = require_company(&cli)?;
            let control = cancellable();
            let summary = service
                .migrate_all(third_party_type, company, *dry_run, &control)
                .await?;
            print_json(&summary)?;
        }
        Commands::Suggest { entity_id } => {
            print_json(&service.suggest(*entity_id).await?)?;
        }
        Commands::Merge {
            entity_id,
            keys,
            target,
            value,
            keep_originals,
        } => {
            let request = MergeRequest {
                keys: keys.clone(),
                target_name: target.clone(),
                target_value: value.as_deref().map(AttributeValue::text),
                remove_originals: !keep_originals,
            };
            let entity = service.merge_entity(*entity_id, &request).await?;
            print_json(&entity)?;
        }
        Commands::BulkMerge {
            third_party_type,
            names,
            target,
            keep_originals,
        } => {
            let request = BulkMergeRequest {
                company_id: require_company(&cli)?,
                third_party_type: third_party_type.clone(),
                raw_names: names.clone(),
                target_name: target.clone(),
                remove_originals: !keep_originals,
            };
            let control = cancellable();
            print_json(&service.bulk_merge(&request, &control).await?)?;
        }
        Commands::DbMigrate => {}
    }

    if cli.command.mutates() {
        backend.flush().await?;
    }
    Ok(())
}
