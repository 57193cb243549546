//! crmport CLI - bulk contact import/export for a multi-tenant CRM
//!
//! # Commands
//!
//! ```bash
//! crmport serve                                  # Start HTTP server (port 3000)
//! crmport import contacts.csv --tenant acme      # Import a CSV file
//! crmport export --tenant acme -o contacts.xlsx  # Export to a spreadsheet
//! crmport audit --tenant acme                    # Show recent audit entries
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crmport::server::{start_server, AppState};
use crmport::{
    audit, export::run_export, import::run_import, Actor, Config, EntityRegistry, SqliteStore,
};

#[derive(Parser)]
#[command(name = "crmport")]
#[command(about = "Bulk contact import/export for a multi-tenant CRM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (default: PORT env or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Import a CSV file into the document store
    Import {
        /// Input CSV file
        input: PathBuf,

        /// Entity to import into
        #[arg(short, long, default_value = "contacts")]
        entity: String,

        /// Tenant (company) id owning the records
        #[arg(short, long)]
        tenant: String,

        /// Acting user id for the audit trail
        #[arg(long, default_value = "cli")]
        user_id: String,

        /// Acting user email for the audit trail
        #[arg(long, default_value = "cli@localhost")]
        user_email: String,
    },

    /// Export an entity to an .xlsx spreadsheet
    Export {
        /// Entity to export
        #[arg(short, long, default_value = "contacts")]
        entity: String,

        /// Tenant (company) id owning the records
        #[arg(short, long)]
        tenant: String,

        /// Output file (default: <entity>-<date>.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Acting user id for the audit trail
        #[arg(long, default_value = "cli")]
        user_id: String,

        /// Acting user email for the audit trail
        #[arg(long, default_value = "cli@localhost")]
        user_email: String,
    },

    /// Show recent audit entries for a tenant
    Audit {
        /// Tenant (company) id
        #[arg(short, long)]
        tenant: String,

        /// Maximum entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let result = match cli.command {
        Commands::Serve { port } => cmd_serve(&config, port).await,

        Commands::Import {
            input,
            entity,
            tenant,
            user_id,
            user_email,
        } => cmd_import(&config, &input, &entity, actor(user_id, user_email, tenant)).await,

        Commands::Export {
            entity,
            tenant,
            output,
            user_id,
            user_email,
        } => cmd_export(&config, &entity, output, actor(user_id, user_email, tenant)).await,

        Commands::Audit { tenant, limit } => cmd_audit(&config, &tenant, limit).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn actor(user_id: String, user_email: String, company_id: String) -> Actor {
    Actor {
        user_id,
        user_email,
        company_id,
    }
}

async fn cmd_serve(config: &Config, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::connect(&config.database_url).await?;
    let registry = Arc::new(EntityRegistry::with_defaults());
    start_server(port.unwrap_or(config.port), AppState { store, registry }).await
}

async fn cmd_import(
    config: &Config,
    input: &PathBuf,
    entity: &str,
    actor: Actor,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(input).await?;
    let store = SqliteStore::connect(&config.database_url).await?;
    let registry = EntityRegistry::with_defaults();

    let result = run_import(&store, &registry, &actor, entity, &bytes).await?;

    println!("Import finished:");
    println!("  created: {}", result.created);
    println!("  updated: {}", result.updated);
    println!("  skipped: {}", result.skipped);
    println!("  failed:  {}", result.failed);
    for error in &result.errors {
        println!("  row {}: {}", error.row, error.message);
    }

    Ok(())
}

async fn cmd_export(
    config: &Config,
    entity: &str,
    output: Option<PathBuf>,
    actor: Actor,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::connect(&config.database_url).await?;
    let registry = EntityRegistry::with_defaults();

    let payload = run_export(&store, &registry, &actor, entity).await?;
    let path = output.unwrap_or_else(|| PathBuf::from(&payload.filename));
    tokio::fs::write(&path, &payload.bytes).await?;

    println!(
        "Exported {} {} records to {}",
        payload.record_count,
        entity,
        path.display()
    );

    Ok(())
}

async fn cmd_audit(
    config: &Config,
    tenant: &str,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::connect(&config.database_url).await?;
    let entries = audit::recent(&store, tenant, limit).await?;

    if entries.is_empty() {
        println!("No audit entries for tenant {}", tenant);
        return Ok(());
    }

    for entry in entries {
        let action = serde_json::to_value(entry.action)?;
        let status = serde_json::to_value(entry.status)?;
        println!(
            "{:<27} {:<7} {:<8} {} by {} ({} records)",
            entry.created_at.as_deref().unwrap_or("-"),
            action.as_str().unwrap_or("?"),
            status.as_str().unwrap_or("?"),
            entry.details.entity,
            entry.user_email,
            entry
                .details
                .record_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
        for error in entry.details.errors.unwrap_or_default() {
            println!("    {}", error);
        }
    }

    Ok(())
}
