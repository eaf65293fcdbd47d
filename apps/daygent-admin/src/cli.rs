//! Admin subcommands
//!
//! - `keygen`: generate a master key for sealing workspace credentials
//! - `workspace create | limits | set-key | clear-key`: provisioning
//! - `usage`: monthly usage report for a workspace

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand};
use daygent_crypto::ApiKeyCipher;
use daygent_llm::Provider;
use daygent_store::{ProxyStore, SqliteStore, Workspace};
use std::path::PathBuf;
use uuid::Uuid;

/// Daygent proxy administration
#[derive(Parser, Debug)]
#[command(name = "daygent-admin")]
#[command(about = "Workspace provisioning and usage reporting for the Daygent LLM proxy")]
#[command(version)]
pub struct Cli {
    /// Path to the proxy database
    #[arg(long, env = "DAYGENT_DB", default_value = "daygent.db")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a fresh base64 master key
    Keygen,
    /// Workspace provisioning
    #[command(subcommand)]
    Workspace(WorkspaceCommands),
    /// Monthly usage report for a workspace
    Usage {
        /// Workspace id
        #[arg(long)]
        id: Uuid,
        /// Month as YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<String>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommands {
    /// Create a workspace
    Create {
        /// Display name
        #[arg(long)]
        name: String,
        /// Monthly spend limit in USD
        #[arg(long, default_value_t = 10.0)]
        limit: f64,
    },
    /// Change a workspace's monthly limit
    Limits {
        /// Workspace id
        #[arg(long)]
        id: Uuid,
        /// Monthly spend limit in USD
        #[arg(long)]
        limit: f64,
        /// Stop enforcing the limit
        #[arg(long)]
        disabled: bool,
    },
    /// Seal and store a provider API key for a workspace
    SetKey {
        /// Workspace id
        #[arg(long)]
        id: Uuid,
        /// Provider the key belongs to (openai or anthropic)
        #[arg(long)]
        provider: String,
        /// The plaintext API key to seal
        #[arg(long)]
        key: String,
    },
    /// Remove a workspace's own API key
    ClearKey {
        /// Workspace id
        #[arg(long)]
        id: Uuid,
    },
}

/// Run the parsed command
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Keygen => {
            println!("{}", BASE64.encode(daygent_crypto::generate_master_key()));
            Ok(())
        }
        Commands::Workspace(cmd) => run_workspace(&cli.db, cmd).await,
        Commands::Usage { id, month, json } => run_usage(&cli.db, id, month, json).await,
    }
}

fn master_cipher() -> Result<ApiKeyCipher> {
    let encoded = std::env::var("DAYGENT_MASTER_KEY")
        .context("DAYGENT_MASTER_KEY is not set; run `daygent-admin keygen` first")?;
    ApiKeyCipher::from_base64(&encoded).context("DAYGENT_MASTER_KEY is not a valid master key")
}

async fn run_workspace(db: &PathBuf, cmd: WorkspaceCommands) -> Result<()> {
    let store = SqliteStore::from_path(db).await?;

    match cmd {
        WorkspaceCommands::Create { name, limit } => {
            let workspace = Workspace::new(name, limit);
            store.create_workspace(&workspace).await?;
            println!("created workspace {}", workspace.id);
        }
        WorkspaceCommands::Limits { id, limit, disabled } => {
            store.update_limits(id, limit, !disabled).await?;
            println!(
                "workspace {}: limit ${:.2}/month ({})",
                id,
                limit,
                if disabled { "not enforced" } else { "enforced" }
            );
        }
        WorkspaceCommands::SetKey { id, provider, key } => {
            let Some(provider) = Provider::parse(&provider) else {
                bail!("unknown provider: {} (expected openai or anthropic)", provider);
            };
            let sealed = master_cipher()?.seal(&key)?;
            store.set_api_key(id, Some(sealed), Some(provider)).await?;
            println!("workspace {}: sealed {} key stored", id, provider);
        }
        WorkspaceCommands::ClearKey { id } => {
            store.set_api_key(id, None, None).await?;
            println!("workspace {}: key cleared", id);
        }
    }

    Ok(())
}

async fn run_usage(db: &PathBuf, id: Uuid, month: Option<String>, json: bool) -> Result<()> {
    let store = SqliteStore::from_path(db).await?;
    let month = month.unwrap_or_else(|| chrono::Utc::now().format("%Y-%m").to_string());

    let workspace = store.workspace(id).await?;
    let total = store.monthly_cost(id, &month).await?;
    let breakdown = store.usage_for_month(id, &month).await?;

    if json {
        let models: Vec<serde_json::Value> = breakdown
            .iter()
            .map(|m| {
                serde_json::json!({
                    "provider": m.provider,
                    "model": m.model,
                    "requests": m.requests,
                    "input_tokens": m.input_tokens,
                    "output_tokens": m.output_tokens,
                    "cost": m.cost,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "workspace_id": id,
                "month": month,
                "total_cost": total,
                "limit": workspace.usage_limit_monthly,
                "limit_enabled": workspace.usage_limit_enabled,
                "models": models,
            }))?
        );
        return Ok(());
    }

    println!();
    println!("  Usage for {} ({})", workspace.name, month);
    println!("  {}", "-".repeat(72));
    println!(
        "  {:<12} {:<32} {:>8} {:>10}",
        "Provider", "Model", "Requests", "Cost"
    );
    println!("  {}", "-".repeat(72));

    if breakdown.is_empty() {
        println!("  (no usage recorded)");
    } else {
        for m in &breakdown {
            println!(
                "  {:<12} {:<32} {:>8} {:>10}",
                m.provider,
                m.model,
                m.requests,
                format!("${:.4}", m.cost)
            );
        }
    }

    println!("  {}", "-".repeat(72));
    let enforced = if workspace.usage_limit_enabled {
        format!(" of ${:.2} limit", workspace.usage_limit_monthly)
    } else {
        " (limit not enforced)".to_string()
    };
    println!("  Total: ${:.4}{}", total, enforced);
    println!();

    Ok(())
}
