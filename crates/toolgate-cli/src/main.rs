//! Toolgate admin CLI.
//!
//! The `toolgate` command drives a running gateway over HTTP — it is
//! the Admin surface for the veto gate.
//!
//! ## Commands
//!
//! - `submit`: Submit a tool-call request on behalf of a tenant
//! - `pending`: List suspended invocations awaiting a decision
//! - `show`: Show one approval record in full
//! - `approve` / `reject`: Decide a suspended invocation

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use serde_json::Value;

use toolgate_state::PendingApproval;

#[derive(Parser)]
#[command(name = "toolgate")]
#[command(version = toolgate_core::VERSION)]
#[command(about = "Admin CLI for the Toolgate gateway", long_about = None)]
struct Cli {
    /// Gateway endpoint
    #[arg(long, global = true, default_value = "http://127.0.0.1:3000", env = "TOOLGATE_ENDPOINT")]
    endpoint: String,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a tool-call request
    Submit {
        /// Tenant on whose behalf the tool runs
        #[arg(short, long)]
        tenant: String,

        /// Tool name
        #[arg(long)]
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        arguments: String,

        /// Explicit request id (generated when omitted)
        #[arg(long)]
        request_id: Option<String>,
    },

    /// List pending approvals
    Pending,

    /// Show one approval record
    Show {
        /// Approval id
        id: String,
    },

    /// Approve a suspended invocation
    Approve {
        /// Approval id
        id: String,

        /// Approver identity recorded on the decision
        #[arg(long = "by")]
        decided_by: String,
    },

    /// Reject a suspended invocation
    Reject {
        /// Approval id
        id: String,

        /// Approver identity recorded on the decision
        #[arg(long = "by")]
        decided_by: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match &cli.command {
        Commands::Submit {
            tenant,
            tool,
            arguments,
            request_id,
        } => {
            let arguments: Value = serde_json::from_str(arguments)
                .context("arguments must be valid JSON")?;
            let body = serde_json::json!({
                "tenant_id": tenant,
                "tool": tool,
                "arguments": arguments,
                "request_id": request_id,
            });
            let resp = client
                .post(format!("{}/v1/execute", cli.endpoint))
                .json(&body)
                .send()
                .await?;
            let status = resp.status();
            let payload: Value = resp.json().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }
            match status {
                StatusCode::OK => {
                    println!("completed (request {})", payload["request_id"]);
                    println!("{}", serde_json::to_string_pretty(&payload["result"])?);
                }
                StatusCode::ACCEPTED => {
                    println!(
                        "awaiting approval: {}",
                        payload["approval_id"].as_str().unwrap_or("?")
                    );
                }
                _ => bail!("gateway error ({status}): {payload}"),
            }
        }

        Commands::Pending => {
            let resp = client
                .get(format!("{}/v1/approvals", cli.endpoint))
                .send()
                .await?
                .error_for_status()?;
            let pending: Vec<PendingApproval> = resp.json().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&pending)?);
                return Ok(());
            }
            if pending.is_empty() {
                println!("no pending approvals");
                return Ok(());
            }
            for record in pending {
                println!(
                    "{}  {}  tenant={}  tool={}  since={}",
                    record.approval_id.short(),
                    record.status,
                    record.tenant_id,
                    record.tool_name,
                    record.created_at.to_rfc3339(),
                );
            }
        }

        Commands::Show { id } => {
            let resp = client
                .get(format!("{}/v1/approvals/{id}", cli.endpoint))
                .send()
                .await?;
            if resp.status() == StatusCode::NOT_FOUND {
                bail!("no approval record found for {id}");
            }
            let record: Value = resp.error_for_status()?.json().await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::Approve { id, decided_by } => {
            decide(&client, &cli, id, "approve", decided_by).await?;
        }

        Commands::Reject { id, decided_by } => {
            decide(&client, &cli, id, "reject", decided_by).await?;
        }
    }

    Ok(())
}

async fn decide(
    client: &reqwest::Client,
    cli: &Cli,
    id: &str,
    outcome: &str,
    decided_by: &str,
) -> Result<()> {
    let body = serde_json::json!({"outcome": outcome, "decided_by": decided_by});
    let resp = client
        .post(format!("{}/v1/approvals/{id}/decision", cli.endpoint))
        .json(&body)
        .send()
        .await?;
    let status = resp.status();
    let payload: Value = resp.json().await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    match status {
        StatusCode::OK => match payload["status"].as_str() {
            Some("executed") => {
                println!("approved; execution finished");
                println!("{}", serde_json::to_string_pretty(&payload["result"])?);
            }
            Some("rejected") => println!("rejected; nothing was executed"),
            other => println!("decision applied: {other:?}"),
        },
        StatusCode::NOT_FOUND => bail!("no approval record found for {id}"),
        StatusCode::CONFLICT => bail!("already decided: {}", payload["error"]),
        StatusCode::GONE => bail!("expired before the decision committed"),
        _ => bail!("gateway error ({status}): {payload}"),
    }
    Ok(())
}
