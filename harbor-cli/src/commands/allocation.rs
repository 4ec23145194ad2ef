//! `harbor allocation request|approve|reject|cancel|check`
//!
//! Requests go to the daemon when it is running so transitions for the same
//! vessel are serialized across every caller. Without a daemon they run in
//! this process against the file-backed stores, holding the same per-vessel
//! lock files the daemon takes.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};
use tokio::sync::broadcast;

use harbor_core::{config, ApproverId, BookingStatus, VesselId};
use harbor_daemon::{dispatch, DaemonError, DaemonRequest, DaemonState};

use super::{print_json, status_label};

#[derive(Subcommand, Debug)]
pub enum AllocationCommand {
    /// New -> In Progress.
    Request { vessel_id: String },
    /// In Progress -> Approved.
    Approve {
        vessel_id: String,
        #[arg(long)]
        approver: String,
    },
    /// In Progress -> Rejected.
    Reject {
        vessel_id: String,
        #[arg(long)]
        approver: String,
    },
    /// New | In Progress -> Cancelled.
    Cancel { vessel_id: String },
    /// List vessels whose vessel and berth booking statuses disagree.
    Check {
        /// Copy the vessel status onto each divergent berth booking.
        #[arg(long)]
        repair: bool,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: AllocationCommand) -> Result<()> {
    let home = super::home()?;

    let request = match command {
        AllocationCommand::Request { vessel_id } => DaemonRequest::RequestAllocation {
            vessel_id: VesselId::from(vessel_id),
        },
        AllocationCommand::Approve {
            vessel_id,
            approver,
        } => DaemonRequest::ApproveAllocation {
            vessel_id: VesselId::from(vessel_id),
            approver_id: ApproverId::from(approver),
        },
        AllocationCommand::Reject {
            vessel_id,
            approver,
        } => DaemonRequest::RejectAllocation {
            vessel_id: VesselId::from(vessel_id),
            approver_id: ApproverId::from(approver),
        },
        AllocationCommand::Cancel { vessel_id } => DaemonRequest::CancelAllocation {
            vessel_id: VesselId::from(vessel_id),
        },
        AllocationCommand::Check { repair, json } => return check(&home, repair, json),
    };

    let data = execute(&home, request)?;
    let vessel_id = data["vesselId"].as_str().unwrap_or_default();
    let status = parse_status(&data["status"])?;
    let resumed = if data["resumed"].as_bool().unwrap_or(false) {
        " (resumed)"
    } else {
        ""
    };
    println!("✓ '{vessel_id}' is now {}{resumed}", status_label(status));
    Ok(())
}

fn check(home: &Path, repair: bool, json: bool) -> Result<()> {
    let found = execute(home, DaemonRequest::Divergent)?;
    let entries = found.as_array().cloned().unwrap_or_default();

    let mut repaired = Vec::new();
    if repair {
        for entry in &entries {
            if entry["kind"] != "status_mismatch" {
                continue;
            }
            let vessel_id = entry["vesselId"]
                .as_str()
                .context("divergence entry without vessel id")?;
            execute(
                home,
                DaemonRequest::Repair {
                    vessel_id: VesselId::from(vessel_id),
                },
            )
            .with_context(|| format!("failed to repair '{vessel_id}'"))?;
            repaired.push(vessel_id.to_string());
        }
    }

    if json {
        return print_json(&serde_json::json!({
            "divergent": entries,
            "repaired": repaired,
        }));
    }

    if entries.is_empty() {
        println!("✓ No divergent allocations");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|entry| {
            let vessel_id = entry["vesselId"].as_str().unwrap_or_default().to_string();
            let action = if repaired.contains(&vessel_id) {
                "repaired".green().to_string()
            } else if entry["kind"] == "status_mismatch" {
                "repairable".yellow().to_string()
            } else {
                "needs operator".red().to_string()
            };
            Ok(DivergenceRow {
                vessel_id,
                kind: entry["kind"].as_str().unwrap_or_default().replace('_', " "),
                vessel: snapshot_cell(&entry["snapshot"]["vessel"])?,
                berth: snapshot_cell(&entry["snapshot"]["berth"])?,
                action,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    if !repair {
        println!("Run 'harbor allocation check --repair' to fix repairable entries.");
    }
    Ok(())
}

#[derive(Tabled)]
struct DivergenceRow {
    #[tabled(rename = "vessel id")]
    vessel_id: String,
    #[tabled(rename = "divergence")]
    kind: String,
    #[tabled(rename = "vessel")]
    vessel: String,
    #[tabled(rename = "berth")]
    berth: String,
    #[tabled(rename = "action")]
    action: String,
}

fn snapshot_cell(value: &Value) -> Result<String> {
    if value.is_null() {
        return Ok("-".to_string());
    }
    Ok(status_label(parse_status(value)?).to_string())
}

fn parse_status(value: &Value) -> Result<BookingStatus> {
    serde_json::from_value(value.clone()).context("daemon returned an unknown status")
}

/// Send to the daemon if one is listening, otherwise serve locally.
fn execute(home: &Path, request: DaemonRequest) -> Result<Value> {
    match harbor_daemon::request(home, &request) {
        Ok(data) => Ok(data),
        Err(DaemonError::DaemonNotRunning { .. }) => execute_locally(home, request),
        Err(err) => Err(describe(err)),
    }
}

fn execute_locally(home: &Path, request: DaemonRequest) -> Result<Value> {
    let config = config::load_at(home).context("failed to load config")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let (shutdown_tx, _) = broadcast::channel(1);
    let state = DaemonState::open_at(home, config, shutdown_tx);
    let response = runtime.block_on(dispatch(&state, request));
    response.into_data().map_err(describe)
}

fn describe(err: DaemonError) -> anyhow::Error {
    match err {
        DaemonError::Remote {
            message, retryable, ..
        } if retryable => anyhow!("{message}\n  safe to retry the same command"),
        DaemonError::Remote { message, .. } => anyhow!(message),
        other => anyhow!(other),
    }
}

