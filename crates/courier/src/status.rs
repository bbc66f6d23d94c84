// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier status` command implementation.
//!
//! Reads the durable state directly from storage: session records with
//! their lifecycle flags, queue depth, and recent processes with their
//! per-recipient delivery tallies. Read-only; safe to run while the
//! daemon is serving.

use std::io::IsTerminal;

use courier_config::CourierConfig;
use courier_core::error::CourierError;
use courier_core::types::SessionRecord;
use courier_core::StorageAdapter;
use courier_storage::SqliteStorage;
use serde::Serialize;

/// One session row in the status report.
#[derive(Debug, Serialize)]
pub struct SessionLine {
    pub id: String,
    pub owner_id: String,
    pub phone: String,
    pub name: String,
    pub state: String,
}

/// One process row in the status report, with its delivery tallies.
#[derive(Debug, Serialize)]
pub struct ProcessLine {
    pub id: String,
    pub owner_id: String,
    pub status: String,
    pub sent_count: i64,
    pub total_recipients: i64,
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub sessions: Vec<SessionLine>,
    pub queue_depth: i64,
    pub processes: Vec<ProcessLine>,
}

/// Derives a display label from the durable lifecycle flags.
///
/// The flags are cumulative on the way up (ready implies authenticated
/// implies scanned); a disconnect clears ready and authenticated but
/// leaves the historical scanned flag set.
fn session_state_label(record: &SessionRecord) -> &'static str {
    if record.ready {
        "ready"
    } else if record.authenticated {
        "authenticated"
    } else if record.qr_scanned {
        "disconnected"
    } else if record.qr_path.is_some() {
        "awaiting_scan"
    } else {
        "registered"
    }
}

/// Builds the status report from storage.
pub async fn collect_report(
    storage: &dyn StorageAdapter,
    queue_name: &str,
) -> Result<StatusReport, CourierError> {
    let records = storage.list_sessions(None).await?;

    let mut owners: Vec<String> = Vec::new();
    for record in &records {
        if !owners.contains(&record.owner_id) {
            owners.push(record.owner_id.clone());
        }
    }

    let sessions = records
        .iter()
        .map(|r| SessionLine {
            id: r.id.clone(),
            owner_id: r.owner_id.clone(),
            phone: r.phone.clone(),
            name: r.name.clone(),
            state: session_state_label(r).to_string(),
        })
        .collect();

    let mut processes = Vec::new();
    for owner in &owners {
        for process in storage.list_processes(owner).await? {
            let counts = storage.count_deliveries(&process.id).await?;
            processes.push(ProcessLine {
                id: process.id,
                owner_id: process.owner_id,
                status: process.status,
                sent_count: process.sent_count,
                total_recipients: process.total_recipients,
                pending: counts.pending,
                sent: counts.sent,
                failed: counts.failed,
            });
        }
    }

    let queue_depth = storage.queue_len(queue_name).await?;

    Ok(StatusReport {
        sessions,
        queue_depth,
        processes,
    })
}

/// Run the `courier status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(
    config: &CourierConfig,
    json: bool,
    plain: bool,
) -> Result<(), CourierError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;

    let report = collect_report(&storage, &config.worker.queue_name).await?;

    StorageAdapter::close(&storage).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_report(&report, use_color);
    }

    Ok(())
}

/// Print the human-readable report with optional colors.
fn print_report(report: &StatusReport, use_color: bool) {
    println!();
    println!("  courier status");
    println!("  {}", "-".repeat(35));

    if report.sessions.is_empty() {
        println!("    Sessions: none registered");
    } else {
        println!("    Sessions:");
        for session in &report.sessions {
            let state = colorize_state(&session.state, use_color);
            println!(
                "      {}  {} ({}) [{}] {}",
                session.id, session.name, session.phone, session.owner_id, state
            );
        }
    }

    println!("    Queue:    {} job(s) waiting", report.queue_depth);

    if report.processes.is_empty() {
        println!("    Jobs:     none recorded");
    } else {
        println!("    Jobs:");
        for process in &report.processes {
            println!(
                "      {}  {}  sent {}/{} (pending {}, failed {})",
                process.id,
                process.status,
                process.sent_count,
                process.total_recipients,
                process.pending,
                process.failed
            );
        }
    }

    println!();
}

/// Color the state label when the terminal supports it.
fn colorize_state(state: &str, use_color: bool) -> String {
    if !use_color {
        return state.to_string();
    }
    use colored::Colorize;
    match state {
        "ready" => state.green().to_string(),
        "awaiting_scan" | "authenticated" => state.yellow().to_string(),
        "disconnected" => state.red().to_string(),
        _ => state.to_string(),
    }
}
