// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use csv::{ReaderBuilder, Trim};
use guichet_rs::{
    Actor, CommissionConfig, Engine, EventBus, RateBoard, ReceiptUpload, Role, TransactionDraft,
    TransactionFilter, TransactionId, TransactionKind, TransactionStatus, export,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Guichet - Replay a back-office workflow journal
///
/// Reads workflow commands from a CSV file, applies them to an in-memory
/// engine, and writes the resulting transaction list to stdout as the
/// French-header back-office export.
#[derive(Parser, Debug)]
#[command(name = "guichet-rs")]
#[command(about = "Replays a workflow command CSV and exports transaction states", long_about = None)]
struct Args {
    /// Path to CSV file with workflow commands
    ///
    /// Expected format: op,id,kind,montant,devise,acteur,role,param
    /// Example: cargo run -- journal.csv > transactions.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Only export transactions in this status
    #[arg(long, value_name = "STATUS")]
    status: Option<String>,

    /// Only export transactions created by this cashier
    #[arg(long, value_name = "NAME")]
    cashier: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = new_engine();
    if let Err(e) = replay_commands(BufReader::new(file), &engine) {
        eprintln!("Error replaying commands: {}", e);
        process::exit(1);
    }

    let filter = TransactionFilter {
        status: args.status.as_deref().and_then(parse_status),
        cashier: args.cashier,
        ..Default::default()
    };
    let page = engine.list(&filter);
    if let Err(e) = export::write_transactions(&page.data, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn new_engine() -> Engine {
    // XAF is pegged to the euro; the journal replay has no rate feed.
    let rates = Arc::new(
        RateBoard::new(dec!(655.957)).expect("peg rate is positive"),
    );
    Engine::new(rates, CommissionConfig::default(), Arc::new(EventBus::new()))
}

/// Raw CSV record matching the journal format.
///
/// Fields: `op, id, kind, montant, devise, acteur, role, param`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    id: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    montant: Option<Decimal>,
    #[serde(default)]
    devise: Option<String>,
    acteur: String,
    role: String,
    #[serde(default)]
    param: Option<String>,
}

fn parse_role(role: &str) -> Option<Role> {
    match role.to_lowercase().as_str() {
        "cashier" | "guichetier" => Some(Role::Cashier),
        "auditor" | "auditeur" => Some(Role::Auditor),
        "executor" | "executeur" => Some(Role::Executor),
        "accountant" | "comptable" => Some(Role::Accountant),
        "director" | "directeur" => Some(Role::Director),
        "cash_manager" => Some(Role::CashManager),
        _ => None,
    }
}

fn parse_kind(kind: &str) -> Option<TransactionKind> {
    match kind.to_lowercase().as_str() {
        "reception" => Some(TransactionKind::Reception),
        "exchange" => Some(TransactionKind::Exchange),
        "card" => Some(TransactionKind::Card),
        "transfer" => Some(TransactionKind::Transfer),
        _ => None,
    }
}

fn parse_status(status: &str) -> Option<TransactionStatus> {
    match status.to_lowercase().as_str() {
        "pending" => Some(TransactionStatus::Pending),
        "validated" => Some(TransactionStatus::Validated),
        "executed" => Some(TransactionStatus::Executed),
        "completed" => Some(TransactionStatus::Completed),
        "rejected" => Some(TransactionStatus::Rejected),
        "pending_delete" => Some(TransactionStatus::PendingDelete),
        _ => None,
    }
}

/// Applies one journal command. Returns `None` for commands that cannot be
/// parsed; workflow rejections come back as engine errors.
fn apply_command(engine: &Engine, record: CsvRecord) -> Option<Result<(), guichet_rs::WorkflowError>> {
    let actor = Actor::new(record.acteur.clone(), parse_role(&record.role)?);
    let id = TransactionId(record.id.clone());

    let result = match record.op.to_lowercase().as_str() {
        "create" => {
            let draft = TransactionDraft {
                id,
                kind: parse_kind(record.kind.as_deref()?)?,
                amount: record.montant?,
                currency: record.devise.unwrap_or_else(|| "XAF".to_string()),
                agency: record.param.unwrap_or_default(),
                details: serde_json::Value::Null,
            };
            engine.create(draft, &actor).map(|_| ())
        }
        "validate" => {
            let eur: Decimal = record.param.as_deref()?.trim().parse().ok()?;
            engine.validate(&id, &actor, eur).map(|_| ())
        }
        "reject" => engine
            .reject(&id, &actor, record.param.as_deref().unwrap_or_default())
            .map(|_| ()),
        "execute" => {
            let file_name = record.param?;
            // Use the real file size when the receipt sits next to the
            // journal; otherwise assume a minimal valid upload.
            let size = match std::fs::metadata(&file_name) {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    tracing::warn!(
                        file = %file_name,
                        error = %e,
                        "receipt file not readable, size unverified"
                    );
                    1
                }
            };
            engine
                .execute(&id, &actor, &ReceiptUpload::new(file_name, size), None)
                .map(|_| ())
        }
        "complete" => engine.complete(&id, &actor).map(|_| ()),
        "request_delete" => engine.request_delete(&id, &actor).map(|_| ()),
        "approve_delete" => engine.approve_delete(&id, &actor).map(|_| ()),
        "complete_all" => engine.complete_all(&actor).map(|_| ()),
        _ => return None,
    };
    Some(result)
}

/// Replays workflow commands from a CSV reader.
///
/// Malformed rows and rejected commands are skipped with a warning;
/// the replay itself only fails on CSV structural errors.
pub fn replay_commands<R: Read>(reader: R, engine: &Engine) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let id = record.id.clone();
                match apply_command(engine, record) {
                    None => tracing::warn!(id = %id, "skipping unparseable command"),
                    Some(Err(e)) => tracing::warn!(id = %id, error = %e, "command refused"),
                    Some(Ok(())) => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed row");
                continue;
            }
        }
    }

    Ok(())
}
