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

//! CSV export of transaction lists.
//!
//! The back-office export format: French header row, every field
//! double-quoted, one row per transaction. K filtered records produce
//! exactly K+1 lines.

use crate::transaction::Transaction;
use csv::{QuoteStyle, WriterBuilder};
use std::io::Write;

/// French header row of the export.
pub const HEADERS: [&str; 10] = [
    "Date",
    "Identifiant",
    "Type",
    "Montant",
    "Devise",
    "Montant réel (EUR)",
    "Commission (XAF)",
    "Statut",
    "Guichetier",
    "Agence",
];

/// Writes the export to any writer.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_transactions<W: Write>(
    records: &[Transaction],
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(writer);

    wtr.write_record(HEADERS)?;
    for tx in records {
        wtr.write_record([
            tx.created_at.format("%Y-%m-%d %H:%M").to_string(),
            tx.id.to_string(),
            tx.kind.as_str().to_string(),
            tx.amount.to_string(),
            tx.currency.clone(),
            tx.real_amount_eur.map(|d| d.to_string()).unwrap_or_default(),
            tx.commission_amount
                .map(|d| d.to_string())
                .unwrap_or_default(),
            tx.status.as_str().to_string(),
            tx.created_by.clone(),
            tx.agency.clone(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
