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

//! International-transfer receipts and execution-proof uploads.

use crate::base::ReceiptNumber;
use crate::commission::clamp_pct;
use crate::error::WorkflowError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Largest accepted receipt upload, in bytes.
pub const MAX_RECEIPT_BYTES: u64 = 10 * 1024 * 1024;

const ACCEPTED_EXTENSIONS: [&str; 6] = ["pdf", "jpg", "jpeg", "png", "doc", "docx"];

/// Metadata gate for the proof-of-execution file attached at the
/// validated→executed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptUpload {
    pub file_name: String,
    pub size: u64,
}

impl ReceiptUpload {
    pub fn new(file_name: impl Into<String>, size: u64) -> Self {
        ReceiptUpload {
            file_name: file_name.into(),
            size,
        }
    }

    /// Checks the upload before any store mutation.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::MissingReceipt`] - empty name or zero-length file.
    /// - [`WorkflowError::ReceiptTooLarge`] - over [`MAX_RECEIPT_BYTES`].
    /// - [`WorkflowError::UnsupportedReceiptType`] - extension not accepted.
    pub fn check(&self) -> Result<(), WorkflowError> {
        if self.file_name.trim().is_empty() || self.size == 0 {
            return Err(WorkflowError::MissingReceipt);
        }
        if self.size > MAX_RECEIPT_BYTES {
            return Err(WorkflowError::ReceiptTooLarge);
        }

        let extension = match self.file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => {
                return Err(WorkflowError::UnsupportedReceiptType {
                    extension: String::new(),
                });
            }
        };
        if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(WorkflowError::UnsupportedReceiptType { extension });
        }
        Ok(())
    }
}

/// Totals printed on an international transfer receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptTotals {
    pub amount_received: Decimal,
    pub commission: Decimal,
    pub amount_sent: Decimal,
}

impl ReceiptTotals {
    /// `commission = ceil(amount_received × rate / 100)`,
    /// `amount_sent = amount_received − commission`. The rate is clamped to
    /// [0, 100] before use.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::InvalidAmount`] - `amount_received` is not positive.
    pub fn compute(
        amount_received: Decimal,
        commission_rate: Decimal,
    ) -> Result<Self, WorkflowError> {
        if amount_received <= Decimal::ZERO {
            return Err(WorkflowError::InvalidAmount);
        }

        let commission = (amount_received * clamp_pct(commission_rate) / dec!(100)).ceil();
        Ok(ReceiptTotals {
            amount_received,
            commission,
            amount_sent: amount_received - commission,
        })
    }
}

/// An issued receipt, keyed by its server-generated number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub number: ReceiptNumber,
    pub beneficiary: String,
    #[serde(flatten)]
    pub totals: ReceiptTotals,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
}

/// Receipt history with server-side number generation.
#[derive(Debug, Default)]
pub struct ReceiptHistory {
    receipts: DashMap<ReceiptNumber, Receipt>,
    sequence: AtomicU64,
}

impl ReceiptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next receipt number: date prefix plus a monotonic sequence.
    fn next_number(&self, issued_at: DateTime<Utc>) -> ReceiptNumber {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        ReceiptNumber(format!("TI-{}-{:06}", issued_at.format("%Y%m%d"), seq))
    }

    /// Issues a receipt, computing its number and storing it in history.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::DuplicateReceipt`] - the generated number collides
    ///   with an existing one (cannot happen with the atomic sequence, kept
    ///   as a store-level guarantee).
    pub fn issue(
        &self,
        beneficiary: impl Into<String>,
        totals: ReceiptTotals,
        issued_by: impl Into<String>,
    ) -> Result<Receipt, WorkflowError> {
        let issued_at = Utc::now();
        let receipt = Receipt {
            number: self.next_number(issued_at),
            beneficiary: beneficiary.into(),
            totals,
            issued_by: issued_by.into(),
            issued_at,
        };

        match self.receipts.entry(receipt.number.clone()) {
            Entry::Occupied(_) => Err(WorkflowError::DuplicateReceipt),
            Entry::Vacant(entry) => {
                entry.insert(receipt.clone());
                Ok(receipt)
            }
        }
    }

    pub fn get(&self, number: &ReceiptNumber) -> Option<Receipt> {
        self.receipts.get(number).map(|r| r.clone())
    }

    /// Case-insensitive substring search over number and beneficiary,
    /// newest first.
    pub fn search(&self, term: &str) -> Vec<Receipt> {
        let needle = term.to_lowercase();
        let mut found: Vec<Receipt> = self
            .receipts
            .iter()
            .filter(|r| {
                needle.is_empty()
                    || r.number.0.to_lowercase().contains(&needle)
                    || r.beneficiary.to_lowercase().contains(&needle)
            })
            .map(|r| r.clone())
            .collect();
        found.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        found
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}
