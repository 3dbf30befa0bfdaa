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

//! Transaction records and their lifecycle states.
//!
//! Transactions follow a state machine:
//! - [`Pending`] → [`Validated`] (auditor) or [`Rejected`] (auditor)
//! - [`Validated`] → [`Executed`] (executor) or [`Completed`] (creator cashier)
//! - [`Executed`] → [`Completed`] (creator cashier)
//! - [`Completed`] → [`PendingDelete`] (creator cashier), removed on approval
//!
//! [`Pending`]: TransactionStatus::Pending
//! [`Validated`]: TransactionStatus::Validated
//! [`Rejected`]: TransactionStatus::Rejected
//! [`Executed`]: TransactionStatus::Executed
//! [`Completed`]: TransactionStatus::Completed
//! [`PendingDelete`]: TransactionStatus::PendingDelete

use crate::base::TransactionId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Business kind of a transaction, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Reception,
    Exchange,
    Card,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Reception => "reception",
            TransactionKind::Exchange => "exchange",
            TransactionKind::Card => "card",
            TransactionKind::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a transaction.
///
/// There is deliberately no `Deleted` variant: an approved deletion removes
/// the record from the store, so no generic status update can ever reach a
/// terminal "deleted" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Validated,
    Executed,
    Completed,
    Rejected,
    PendingDelete,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Validated => "validated",
            TransactionStatus::Executed => "executed",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::PendingDelete => "pending_delete",
        }
    }

    /// Edges of the lifecycle state machine. Deletion approval is not an
    /// edge; it removes the record instead of changing its status.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Validated)
                | (Pending, Rejected)
                | (Validated, Executed)
                | (Validated, Completed)
                | (Executed, Completed)
                | (Completed, PendingDelete)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted transaction record.
///
/// `real_amount_eur` and `commission_amount` are set together, exactly once,
/// at the pending→validated transition; a subsequent reject clears both.
/// The `details` payload is kind-specific (beneficiary, transfer method,
/// client info) and opaque to the workflow engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub created_by: String,
    pub agency: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_amount_eur: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Payload supplied by the teller at creation time.
///
/// The creator identity comes from the acting teller, not the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub currency: String,
    pub agency: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Transaction {
    pub(crate) fn from_draft(
        draft: TransactionDraft,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Transaction {
            id: draft.id,
            kind: draft.kind,
            amount: draft.amount,
            currency: draft.currency,
            status: TransactionStatus::Pending,
            created_by,
            agency: draft.agency,
            created_at,
            real_amount_eur: None,
            commission_amount: None,
            validated_by: None,
            rejection_reason: None,
            receipt_url: None,
            executor_comment: None,
            executed_at: None,
            details: draft.details,
        }
    }
}
