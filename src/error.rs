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

//! Error types for workflow processing.

use crate::base::Role;
use crate::declaration::DeclarationStatus;
use crate::expense::ExpenseStatus;
use crate::policy::TransactionAction;
use crate::transaction::TransactionStatus;
use thiserror::Error;

/// Workflow processing errors.
///
/// Input-validation failures and business-rule rejections are distinct
/// variants so HTTP layers can map them to different status codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Requested target status is not reachable from the current one
    #[error("no transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Action is not admissible in the record's current status
    #[error("cannot '{action}' a transaction in status '{status}'")]
    ActionNotAvailable {
        status: TransactionStatus,
        action: TransactionAction,
    },

    /// Compare-and-swap failure: the record moved since the caller read it
    #[error("expected status '{expected}' but record is '{actual}'")]
    StaleStatus {
        expected: TransactionStatus,
        actual: TransactionStatus,
    },

    /// Role is not permitted to perform the action
    #[error("role '{role}' may not perform '{action}'")]
    NotAuthorized { role: Role, action: &'static str },

    /// Creator-only action attempted by a different cashier
    #[error("only the creating cashier may act on this transaction")]
    NotOwner,

    /// Referenced transaction ID does not exist
    #[error("transaction not found")]
    TransactionNotFound,

    /// Referenced declaration ID does not exist
    #[error("cash declaration not found")]
    DeclarationNotFound,

    /// Referenced receipt number does not exist
    #[error("receipt not found")]
    ReceiptNotFound,

    /// Duplicate transaction ID
    #[error("duplicate transaction ID")]
    DuplicateTransaction,

    /// Duplicate declaration ID
    #[error("duplicate declaration ID")]
    DuplicateDeclaration,

    /// Duplicate receipt number
    #[error("duplicate receipt number")]
    DuplicateReceipt,

    /// Requested declaration status is not reachable from the current one
    #[error("no declaration transition from '{from}' to '{to}'")]
    InvalidDeclarationTransition {
        from: DeclarationStatus,
        to: DeclarationStatus,
    },

    /// Declaration edits are only allowed before submission
    #[error("declaration can only be edited while pending or corrected")]
    DeclarationNotEditable,

    /// Referenced expense ID does not exist
    #[error("expense not found")]
    ExpenseNotFound,

    /// Duplicate expense ID
    #[error("duplicate expense ID")]
    DuplicateExpense,

    /// Requested expense status is not reachable from the current one
    #[error("no expense transition from '{from}' to '{to}'")]
    InvalidExpenseTransition {
        from: ExpenseStatus,
        to: ExpenseStatus,
    },

    /// Real EUR amount is missing, non-numeric, or non-positive
    #[error("real EUR amount must be a positive number")]
    InvalidRealAmount,

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Rejection requires a non-empty reason
    #[error("a rejection reason is required")]
    MissingRejectionReason,

    /// The action requires a non-empty comment
    #[error("a comment is required")]
    MissingComment,

    /// Execution requires a receipt file
    #[error("a receipt file is required")]
    MissingReceipt,

    /// Receipt upload exceeds the size limit
    #[error("receipt file exceeds the 10 MiB limit")]
    ReceiptTooLarge,

    /// Receipt upload has an unsupported file extension
    #[error("unsupported receipt file type '.{extension}'")]
    UnsupportedReceiptType { extension: String },

    /// Exchange rate must be strictly positive
    #[error("exchange rate must be positive")]
    InvalidRate,
}
