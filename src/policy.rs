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

//! Central authorization table.
//!
//! One table maps (role, current status) → allowed actions; every entry
//! point consults it so no caller can expose an action the store would
//! refuse. Ownership checks (creator-only actions) are enforced by the
//! engine on top of this table.

use crate::base::Role;
use crate::transaction::TransactionStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Actions a role may request on a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionAction {
    Validate,
    Reject,
    Execute,
    Complete,
    RequestDelete,
    ApproveDelete,
}

impl TransactionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionAction::Validate => "validate",
            TransactionAction::Reject => "reject",
            TransactionAction::Execute => "execute",
            TransactionAction::Complete => "complete",
            TransactionAction::RequestDelete => "request_delete",
            TransactionAction::ApproveDelete => "approve_delete",
        }
    }

    /// Whether the action is restricted to the transaction's creator.
    pub fn creator_only(&self) -> bool {
        matches!(
            self,
            TransactionAction::Complete | TransactionAction::RequestDelete
        )
    }
}

impl fmt::Display for TransactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true when `role` may apply `action` to a transaction currently
/// in `status`.
pub fn allowed(role: Role, status: TransactionStatus, action: TransactionAction) -> bool {
    use Role::*;
    use TransactionAction::*;
    use TransactionStatus::*;

    matches!(
        (status, action, role),
        (Pending, Validate, Auditor)
            | (Pending, Reject, Auditor)
            | (Validated, Execute, Executor | Auditor)
            | (Validated, Complete, Cashier)
            | (Executed, Complete, Cashier)
            | (Completed, RequestDelete, Cashier)
            | (PendingDelete, ApproveDelete, Accountant | Director)
    )
}

/// Returns true when `action` is admissible in `status` for any role.
///
/// Distinguishes "wrong state" from "wrong role" in error reporting.
pub fn action_possible(status: TransactionStatus, action: TransactionAction) -> bool {
    use Role::*;
    [Cashier, Auditor, Executor, Accountant, Director, CashManager]
        .into_iter()
        .any(|role| allowed(role, status, action))
}

/// Action implied by a requested target status on the generic
/// status-update entry point. Validation is excluded: it requires the real
/// EUR amount and goes through its own operation.
pub fn action_for_target(target: TransactionStatus) -> Option<TransactionAction> {
    match target {
        TransactionStatus::Rejected => Some(TransactionAction::Reject),
        TransactionStatus::Completed => Some(TransactionAction::Complete),
        TransactionStatus::PendingDelete => Some(TransactionAction::RequestDelete),
        TransactionStatus::Executed => Some(TransactionAction::Execute),
        TransactionStatus::Pending | TransactionStatus::Validated => None,
    }
}
