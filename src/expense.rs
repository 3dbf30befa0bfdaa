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

//! Petty-cash expense reviews.
//!
//! Expenses are a thin sibling of the transaction lifecycle: a teller
//! records one, and an accountant or director settles it with the same
//! generic status-update shape the transaction endpoint uses
//! (`{ id, status, rejection_reason? }`). Only `Pending` records move.

use crate::base::{Actor, ExpenseId, Role};
use crate::error::WorkflowError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Review status of an expense. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExpenseStatus::Approved | ExpenseStatus::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded petty-cash expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub label: String,
    pub amount: Decimal,
    pub requested_by: String,
    pub status: ExpenseStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload supplied by the teller at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub id: ExpenseId,
    pub label: String,
    pub amount: Decimal,
}

/// Store and review gate for petty-cash expenses.
pub struct ExpenseBook {
    expenses: DashMap<ExpenseId, Expense>,
}

impl ExpenseBook {
    pub fn new() -> Self {
        ExpenseBook {
            expenses: DashMap::new(),
        }
    }

    /// Records a pending expense, owned by the acting teller.
    pub fn create(&self, draft: ExpenseDraft, actor: &Actor) -> Result<Expense, WorkflowError> {
        if actor.role != Role::Cashier {
            return Err(WorkflowError::NotAuthorized {
                role: actor.role,
                action: "create_expense",
            });
        }
        if draft.amount <= Decimal::ZERO {
            return Err(WorkflowError::InvalidAmount);
        }

        let expense = Expense {
            id: draft.id,
            label: draft.label,
            amount: draft.amount,
            requested_by: actor.name.clone(),
            status: ExpenseStatus::Pending,
            rejection_reason: None,
            created_at: Utc::now(),
        };

        match self.expenses.entry(expense.id.clone()) {
            Entry::Occupied(_) => Err(WorkflowError::DuplicateExpense),
            Entry::Vacant(entry) => {
                entry.insert(expense.clone());
                tracing::info!(id = %expense.id, requested_by = %expense.requested_by, "expense recorded");
                Ok(expense)
            }
        }
    }

    /// Settles a pending expense. Rejection requires a non-empty reason;
    /// the status guard runs under the entry lock, so two concurrent
    /// reviews of the same expense cannot both apply.
    pub fn set_status(
        &self,
        id: &ExpenseId,
        actor: &Actor,
        target: ExpenseStatus,
        reason: Option<&str>,
    ) -> Result<Expense, WorkflowError> {
        if !matches!(actor.role, Role::Accountant | Role::Director) {
            return Err(WorkflowError::NotAuthorized {
                role: actor.role,
                action: "review_expense",
            });
        }
        if target == ExpenseStatus::Rejected
            && reason.is_none_or(|r| r.trim().is_empty())
        {
            return Err(WorkflowError::MissingRejectionReason);
        }

        let mut expense = self
            .expenses
            .get_mut(id)
            .ok_or(WorkflowError::ExpenseNotFound)?;
        if expense.status != ExpenseStatus::Pending || !target.is_terminal() {
            return Err(WorkflowError::InvalidExpenseTransition {
                from: expense.status,
                to: target,
            });
        }

        expense.status = target;
        expense.rejection_reason = match target {
            ExpenseStatus::Rejected => reason.map(|r| r.trim().to_string()),
            _ => None,
        };
        tracing::info!(id = %expense.id, status = %expense.status, "expense reviewed");
        Ok(expense.clone())
    }

    pub fn get(&self, id: &ExpenseId) -> Option<Expense> {
        self.expenses.get(id).map(|e| e.clone())
    }

    /// Expenses matching the optional status filter, newest first.
    pub fn list(&self, status: Option<ExpenseStatus>) -> Vec<Expense> {
        let mut found: Vec<Expense> = self
            .expenses
            .iter()
            .filter(|e| status.is_none_or(|s| e.status == s))
            .map(|e| e.clone())
            .collect();
        found.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        found
    }

    pub fn len(&self) -> usize {
        self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }
}

impl Default for ExpenseBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn teller() -> Actor {
        Actor::new("alice", Role::Cashier)
    }

    fn director() -> Actor {
        Actor::new("paul", Role::Director)
    }

    fn book() -> ExpenseBook {
        ExpenseBook::new()
    }

    fn draft(id: &str) -> ExpenseDraft {
        ExpenseDraft {
            id: ExpenseId::from(id),
            label: "fournitures bureau".to_string(),
            amount: dec!(15000),
        }
    }

    #[test]
    fn approval_settles_a_pending_expense() {
        let book = book();
        book.create(draft("exp-1"), &teller()).unwrap();

        let approved = book
            .set_status(&ExpenseId::from("exp-1"), &director(), ExpenseStatus::Approved, None)
            .unwrap();
        assert_eq!(approved.status, ExpenseStatus::Approved);
        assert!(approved.rejection_reason.is_none());
    }

    #[test]
    fn rejection_requires_a_reason() {
        let book = book();
        book.create(draft("exp-1"), &teller()).unwrap();
        let id = ExpenseId::from("exp-1");

        assert_eq!(
            book.set_status(&id, &director(), ExpenseStatus::Rejected, Some("  ")),
            Err(WorkflowError::MissingRejectionReason)
        );
        let rejected = book
            .set_status(&id, &director(), ExpenseStatus::Rejected, Some("hors budget"))
            .unwrap();
        assert_eq!(rejected.rejection_reason.as_deref(), Some("hors budget"));
    }

    #[test]
    fn settled_expenses_are_frozen() {
        let book = book();
        book.create(draft("exp-1"), &teller()).unwrap();
        let id = ExpenseId::from("exp-1");
        book.set_status(&id, &director(), ExpenseStatus::Approved, None)
            .unwrap();

        assert_eq!(
            book.set_status(&id, &director(), ExpenseStatus::Rejected, Some("trop tard")),
            Err(WorkflowError::InvalidExpenseTransition {
                from: ExpenseStatus::Approved,
                to: ExpenseStatus::Rejected,
            })
        );
    }

    #[test]
    fn pending_is_not_a_review_target() {
        let book = book();
        book.create(draft("exp-1"), &teller()).unwrap();

        assert_eq!(
            book.set_status(
                &ExpenseId::from("exp-1"),
                &director(),
                ExpenseStatus::Pending,
                None,
            ),
            Err(WorkflowError::InvalidExpenseTransition {
                from: ExpenseStatus::Pending,
                to: ExpenseStatus::Pending,
            })
        );
    }

    #[test]
    fn only_accountant_or_director_reviews() {
        let book = book();
        book.create(draft("exp-1"), &teller()).unwrap();

        assert!(matches!(
            book.set_status(
                &ExpenseId::from("exp-1"),
                &teller(),
                ExpenseStatus::Approved,
                None,
            ),
            Err(WorkflowError::NotAuthorized { .. })
        ));

        let accountant = Actor::new("diane", Role::Accountant);
        assert!(
            book.set_status(
                &ExpenseId::from("exp-1"),
                &accountant,
                ExpenseStatus::Approved,
                None,
            )
            .is_ok()
        );
    }

    #[test]
    fn duplicate_and_invalid_drafts_are_refused() {
        let book = book();
        book.create(draft("exp-1"), &teller()).unwrap();

        assert_eq!(
            book.create(draft("exp-1"), &teller()),
            Err(WorkflowError::DuplicateExpense)
        );

        let mut zero = draft("exp-2");
        zero.amount = dec!(0);
        assert_eq!(book.create(zero, &teller()), Err(WorkflowError::InvalidAmount));
    }

    #[test]
    fn list_filters_by_status() {
        let book = book();
        book.create(draft("exp-1"), &teller()).unwrap();
        book.create(draft("exp-2"), &teller()).unwrap();
        book.set_status(&ExpenseId::from("exp-2"), &director(), ExpenseStatus::Approved, None)
            .unwrap();

        assert_eq!(book.list(None).len(), 2);
        let pending = book.list(Some(ExpenseStatus::Pending));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, ExpenseId::from("exp-1"));
    }
}
