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

//! Transaction workflow engine.
//!
//! The [`Engine`] is the sole arbiter of the transaction lifecycle. Every
//! mutation is a single-record conditional update: the status and role
//! guards run while the record's map entry is locked, so two concurrent
//! "validate" clicks cannot both apply a commission.
//!
//! # Invariants
//!
//! - Status moves only along the edges in [`TransactionStatus::can_transition_to`].
//! - `real_amount_eur` and `commission_amount` are written together, once,
//!   at validation; a reject clears both.
//! - Records leave the store only through [`Engine::approve_delete`].

use crate::base::{Actor, Role, TransactionId};
use crate::commission::{CommissionConfig, RateBoard, validation_commission};
use crate::error::WorkflowError;
use crate::events::{Event, EventBus};
use crate::policy::{self, TransactionAction};
use crate::receipt::ReceiptUpload;
use crate::transaction::{Transaction, TransactionDraft, TransactionKind, TransactionStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Filter and pagination for transaction list views.
///
/// Mirrors the query parameters of the list endpoint; `page` is 1-based.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub cashier: Option<String>,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl TransactionFilter {
    fn matches(&self, tx: &Transaction) -> bool {
        if self.status.is_some_and(|s| tx.status != s) {
            return false;
        }
        if self.kind.is_some_and(|k| tx.kind != k) {
            return false;
        }
        if self.cashier.as_deref().is_some_and(|c| tx.created_by != c) {
            return false;
        }
        if self.agency.as_deref().is_some_and(|a| tx.agency != a) {
            return false;
        }
        if self.from.is_some_and(|from| tx.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| tx.created_at > to) {
            return false;
        }
        if let Some(search) = self.search.as_deref() {
            let needle = search.to_lowercase();
            if !needle.is_empty() {
                let haystack = [
                    tx.id.0.as_str(),
                    tx.created_by.as_str(),
                    tx.agency.as_str(),
                    tx.currency.as_str(),
                ];
                if !haystack.iter().any(|h| h.to_lowercase().contains(&needle)) {
                    return false;
                }
            }
        }
        true
    }
}

/// One page of a filtered list, plus the total match count before paging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    pub data: Vec<Transaction>,
    pub total: usize,
}

/// Outcome of a bulk completion: N independent conditional updates, never
/// an atomic batch. Partial failure leaves completed records completed.
#[derive(Debug, Clone)]
pub struct BulkCompletion {
    pub completed: Vec<TransactionId>,
    pub failed: Vec<(TransactionId, WorkflowError)>,
}

impl BulkCompletion {
    pub fn is_full_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// Transaction workflow engine over a concurrent record store.
pub struct Engine {
    /// Transactions indexed by ID.
    transactions: DashMap<TransactionId, Transaction>,
    rates: Arc<RateBoard>,
    config: CommissionConfig,
    bus: Arc<EventBus>,
}

impl Engine {
    pub fn new(rates: Arc<RateBoard>, config: CommissionConfig, bus: Arc<EventBus>) -> Self {
        Engine {
            transactions: DashMap::new(),
            rates,
            config,
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn rates(&self) -> &RateBoard {
        &self.rates
    }

    pub fn config(&self) -> &CommissionConfig {
        &self.config
    }

    /// Creates a `Pending` transaction owned by the acting teller.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::NotAuthorized`] - actor is not a cashier.
    /// - [`WorkflowError::InvalidAmount`] - non-positive amount.
    /// - [`WorkflowError::DuplicateTransaction`] - id already exists.
    pub fn create(
        &self,
        draft: TransactionDraft,
        actor: &Actor,
    ) -> Result<Transaction, WorkflowError> {
        if actor.role != Role::Cashier {
            return Err(WorkflowError::NotAuthorized {
                role: actor.role,
                action: "create",
            });
        }
        if draft.amount <= Decimal::ZERO {
            return Err(WorkflowError::InvalidAmount);
        }

        let tx = Transaction::from_draft(draft, actor.name.clone(), Utc::now());
        let created = match self.transactions.entry(tx.id.clone()) {
            Entry::Occupied(_) => return Err(WorkflowError::DuplicateTransaction),
            Entry::Vacant(entry) => {
                entry.insert(tx.clone());
                tx
            }
        };

        info!(id = %created.id, kind = %created.kind, "transaction created");
        self.bus.publish(Event::TransactionCreated {
            id: created.id.clone(),
            kind: created.kind,
        });
        Ok(created)
    }

    /// Auditor validation: `Pending` → `Validated`.
    ///
    /// Requires a positive real EUR amount; the commission is computed from
    /// it at the currently published rate and stored alongside, exactly
    /// once. The amount gate runs before the store is touched.
    pub fn validate(
        &self,
        id: &TransactionId,
        actor: &Actor,
        real_amount_eur: Decimal,
    ) -> Result<Transaction, WorkflowError> {
        if real_amount_eur <= Decimal::ZERO {
            return Err(WorkflowError::InvalidRealAmount);
        }
        let commission = validation_commission(
            real_amount_eur,
            self.rates.current(),
            self.config.validation_pct,
        )?;

        let validated = {
            let mut tx = self
                .transactions
                .get_mut(id)
                .ok_or(WorkflowError::TransactionNotFound)?;
            self.authorize(&tx, actor, TransactionAction::Validate)?;

            tx.status = TransactionStatus::Validated;
            tx.real_amount_eur = Some(real_amount_eur);
            tx.commission_amount = Some(commission);
            tx.validated_by = Some(actor.name.clone());
            tx.clone()
        };

        info!(id = %id, commission = %commission, "transaction validated");
        self.publish_status(vec![validated.id.clone()], validated.status);
        Ok(validated)
    }

    /// Auditor rejection: `Pending` → `Rejected`. Requires a non-empty
    /// reason; clears any validation data.
    pub fn reject(
        &self,
        id: &TransactionId,
        actor: &Actor,
        reason: &str,
    ) -> Result<Transaction, WorkflowError> {
        if reason.trim().is_empty() {
            return Err(WorkflowError::MissingRejectionReason);
        }

        let rejected = {
            let mut tx = self
                .transactions
                .get_mut(id)
                .ok_or(WorkflowError::TransactionNotFound)?;
            self.authorize(&tx, actor, TransactionAction::Reject)?;

            tx.status = TransactionStatus::Rejected;
            tx.rejection_reason = Some(reason.trim().to_string());
            tx.real_amount_eur = None;
            tx.commission_amount = None;
            tx.validated_by = None;
            tx.clone()
        };

        info!(id = %id, "transaction rejected");
        self.publish_status(vec![rejected.id.clone()], rejected.status);
        Ok(rejected)
    }

    /// Execution with proof: `Validated` → `Executed`.
    ///
    /// The receipt upload is checked before the store is touched; on
    /// success the receipt URL, executor comment, and execution time are
    /// recorded.
    pub fn execute(
        &self,
        id: &TransactionId,
        actor: &Actor,
        receipt: &ReceiptUpload,
        comment: Option<String>,
    ) -> Result<Transaction, WorkflowError> {
        receipt.check()?;

        let executed = {
            let mut tx = self
                .transactions
                .get_mut(id)
                .ok_or(WorkflowError::TransactionNotFound)?;
            self.authorize(&tx, actor, TransactionAction::Execute)?;

            tx.status = TransactionStatus::Executed;
            tx.receipt_url = Some(format!("/uploads/receipts/{}", receipt.file_name));
            tx.executor_comment = comment.filter(|c| !c.trim().is_empty());
            tx.executed_at = Some(Utc::now());
            tx.clone()
        };

        info!(id = %id, "transaction executed");
        self.publish_status(vec![executed.id.clone()], executed.status);
        Ok(executed)
    }

    /// Creator cashier closes the transaction:
    /// `Validated`/`Executed` → `Completed`.
    pub fn complete(
        &self,
        id: &TransactionId,
        actor: &Actor,
    ) -> Result<Transaction, WorkflowError> {
        let completed = self.apply_complete(id, actor)?;
        self.publish_status(vec![completed.id.clone()], completed.status);
        Ok(completed)
    }

    /// Creator cashier asks for deletion: `Completed` → `PendingDelete`.
    pub fn request_delete(
        &self,
        id: &TransactionId,
        actor: &Actor,
    ) -> Result<Transaction, WorkflowError> {
        let pending_delete = {
            let mut tx = self
                .transactions
                .get_mut(id)
                .ok_or(WorkflowError::TransactionNotFound)?;
            self.authorize(&tx, actor, TransactionAction::RequestDelete)?;

            tx.status = TransactionStatus::PendingDelete;
            tx.clone()
        };

        info!(id = %id, "deletion requested");
        self.publish_status(vec![pending_delete.id.clone()], pending_delete.status);
        Ok(pending_delete)
    }

    /// Accountant or director approves the deletion and removes the record.
    ///
    /// This is the only path out of the store. The check-and-remove runs
    /// under the entry lock, so exactly one approval wins.
    pub fn approve_delete(
        &self,
        id: &TransactionId,
        actor: &Actor,
    ) -> Result<Transaction, WorkflowError> {
        let removed = match self.transactions.entry(id.clone()) {
            Entry::Vacant(_) => return Err(WorkflowError::TransactionNotFound),
            Entry::Occupied(entry) => {
                self.authorize(entry.get(), actor, TransactionAction::ApproveDelete)?;
                entry.remove()
            }
        };

        info!(id = %id, approved_by = %actor.name, "transaction deleted");
        self.publish_status(vec![removed.id.clone()], removed.status);
        Ok(removed)
    }

    /// Generic status update, the `PUT /api/transactions` entry point.
    ///
    /// Supports reject, completion, execution, and delete requests;
    /// validation must go through [`Engine::validate`] because it needs the
    /// real EUR amount. When `expected` is given, the call fails with
    /// [`WorkflowError::StaleStatus`] if the record has moved since the
    /// caller read it.
    pub fn transition(
        &self,
        id: &TransactionId,
        expected: Option<TransactionStatus>,
        target: TransactionStatus,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<Transaction, WorkflowError> {
        let current = self.status_of(id)?;
        if let Some(expected) = expected {
            if current != expected {
                return Err(WorkflowError::StaleStatus {
                    expected,
                    actual: current,
                });
            }
        }

        // The action itself revalidates status under the entry lock; this
        // match only routes to the right operation.
        match policy::action_for_target(target) {
            Some(TransactionAction::Reject) => self.reject(id, actor, reason.unwrap_or_default()),
            Some(TransactionAction::Complete) => self.complete(id, actor),
            Some(TransactionAction::RequestDelete) => self.request_delete(id, actor),
            // Execution needs a receipt upload; the generic endpoint has none.
            Some(_) | None => Err(WorkflowError::InvalidTransition {
                from: current,
                to: target,
            }),
        }
    }

    /// Closes every `Validated` or `Executed` transaction owned by the
    /// acting cashier.
    ///
    /// Explicitly non-atomic: each record is completed with its own
    /// conditional update, and a failure on one leaves the others
    /// untouched. One status event carries every completed id.
    pub fn complete_all(&self, actor: &Actor) -> Result<BulkCompletion, WorkflowError> {
        if actor.role != Role::Cashier {
            return Err(WorkflowError::NotAuthorized {
                role: actor.role,
                action: "complete_all",
            });
        }

        // Snapshot first; each completion re-checks status under its own
        // entry lock, so records that moved in between simply fail.
        let ids: Vec<TransactionId> = self
            .transactions
            .iter()
            .filter(|tx| {
                matches!(
                    tx.status,
                    TransactionStatus::Validated | TransactionStatus::Executed
                ) && tx.created_by == actor.name
            })
            .map(|tx| tx.id.clone())
            .collect();

        let mut outcome = BulkCompletion {
            completed: Vec::with_capacity(ids.len()),
            failed: Vec::new(),
        };
        for id in ids {
            match self.apply_complete(&id, actor) {
                Ok(_) => outcome.completed.push(id),
                Err(e) => outcome.failed.push((id, e)),
            }
        }

        info!(
            completed = outcome.completed.len(),
            failed = outcome.failed.len(),
            cashier = %actor.name,
            "bulk completion finished"
        );
        if !outcome.completed.is_empty() {
            self.publish_status(outcome.completed.clone(), TransactionStatus::Completed);
        }
        Ok(outcome)
    }

    pub fn get(&self, id: &TransactionId) -> Option<Transaction> {
        self.transactions.get(id).map(|tx| tx.clone())
    }

    /// One page of the filtered list, newest first. `total` counts every
    /// match before paging.
    pub fn list(&self, filter: &TransactionFilter) -> TransactionPage {
        let mut matched: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|tx| filter.matches(tx))
            .map(|tx| tx.clone())
            .collect();
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });

        let total = matched.len();
        let data = match filter.limit {
            Some(limit) => {
                // Saturating: an out-of-range page is an empty page, not
                // an overflow.
                let page = filter.page.unwrap_or(1).max(1);
                matched
                    .into_iter()
                    .skip(page.saturating_sub(1).saturating_mul(limit))
                    .take(limit)
                    .collect()
            }
            None => matched,
        };
        TransactionPage { data, total }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Completion without the status event, shared by the single and bulk
    /// paths.
    fn apply_complete(
        &self,
        id: &TransactionId,
        actor: &Actor,
    ) -> Result<Transaction, WorkflowError> {
        let mut tx = self
            .transactions
            .get_mut(id)
            .ok_or(WorkflowError::TransactionNotFound)?;
        self.authorize(&tx, actor, TransactionAction::Complete)?;

        tx.status = TransactionStatus::Completed;
        Ok(tx.clone())
    }

    /// Policy and ownership gate, run while the caller holds the record's
    /// entry lock.
    fn authorize(
        &self,
        tx: &Transaction,
        actor: &Actor,
        action: TransactionAction,
    ) -> Result<(), WorkflowError> {
        if !policy::action_possible(tx.status, action) {
            return Err(WorkflowError::ActionNotAvailable {
                status: tx.status,
                action,
            });
        }
        if !policy::allowed(actor.role, tx.status, action) {
            return Err(WorkflowError::NotAuthorized {
                role: actor.role,
                action: action.as_str(),
            });
        }
        if action.creator_only() && tx.created_by != actor.name {
            return Err(WorkflowError::NotOwner);
        }
        Ok(())
    }

    fn publish_status(&self, ids: Vec<TransactionId>, status: TransactionStatus) {
        self.bus
            .publish(Event::TransactionStatusChanged { ids, status });
    }

    fn status_of(&self, id: &TransactionId) -> Result<TransactionStatus, WorkflowError> {
        self.transactions
            .get(id)
            .map(|tx| tx.status)
            .ok_or(WorkflowError::TransactionNotFound)
    }
}
