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

//! End-of-day cash declarations (arrêtés de caisse).
//!
//! Declarations follow their own state machine, independent of the
//! transaction lifecycle:
//! - [`Pending`] → [`Submitted`] (owning teller)
//! - [`Submitted`] → [`Validated`] or [`Rejected`] (cash manager, terminal)
//! - [`Submitted`] → [`Corrected`] (cash manager), then the teller edits
//!   and resubmits, looping back through [`Submitted`]
//!
//! [`Pending`]: DeclarationStatus::Pending
//! [`Submitted`]: DeclarationStatus::Submitted
//! [`Validated`]: DeclarationStatus::Validated
//! [`Rejected`]: DeclarationStatus::Rejected
//! [`Corrected`]: DeclarationStatus::Corrected

use crate::base::{Actor, DeclarationId, Role};
use crate::error::WorkflowError;
use crate::events::{Event, EventBus};
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Lifecycle status of a cash declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationStatus {
    Pending,
    Submitted,
    Corrected,
    Validated,
    Rejected,
}

impl DeclarationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationStatus::Pending => "pending",
            DeclarationStatus::Submitted => "submitted",
            DeclarationStatus::Corrected => "corrected",
            DeclarationStatus::Validated => "validated",
            DeclarationStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeclarationStatus::Validated | DeclarationStatus::Rejected
        )
    }
}

impl fmt::Display for DeclarationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted cash declaration.
///
/// The net amount is always derived from `montant_brut − total_delestage`;
/// it is never stored, only computed on read.
#[derive(Debug, Clone, PartialEq)]
pub struct CashDeclaration {
    pub id: DeclarationId,
    pub guichetier: String,
    pub declaration_date: NaiveDate,
    pub montant_brut: Decimal,
    pub total_delestage: Decimal,
    pub delestage_comment: Option<String>,
    pub justificatif_file_path: Option<String>,
    pub status: DeclarationStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub validated_by: Option<String>,
    pub validated_at: Option<DateTime<Utc>>,
    pub rejection_comment: Option<String>,
    pub validation_comment: Option<String>,
}

impl CashDeclaration {
    /// Net amount owed by the teller.
    pub fn montant_net(&self) -> Decimal {
        self.montant_brut - self.total_delestage
    }
}

// Serialization always includes the derived net amount so readers never
// recompute it from a possibly stale stored copy.
impl Serialize for CashDeclaration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("CashDeclaration", 14)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("guichetier", &self.guichetier)?;
        state.serialize_field("declaration_date", &self.declaration_date)?;
        state.serialize_field("montant_brut", &self.montant_brut)?;
        state.serialize_field("total_delestage", &self.total_delestage)?;
        state.serialize_field("montant_net", &self.montant_net())?;
        state.serialize_field("delestage_comment", &self.delestage_comment)?;
        state.serialize_field("justificatif_file_path", &self.justificatif_file_path)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("submitted_at", &self.submitted_at)?;
        state.serialize_field("validated_by", &self.validated_by)?;
        state.serialize_field("validated_at", &self.validated_at)?;
        state.serialize_field("rejection_comment", &self.rejection_comment)?;
        state.serialize_field("validation_comment", &self.validation_comment)?;
        state.end()
    }
}

/// Payload supplied by the teller at creation time.
///
/// The owning guichetier is the acting teller, not a payload field.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct DeclarationDraft {
    pub id: DeclarationId,
    pub declaration_date: NaiveDate,
    pub montant_brut: Decimal,
    pub total_delestage: Decimal,
    #[serde(default)]
    pub delestage_comment: Option<String>,
    #[serde(default)]
    pub justificatif_file_path: Option<String>,
}

/// Partial edit applied while a declaration is pending or corrected.
#[derive(Debug, Clone, Default, serde::Serialize, Deserialize)]
pub struct DeclarationUpdate {
    #[serde(default)]
    pub montant_brut: Option<Decimal>,
    #[serde(default)]
    pub total_delestage: Option<Decimal>,
    #[serde(default)]
    pub delestage_comment: Option<String>,
    #[serde(default)]
    pub justificatif_file_path: Option<String>,
}

/// Per-status counts and validated totals, for the stats view.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct DeclarationStats {
    pub pending: usize,
    pub submitted: usize,
    pub corrected: usize,
    pub validated: usize,
    pub rejected: usize,
    /// Sum of net amounts over validated declarations.
    pub total_net_validated: Decimal,
}

/// Store and state machine for cash declarations.
///
/// Every mutation is a single-record conditional update: the status guard
/// runs under the map entry lock, so two concurrent cash-manager actions on
/// the same declaration cannot both apply.
pub struct DeclarationBook {
    declarations: DashMap<DeclarationId, CashDeclaration>,
    bus: Arc<EventBus>,
}

impl DeclarationBook {
    pub fn new(bus: Arc<EventBus>) -> Self {
        DeclarationBook {
            declarations: DashMap::new(),
            bus,
        }
    }

    /// Creates a declaration in `Pending`, owned by the acting teller.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::NotAuthorized`] - actor is not a cashier.
    /// - [`WorkflowError::InvalidAmount`] - negative gross or delestage.
    /// - [`WorkflowError::DuplicateDeclaration`] - id already exists.
    pub fn create(
        &self,
        draft: DeclarationDraft,
        actor: &Actor,
    ) -> Result<CashDeclaration, WorkflowError> {
        if actor.role != Role::Cashier {
            return Err(WorkflowError::NotAuthorized {
                role: actor.role,
                action: "create_declaration",
            });
        }
        if draft.montant_brut < Decimal::ZERO || draft.total_delestage < Decimal::ZERO {
            return Err(WorkflowError::InvalidAmount);
        }

        let declaration = CashDeclaration {
            id: draft.id,
            guichetier: actor.name.clone(),
            declaration_date: draft.declaration_date,
            montant_brut: draft.montant_brut,
            total_delestage: draft.total_delestage,
            delestage_comment: draft.delestage_comment,
            justificatif_file_path: draft.justificatif_file_path,
            status: DeclarationStatus::Pending,
            submitted_at: None,
            validated_by: None,
            validated_at: None,
            rejection_comment: None,
            validation_comment: None,
        };

        match self.declarations.entry(declaration.id.clone()) {
            Entry::Occupied(_) => Err(WorkflowError::DuplicateDeclaration),
            Entry::Vacant(entry) => {
                entry.insert(declaration.clone());
                tracing::info!(id = %declaration.id, guichetier = %declaration.guichetier, "cash declaration created");
                Ok(declaration)
            }
        }
    }

    /// Applies a teller edit. Only the owner may edit, and only while the
    /// declaration is `Pending` or `Corrected`.
    pub fn update(
        &self,
        id: &DeclarationId,
        actor: &Actor,
        update: DeclarationUpdate,
    ) -> Result<CashDeclaration, WorkflowError> {
        let mut declaration = self
            .declarations
            .get_mut(id)
            .ok_or(WorkflowError::DeclarationNotFound)?;

        self.check_owner(&declaration, actor)?;
        if !matches!(
            declaration.status,
            DeclarationStatus::Pending | DeclarationStatus::Corrected
        ) {
            return Err(WorkflowError::DeclarationNotEditable);
        }

        if let Some(brut) = update.montant_brut {
            if brut < Decimal::ZERO {
                return Err(WorkflowError::InvalidAmount);
            }
            declaration.montant_brut = brut;
        }
        if let Some(delestage) = update.total_delestage {
            if delestage < Decimal::ZERO {
                return Err(WorkflowError::InvalidAmount);
            }
            declaration.total_delestage = delestage;
        }
        if let Some(comment) = update.delestage_comment {
            declaration.delestage_comment = Some(comment);
        }
        if let Some(path) = update.justificatif_file_path {
            declaration.justificatif_file_path = Some(path);
        }

        Ok(declaration.clone())
    }

    /// Teller submits for review: `Pending`/`Corrected` → `Submitted`.
    pub fn submit(
        &self,
        id: &DeclarationId,
        actor: &Actor,
    ) -> Result<CashDeclaration, WorkflowError> {
        let submitted = {
            let mut declaration = self
                .declarations
                .get_mut(id)
                .ok_or(WorkflowError::DeclarationNotFound)?;

            self.check_owner(&declaration, actor)?;
            if !matches!(
                declaration.status,
                DeclarationStatus::Pending | DeclarationStatus::Corrected
            ) {
                return Err(WorkflowError::InvalidDeclarationTransition {
                    from: declaration.status,
                    to: DeclarationStatus::Submitted,
                });
            }

            declaration.status = DeclarationStatus::Submitted;
            declaration.submitted_at = Some(Utc::now());
            declaration.clone()
        };

        self.publish_status(&submitted);
        Ok(submitted)
    }

    /// Cash manager validates: `Submitted` → `Validated` (terminal).
    pub fn validate(
        &self,
        id: &DeclarationId,
        actor: &Actor,
        comment: Option<String>,
    ) -> Result<CashDeclaration, WorkflowError> {
        let validated = {
            let mut declaration =
                self.manager_transition(id, actor, DeclarationStatus::Validated)?;
            declaration.status = DeclarationStatus::Validated;
            declaration.validated_by = Some(actor.name.clone());
            declaration.validated_at = Some(Utc::now());
            declaration.validation_comment = comment.filter(|c| !c.trim().is_empty());
            declaration.clone()
        };

        self.publish_status(&validated);
        Ok(validated)
    }

    /// Cash manager rejects: `Submitted` → `Rejected` (terminal).
    /// A non-empty comment is required.
    pub fn reject(
        &self,
        id: &DeclarationId,
        actor: &Actor,
        comment: &str,
    ) -> Result<CashDeclaration, WorkflowError> {
        if comment.trim().is_empty() {
            return Err(WorkflowError::MissingComment);
        }

        let rejected = {
            let mut declaration =
                self.manager_transition(id, actor, DeclarationStatus::Rejected)?;
            declaration.status = DeclarationStatus::Rejected;
            declaration.rejection_comment = Some(comment.trim().to_string());
            declaration.clone()
        };

        self.publish_status(&rejected);
        Ok(rejected)
    }

    /// Cash manager sends the declaration back: `Submitted` → `Corrected`.
    /// The note telling the teller what to fix lands in `rejection_comment`.
    pub fn request_correction(
        &self,
        id: &DeclarationId,
        actor: &Actor,
        comment: Option<String>,
    ) -> Result<CashDeclaration, WorkflowError> {
        let corrected = {
            let mut declaration =
                self.manager_transition(id, actor, DeclarationStatus::Corrected)?;
            declaration.status = DeclarationStatus::Corrected;
            if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
                declaration.rejection_comment = Some(comment);
            }
            declaration.clone()
        };

        self.publish_status(&corrected);
        Ok(corrected)
    }

    pub fn get(&self, id: &DeclarationId) -> Option<CashDeclaration> {
        self.declarations.get(id).map(|d| d.clone())
    }

    /// Declarations matching the optional status and owner filters, newest
    /// declaration date first.
    pub fn list(
        &self,
        status: Option<DeclarationStatus>,
        guichetier: Option<&str>,
    ) -> Vec<CashDeclaration> {
        let mut found: Vec<CashDeclaration> = self
            .declarations
            .iter()
            .filter(|d| status.is_none_or(|s| d.status == s))
            .filter(|d| guichetier.is_none_or(|g| d.guichetier == g))
            .map(|d| d.clone())
            .collect();
        found.sort_by(|a, b| {
            b.declaration_date
                .cmp(&a.declaration_date)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        found
    }

    pub fn stats(&self) -> DeclarationStats {
        let mut stats = DeclarationStats {
            pending: 0,
            submitted: 0,
            corrected: 0,
            validated: 0,
            rejected: 0,
            total_net_validated: Decimal::ZERO,
        };
        for declaration in self.declarations.iter() {
            match declaration.status {
                DeclarationStatus::Pending => stats.pending += 1,
                DeclarationStatus::Submitted => stats.submitted += 1,
                DeclarationStatus::Corrected => stats.corrected += 1,
                DeclarationStatus::Validated => {
                    stats.validated += 1;
                    stats.total_net_validated += declaration.montant_net();
                }
                DeclarationStatus::Rejected => stats.rejected += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    fn check_owner(
        &self,
        declaration: &CashDeclaration,
        actor: &Actor,
    ) -> Result<(), WorkflowError> {
        if actor.role != Role::Cashier {
            return Err(WorkflowError::NotAuthorized {
                role: actor.role,
                action: "edit_declaration",
            });
        }
        if declaration.guichetier != actor.name {
            return Err(WorkflowError::NotOwner);
        }
        Ok(())
    }

    /// Common guard for cash-manager actions out of `Submitted`. Returns
    /// the locked entry so the caller mutates under the same guard.
    fn manager_transition<'a>(
        &'a self,
        id: &DeclarationId,
        actor: &Actor,
        to: DeclarationStatus,
    ) -> Result<dashmap::mapref::one::RefMut<'a, DeclarationId, CashDeclaration>, WorkflowError>
    {
        if actor.role != Role::CashManager {
            return Err(WorkflowError::NotAuthorized {
                role: actor.role,
                action: "review_declaration",
            });
        }

        let declaration = self
            .declarations
            .get_mut(id)
            .ok_or(WorkflowError::DeclarationNotFound)?;
        if declaration.status != DeclarationStatus::Submitted {
            return Err(WorkflowError::InvalidDeclarationTransition {
                from: declaration.status,
                to,
            });
        }
        Ok(declaration)
    }

    fn publish_status(&self, declaration: &CashDeclaration) {
        tracing::info!(
            id = %declaration.id,
            status = %declaration.status,
            "declaration status changed"
        );
        self.bus.publish(Event::DeclarationStatusChanged {
            id: declaration.id.clone(),
            status: declaration.status,
        });
    }
}
