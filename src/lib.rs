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

//! # Guichet
//!
//! This library provides the back-office workflow engine of a foreign
//! exchange and money-transfer operation: role-gated transaction
//! lifecycles, end-of-day cash declarations (arrêtés de caisse), commission
//! accounting, and advisory change notifications.
//!
//! ## Core Components
//!
//! - [`Engine`]: transaction lifecycle processor with conditional updates
//! - [`DeclarationBook`]: cash-declaration store and state machine
//! - [`EventBus`]: typed invalidation signals for list views
//! - [`WorkflowError`]: error types for workflow failures
//!
//! ## Example
//!
//! ```
//! use guichet_rs::{
//!     Actor, CommissionConfig, Engine, EventBus, RateBoard, Role,
//!     TransactionDraft, TransactionId, TransactionKind, TransactionStatus,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let rates = Arc::new(RateBoard::new(dec!(655.957)).unwrap());
//! let engine = Engine::new(rates, CommissionConfig::default(), Arc::new(EventBus::new()));
//!
//! // A teller records a transfer.
//! let teller = Actor::new("alice", Role::Cashier);
//! engine
//!     .create(
//!         TransactionDraft {
//!             id: TransactionId::from("tx-1"),
//!             kind: TransactionKind::Transfer,
//!             amount: dec!(250000),
//!             currency: "XAF".to_string(),
//!             agency: "Douala Akwa".to_string(),
//!             details: serde_json::Value::Null,
//!         },
//!         &teller,
//!     )
//!     .unwrap();
//!
//! // An auditor validates it with the audited EUR amount.
//! let auditor = Actor::new("bob", Role::Auditor);
//! let tx = engine
//!     .validate(&TransactionId::from("tx-1"), &auditor, dec!(380))
//!     .unwrap();
//! assert_eq!(tx.status, TransactionStatus::Validated);
//! assert!(tx.commission_amount.is_some());
//! ```
//!
//! ## Thread Safety
//!
//! Stores are keyed concurrent maps; every status guard runs while the
//! record's entry is locked, so concurrent conflicting actions resolve to
//! exactly one winner.

pub mod base;
pub mod commission;
pub mod declaration;
mod engine;
pub mod error;
pub mod events;
pub mod expense;
pub mod export;
pub mod policy;
pub mod receipt;
mod transaction;

pub use base::{Actor, DeclarationId, ExpenseId, ReceiptNumber, Role, TransactionId};
pub use commission::{CommissionConfig, RateBoard, validation_commission};
pub use declaration::{
    CashDeclaration, DeclarationBook, DeclarationDraft, DeclarationStats, DeclarationStatus,
    DeclarationUpdate,
};
pub use engine::{BulkCompletion, Engine, TransactionFilter, TransactionPage};
pub use error::WorkflowError;
pub use events::{Event, EventBus};
pub use expense::{Expense, ExpenseBook, ExpenseDraft, ExpenseStatus};
pub use policy::TransactionAction;
pub use receipt::{Receipt, ReceiptHistory, ReceiptTotals, ReceiptUpload};
pub use transaction::{Transaction, TransactionDraft, TransactionKind, TransactionStatus};
