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

//! Advisory notification fan-out.
//!
//! Every successful store mutation broadcasts an [`Event`]. Subscribers
//! treat events purely as invalidation signals and re-fetch their own view;
//! no state rides on the payload beyond the ids involved.

use crate::base::{DeclarationId, TransactionId};
use crate::declaration::DeclarationStatus;
use crate::transaction::{TransactionKind, TransactionStatus};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Signals broadcast after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    TransactionCreated {
        id: TransactionId,
        kind: TransactionKind,
    },
    /// Single mutations carry one id; bulk completion carries every
    /// completed id in one event.
    TransactionStatusChanged {
        ids: Vec<TransactionId>,
        status: TransactionStatus,
    },
    DeclarationStatusChanged {
        id: DeclarationId,
        status: DeclarationStatus,
    },
}

impl Event {
    /// Wire name matching the dashboard's custom-event vocabulary.
    pub fn name(&self) -> &'static str {
        match self {
            Event::TransactionCreated { kind, .. } => match kind {
                TransactionKind::Reception => "receptionCreated",
                TransactionKind::Exchange => "exchangeCreated",
                TransactionKind::Card => "cardCreated",
                TransactionKind::Transfer => "transferCreated",
            },
            Event::TransactionStatusChanged { .. } => "transactionStatusChanged",
            Event::DeclarationStatusChanged { .. } => "declarationStatusChanged",
        }
    }
}

/// Typed pub/sub bus.
///
/// Subscription lifetime is the receiver's lifetime: dropping the receiver
/// unsubscribes, and the next publish prunes the dead sender. There is no
/// process-global registry.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<Event>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and returns its receiving end.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Delivers the event to every live subscriber.
    pub fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
