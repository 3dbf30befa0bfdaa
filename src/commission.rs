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

//! Commission math and the published EUR→XAF rate.
//!
//! Percentages come from configuration, never from call sites, and are
//! clamped to [0, 100] before use. Commissions are rounded up to a whole
//! XAF franc.

use crate::error::WorkflowError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Commission percentages sourced from settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionConfig {
    /// Percentage applied when an auditor validates a transaction.
    #[serde(default = "default_validation_pct")]
    pub validation_pct: Decimal,
    /// Percentage printed on international transfer receipts.
    #[serde(default = "default_international_pct")]
    pub international_pct: Decimal,
}

fn default_validation_pct() -> Decimal {
    dec!(1.5)
}

fn default_international_pct() -> Decimal {
    dec!(3.6)
}

impl Default for CommissionConfig {
    fn default() -> Self {
        CommissionConfig {
            validation_pct: default_validation_pct(),
            international_pct: default_international_pct(),
        }
    }
}

/// Clamps a percentage to [0, 100].
pub(crate) fn clamp_pct(pct: Decimal) -> Decimal {
    pct.clamp(Decimal::ZERO, dec!(100))
}

/// Commission charged at the validation transition.
///
/// Converts the audited real EUR amount to XAF at the published rate,
/// applies the configured percentage, and rounds up to a whole franc.
///
/// # Errors
///
/// - [`WorkflowError::InvalidRealAmount`] - `real_amount_eur` is not positive.
/// - [`WorkflowError::InvalidRate`] - the published rate is not positive.
pub fn validation_commission(
    real_amount_eur: Decimal,
    eur_to_xaf: Decimal,
    pct: Decimal,
) -> Result<Decimal, WorkflowError> {
    if real_amount_eur <= Decimal::ZERO {
        return Err(WorkflowError::InvalidRealAmount);
    }
    if eur_to_xaf <= Decimal::ZERO {
        return Err(WorkflowError::InvalidRate);
    }

    let amount_xaf = real_amount_eur * eur_to_xaf;
    Ok((amount_xaf * clamp_pct(pct) / dec!(100)).ceil())
}

#[derive(Debug, Clone)]
struct RateData {
    eur_to_xaf: Decimal,
    updated_at: DateTime<Utc>,
}

/// Published EUR→XAF exchange rate, refreshed by an external feed.
///
/// Readers always see the latest published value; the engine reads it once
/// per validation so a rate refresh never splits a single commission
/// computation.
#[derive(Debug)]
pub struct RateBoard {
    inner: Mutex<RateData>,
}

impl RateBoard {
    pub fn new(eur_to_xaf: Decimal) -> Result<Self, WorkflowError> {
        if eur_to_xaf <= Decimal::ZERO {
            return Err(WorkflowError::InvalidRate);
        }
        Ok(RateBoard {
            inner: Mutex::new(RateData {
                eur_to_xaf,
                updated_at: Utc::now(),
            }),
        })
    }

    /// Publishes a new rate, stamping the refresh time.
    pub fn publish(&self, eur_to_xaf: Decimal) -> Result<(), WorkflowError> {
        if eur_to_xaf <= Decimal::ZERO {
            return Err(WorkflowError::InvalidRate);
        }
        let mut data = self.inner.lock();
        data.eur_to_xaf = eur_to_xaf;
        data.updated_at = Utc::now();
        Ok(())
    }

    pub fn current(&self) -> Decimal {
        self.inner.lock().eur_to_xaf
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.inner.lock().updated_at
    }
}
