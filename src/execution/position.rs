use std::collections::HashMap;

use crate::error::CycleError;
use crate::models::{AssetBalance, PositionSide, PositionState};

// Exchange lot precision for the held quantity
const QUANTITY_DECIMALS: i32 = 4;

/// Classifies current holdings as flat or long.
///
/// A balance below the dust threshold is flat: residual dust from rounded
/// fills must not read as an open position.
pub struct PositionTracker {
    base_asset: String,
    dust_threshold: f64,
}

impl PositionTracker {
    pub fn new(base_asset: impl Into<String>, dust_threshold: f64) -> Self {
        Self {
            base_asset: base_asset.into(),
            dust_threshold,
        }
    }

    /// Interpret a balance snapshot.
    ///
    /// Fails with `BalanceUnavailable` when the tracked asset is absent
    /// from the mapping; the caller decides the degrade-to-flat policy.
    pub fn position(
        &self,
        balances: &HashMap<String, AssetBalance>,
    ) -> Result<PositionState, CycleError> {
        let balance = balances
            .get(&self.base_asset)
            .ok_or_else(|| CycleError::BalanceUnavailable {
                asset: self.base_asset.clone(),
            })?;

        let total = balance.total();
        if total >= self.dust_threshold {
            Ok(PositionState {
                side: PositionSide::Long,
                quantity: round_to(total, QUANTITY_DECIMALS),
            })
        } else {
            Ok(PositionState::flat())
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
