//! Hot/cold wallet rebalancing (§4.6), triggered at the end of every successful deposit.
//!
//! No teacher counterpart exists for a hot/cold wallet split; this follows the policy
//! description directly, keeping the native `L1Client` it moves funds through.

use alloy::primitives::U256;
use tracing::info;

use crate::bridge::L1Client;
use crate::types::AtomicUnits;

/// Basis-point-per-million granularity keeps the float-to-integer conversion below
/// one atomic unit of error even at 18 decimals.
const SCALE: u64 = 1_000_000;

fn scale_by_ratio(amount: AtomicUnits, ratio: f64) -> AtomicUnits {
    let parts = (ratio.clamp(0.0, 1.0) * SCALE as f64).round() as u64;
    AtomicUnits(amount.0 * U256::from(parts) / U256::from(SCALE))
}

/// Apply the hot/cold rebalancing policy after crediting `deposit` to a user's balance.
/// `minimum` is the configured hot-wallet floor, `ratio` the target hot-wallet share of
/// total custody (0.0..=1.0).
pub async fn maybe_rebalance(
    l1: &dyn L1Client,
    deposit: AtomicUnits,
    minimum: AtomicUnits,
    ratio: f64,
) -> eyre::Result<()> {
    let hot = l1.hot_balance().await?;
    if hot <= minimum {
        return Ok(());
    }

    let cold = l1.cold_balance().await?;
    let total = hot.saturating_add(cold);
    let target = scale_by_ratio(total, ratio);
    if hot <= target {
        return Ok(());
    }

    let available = hot.checked_sub(minimum).unwrap_or(AtomicUnits::ZERO);
    let base = if available < deposit { available } else { deposit };
    let send = scale_by_ratio(base, 1.0 - ratio);

    if send > AtomicUnits::ZERO {
        let hash = l1.transfer_hot_to_cold(send).await?;
        info!(amount = %send, hash, "hot-to-cold rebalance transfer");
    }
    Ok(())
}
