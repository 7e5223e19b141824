//! Duration buckets for timed positions.
//!
//! Each allowed duration carries a fixed minimum stake and win payout
//! percentage. Durations outside the table are rejected at placement.

use rust_decimal::Decimal;

/// Allowed trade durations, in seconds.
pub const DURATIONS: [u32; 5] = [30, 60, 120, 300, 600];

/// Returns the win payout as a fraction of the stake for a duration
/// bucket, or `None` if the duration is not offered.
#[must_use]
pub fn payout_percent(duration_secs: u32) -> Option<Decimal> {
    let pct = match duration_secs {
        30 => Decimal::new(10, 2),  // 10%
        60 => Decimal::new(15, 2),  // 15%
        120 => Decimal::new(25, 2), // 25%
        300 => Decimal::new(50, 2), // 50%
        600 => Decimal::ONE,        // 100%
        _ => return None,
    };
    Some(pct)
}

/// Returns the minimum stake for a duration bucket, or `None` if the
/// duration is not offered.
#[must_use]
pub fn min_amount(duration_secs: u32) -> Option<Decimal> {
    let min = match duration_secs {
        30 | 60 => Decimal::from(10),
        120 => Decimal::from(20),
        300 => Decimal::from(50),
        600 => Decimal::from(100),
        _ => return None,
    };
    Some(min)
}
