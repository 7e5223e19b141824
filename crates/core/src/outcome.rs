//! Outcome decision policy.
//!
//! The market rule and the admin override are both expressed through
//! [`decide`], so settlement never branches on who decided the outcome.
//!
//! # Settlement Logic
//! - Up wins if the market price finishes strictly above the entry price
//! - Down wins if it finishes strictly below
//! - An exact tie loses for both directions
//! - A `Win`/`Lose` override forces the result and nudges the exit price
//!   just past the entry so the natural comparison agrees with it

use rust_decimal::Decimal;

use crate::domain::{ControlType, Direction};

/// Resolved outcome of a trade at expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub won: bool,
    pub exit_price: Decimal,
}

/// Smallest price offset used when an override has to move the exit
/// price across the entry: 1 basis point of the entry, floored at 0.01.
fn nudge(entry_price: Decimal) -> Decimal {
    let bp = entry_price.abs() * Decimal::new(1, 4);
    bp.max(Decimal::new(1, 2))
}

/// Decides whether a trade won and what exit price to record.
#[must_use]
pub fn decide(
    direction: Direction,
    entry_price: Decimal,
    market_price: Decimal,
    control: ControlType,
) -> Outcome {
    match control {
        ControlType::Normal => {
            let won = match direction {
                Direction::Up => market_price > entry_price,
                Direction::Down => market_price < entry_price,
            };
            Outcome {
                won,
                exit_price: market_price,
            }
        }
        ControlType::Win => Outcome {
            won: true,
            exit_price: forced_exit(direction, entry_price, market_price, true),
        },
        ControlType::Lose => Outcome {
            won: false,
            exit_price: forced_exit(direction, entry_price, market_price, false),
        },
    }
}

/// Exit price for a forced outcome. Keeps the real market price when it
/// already agrees with the forced result, otherwise moves just past the
/// entry in the required direction.
fn forced_exit(
    direction: Direction,
    entry_price: Decimal,
    market_price: Decimal,
    won: bool,
) -> Decimal {
    let needs_above = matches!(direction, Direction::Up) == won;
    if needs_above {
        if market_price > entry_price {
            market_price
        } else {
            entry_price + nudge(entry_price)
        }
    } else if market_price < entry_price {
        market_price
    } else {
        entry_price - nudge(entry_price)
    }
}

/// Profit applied to the user's balance: the payout fraction of the
/// stake on a win, the full stake lost otherwise.
#[must_use]
pub fn profit(won: bool, amount: Decimal, payout_percent: Decimal) -> Decimal {
    if won {
        amount * payout_percent
    } else {
        -amount
    }
}
