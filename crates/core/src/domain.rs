use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Direction of a timed position: up bets the price finishes above the
/// entry price, down bets it finishes below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Active,
    Completed,
    Cancelled,
}

impl TradeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Terminal states never transition again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown trade status: {other}")),
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timed up/down position.
///
/// Invariant: `status == Active` iff `exit_price`, `profit`, and
/// `completed_at` are unset. A cancelled trade gets `completed_at` only;
/// `exit_price` and `profit` stay unset because no outcome was computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub duration_secs: u32,
    pub status: TradeStatus,
    pub profit: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Trade {
    /// Opens a new active trade expiring `duration_secs` from now.
    #[must_use]
    pub fn open(
        user_id: Uuid,
        symbol: String,
        direction: Direction,
        amount: Decimal,
        entry_price: Decimal,
        duration_secs: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            symbol,
            direction,
            amount,
            entry_price,
            exit_price: None,
            duration_secs,
            status: TradeStatus::Active,
            profit: None,
            created_at: now,
            expires_at: now + Duration::seconds(i64::from(duration_secs)),
            completed_at: None,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, TradeStatus::Active)
    }
}

/// Per-user, per-symbol funds. `locked` holds stakes of open trades.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub user_id: Uuid,
    pub symbol: String,
    pub available: Decimal,
    pub locked: Decimal,
}

impl Balance {
    /// Empty balance for a user/symbol pair that has no row yet.
    #[must_use]
    pub fn zero(user_id: Uuid, symbol: String) -> Self {
        Self {
            user_id,
            symbol,
            available: Decimal::ZERO,
            locked: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }
}

/// Admin override applied at settlement time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    #[default]
    Normal,
    Win,
    Lose,
}

impl ControlType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Win => "win",
            Self::Lose => "lose",
        }
    }
}

impl FromStr for ControlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "win" => Ok(Self::Win),
            "lose" => Ok(Self::Lose),
            other => Err(format!("unknown control type: {other}")),
        }
    }
}

/// One active override record per user. Absence means `Normal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeControl {
    pub user_id: Uuid,
    pub control_type: ControlType,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutcomeControl {
    #[must_use]
    pub fn new(user_id: Uuid, control_type: ControlType, notes: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            control_type,
            is_active: true,
            notes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Latest market state for a symbol, upserted on every feed tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub symbol: String,
    pub price: Decimal,
    pub change_24h: Decimal,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub volume_24h: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Broadcast when a trade settles.
///
/// `seq` is monotonic per process; consumers drop deliveries at or below
/// the last sequence they applied for a trade id. Entry and exit prices
/// are always present so no delivery path has to fabricate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementEvent {
    pub trade_id: Uuid,
    pub user_id: Uuid,
    pub seq: u64,
    pub symbol: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub profit: Decimal,
    pub won: bool,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn open_trade_is_active_with_unset_result_fields() {
        let trade = Trade::open(
            Uuid::new_v4(),
            "BTCUSDT".to_string(),
            Direction::Up,
            dec!(100),
            dec!(50000),
            30,
        );

        assert!(trade.is_active());
        assert!(trade.exit_price.is_none());
        assert!(trade.profit.is_none());
        assert!(trade.completed_at.is_none());
        assert_eq!(trade.expires_at - trade.created_at, Duration::seconds(30));
    }

    #[test]
    fn direction_round_trips_through_str() {
        assert_eq!("up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("down".parse::<Direction>().unwrap(), Direction::Down);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::Up.as_str(), "up");
    }

    #[test]
    fn status_terminality() {
        assert!(!TradeStatus::Active.is_terminal());
        assert!(TradeStatus::Completed.is_terminal());
        assert!(TradeStatus::Cancelled.is_terminal());
    }

    #[test]
    fn control_type_defaults_to_normal() {
        assert_eq!(ControlType::default(), ControlType::Normal);
        assert_eq!("lose".parse::<ControlType>().unwrap(), ControlType::Lose);
    }

    #[test]
    fn balance_total_sums_available_and_locked() {
        let mut balance = Balance::zero(Uuid::new_v4(), "BTCUSDT".to_string());
        balance.available = dec!(900);
        balance.locked = dec!(100);
        assert_eq!(balance.total(), dec!(1000));
    }

    #[test]
    fn trade_serializes_camel_case() {
        let trade = Trade::open(
            Uuid::new_v4(),
            "BTCUSDT".to_string(),
            Direction::Down,
            dec!(50),
            dec!(50000),
            60,
        );
        let json = serde_json::to_value(&trade).unwrap();
        assert_eq!(json["direction"], "down");
        assert_eq!(json["status"], "active");
        assert!(json["entryPrice"].is_string() || json["entryPrice"].is_number());
        assert!(json["exitPrice"].is_null());
    }
}
