pub mod config;
pub mod config_loader;
pub mod domain;
pub mod error;
pub mod outcome;
pub mod payout;
pub mod reconcile;
pub mod traits;

pub use config::AppConfig;
pub use config_loader::ConfigLoader;
pub use domain::{
    Balance, ControlType, Direction, OutcomeControl, PriceQuote, SettlementEvent, Trade,
    TradeStatus,
};
pub use error::TradeError;
pub use traits::{BalanceStore, ControlStore, PriceSource, TradeStore};
