mod balance_repo;
mod control_repo;
mod trade_repo;

pub use balance_repo::PgBalanceStore;
pub use control_repo::PgControlStore;
pub use trade_repo::PgTradeStore;
