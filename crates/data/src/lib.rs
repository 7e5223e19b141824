pub mod database;
pub mod memory;
pub mod models;
pub mod repositories;

pub use database::DatabaseClient;
pub use memory::{MemoryBalanceStore, MemoryControlStore, MemoryTradeStore};
pub use repositories::{PgBalanceStore, PgControlStore, PgTradeStore};
