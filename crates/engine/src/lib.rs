pub mod engine;
pub mod scheduler;

pub use engine::TradeEngine;
