pub mod manual;
pub mod simulator;

pub use manual::ManualPriceSource;
pub use simulator::SimulatedFeed;
