pub mod drain;
pub mod monitor;

pub use drain::{DrainScheduler, DRAIN_INTERVAL};
pub use monitor::{CellularGeneration, ConnectivityEvent, NetworkMonitor};
