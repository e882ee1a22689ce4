//! Heuristic dispatch and the system orchestrator.

pub mod merit_order;
pub mod system;

pub use merit_order::{BalanceTable, dispatch};
pub use system::{Horizon, LastCall, OptimizeOutcome, System, load_resources};
