//! Merit-order dispatch and capacity sizing for small hybrid energy systems.

pub mod components;
pub mod config;
pub mod error;
pub mod io;
pub mod optimize;
pub mod resource;
/// Heuristic dispatch and the system orchestrator.
pub mod sim;
