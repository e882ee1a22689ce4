//! Exact capacity-and-dispatch path: model building, objective composition,
//! solving, and result extraction.

pub mod builder;
pub mod extract;
pub mod model;
pub mod objective;
pub mod solver;

pub use extract::{CapacityTable, ExtractionSummary, SolvedModel, extract};
pub use model::{LpProblem, Model, Registry, VarHandle};
pub use objective::{CostFactors, Finance, ObjectiveKey};
pub use solver::{ClarabelSolver, SolveReport, SolveStatus, Solver};
