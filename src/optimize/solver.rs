//! External LP solver seam.

use std::time::{Duration, Instant};

use clarabel::solver::SolverStatus;
use good_lp::{Solution, SolverModel, clarabel};
use tracing::{debug, warn};

use super::model::LpProblem;

/// Termination status reported by a solver.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    Optimal,
    /// The solver stopped without an optimal point (infeasible, unbounded,
    /// numerical failure). Values are meaningless in this case.
    NonOptimal(String),
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

/// What a solver hands back for one problem.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub duration: Duration,
    /// Objective value at the solution (`NaN` if not optimal).
    pub objective: f64,
    /// One value per tracked variable, aligned with [`LpProblem::tracked`].
    /// Empty if not optimal.
    pub values: Vec<f64>,
}

/// An opaque, blocking optimisation oracle.
pub trait Solver {
    /// Minimises `problem.objective` subject to `problem.constraints`.
    fn solve(&self, problem: LpProblem) -> SolveReport;
}

/// Interior-point solver backed by Clarabel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClarabelSolver;

impl Solver for ClarabelSolver {
    fn solve(&self, problem: LpProblem) -> SolveReport {
        let LpProblem {
            variables,
            objective,
            constraints,
            tracked,
        } = problem;

        let started = Instant::now();
        debug!(
            variables = tracked.len(),
            constraints = constraints.len(),
            "invoking clarabel"
        );

        let mut model = variables.minimise(objective.clone()).using(clarabel);
        for c in constraints {
            model = model.with(c);
        }

        match model.solve() {
            // good_lp hands back dual-infeasible (unbounded) runs as Ok.
            Ok(solution) => match solution.inner().status {
                SolverStatus::Solved | SolverStatus::AlmostSolved => SolveReport {
                    status: SolveStatus::Optimal,
                    duration: started.elapsed(),
                    objective: objective.eval_with(&solution),
                    values: tracked.iter().map(|v| solution.value(*v)).collect(),
                },
                other => non_optimal(format!("clarabel terminated with {other:?}"), started),
            },
            Err(e) => non_optimal(e.to_string(), started),
        }
    }
}

fn non_optimal(reason: String, started: Instant) -> SolveReport {
    warn!(%reason, "solver did not reach an optimal point");
    SolveReport {
        status: SolveStatus::NonOptimal(reason),
        duration: started.elapsed(),
        objective: f64::NAN,
        values: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Suffix;
    use crate::optimize::model::Model;
    use good_lp::{Expression, constraint, variable};

    #[test]
    fn solves_small_lp() {
        let mut model = Model::new();
        let x = model.add_scalar("x", Suffix::Size, variable().min(0.0).max(10.0));
        model.add_constraint(constraint!(x >= 3.0));
        let (problem, _) = model.into_problem(Expression::from(x) * 2.0);
        let report = ClarabelSolver.solve(problem);
        assert!(report.status.is_optimal());
        assert!((report.values[0] - 3.0).abs() < 1e-5);
        assert!((report.objective - 6.0).abs() < 1e-5);
    }

    #[test]
    fn infeasible_problem_is_non_optimal() {
        let mut model = Model::new();
        let x = model.add_scalar("x", Suffix::Size, variable().min(0.0).max(1.0));
        model.add_constraint(constraint!(x >= 2.0));
        let (problem, _) = model.into_problem(Expression::from(x));
        let report = ClarabelSolver.solve(problem);
        assert!(!report.status.is_optimal());
        assert!(report.values.is_empty());
    }

    #[test]
    fn unbounded_problem_is_non_optimal() {
        let mut model = Model::new();
        let x = model.add_scalar("x", Suffix::Size, variable().max(0.0));
        model.add_constraint(constraint!(x <= 5.0));
        let (problem, _) = model.into_problem(Expression::from(x));
        let report = ClarabelSolver.solve(problem);
        assert!(
            matches!(report.status, SolveStatus::NonOptimal(_)),
            "{:?}",
            report.status
        );
        assert!(report.objective.is_nan());
        assert!(report.values.is_empty());
    }
}
