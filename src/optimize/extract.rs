//! Writes solved values back into component state.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{Registry, VarHandle};
use super::solver::SolveReport;
use crate::components::types::{POWER_NEG, POWER_POS};
use crate::components::{Component, Suffix};
use crate::error::Result;

/// Sizes below this are reported as exactly zero.
pub const SIZE_TOLERANCE: f64 = 1e-6;

/// A finished solve: the solver report plus the registry needed to read it.
#[derive(Debug, Clone)]
pub struct SolvedModel {
    pub report: SolveReport,
    pub registry: Registry,
}

/// `(name, installed capacity)` rows for every component with non-zero capacity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CapacityTable {
    pub rows: Vec<(String, f64)>,
}

impl CapacityTable {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.rows
            .iter()
            .find_map(|(n, v)| (n == name).then_some(*v))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSummary {
    pub capacities: CapacityTable,
    pub objective: f64,
}

/// Copies every registered variable family into its state column, reads
/// sized capacities, and records the power of fixed-series components.
///
/// Calling this again on the same solved model yields identical state and
/// summary.
///
/// # Errors
///
/// Returns [`Error::HorizonMismatch`](crate::error::Error::HorizonMismatch)
/// if a registered series does not match a component's state length.
pub fn extract(solved: &SolvedModel, components: &mut [Component]) -> Result<ExtractionSummary> {
    let values = &solved.report.values;
    let mut capacities = CapacityTable::default();

    for c in components.iter_mut() {
        let key = c.key().to_string();

        if c.is_dof() {
            if let Some(index) = solved.registry.scalar_index(&key, Suffix::Size) {
                let size = values.get(index).copied().unwrap_or(0.0);
                c.set_installed(if size.abs() < SIZE_TOLERANCE { 0.0 } else { size });
            }
        }

        // Fixed-series components have no power variable: their output
        // follows from the (possibly just sized) capacity.
        if let Some(raw) = c.raw_power() {
            c.write_power(&raw)?;
        }

        let registrations = solved.registry.registrations(&key);
        for (column, handle) in registrations {
            let series = match handle {
                VarHandle::Series(range) => values.get(range.clone()).unwrap_or_default().to_vec(),
                VarHandle::Scalar(i) => vec![values.get(*i).copied().unwrap_or(0.0)],
            };
            c.state_mut().set_column(column, series)?;
        }

        // Disabled directions have no variable; their partition is zero.
        if c.capabilities().is_controllable() {
            let len = c.state().len();
            for column in [POWER_POS, POWER_NEG] {
                if !registrations.iter().any(|(name, _)| *name == column) {
                    c.state_mut().set_column(column, vec![0.0; len])?;
                }
            }
        }

        if c.installed() != 0.0 {
            capacities.rows.push((c.name().to_string(), c.installed()));
        }
        debug!(key = %key, installed = c.installed(), "extracted component");
    }

    Ok(ExtractionSummary {
        capacities,
        objective: solved.report.objective,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use good_lp::Expression;

    use super::*;
    use crate::components::ComponentFactory;
    use crate::components::types::{ENERGY, POWER};
    use crate::config::{ComponentSpec, KindName};
    use crate::optimize::builder;
    use crate::optimize::solver::SolveStatus;

    fn sized_battery() -> Vec<Component> {
        let spec = ComponentSpec {
            dof: true,
            bounds: Some([0.0, 10.0]),
            ep_ratio: Some(1.0),
            starting_soc: Some(0.0),
            ..ComponentSpec::new(KindName::Lithium)
        };
        let mut c = match ComponentFactory::new().build(spec) {
            Ok(c) => c,
            Err(e) => panic!("spec should build: {e}"),
        };
        c.reset_state(2);
        vec![c]
    }

    fn solved(components: &[Component], values: Vec<f64>) -> SolvedModel {
        let model = match builder::build(components, 2) {
            Ok(m) => m,
            Err(e) => panic!("model should build: {e}"),
        };
        let (_, registry) = model.into_problem(Expression::default());
        SolvedModel {
            report: SolveReport {
                status: SolveStatus::Optimal,
                duration: Duration::ZERO,
                objective: 1.5,
                values,
            },
            registry,
        }
    }

    // size, P[0..2], Ppos[0..2], Pneg[0..2], E[0..2]
    const VALUES: [f64; 9] = [4.0, -2.0, 1.0, 0.0, 1.0, -2.0, 0.0, 0.0, 2.0];

    #[test]
    fn writes_registered_columns_and_size() {
        let mut components = sized_battery();
        let solved = solved(&components, VALUES.to_vec());
        let summary = extract(&solved, &mut components).ok();

        let c = &components[0];
        assert_eq!(c.installed(), 4.0);
        assert_eq!(c.state().column(POWER), Some(&[-2.0, 1.0][..]));
        assert_eq!(c.state().column(ENERGY), Some(&[0.0, 2.0][..]));
        let summary = summary.unwrap_or_else(|| panic!("extraction should succeed"));
        assert_eq!(summary.capacities.get(c.name()), Some(4.0));
        assert_eq!(summary.objective, 1.5);
    }

    #[test]
    fn tiny_size_is_zero_and_omitted() {
        let mut components = sized_battery();
        let mut values = VALUES.to_vec();
        values[0] = 1e-9;
        let solved = solved(&components, values);
        let summary = extract(&solved, &mut components).ok();
        assert_eq!(components[0].installed(), 0.0);
        assert_eq!(summary.map(|s| s.capacities.is_empty()), Some(true));
    }

    #[test]
    fn extraction_is_idempotent() {
        let mut components = sized_battery();
        let solved = solved(&components, VALUES.to_vec());
        let first = extract(&solved, &mut components).ok();
        let state = components[0].state().clone();
        let second = extract(&solved, &mut components).ok();
        assert_eq!(first, second);
        assert_eq!(&state, components[0].state());
    }

    #[test]
    fn fixed_series_power_follows_solved_size() {
        let mut factory = ComponentFactory::new();
        let pv = ComponentSpec {
            dof: true,
            bounds: Some([0.0, 10.0]),
            profile: Some("irradiance".to_string()),
            ..ComponentSpec::new(KindName::Photovoltaic)
        };
        let load = ComponentSpec {
            profile: Some("demand".to_string()),
            ..ComponentSpec::new(KindName::Consumer)
        };
        let mut components: Vec<Component> = [pv, load]
            .into_iter()
            .map(|spec| match factory.build(spec) {
                Ok(c) => c,
                Err(e) => panic!("spec should build: {e}"),
            })
            .collect();
        components[0].attach_series(vec![1.0, 0.5]);
        components[1].attach_series(vec![-1.0, -2.0]);

        // Only the PV size is a variable.
        let solved = solved(&components, vec![4.0]);
        assert!(extract(&solved, &mut components).is_ok());
        assert_eq!(components[0].state().column(POWER), Some(&[4.0, 2.0][..]));
        assert_eq!(components[1].state().column(POWER), Some(&[-1.0, -2.0][..]));
    }
}
