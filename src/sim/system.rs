//! System orchestrator: owns the components and runs either dispatch path.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::merit_order::{self, BalanceTable};
use crate::components::{Component, ComponentFactory, PriorityMap};
use crate::config::{ConfigError, ScenarioConfig, SystemConfig};
use crate::error::{Error, Result};
use crate::optimize::{
    self, CapacityTable, ExtractionSummary, Finance, Model, ObjectiveKey, SolveStatus,
    SolvedModel, Solver,
};
use crate::resource::ResourceTable;

/// Hourly time axis of a system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizon {
    pub start: NaiveDateTime,
    pub len: usize,
}

impl Horizon {
    /// Timestamp of every step.
    pub fn dates(&self) -> Vec<NaiveDateTime> {
        (0..self.len)
            .map(|t| self.start + TimeDelta::hours(t as i64))
            .collect()
    }
}

/// Which dispatch path ran last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastCall {
    MeritOrder,
    Optimize,
}

/// Outcome of [`System::optimize`].
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeOutcome {
    /// Values were extracted into component state.
    Solved {
        summary: ExtractionSummary,
        duration: Duration,
    },
    /// Extraction was skipped; component state is unchanged.
    NonOptimal { reason: String, duration: Duration },
}

/// An ordered set of components over a fixed horizon.
#[derive(Debug, Clone)]
pub struct System {
    name: String,
    horizon: Horizon,
    objective: ObjectiveKey,
    finance: Finance,
    priorities: PriorityMap,
    components: Vec<Component>,
    created: NaiveDateTime,
    last_call: Option<LastCall>,
    installed_capacities: Option<CapacityTable>,
    objective_outcome: Option<f64>,
}

impl System {
    /// Creates an empty system.
    pub fn new(
        name: impl Into<String>,
        horizon: Horizon,
        objective: ObjectiveKey,
        finance: Finance,
        priorities: PriorityMap,
    ) -> Self {
        Self {
            name: name.into(),
            horizon,
            objective,
            finance,
            priorities,
            components: Vec::new(),
            created: Utc::now().naive_utc(),
            last_call: None,
            installed_capacities: None,
            objective_outcome: None,
        }
    }

    /// Validates a scenario and registers all its components.
    ///
    /// Resources are not attached; call [`System::attach_resources`] next.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] with every validation failure, or for a duplicate
    ///   component name
    /// - [`Error::MissingAttributes`] / [`Error::ZeroCapexWithLifetime`]
    ///   from component registration
    pub fn from_config(config: &ScenarioConfig) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(Error::Config(errors));
        }
        let start = config.start().ok_or_else(|| {
            Error::Config(vec![ConfigError {
                field: "system.start".to_string(),
                message: "unparseable timestamp".to_string(),
            }])
        })?;

        let priorities = config
            .priorities
            .iter()
            .fold(PriorityMap::default(), |map, (tag, tier)| {
                map.with_tier(*tag, *tier)
            });

        let mut system = Self::new(
            config.system.name.clone(),
            Horizon {
                start,
                len: config.system.horizon,
            },
            config.system.objective,
            Finance::from(&config.finance),
            priorities,
        );

        // Names key the capacity table and the result document.
        let mut factory = ComponentFactory::new();
        let mut names = BTreeSet::new();
        for (i, spec) in config.components.iter().enumerate() {
            let component = factory.build(spec.clone())?;
            if !names.insert(component.name().to_string()) {
                return Err(Error::Config(vec![ConfigError {
                    field: format!("components[{i}].name"),
                    message: format!("duplicate component name \"{}\"", component.name()),
                }]));
            }
            system.add_component(component);
        }
        info!(
            system = %system.name,
            components = system.components.len(),
            horizon = system.horizon.len,
            "system registered"
        );
        Ok(system)
    }

    /// Inserts a component after every component of equal or lower tier.
    pub fn add_component(&mut self, mut component: Component) {
        component.reset_state(self.horizon.len);
        let tier = self.priorities.tier(component.merit_tag());
        let at = self
            .components
            .partition_point(|c| self.priorities.tier(c.merit_tag()) <= tier);
        self.components.insert(at, component);
    }

    /// Computes and attaches each component's raw series from `resources`.
    ///
    /// # Errors
    ///
    /// - [`Error::HorizonMismatch`] if the table length differs from the horizon
    /// - [`Error::UnknownResource`] if a profile column is absent
    pub fn attach_resources(&mut self, resources: &ResourceTable) -> Result<()> {
        if resources.len() != self.horizon.len {
            return Err(Error::HorizonMismatch {
                name: "resource table".to_string(),
                expected: self.horizon.len,
                actual: resources.len(),
            });
        }
        for c in &mut self.components {
            match resources.series_for(c)? {
                Some(series) => c.attach_series(series),
                None => c.reset_state(self.horizon.len),
            }
        }
        Ok(())
    }

    /// Runs the heuristic dispatcher and records it as the last call.
    ///
    /// # Errors
    ///
    /// See [`merit_order::dispatch`].
    pub fn run_merit_order(&mut self) -> Result<BalanceTable> {
        self.clear_state();
        let table =
            merit_order::dispatch(&mut self.components, &self.priorities, self.horizon.len)?;
        self.last_call = Some(LastCall::MeritOrder);
        self.installed_capacities = None;
        self.objective_outcome = None;

        let unserved: f64 = table
            .residual()
            .unwrap_or_default()
            .iter()
            .map(|r| r.abs())
            .sum();
        info!(system = %self.name, unserved, "merit order dispatch finished");
        Ok(table)
    }

    /// Builds the model with its objective for the current components.
    ///
    /// # Errors
    ///
    /// See [`optimize::builder::build`].
    pub fn build_model(&self) -> Result<(Model, good_lp::Expression)> {
        let model = optimize::builder::build(&self.components, self.horizon.len)?;
        let objective = optimize::objective::compose(
            &model,
            &self.components,
            self.objective,
            &self.finance,
            self.horizon.len,
        )?;
        Ok((model, objective))
    }

    /// Builds, solves, and on success extracts the exact solution.
    ///
    /// A non-optimal termination is logged and reported as
    /// [`OptimizeOutcome::NonOptimal`]; component state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns registration or extraction errors. Solver failure is not an error.
    pub fn optimize(&mut self, solver: &dyn Solver) -> Result<OptimizeOutcome> {
        let (model, objective) = self.build_model()?;
        info!(
            system = %self.name,
            variables = model.variable_count(),
            constraints = model.constraint_count(),
            objective = ?self.objective,
            "solving"
        );
        let (problem, registry) = model.into_problem(objective);
        let report = solver.solve(problem);
        let duration = report.duration;
        self.last_call = Some(LastCall::Optimize);

        if let SolveStatus::NonOptimal(reason) = &report.status {
            warn!(system = %self.name, %reason, "non-optimal termination, skipping extraction");
            self.installed_capacities = None;
            self.objective_outcome = None;
            return Ok(OptimizeOutcome::NonOptimal {
                reason: reason.clone(),
                duration,
            });
        }

        self.clear_state();
        let solved = SolvedModel { report, registry };
        let summary = optimize::extract(&solved, &mut self.components)?;
        info!(
            system = %self.name,
            objective = summary.objective,
            elapsed_ms = duration.as_millis() as u64,
            "optimal solution extracted"
        );
        self.installed_capacities = Some(summary.capacities.clone());
        self.objective_outcome = Some(summary.objective);
        Ok(OptimizeOutcome::Solved { summary, duration })
    }

    fn clear_state(&mut self) {
        for c in &mut self.components {
            c.state_mut().clear();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn objective(&self) -> ObjectiveKey {
        self.objective
    }

    pub fn priorities(&self) -> &PriorityMap {
        &self.priorities
    }

    /// Components in merit order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name() == name)
    }

    /// Creation timestamp of the system.
    pub fn date(&self) -> NaiveDateTime {
        self.created
    }

    pub fn last_call(&self) -> Option<LastCall> {
        self.last_call
    }

    /// Capacities from the last successful solve.
    pub fn installed_capacities(&self) -> Option<&CapacityTable> {
        self.installed_capacities.as_ref()
    }

    pub fn objective_outcome(&self) -> Option<f64> {
        self.objective_outcome
    }
}

/// Loads the resource table a scenario asks for: the configured CSV cut to
/// the horizon, or synthetic series from the seed.
///
/// # Errors
///
/// Returns CSV or horizon errors from [`ResourceTable`].
pub fn load_resources(cfg: &SystemConfig) -> Result<ResourceTable> {
    match &cfg.resource_csv {
        Some(path) => ResourceTable::from_csv_path(path)?.truncate(cfg.horizon),
        None => Ok(ResourceTable::synthetic(cfg.horizon, cfg.seed)),
    }
}
