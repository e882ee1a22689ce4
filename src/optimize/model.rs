//! Decision-variable registry and constraint store for one model build.

use std::collections::BTreeMap;
use std::ops::Range;

use good_lp::{Constraint, Expression, ProblemVariables, Variable, VariableDefinition};

use crate::components::Suffix;

/// Position of a registered variable family in the model's creation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarHandle {
    Scalar(usize),
    Series(Range<usize>),
}

/// An objective plus everything a solver needs to minimise it.
pub struct LpProblem {
    pub variables: ProblemVariables,
    pub objective: Expression,
    pub constraints: Vec<Constraint>,
    /// Every created variable, in creation order. Solvers report values
    /// aligned with this list.
    pub tracked: Vec<Variable>,
}

/// Model context threaded explicitly through every construction call.
///
/// Created once per build, populated component by component in merit order,
/// and consumed by [`Model::into_problem`].
pub struct Model {
    variables: ProblemVariables,
    created: Vec<Variable>,
    constraints: Vec<Constraint>,
    registry: BTreeMap<(String, Suffix), VarHandle>,
    registrations: BTreeMap<String, Vec<(&'static str, VarHandle)>>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            variables: ProblemVariables::new(),
            created: Vec::new(),
            constraints: Vec::new(),
            registry: BTreeMap::new(),
            registrations: BTreeMap::new(),
        }
    }

    /// Adds one variable and records it under `(key, suffix)`.
    pub fn add_scalar(&mut self, key: &str, suffix: Suffix, def: VariableDefinition) -> Variable {
        let index = self.created.len();
        let var = self.variables.add(def.name(format!("{key}_{}", suffix.as_str())));
        self.created.push(var);
        self.registry
            .insert((key.to_string(), suffix), VarHandle::Scalar(index));
        var
    }

    /// Adds one variable per timestep and records the family under `(key, suffix)`.
    pub fn add_series(
        &mut self,
        key: &str,
        suffix: Suffix,
        len: usize,
        def: impl Fn() -> VariableDefinition,
    ) -> Vec<Variable> {
        let start = self.created.len();
        let vars: Vec<Variable> = (0..len)
            .map(|t| {
                self.variables
                    .add(def().name(format!("{key}_{}_{t}", suffix.as_str())))
            })
            .collect();
        self.created.extend_from_slice(&vars);
        self.registry.insert(
            (key.to_string(), suffix),
            VarHandle::Series(start..start + len),
        );
        vars
    }

    /// Handle registered under `(key, suffix)`.
    pub fn handle(&self, key: &str, suffix: Suffix) -> Option<&VarHandle> {
        self.registry.get(&(key.to_string(), suffix))
    }

    /// The scalar variable registered under `(key, suffix)`.
    pub fn scalar(&self, key: &str, suffix: Suffix) -> Option<Variable> {
        match self.handle(key, suffix)? {
            VarHandle::Scalar(i) => self.created.get(*i).copied(),
            VarHandle::Series(_) => None,
        }
    }

    /// The per-timestep variables registered under `(key, suffix)`.
    pub fn series(&self, key: &str, suffix: Suffix) -> Option<&[Variable]> {
        match self.handle(key, suffix)? {
            VarHandle::Series(range) => self.created.get(range.clone()),
            VarHandle::Scalar(_) => None,
        }
    }

    /// Appends a constraint to the store.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Records that the family under `(key, suffix)` fills `column` after solving.
    ///
    /// Registration order is preserved and consumed positionally by the
    /// extractor.
    pub fn register(&mut self, key: &str, column: &'static str, suffix: Suffix) {
        if let Some(handle) = self.handle(key, suffix).cloned() {
            self.registrations
                .entry(key.to_string())
                .or_default()
                .push((column, handle));
        }
    }

    /// Column registrations of a component, in registration order.
    pub fn registrations(&self, key: &str) -> &[(&'static str, VarHandle)] {
        self.registrations.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn variable_count(&self) -> usize {
        self.created.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Splits the model into the solver input and the registry kept for extraction.
    pub fn into_problem(self, objective: Expression) -> (LpProblem, Registry) {
        let problem = LpProblem {
            variables: self.variables,
            objective,
            constraints: self.constraints,
            tracked: self.created,
        };
        let registry = Registry {
            scalars: self
                .registry
                .into_iter()
                .filter_map(|((key, suffix), handle)| match handle {
                    VarHandle::Scalar(i) => Some(((key, suffix), i)),
                    VarHandle::Series(_) => None,
                })
                .collect(),
            registrations: self.registrations,
        };
        (problem, registry)
    }
}

/// What survives of a model once the solver has taken the problem.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    scalars: BTreeMap<(String, Suffix), usize>,
    registrations: BTreeMap<String, Vec<(&'static str, VarHandle)>>,
}

impl Registry {
    /// Index of the scalar variable under `(key, suffix)` in the value list.
    pub fn scalar_index(&self, key: &str, suffix: Suffix) -> Option<usize> {
        self.scalars.get(&(key.to_string(), suffix)).copied()
    }

    pub fn registrations(&self, key: &str) -> &[(&'static str, VarHandle)] {
        self.registrations.get(key).map_or(&[], Vec::as_slice)
    }
}
