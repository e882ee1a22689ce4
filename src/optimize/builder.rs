//! Per-component variable and constraint generation.

use good_lp::{Expression, Variable, constraint, variable};
use tracing::debug;

use super::model::Model;
use super::objective::capacity_ref;
use crate::components::types::{ENERGY, LOSSES};
use crate::components::{
    Capabilities, Component, ComponentKind, DirectionFlags, MeritTag, SourceSink, Storage, Suffix,
};
use crate::error::{Error, Result};

/// Builds the model for a merit-sorted component list.
///
/// Each component contributes its own variables and constraints, in list
/// order, followed by one global power-balance constraint per timestep.
///
/// # Errors
///
/// - [`Error::MissingAttributes`] if a fixed-series component has no series
/// - [`Error::UnmappedSuffix`] if a registered suffix has no state column
pub fn build(components: &[Component], horizon: usize) -> Result<Model> {
    let mut model = Model::new();
    for component in components {
        add_component(&mut model, component, horizon)?;
        debug!(
            key = component.key(),
            variables = model.variable_count(),
            constraints = model.constraint_count(),
            "added component to model"
        );
    }
    add_power_balance(&mut model, components, horizon)?;
    Ok(model)
}

/// Adds the variables and constraints one component needs.
///
/// # Errors
///
/// Returns [`Error::UnmappedSuffix`] if a registered suffix has no state
/// column.
pub fn add_component(model: &mut Model, c: &Component, horizon: usize) -> Result<()> {
    let key = c.key();
    if c.is_dof() {
        let bounds = c.bounds();
        model.add_scalar(key, Suffix::Size, variable().min(0.0).max(bounds.upper));
    }

    let caps = c.capabilities();
    if !caps.is_controllable() {
        return Ok(());
    }

    let directions = match c.kind() {
        ComponentKind::SourceSink(kind) => kind.directions(),
        ComponentKind::Storage(_) => DirectionFlags::BOTH,
    };
    add_power_split(model, key, horizon, directions)?;

    let cap = capacity_ref(model, c)?;
    let p = power(model, key)?;

    match c.kind() {
        ComponentKind::Storage(storage) => {
            let rated = cap.clone() * (1.0 / storage.ep_ratio);
            let lower = rated.clone() * -1.0;
            add_storage(model, c, storage, &p, cap)?;
            add_power_limits(model, &p, &rated, &lower);
            add_partition_limits(model, key, &rated, &lower);
        }
        ComponentKind::SourceSink(SourceSink::Grid { .. }) => {
            let pos = directions.positive_factor();
            let neg = directions.negative_factor();
            if c.is_dof() {
                let upper = cap.clone() * pos;
                let lower = cap * (-neg);
                add_power_limits(model, &p, &upper, &lower);
                add_partition_limits(model, key, &upper, &lower);
            } else {
                // Bounds act as fractions of installed capacity.
                let b = c.bounds().clamp_unit();
                let upper = pos * b.upper * c.installed();
                let lower = neg * b.lower * c.installed();
                add_fixed_limits(model, key, &p, upper, lower);
            }
        }
        ComponentKind::SourceSink(SourceSink::FinalBalance { .. }) => {
            let b = c.bounds();
            let upper = directions.positive_factor() * b.upper;
            let lower = directions.negative_factor() * b.lower;
            add_fixed_limits(model, key, &p, upper, lower);
        }
        ComponentKind::SourceSink(_) => {}
    }

    Ok(())
}

fn constant(value: f64) -> Expression {
    Expression::default() + value
}

/// `lower <= P[t] <= upper` for every timestep.
fn add_power_limits(model: &mut Model, p: &[Variable], upper: &Expression, lower: &Expression) {
    for &pt in p {
        model.add_constraint(constraint!(pt <= upper.clone()));
        model.add_constraint(constraint!(pt >= lower.clone()));
    }
}

/// `Ppos[t] <= upper` and `Pneg[t] >= lower`.
///
/// Without these the split is only tied through `P`, and simultaneous
/// import and export can grow without limit.
fn add_partition_limits(model: &mut Model, key: &str, upper: &Expression, lower: &Expression) {
    let pos = model
        .series(key, Suffix::Ppos)
        .map(<[Variable]>::to_vec)
        .unwrap_or_default();
    for v in pos {
        model.add_constraint(constraint!(v <= upper.clone()));
    }
    let neg = model
        .series(key, Suffix::Pneg)
        .map(<[Variable]>::to_vec)
        .unwrap_or_default();
    for v in neg {
        model.add_constraint(constraint!(v >= lower.clone()));
    }
}

/// Constant power limits. Partitions are sign-constrained, so their limits
/// are clipped at zero.
fn add_fixed_limits(model: &mut Model, key: &str, p: &[Variable], upper: f64, lower: f64) {
    add_power_limits(model, p, &constant(upper), &constant(lower));
    add_partition_limits(
        model,
        key,
        &constant(upper.max(0.0)),
        &constant(lower.min(0.0)),
    );
}

/// Creates `P`, `Ppos` and `Pneg` and ties them with `P = Ppos + Pneg`.
///
/// A disabled direction leaves out its partition variable entirely.
fn add_power_split(
    model: &mut Model,
    key: &str,
    horizon: usize,
    directions: DirectionFlags,
) -> Result<()> {
    let p = model.add_series(key, Suffix::P, horizon, variable);
    let pos = directions
        .positive
        .then(|| model.add_series(key, Suffix::Ppos, horizon, || variable().min(0.0)));
    let neg = directions
        .negative
        .then(|| model.add_series(key, Suffix::Pneg, horizon, || variable().max(0.0)));

    for (t, &pt) in p.iter().enumerate() {
        let mut split = Expression::default();
        if let Some(pos) = &pos {
            split += pos[t];
        }
        if let Some(neg) = &neg {
            split += neg[t];
        }
        model.add_constraint(constraint!(pt == split));
    }

    model.register(key, Suffix::P.column()?, Suffix::P);
    if pos.is_some() {
        model.register(key, Suffix::Ppos.column()?, Suffix::Ppos);
    }
    if neg.is_some() {
        model.register(key, Suffix::Pneg.column()?, Suffix::Pneg);
    }
    Ok(())
}

/// Storage dynamics: initial energy, single-step recursion and energy
/// limits.
fn add_storage(
    model: &mut Model,
    c: &Component,
    storage: &Storage,
    p: &[Variable],
    cap: Expression,
) -> Result<()> {
    let key = c.key();
    let horizon = p.len();
    let e = model.add_series(key, Suffix::E, horizon, variable);
    let lossy = c.capabilities().contains(Capabilities::LOSS_STATEFUL);
    let losses =
        lossy.then(|| model.add_series(key, Suffix::Losses, horizon, || variable().min(0.0)));

    if let Some(&e0) = e.first() {
        model.add_constraint(constraint!(e0 == cap.clone() * storage.starting_soc));
    }

    for t in 0..horizon {
        let mut next = Expression::from(e[t]) - p[t];
        if let Some(losses) = &losses {
            model.add_constraint(constraint!(losses[t] == e[t] * storage.self_discharge));
            next -= losses[t];
        }
        if t + 1 < horizon {
            model.add_constraint(constraint!(e[t + 1] == next));
        } else {
            // Energy left after the last step must still fit the store.
            model.add_constraint(constraint!(next.clone() >= 0.0));
            model.add_constraint(constraint!(next <= cap.clone()));
        }
        model.add_constraint(constraint!(e[t] >= 0.0));
        model.add_constraint(constraint!(e[t] <= cap.clone()));
    }

    model.register(key, ENERGY, Suffix::E);
    if lossy {
        model.register(key, LOSSES, Suffix::Losses);
    }
    Ok(())
}

fn power(model: &Model, key: &str) -> Result<Vec<Variable>> {
    model
        .series(key, Suffix::P)
        .map(<[Variable]>::to_vec)
        .ok_or(Error::UnmappedSuffix(Suffix::P.as_str()))
}

/// Effective contribution of a component to the balance at every timestep.
///
/// Dispatchable components contribute `P[t]`, volatile sources their
/// capacity reference times yield, and loads their raw series.
///
/// # Errors
///
/// Returns [`Error::MissingAttributes`] for a fixed-series component with no
/// series attached.
pub fn contributions(model: &Model, c: &Component, horizon: usize) -> Result<Vec<Expression>> {
    if c.capabilities().is_controllable() {
        let p = power(model, c.key())?;
        return Ok(p.into_iter().map(Expression::from).collect());
    }

    let series = c.series().ok_or_else(|| Error::MissingAttributes {
        component: c.name().to_string(),
        missing: vec!["series"],
    })?;
    if series.len() != horizon {
        return Err(Error::HorizonMismatch {
            name: c.name().to_string(),
            expected: horizon,
            actual: series.len(),
        });
    }

    match c.merit_tag() {
        MeritTag::Volatile => {
            let cap = capacity_ref(model, c)?;
            Ok(series.iter().map(|y| cap.clone() * *y).collect())
        }
        _ => Ok(series
            .iter()
            .map(|v| Expression::default() + *v)
            .collect()),
    }
}

/// Adds `Σ contributions[t] == 0` for every timestep.
fn add_power_balance(model: &mut Model, components: &[Component], horizon: usize) -> Result<()> {
    let mut totals = vec![Expression::default(); horizon];
    for c in components {
        for (total, term) in totals.iter_mut().zip(contributions(model, c, horizon)?) {
            *total += term;
        }
    }
    for total in totals {
        model.add_constraint(constraint!(total == 0.0));
    }
    Ok(())
}
