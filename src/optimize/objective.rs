//! Objective composition under a selectable cost-accounting convention.

use good_lp::Expression;
use serde::{Deserialize, Serialize};

use super::model::Model;
use crate::components::storage::DEFAULT_REFLUX_PENALTY;
use crate::components::{Component, ComponentKind, CostParams, MeritTag, SourceSink, Suffix};
use crate::config::FinanceConfig;
use crate::error::{Error, Result};

/// Hours per year used to annualise variable costs.
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// Named cost-accounting conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKey {
    /// Total cost of ownership over the system lifetime, annuitised.
    Tco,
    /// Overnight system cost: annualised capex plus first-year operating cost.
    Osc,
    /// Like [`ObjectiveKey::Osc`], annualising each component over its own lifetime.
    OscComponentCrf,
    /// Operating cost and revenue only.
    Profit,
}

/// System-level financial parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Finance {
    pub interest_rate: f64,
    /// System lifetime in years.
    pub lifetime: f64,
    /// Replaces the derived capital recovery factor when set.
    pub crf_override: Option<f64>,
}

impl From<&FinanceConfig> for Finance {
    fn from(cfg: &FinanceConfig) -> Self {
        Self {
            interest_rate: cfg.interest_rate,
            lifetime: cfg.lifetime,
            crf_override: cfg.capital_recovery_factor,
        }
    }
}

impl Finance {
    /// System capital recovery factor.
    pub fn crf(&self) -> f64 {
        self.crf_override
            .unwrap_or_else(|| capital_recovery_factor(self.interest_rate, self.lifetime))
    }
}

/// Annuity factor turning a one-time expense into equal annual payments.
///
/// `i(1+i)^n / ((1+i)^n - 1)`, or `1/n` without interest.
///
/// # Examples
///
/// ```
/// use meritsim::optimize::objective::capital_recovery_factor;
///
/// assert!((capital_recovery_factor(0.0, 10.0) - 0.1).abs() < 1e-12);
/// assert!((capital_recovery_factor(0.05, 20.0) - 0.080243).abs() < 1e-6);
/// ```
pub fn capital_recovery_factor(rate: f64, years: f64) -> f64 {
    if rate == 0.0 {
        return 1.0 / years;
    }
    let growth = (1.0 + rate).powf(years);
    rate * growth / (growth - 1.0)
}

/// Present value of one unit paid every year for `years` years.
pub fn present_value_factor(rate: f64, years: f64) -> f64 {
    1.0 / capital_recovery_factor(rate, years)
}

/// Per-component multipliers applied to capacity and annual energy cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostFactors {
    /// Multiplier on the size-or-installed reference.
    pub per_capacity: f64,
    /// Multiplier on the annualised variable cost.
    pub per_variable: f64,
}

impl CostFactors {
    /// Resolves the multipliers for one component under `key`.
    pub fn new(key: ObjectiveKey, costs: &CostParams, finance: &Finance) -> Self {
        let crf = finance.crf();
        match key {
            ObjectiveKey::Tco => {
                let capex = match costs.lifetime {
                    Some(lifetime) if finance.lifetime > lifetime => {
                        costs.capex * finance.lifetime / lifetime
                    }
                    _ => costs.capex,
                };
                // Recurring costs are discounted over the system lifetime,
                // then the whole is annuitised. The two factors cancel unless
                // the capital recovery factor is overridden.
                let pvf = present_value_factor(finance.interest_rate, finance.lifetime);
                Self {
                    per_capacity: crf * (capex + costs.opex * pvf),
                    per_variable: crf * pvf,
                }
            }
            ObjectiveKey::Osc => Self {
                per_capacity: crf * costs.capex + costs.opex,
                per_variable: 1.0,
            },
            ObjectiveKey::OscComponentCrf => {
                let crf = match costs.lifetime {
                    Some(lifetime) if finance.crf_override.is_none() => {
                        capital_recovery_factor(finance.interest_rate, lifetime)
                    }
                    _ => crf,
                };
                Self {
                    per_capacity: crf * costs.capex + costs.opex,
                    per_variable: 1.0,
                }
            }
            ObjectiveKey::Profit => Self {
                per_capacity: costs.opex,
                per_variable: 1.0,
            },
        }
    }
}

/// Fixed-capacity cost of a component: `per_capacity × installed`.
pub fn fixed_capacity_cost(
    key: ObjectiveKey,
    costs: &CostParams,
    finance: &Finance,
    installed: f64,
) -> f64 {
    CostFactors::new(key, costs, finance).per_capacity * installed
}

/// Size-or-installed reference: the sizing variable if capacity is free,
/// the installed value otherwise.
pub(crate) fn capacity_ref(model: &Model, component: &Component) -> Result<Expression> {
    if component.is_dof() {
        let size = model
            .scalar(component.key(), Suffix::Size)
            .ok_or(Error::UnmappedSuffix(Suffix::Size.as_str()))?;
        Ok(Expression::from(size))
    } else {
        Ok(Expression::default() + component.installed())
    }
}

/// Sums every variable of a registered series.
fn series_sum(model: &Model, key: &str, suffix: Suffix) -> Expression {
    let mut sum = Expression::default();
    for var in model.series(key, suffix).unwrap_or_default() {
        sum += *var;
    }
    sum
}

/// Builds the scalar objective over all components.
///
/// Capacity terms are scaled by [`CostFactors::per_capacity`]; energy terms
/// are annualised from the horizon to one year and scaled by
/// [`CostFactors::per_variable`]. Every dispatchable component adds a
/// small linear penalty on throughput, so `Ppos` and `Pneg` are not both
/// non-zero at a cost-neutral optimum.
///
/// # Errors
///
/// Returns [`Error::UnmappedSuffix`] if a sized component has no size
/// variable in `model`.
pub fn compose(
    model: &Model,
    components: &[Component],
    key: ObjectiveKey,
    finance: &Finance,
    horizon: usize,
) -> Result<Expression> {
    let annualise = if horizon == 0 {
        0.0
    } else {
        HOURS_PER_YEAR / horizon as f64
    };
    let mut objective = Expression::default();

    for c in components {
        let factors = CostFactors::new(key, c.costs(), finance);
        let cap = capacity_ref(model, c)?;
        objective += cap.clone() * factors.per_capacity;

        let energy = variable_cost(model, c, cap);
        objective += energy * (factors.per_variable * annualise);

        if c.capabilities().is_controllable() {
            let penalty = match c.kind() {
                ComponentKind::Storage(storage) => storage.reflux_penalty,
                ComponentKind::SourceSink(_) => DEFAULT_REFLUX_PENALTY,
            };
            let throughput =
                series_sum(model, c.key(), Suffix::Ppos) - series_sum(model, c.key(), Suffix::Pneg);
            objective += throughput * penalty;
        }
    }

    Ok(objective)
}

/// Variable cost over the horizon, before annualisation.
fn variable_cost(model: &Model, c: &Component, cap: Expression) -> Expression {
    let rate = c.costs().variable_cost;
    match c.kind() {
        ComponentKind::SourceSink(SourceSink::Grid { tariff, .. }) => {
            series_sum(model, c.key(), Suffix::Ppos) * tariff.import_price
                + series_sum(model, c.key(), Suffix::Pneg) * tariff.export_price
        }
        ComponentKind::SourceSink(SourceSink::FinalBalance { .. }) | ComponentKind::Storage(_) => {
            series_sum(model, c.key(), Suffix::Ppos) * rate
        }
        ComponentKind::SourceSink(_) => {
            let total: f64 = c.series().unwrap_or_default().iter().sum();
            match c.merit_tag() {
                MeritTag::Volatile => cap * (rate * total),
                _ => Expression::default() + rate * -total,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finance(crf: Option<f64>) -> Finance {
        Finance {
            interest_rate: 0.05,
            lifetime: 20.0,
            crf_override: crf,
        }
    }

    #[test]
    fn osc_with_fixed_crf() {
        let costs = CostParams {
            capex: 100.0,
            opex: 1.0,
            variable_cost: 0.0,
            lifetime: Some(10.0),
        };
        let cost = fixed_capacity_cost(ObjectiveKey::Osc, &costs, &finance(Some(0.12)), 5.0);
        assert!((cost - 65.0).abs() < 1e-9);
    }

    #[test]
    fn tco_prorates_replacement() {
        let costs = CostParams {
            capex: 100.0,
            opex: 0.0,
            variable_cost: 0.0,
            lifetime: Some(10.0),
        };
        let f = finance(Some(0.1));
        let factors = CostFactors::new(ObjectiveKey::Tco, &costs, &f);
        // 20-year system, 10-year component: capex counted twice.
        assert!((factors.per_capacity - 20.0).abs() < 1e-9);
    }

    #[test]
    fn component_crf_uses_component_lifetime() {
        let costs = CostParams {
            capex: 100.0,
            opex: 0.0,
            variable_cost: 0.0,
            lifetime: Some(10.0),
        };
        let factors = CostFactors::new(ObjectiveKey::OscComponentCrf, &costs, &finance(None));
        let expected = 100.0 * capital_recovery_factor(0.05, 10.0);
        assert!((factors.per_capacity - expected).abs() < 1e-9);
    }

    #[test]
    fn profit_ignores_capex() {
        let costs = CostParams {
            capex: 1000.0,
            opex: 3.0,
            variable_cost: 0.0,
            lifetime: None,
        };
        let factors = CostFactors::new(ObjectiveKey::Profit, &costs, &finance(None));
        assert_eq!(factors.per_capacity, 3.0);
    }

    #[test]
    fn tco_discounts_opex_like_variable_cost() {
        let costs = CostParams {
            capex: 0.0,
            opex: 2.0,
            variable_cost: 0.0,
            lifetime: None,
        };
        let derived = CostFactors::new(ObjectiveKey::Tco, &costs, &finance(None));
        assert!((derived.per_capacity - 2.0).abs() < 1e-9);
        assert!((derived.per_variable - 1.0).abs() < 1e-12);

        let pvf = present_value_factor(0.05, 20.0);
        let overridden = CostFactors::new(ObjectiveKey::Tco, &costs, &finance(Some(0.1)));
        assert!((overridden.per_capacity - 0.1 * 2.0 * pvf).abs() < 1e-9);
        assert!((overridden.per_variable - 0.1 * pvf).abs() < 1e-12);
    }

    #[test]
    fn crf_and_pvf_are_reciprocal() {
        let crf = capital_recovery_factor(0.07, 15.0);
        let pvf = present_value_factor(0.07, 15.0);
        assert!((crf * pvf - 1.0).abs() < 1e-12);
    }
}
