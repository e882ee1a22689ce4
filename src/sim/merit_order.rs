//! Priority-ordered heuristic dispatch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::{Component, PriorityMap};
use crate::error::{Error, Result};

/// Name of the balance column left after the last tier.
pub const RESIDUAL: &str = "residual";

/// Cumulative balance after each tier, plus the final residual.
///
/// Positive values are surplus, negative values shortfall.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BalanceTable {
    /// Columns keyed `tier_1` .. `tier_N` and `residual`.
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl BalanceTable {
    /// Column name for a tier.
    pub fn tier_column(tier: u32) -> String {
        format!("tier_{tier}")
    }

    pub fn tier(&self, tier: u32) -> Option<&[f64]> {
        self.columns
            .get(&Self::tier_column(tier))
            .map(Vec::as_slice)
    }

    pub fn residual(&self) -> Option<&[f64]> {
        self.columns.get(RESIDUAL).map(Vec::as_slice)
    }
}

/// Dispatches a merit-sorted component list tier by tier.
///
/// For every tier the previous cumulative balance is carried forward.
/// Dispatchable components run their control policy against the running
/// balance and add the result; fixed-series components add their raw power.
/// Each tier consumes the output of the one before it, so tiers run strictly
/// in order.
///
/// # Arguments
///
/// * `components` - Components sorted by ascending tier
/// * `priorities` - Merit tag to tier mapping
/// * `horizon` - Number of timesteps
///
/// # Errors
///
/// - [`Error::MissingAttributes`] if a fixed-series component has no series
/// - [`Error::HorizonMismatch`] if a series does not match `horizon`
///
/// # Examples
///
/// ```
/// use meritsim::components::{ComponentFactory, PriorityMap};
/// use meritsim::config::{ComponentSpec, KindName};
/// use meritsim::sim::merit_order::dispatch;
///
/// let mut factory = ComponentFactory::new();
/// let mut load = factory
///     .build(ComponentSpec {
///         profile: Some("demand".into()),
///         ..ComponentSpec::new(KindName::Consumer)
///     })
///     .unwrap();
/// load.attach_series(vec![-2.0, -1.0]);
/// let mut slack = factory.build(ComponentSpec::new(KindName::FinalBalance)).unwrap();
/// slack.reset_state(2);
///
/// let mut components = vec![load, slack];
/// let table = dispatch(&mut components, &PriorityMap::default(), 2).unwrap();
/// assert_eq!(table.residual(), Some(&[0.0, 0.0][..]));
/// ```
pub fn dispatch(
    components: &mut [Component],
    priorities: &PriorityMap,
    horizon: usize,
) -> Result<BalanceTable> {
    let mut balance = vec![0.0; horizon];
    let mut table = BalanceTable::default();

    for tier in 1..=priorities.max_tier() {
        for c in components
            .iter_mut()
            .filter(|c| priorities.tier(c.merit_tag()) == tier)
        {
            let power = if c.capabilities().is_controllable() {
                c.control(&balance)?
            } else {
                let raw = c.raw_power().ok_or_else(|| Error::MissingAttributes {
                    component: c.name().to_string(),
                    missing: vec!["series"],
                })?;
                c.write_power(&raw)?;
                Some(raw)
            };

            let Some(power) = power else { continue };
            if power.len() != horizon {
                return Err(Error::HorizonMismatch {
                    name: c.name().to_string(),
                    expected: horizon,
                    actual: power.len(),
                });
            }
            for (b, p) in balance.iter_mut().zip(&power) {
                *b += p;
            }
        }

        debug!(
            tier,
            surplus = balance.iter().filter(|b| **b > 0.0).sum::<f64>(),
            shortfall = balance.iter().filter(|b| **b < 0.0).sum::<f64>(),
            "tier dispatched"
        );
        table
            .columns
            .insert(BalanceTable::tier_column(tier), balance.clone());
    }

    table.columns.insert(RESIDUAL.to_string(), balance);
    Ok(table)
}
