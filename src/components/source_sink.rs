//! Source/sink components: generation, loads, grid tie, and final balance.

use serde::{Deserialize, Serialize};

use super::types::{Bounds, Capabilities, DirectionFlags, MeritTag};

/// Grid tariff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTariff {
    /// Price paid per unit of imported energy.
    pub import_price: f64,
    /// Revenue per unit of exported energy.
    pub export_price: f64,
}

/// Concrete source/sink variants.
///
/// # Power Flow Convention
/// - Positive power: source (generation, import, discharge, underload)
/// - Negative power: load (consumption, export, charge, curtailment)
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSink {
    PhotoVoltaic,
    Wind,
    Consumer,
    FastCharger,
    Grid {
        tariff: GridTariff,
        directions: DirectionFlags,
    },
    FinalBalance {
        directions: DirectionFlags,
    },
}

impl SourceSink {
    /// Human-readable kind name, also used for default component names.
    pub fn label(&self) -> &'static str {
        match self {
            SourceSink::PhotoVoltaic => "PhotoVoltaic",
            SourceSink::Wind => "Wind",
            SourceSink::Consumer => "Consumer",
            SourceSink::FastCharger => "FastCharger",
            SourceSink::Grid { .. } => "Grid",
            SourceSink::FinalBalance { .. } => "FinalBalance",
        }
    }

    pub fn merit_tag(&self) -> MeritTag {
        match self {
            SourceSink::PhotoVoltaic | SourceSink::Wind => MeritTag::Volatile,
            SourceSink::Consumer | SourceSink::FastCharger => MeritTag::MustMeetLoad,
            SourceSink::Grid { .. } => MeritTag::Grid,
            SourceSink::FinalBalance { .. } => MeritTag::FinalBalance,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            SourceSink::Grid { .. } | SourceSink::FinalBalance { .. } => {
                Capabilities::POWER_CONTROLLABLE
            }
            _ => Capabilities::NONE,
        }
    }

    /// Enabled power directions; fixed-series kinds report both.
    pub fn directions(&self) -> DirectionFlags {
        match self {
            SourceSink::Grid { directions, .. } | SourceSink::FinalBalance { directions } => {
                *directions
            }
            _ => DirectionFlags::BOTH,
        }
    }

    /// Heuristic control policy for dispatchable variants.
    ///
    /// Returns `None` for fixed-series kinds.
    pub fn control(&self, balance: &[f64], installed: f64, bounds: Bounds) -> Option<Vec<f64>> {
        match self {
            SourceSink::Grid { directions, .. } => {
                Some(grid_policy(balance, installed, *directions))
            }
            SourceSink::FinalBalance { directions } => {
                Some(final_balance_policy(balance, bounds, *directions))
            }
            _ => None,
        }
    }
}

/// Grid control policy.
///
/// Imports up to `installed` when the balance is short and exports up to
/// `installed` when it is long. Anything beyond the connection rating stays
/// in the residual.
///
/// # Arguments
///
/// * `balance` - Cumulative balance before the grid tier (positive = surplus)
/// * `installed` - Connection rating
/// * `directions` - Whether import and export are permitted
///
/// # Returns
///
/// Grid power per step: `import - export` (positive = import).
pub fn grid_policy(balance: &[f64], installed: f64, directions: DirectionFlags) -> Vec<f64> {
    balance
        .iter()
        .map(|&b| {
            let import = if b < 0.0 && directions.positive {
                (-b).min(installed)
            } else {
                0.0
            };
            let export = if b > 0.0 && directions.negative {
                b.min(installed)
            } else {
                0.0
            };
            import - export
        })
        .collect()
}

/// Final-balance policy: absorbs the remaining residual within its bounds.
///
/// A shortfall is covered as underload (positive power) and a surplus is
/// dumped as curtailment (negative power), each only if that direction is
/// enabled.
pub fn final_balance_policy(balance: &[f64], bounds: Bounds, directions: DirectionFlags) -> Vec<f64> {
    balance
        .iter()
        .map(|&b| {
            if b < 0.0 && directions.positive {
                (-b).min(bounds.upper.max(0.0))
            } else if b > 0.0 && directions.negative {
                (-b).max(bounds.lower.min(0.0))
            } else {
                0.0
            }
        })
        .collect()
}
