//! Capability taxonomy, merit tags, and shared parameter types.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// State column holding the signed power series (positive = source).
pub const POWER: &str = "power";
/// State column holding the non-negative part of `power`.
pub const POWER_POS: &str = "power_pos";
/// State column holding the non-positive part of `power`.
pub const POWER_NEG: &str = "power_neg";
/// State column holding the stored energy of a storage component.
pub const ENERGY: &str = "energy";
/// State column holding standing losses of a storage component.
pub const LOSSES: &str = "losses";

/// Set of behaviours a component exposes to the dispatcher and model builder.
///
/// Queried once at registration time instead of probing for attributes.
///
/// # Examples
///
/// ```
/// use meritsim::components::types::Capabilities;
///
/// let caps = Capabilities::POWER_CONTROLLABLE | Capabilities::ENERGY_STATEFUL;
/// assert!(caps.contains(Capabilities::POWER_CONTROLLABLE));
/// assert!(!caps.contains(Capabilities::LOSS_STATEFUL));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No capability: the component only contributes a fixed series.
    pub const NONE: Self = Self(0);
    /// Power is a dispatch decision (control policy / `P` variables).
    pub const POWER_CONTROLLABLE: Self = Self(1);
    /// Carries an energy state (`E` variables, SoC tracking).
    pub const ENERGY_STATEFUL: Self = Self(1 << 1);
    /// Carries standing losses proportional to stored energy.
    pub const LOSS_STATEFUL: Self = Self(1 << 2);

    /// Returns `true` if every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if the component can be dispatched.
    pub const fn is_controllable(self) -> bool {
        self.contains(Self::POWER_CONTROLLABLE)
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Structural class of a component. Only `SourceSink` and `Storage` carry
/// dispatch behaviour; the other two are reserved for conversion and
/// aggregation elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentClass {
    SourceSink,
    Storage,
    Transformer,
    Collector,
}

/// Merit tag: key into the priority map deciding dispatch precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeritTag {
    /// Loads that must be served (consumers, chargers).
    MustMeetLoad,
    /// Weather-driven generation (PV, wind).
    Volatile,
    /// Dispatchable storage.
    Storage,
    /// Grid connection.
    Grid,
    /// Slack element absorbing what is left.
    FinalBalance,
}

impl MeritTag {
    /// All tags in default priority order.
    pub const ALL: [MeritTag; 5] = [
        MeritTag::MustMeetLoad,
        MeritTag::Volatile,
        MeritTag::Storage,
        MeritTag::Grid,
        MeritTag::FinalBalance,
    ];

    /// String key used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            MeritTag::MustMeetLoad => "must_meet_load",
            MeritTag::Volatile => "volatile",
            MeritTag::Storage => "storage",
            MeritTag::Grid => "grid",
            MeritTag::FinalBalance => "final_balance",
        }
    }
}

impl fmt::Display for MeritTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from merit tag to integer tier (1 = dispatched first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityMap {
    tiers: BTreeMap<MeritTag, u32>,
}

impl Default for PriorityMap {
    fn default() -> Self {
        let tiers = MeritTag::ALL
            .iter()
            .zip(1..)
            .map(|(tag, tier)| (*tag, tier))
            .collect();
        Self { tiers }
    }
}

impl PriorityMap {
    /// Returns a copy with `tag` moved to `tier`.
    pub fn with_tier(mut self, tag: MeritTag, tier: u32) -> Self {
        self.tiers.insert(tag, tier);
        self
    }

    /// Tier of the given tag.
    pub fn tier(&self, tag: MeritTag) -> u32 {
        self.tiers.get(&tag).copied().unwrap_or(u32::MAX)
    }

    /// Highest tier value in the map.
    pub fn max_tier(&self) -> u32 {
        self.tiers.values().copied().max().unwrap_or(0)
    }
}

/// Capacity bound pair `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Clamps both ends into `[-1, 1]` so they act as fractions of installed capacity.
    pub fn clamp_unit(self) -> Self {
        Self {
            lower: self.lower.clamp(-1.0, 1.0),
            upper: self.upper.clamp(-1.0, 1.0),
        }
    }
}

/// Which power directions a dispatchable component may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionFlags {
    /// Positive power (supply, import, underload) permitted.
    pub positive: bool,
    /// Negative power (absorption, export, curtailment) permitted.
    pub negative: bool,
}

impl DirectionFlags {
    pub const BOTH: Self = Self {
        positive: true,
        negative: true,
    };

    /// Returns `1.0` or `0.0` for use as a bound multiplier.
    pub fn positive_factor(self) -> f64 {
        if self.positive { 1.0 } else { 0.0 }
    }

    /// Returns `1.0` or `0.0` for use as a bound multiplier.
    pub fn negative_factor(self) -> f64 {
        if self.negative { 1.0 } else { 0.0 }
    }
}

/// Cost parameters entering the objective.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostParams {
    /// Capital expenditure per unit of capacity.
    pub capex: f64,
    /// Fixed operating expenditure per unit of capacity and year.
    pub opex: f64,
    /// Cost per unit of energy delivered.
    pub variable_cost: f64,
    /// Technical lifetime in years (`None` = does not wear out).
    pub lifetime: Option<f64>,
}

/// Suffix identifying one decision variable family of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suffix {
    Size,
    P,
    Ppos,
    Pneg,
    E,
    Losses,
}

impl Suffix {
    pub fn as_str(self) -> &'static str {
        match self {
            Suffix::Size => "size",
            Suffix::P => "P",
            Suffix::Ppos => "Ppos",
            Suffix::Pneg => "Pneg",
            Suffix::E => "E",
            Suffix::Losses => "Losses",
        }
    }

    /// State column receiving the solved values of this variable family.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmappedSuffix`] for `Size`, which is scalar and
    /// written to the installed capacity instead of the state table.
    pub fn column(self) -> Result<&'static str> {
        match self {
            Suffix::P => Ok(POWER),
            Suffix::Ppos => Ok(POWER_POS),
            Suffix::Pneg => Ok(POWER_NEG),
            Suffix::E => Ok(ENERGY),
            Suffix::Losses => Ok(LOSSES),
            Suffix::Size => Err(Error::UnmappedSuffix(self.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_union_and_contains() {
        let caps = Capabilities::POWER_CONTROLLABLE | Capabilities::LOSS_STATEFUL;
        assert!(caps.is_controllable());
        assert!(caps.contains(Capabilities::LOSS_STATEFUL));
        assert!(!caps.contains(Capabilities::ENERGY_STATEFUL));
        assert!(Capabilities::NONE.contains(Capabilities::NONE));
        assert!(!Capabilities::NONE.is_controllable());
    }

    #[test]
    fn default_priorities_follow_tag_order() {
        let map = PriorityMap::default();
        assert_eq!(map.tier(MeritTag::MustMeetLoad), 1);
        assert_eq!(map.tier(MeritTag::FinalBalance), 5);
        assert_eq!(map.max_tier(), 5);
    }

    #[test]
    fn priority_override_changes_tier() {
        let map = PriorityMap::default().with_tier(MeritTag::Grid, 2);
        assert_eq!(map.tier(MeritTag::Grid), 2);
    }

    #[test]
    fn size_suffix_is_unmapped() {
        assert!(matches!(
            Suffix::Size.column(),
            Err(Error::UnmappedSuffix("size"))
        ));
        assert_eq!(Suffix::Pneg.column().ok(), Some(POWER_NEG));
    }

    #[test]
    fn clamp_unit_limits_bounds() {
        let b = Bounds::new(-50.0, 0.4).clamp_unit();
        assert_eq!(b, Bounds::new(-1.0, 0.4));
    }
}
