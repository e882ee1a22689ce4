//! The component entity and the factory that registers it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::source_sink::{GridTariff, SourceSink};
use super::state::StateTable;
use super::storage::{DEFAULT_REFLUX_PENALTY, Storage, StorageKind};
use super::types::{
    Bounds, Capabilities, ComponentClass, CostParams, DirectionFlags, ENERGY, LOSSES, MeritTag,
    POWER, POWER_NEG, POWER_POS,
};
use crate::config::{ComponentSpec, KindName};
use crate::error::{Error, Result};

/// Bound applied to final-balance power when none is configured.
pub const DEFAULT_BALANCE_LIMIT: f64 = 1e6;

/// Kind-specific behaviour of a component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    SourceSink(SourceSink),
    Storage(Storage),
}

impl ComponentKind {
    pub fn class(&self) -> ComponentClass {
        match self {
            ComponentKind::SourceSink(_) => ComponentClass::SourceSink,
            ComponentKind::Storage(_) => ComponentClass::Storage,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::SourceSink(s) => s.label(),
            ComponentKind::Storage(s) => s.label(),
        }
    }

    pub fn merit_tag(&self) -> MeritTag {
        match self {
            ComponentKind::SourceSink(s) => s.merit_tag(),
            ComponentKind::Storage(s) => s.merit_tag(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            ComponentKind::SourceSink(s) => s.capabilities(),
            ComponentKind::Storage(s) => s.capabilities(),
        }
    }

    fn default_color(&self) -> &'static str {
        match self {
            ComponentKind::SourceSink(SourceSink::PhotoVoltaic) => "#f2c12e",
            ComponentKind::SourceSink(SourceSink::Wind) => "#4c9be8",
            ComponentKind::SourceSink(SourceSink::Consumer) => "#5a5a5a",
            ComponentKind::SourceSink(SourceSink::FastCharger) => "#8e44ad",
            ComponentKind::SourceSink(SourceSink::Grid { .. }) => "#2c3e50",
            ComponentKind::SourceSink(SourceSink::FinalBalance { .. }) => "#c0392b",
            ComponentKind::Storage(_) => "#27ae60",
        }
    }
}

/// Plot hints passed through to reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Styling {
    pub color: String,
    pub label: String,
}

/// One energy-system element.
///
/// Holds a fixed capability set, bounds, cost parameters, and a
/// time-indexed state table sized to the system horizon once resources are
/// attached.
#[derive(Debug, Clone)]
pub struct Component {
    key: String,
    name: String,
    kind: ComponentKind,
    tag: MeritTag,
    capabilities: Capabilities,
    bounds: Bounds,
    dof: bool,
    installed: f64,
    costs: CostParams,
    profile: Option<String>,
    scale: f64,
    series: Option<Vec<f64>>,
    state: StateTable,
    styling: Styling,
    settings: ComponentSpec,
}

impl Component {
    /// Unique key used in the variable registry and result documents.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn merit_tag(&self) -> MeritTag {
        self.tag
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Whether capacity is a free decision variable.
    pub fn is_dof(&self) -> bool {
        self.dof
    }

    pub fn installed(&self) -> f64 {
        self.installed
    }

    pub fn set_installed(&mut self, installed: f64) {
        self.installed = installed;
    }

    pub fn costs(&self) -> &CostParams {
        &self.costs
    }

    /// Resource column this component reads, if any.
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Raw series: per-unit yield for generation, signed demand for loads.
    pub fn series(&self) -> Option<&[f64]> {
        self.series.as_deref()
    }

    pub fn state(&self) -> &StateTable {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateTable {
        &mut self.state
    }

    pub fn styling(&self) -> &Styling {
        &self.styling
    }

    /// Recognized options this component was built from.
    pub fn settings(&self) -> &ComponentSpec {
        &self.settings
    }

    /// Storage parameters if this is a storage component.
    pub fn storage(&self) -> Option<&Storage> {
        match &self.kind {
            ComponentKind::Storage(s) => Some(s),
            ComponentKind::SourceSink(_) => None,
        }
    }

    /// Attaches the raw series and resets the state table to its length.
    pub fn attach_series(&mut self, series: Vec<f64>) {
        self.state = StateTable::new(series.len());
        self.series = Some(series);
    }

    /// Resets the state table to an empty one of `len` steps.
    pub fn reset_state(&mut self, len: usize) {
        self.state = StateTable::new(len);
    }

    /// Effective contribution of a fixed-series component at its current
    /// installed capacity.
    ///
    /// Generation scales its per-unit yield by installed capacity; loads use
    /// their series as-is. Returns `None` for dispatchable components or when
    /// no series is attached.
    pub fn raw_power(&self) -> Option<Vec<f64>> {
        if self.capabilities.is_controllable() {
            return None;
        }
        let series = self.series.as_ref()?;
        match self.tag {
            MeritTag::Volatile => Some(series.iter().map(|y| y * self.installed).collect()),
            _ => Some(series.clone()),
        }
    }

    /// Runs this component's control policy against the cumulative balance
    /// and records the outcome in its state table.
    ///
    /// Returns the dispatched power series, or `None` if the component has
    /// no control policy.
    pub fn control(&mut self, balance: &[f64]) -> Result<Option<Vec<f64>>> {
        let power = match &self.kind {
            ComponentKind::Storage(storage) => {
                let out = storage.dispatch(balance, self.installed);
                self.state.set_column(ENERGY, out.energy)?;
                if self.capabilities.contains(Capabilities::LOSS_STATEFUL) {
                    self.state.set_column(LOSSES, out.losses)?;
                }
                out.power
            }
            ComponentKind::SourceSink(source_sink) => {
                match source_sink.control(balance, self.installed, self.bounds) {
                    Some(power) => power,
                    None => return Ok(None),
                }
            }
        };
        self.write_power(&power)?;
        Ok(Some(power))
    }

    /// Writes `power` and, for dispatchable components, its sign partitions.
    pub fn write_power(&mut self, power: &[f64]) -> Result<()> {
        self.state.set_column(POWER, power.to_vec())?;
        if self.capabilities.is_controllable() {
            let pos = power.iter().map(|p| p.max(0.0)).collect();
            let neg = power.iter().map(|p| p.min(0.0)).collect();
            self.state.set_column(POWER_POS, pos)?;
            self.state.set_column(POWER_NEG, neg)?;
        }
        Ok(())
    }
}

/// Builds components from their specs, assigning keys and default names.
///
/// Numbering is per kind and local to the factory, so two systems built in
/// the same process never influence each other.
#[derive(Debug, Default)]
pub struct ComponentFactory {
    counters: BTreeMap<&'static str, usize>,
}

impl ComponentFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a spec and builds the component.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingAttributes`] listing every attribute the kind
    ///   requires but the spec leaves unset.
    /// - [`Error::ZeroCapexWithLifetime`] if a finite lifetime is given
    ///   without capex.
    pub fn build(&mut self, spec: ComponentSpec) -> Result<Component> {
        let kind = kind_from_spec(&spec);
        let label = kind.label();
        let counter = self.counters.entry(label).or_insert(0);
        *counter += 1;
        let number = *counter;

        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("{label} {number}"));
        let key = format!("{}_{number}", label.to_lowercase());

        let missing = missing_attributes(&spec);
        if !missing.is_empty() {
            return Err(Error::MissingAttributes {
                component: name,
                missing,
            });
        }
        if let Some(lifetime) = spec.lifetime {
            if spec.capex == 0.0 && lifetime.is_finite() {
                return Err(Error::ZeroCapexWithLifetime {
                    component: name,
                    lifetime,
                });
            }
        }

        let bounds = match (spec.bounds, &kind) {
            (Some([lower, upper]), _) => Bounds::new(lower, upper),
            (None, ComponentKind::SourceSink(SourceSink::FinalBalance { .. })) => {
                Bounds::new(-DEFAULT_BALANCE_LIMIT, DEFAULT_BALANCE_LIMIT)
            }
            (None, _) => Bounds::new(-1.0, 1.0),
        };
        // Sized components start from zero and learn their capacity from the solve.
        let installed = if spec.dof {
            0.0
        } else {
            spec.installed.unwrap_or(0.0)
        };

        debug!(key = %key, name = %name, kind = label, dof = spec.dof, "registered component");

        Ok(Component {
            tag: kind.merit_tag(),
            capabilities: kind.capabilities(),
            styling: Styling {
                color: spec
                    .color
                    .clone()
                    .unwrap_or_else(|| kind.default_color().to_string()),
                label: name.clone(),
            },
            key,
            name,
            bounds,
            dof: spec.dof,
            installed,
            costs: CostParams {
                capex: spec.capex,
                opex: spec.opex,
                variable_cost: spec.variable_cost,
                lifetime: spec.lifetime,
            },
            profile: spec.profile.clone(),
            scale: spec.scale,
            series: None,
            state: StateTable::default(),
            kind,
            settings: spec,
        })
    }
}

fn kind_from_spec(spec: &ComponentSpec) -> ComponentKind {
    let storage = |kind| {
        ComponentKind::Storage(Storage {
            kind,
            ep_ratio: spec.ep_ratio.unwrap_or(1.0),
            starting_soc: spec.starting_soc.unwrap_or(0.0),
            self_discharge: spec.self_discharge.unwrap_or(0.0),
            reflux_penalty: spec.reflux_penalty.unwrap_or(DEFAULT_REFLUX_PENALTY),
        })
    };
    match spec.kind {
        KindName::Photovoltaic => ComponentKind::SourceSink(SourceSink::PhotoVoltaic),
        KindName::Wind => ComponentKind::SourceSink(SourceSink::Wind),
        KindName::Consumer => ComponentKind::SourceSink(SourceSink::Consumer),
        KindName::FastCharger => ComponentKind::SourceSink(SourceSink::FastCharger),
        KindName::Grid => ComponentKind::SourceSink(SourceSink::Grid {
            tariff: GridTariff {
                import_price: spec.import_price.unwrap_or(0.0),
                export_price: spec.export_price.unwrap_or(0.0),
            },
            directions: DirectionFlags {
                positive: spec.allow_import.unwrap_or(true),
                negative: spec.allow_export.unwrap_or(true),
            },
        }),
        KindName::FinalBalance => ComponentKind::SourceSink(SourceSink::FinalBalance {
            directions: DirectionFlags {
                positive: spec.allow_underload.unwrap_or(true),
                negative: spec.allow_curtailment.unwrap_or(true),
            },
        }),
        KindName::Lithium => storage(StorageKind::Lithium),
        KindName::Hydrogen => storage(StorageKind::Hydrogen),
    }
}

/// Attributes the kind needs but the spec leaves unset, in a stable order.
fn missing_attributes(spec: &ComponentSpec) -> Vec<&'static str> {
    let mut missing = Vec::new();
    let sized = matches!(
        spec.kind,
        KindName::Photovoltaic
            | KindName::Wind
            | KindName::Grid
            | KindName::Lithium
            | KindName::Hydrogen
    );

    if sized {
        if spec.dof && spec.bounds.is_none() {
            missing.push("bounds");
        }
        if !spec.dof && spec.installed.is_none() {
            missing.push("installed");
        }
    }
    if matches!(
        spec.kind,
        KindName::Photovoltaic | KindName::Wind | KindName::Consumer | KindName::FastCharger
    ) && spec.profile.is_none()
    {
        missing.push("profile");
    }
    if matches!(spec.kind, KindName::Lithium | KindName::Hydrogen) {
        if spec.ep_ratio.is_none() {
            missing.push("ep_ratio");
        }
        if spec.starting_soc.is_none() {
            missing.push("starting_soc");
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_numbers_per_kind() {
        let mut factory = ComponentFactory::new();
        let spec = ComponentSpec {
            profile: Some("irradiance".to_string()),
            installed: Some(5.0),
            ..ComponentSpec::new(KindName::Photovoltaic)
        };
        let a = factory.build(spec.clone()).ok();
        let b = factory.build(spec).ok();
        assert_eq!(a.as_ref().map(Component::name), Some("PhotoVoltaic 1"));
        assert_eq!(b.as_ref().map(Component::key), Some("photovoltaic_2"));
    }

    #[test]
    fn independent_factories_do_not_share_numbering() {
        let spec = ComponentSpec::new(KindName::FinalBalance);
        let a = ComponentFactory::new().build(spec.clone()).ok();
        let b = ComponentFactory::new().build(spec).ok();
        assert_eq!(
            a.as_ref().map(Component::key),
            b.as_ref().map(Component::key)
        );
    }

    #[test]
    fn storage_reports_every_missing_attribute() {
        let err = ComponentFactory::new().build(ComponentSpec::new(KindName::Lithium));
        match err {
            Err(Error::MissingAttributes { missing, .. }) => {
                assert_eq!(missing, vec!["installed", "ep_ratio", "starting_soc"]);
            }
            other => panic!("expected MissingAttributes, got {other:?}"),
        }
    }

    #[test]
    fn zero_capex_with_lifetime_is_rejected() {
        let spec = ComponentSpec {
            installed: Some(10.0),
            lifetime: Some(20.0),
            ..ComponentSpec::new(KindName::Grid)
        };
        assert!(matches!(
            ComponentFactory::new().build(spec),
            Err(Error::ZeroCapexWithLifetime { .. })
        ));
    }

    #[test]
    fn storage_capabilities_and_tag() {
        let spec = ComponentSpec {
            installed: Some(10.0),
            ep_ratio: Some(2.0),
            starting_soc: Some(0.5),
            ..ComponentSpec::new(KindName::Hydrogen)
        };
        let c = ComponentFactory::new().build(spec).ok();
        let caps = c.as_ref().map(Component::capabilities);
        assert_eq!(
            caps,
            Some(
                Capabilities::POWER_CONTROLLABLE
                    | Capabilities::ENERGY_STATEFUL
                    | Capabilities::LOSS_STATEFUL
            )
        );
        assert_eq!(c.map(|c| c.merit_tag()), Some(MeritTag::Storage));
    }

    #[test]
    fn volatile_raw_power_scales_with_installed() {
        let spec = ComponentSpec {
            profile: Some("wind".to_string()),
            installed: Some(4.0),
            ..ComponentSpec::new(KindName::Wind)
        };
        let mut c = ComponentFactory::new().build(spec).ok();
        if let Some(c) = c.as_mut() {
            c.attach_series(vec![0.0, 0.5, 1.0]);
        }
        assert_eq!(c.and_then(|c| c.raw_power()), Some(vec![0.0, 2.0, 4.0]));
    }

    #[test]
    fn control_writes_power_partitions() {
        let spec = ComponentSpec {
            installed: Some(100.0),
            ..ComponentSpec::new(KindName::Grid)
        };
        let mut grid = ComponentFactory::new().build(spec).ok();
        let power = grid
            .as_mut()
            .and_then(|g| {
                g.reset_state(2);
                g.control(&[-150.0, 150.0]).ok().flatten()
            });
        assert_eq!(power, Some(vec![100.0, -100.0]));
        let state = grid.as_ref().map(Component::state);
        assert_eq!(
            state.and_then(|s| s.column(POWER_POS)),
            Some(&[100.0, 0.0][..])
        );
        assert_eq!(
            state.and_then(|s| s.column(POWER_NEG)),
            Some(&[0.0, -100.0][..])
        );
    }
}
