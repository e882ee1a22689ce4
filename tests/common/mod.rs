//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::NaiveDateTime;

use meritsim::components::{Component, ComponentFactory, PriorityMap};
use meritsim::config::{ComponentSpec, KindName, START_FORMAT, ScenarioConfig};
use meritsim::optimize::{Finance, ObjectiveKey};
use meritsim::resource::ResourceTable;
use meritsim::sim::{Horizon, System};

/// Absolute tolerance for values coming back from the interior-point solver.
pub const SOLVER_TOL: f64 = 1e-4;

pub fn start() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2023-01-01T00:00:00", START_FORMAT).unwrap_or_default()
}

/// Finance with a fixed capital recovery factor.
pub fn finance(crf: Option<f64>) -> Finance {
    Finance {
        interest_rate: 0.05,
        lifetime: 20.0,
        crf_override: crf,
    }
}

/// Empty system over `len` hours.
pub fn system(len: usize, objective: ObjectiveKey, finance: Finance) -> System {
    System::new(
        "test",
        Horizon { start: start(), len },
        objective,
        finance,
        PriorityMap::default(),
    )
}

pub fn build(factory: &mut ComponentFactory, spec: ComponentSpec) -> Component {
    factory
        .build(spec)
        .unwrap_or_else(|e| panic!("spec should build: {e}"))
}

pub fn consumer(scale: f64) -> ComponentSpec {
    ComponentSpec {
        profile: Some("demand".to_string()),
        scale,
        ..ComponentSpec::new(KindName::Consumer)
    }
}

pub fn pv(installed: f64) -> ComponentSpec {
    ComponentSpec {
        profile: Some("irradiance".to_string()),
        installed: Some(installed),
        ..ComponentSpec::new(KindName::Photovoltaic)
    }
}

pub fn lithium(installed: f64, ep_ratio: f64, starting_soc: f64) -> ComponentSpec {
    ComponentSpec {
        installed: Some(installed),
        ep_ratio: Some(ep_ratio),
        starting_soc: Some(starting_soc),
        ..ComponentSpec::new(KindName::Lithium)
    }
}

pub fn grid(installed: f64) -> ComponentSpec {
    ComponentSpec {
        installed: Some(installed),
        ..ComponentSpec::new(KindName::Grid)
    }
}

pub fn final_balance(variable_cost: f64) -> ComponentSpec {
    ComponentSpec {
        variable_cost,
        ..ComponentSpec::new(KindName::FinalBalance)
    }
}

/// Resource table from explicit columns.
pub fn resources(irradiance: &[f64], demand: &[f64]) -> ResourceTable {
    let mut table = ResourceTable::new(irradiance.len());
    table
        .insert("irradiance", irradiance.to_vec())
        .unwrap_or_else(|e| panic!("{e}"));
    table
        .insert("demand", demand.to_vec())
        .unwrap_or_else(|e| panic!("{e}"));
    table
}

/// Two-hour system: 5 kW of sun in hour 0, 4 kW of load in hour 1, a 2 kWh
/// battery in between, and a costly final balance.
pub fn shift_system() -> System {
    let mut factory = ComponentFactory::new();
    let mut system = system(2, ObjectiveKey::Osc, finance(None));
    system.add_component(build(&mut factory, final_balance(100.0)));
    system.add_component(build(&mut factory, lithium(2.0, 1.0, 0.0)));
    system.add_component(build(&mut factory, pv(5.0)));
    system.add_component(build(&mut factory, consumer(4.0)));
    system
        .attach_resources(&resources(&[1.0, 0.0], &[0.0, 1.0]))
        .unwrap_or_else(|e| panic!("{e}"));
    system
}

/// The sizing preset cut down to `len` hours with synthetic resources.
pub fn sizing_system(len: usize) -> System {
    let mut cfg = ScenarioConfig::sizing();
    cfg.system.horizon = len;
    let mut system = System::from_config(&cfg).unwrap_or_else(|e| panic!("{e}"));
    system
        .attach_resources(&ResourceTable::synthetic(len, cfg.system.seed))
        .unwrap_or_else(|e| panic!("{e}"));
    system
}

/// Column of a component, or an empty slice.
pub fn column<'a>(component: &'a Component, name: &str) -> &'a [f64] {
    component.state().column(name).unwrap_or_default()
}
