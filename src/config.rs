//! TOML-based scenario configuration and preset definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::components::types::MeritTag;
use crate::optimize::objective::ObjectiveKey;

/// Timestamp format used for the horizon start.
pub const START_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Top-level scenario configuration parsed from TOML.
///
/// All sections have defaults. Load from TOML with
/// [`ScenarioConfig::from_toml_file`] or use one of the built-in presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Horizon, accounting convention, and run mode.
    #[serde(default)]
    pub system: SystemConfig,
    /// Financial parameters for the objective.
    #[serde(default)]
    pub finance: FinanceConfig,
    /// Tier overrides keyed by merit tag.
    #[serde(default)]
    pub priorities: BTreeMap<MeritTag, u32>,
    /// Component definitions, in insertion order.
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

/// Which dispatch strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Sequential heuristic dispatch by priority tier.
    MeritOrder,
    /// Linear program over capacities and dispatch.
    Optimize,
}

/// Horizon and run parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    pub name: String,
    /// Number of hourly steps (must be > 0).
    pub horizon: usize,
    /// Timestamp of the first step, `YYYY-MM-DDTHH:MM:SS`.
    pub start: String,
    pub objective: ObjectiveKey,
    pub mode: RunMode,
    /// Seed for the synthetic resource generator.
    pub seed: u64,
    /// Optional CSV file with resource columns; synthetic data otherwise.
    pub resource_csv: Option<PathBuf>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "system".to_string(),
            horizon: 8760,
            start: "2023-01-01T00:00:00".to_string(),
            objective: ObjectiveKey::Osc,
            mode: RunMode::MeritOrder,
            seed: 42,
            resource_csv: None,
        }
    }
}

/// Financial parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinanceConfig {
    /// Annual interest rate (0.05 = 5%).
    pub interest_rate: f64,
    /// System lifetime in years.
    pub lifetime: f64,
    /// Overrides the capital recovery factor derived from rate and lifetime.
    pub capital_recovery_factor: Option<f64>,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            interest_rate: 0.05,
            lifetime: 20.0,
            capital_recovery_factor: None,
        }
    }
}

/// Component kinds accepted in `[[components]]` tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindName {
    Photovoltaic,
    Wind,
    Consumer,
    FastCharger,
    Grid,
    FinalBalance,
    Lithium,
    Hydrogen,
}

impl KindName {
    fn is_storage(self) -> bool {
        matches!(self, KindName::Lithium | KindName::Hydrogen)
    }

    fn is_profiled(self) -> bool {
        matches!(
            self,
            KindName::Photovoltaic | KindName::Wind | KindName::Consumer | KindName::FastCharger
        )
    }

    /// Whether `field` is a recognized option for this kind.
    pub fn accepts(self, field: &str) -> bool {
        match field {
            "profile" | "scale" => self.is_profiled(),
            "ep_ratio" | "starting_soc" | "reflux_penalty" => self.is_storage(),
            "self_discharge" => self == KindName::Hydrogen,
            "import_price" | "export_price" | "allow_import" | "allow_export" => {
                self == KindName::Grid
            }
            "allow_underload" | "allow_curtailment" => self == KindName::FinalBalance,
            _ => true,
        }
    }
}

/// Every recognized option of a component, with its effect.
///
/// Kind-specific options are rejected by [`ScenarioConfig::validate`] when set
/// on a kind that does not use them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    pub kind: KindName,
    /// Display name; defaults to `"<Kind> <n>"`.
    pub name: Option<String>,
    /// Resource column driving the series (generation and loads).
    pub profile: Option<String>,
    /// Multiplier applied to the resource column.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Installed capacity (energy for storage, power otherwise).
    pub installed: Option<f64>,
    /// Capacity is a free decision variable.
    #[serde(default)]
    pub dof: bool,
    /// `[lower, upper]` capacity or power bounds.
    pub bounds: Option<[f64; 2]>,
    #[serde(default)]
    pub capex: f64,
    #[serde(default)]
    pub opex: f64,
    #[serde(default)]
    pub variable_cost: f64,
    /// Technical lifetime in years.
    pub lifetime: Option<f64>,
    /// Storage energy-to-power ratio in hours.
    pub ep_ratio: Option<f64>,
    /// Storage initial state of charge (0.0 to 1.0).
    pub starting_soc: Option<f64>,
    /// Hydrogen standing loss per hour (0.0 to 1.0).
    pub self_discharge: Option<f64>,
    /// Weight of the storage throughput penalty.
    pub reflux_penalty: Option<f64>,
    pub import_price: Option<f64>,
    pub export_price: Option<f64>,
    pub allow_import: Option<bool>,
    pub allow_export: Option<bool>,
    pub allow_underload: Option<bool>,
    pub allow_curtailment: Option<bool>,
    /// Plot color for downstream reporting.
    pub color: Option<String>,
}

fn default_scale() -> f64 {
    1.0
}

impl ComponentSpec {
    /// Creates a spec with every option unset.
    pub fn new(kind: KindName) -> Self {
        Self {
            kind,
            name: None,
            profile: None,
            scale: default_scale(),
            installed: None,
            dof: false,
            bounds: None,
            capex: 0.0,
            opex: 0.0,
            variable_cost: 0.0,
            lifetime: None,
            ep_ratio: None,
            starting_soc: None,
            self_discharge: None,
            reflux_penalty: None,
            import_price: None,
            export_price: None,
            allow_import: None,
            allow_export: None,
            allow_underload: None,
            allow_curtailment: None,
            color: None,
        }
    }

    /// Kind-specific options that are set, by name.
    fn set_options(&self) -> Vec<&'static str> {
        let flags = [
            ("profile", self.profile.is_some()),
            ("scale", self.scale != 1.0),
            ("ep_ratio", self.ep_ratio.is_some()),
            ("starting_soc", self.starting_soc.is_some()),
            ("self_discharge", self.self_discharge.is_some()),
            ("reflux_penalty", self.reflux_penalty.is_some()),
            ("import_price", self.import_price.is_some()),
            ("export_price", self.export_price.is_some()),
            ("allow_import", self.allow_import.is_some()),
            ("allow_export", self.allow_export.is_some()),
            ("allow_underload", self.allow_underload.is_some()),
            ("allow_curtailment", self.allow_curtailment.is_some()),
        ];
        flags
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect()
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"components[1].ep_ratio"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Stand-alone PV, battery, and load with a final-balance slack.
    pub fn island() -> Self {
        Self {
            system: SystemConfig {
                name: "island".to_string(),
                ..SystemConfig::default()
            },
            finance: FinanceConfig::default(),
            priorities: BTreeMap::new(),
            components: vec![
                ComponentSpec {
                    name: Some("Household".to_string()),
                    profile: Some("demand".to_string()),
                    scale: 2.0,
                    ..ComponentSpec::new(KindName::Consumer)
                },
                ComponentSpec {
                    name: Some("Roof PV".to_string()),
                    profile: Some("irradiance".to_string()),
                    installed: Some(8.0),
                    capex: 900.0,
                    opex: 12.0,
                    lifetime: Some(25.0),
                    ..ComponentSpec::new(KindName::Photovoltaic)
                },
                ComponentSpec {
                    name: Some("Home battery".to_string()),
                    installed: Some(20.0),
                    ep_ratio: Some(4.0),
                    starting_soc: Some(0.5),
                    capex: 400.0,
                    opex: 5.0,
                    lifetime: Some(15.0),
                    ..ComponentSpec::new(KindName::Lithium)
                },
                ComponentSpec {
                    name: Some("Unserved".to_string()),
                    variable_cost: 5.0,
                    ..ComponentSpec::new(KindName::FinalBalance)
                },
            ],
        }
    }

    /// Grid-tied mix with wind, PV, storage, and a fast charger.
    pub fn grid_tied() -> Self {
        Self {
            system: SystemConfig {
                name: "grid_tied".to_string(),
                ..SystemConfig::default()
            },
            finance: FinanceConfig::default(),
            priorities: BTreeMap::new(),
            components: vec![
                ComponentSpec {
                    profile: Some("demand".to_string()),
                    scale: 40.0,
                    ..ComponentSpec::new(KindName::Consumer)
                },
                ComponentSpec {
                    profile: Some("demand".to_string()),
                    scale: 10.0,
                    ..ComponentSpec::new(KindName::FastCharger)
                },
                ComponentSpec {
                    profile: Some("irradiance".to_string()),
                    installed: Some(60.0),
                    capex: 800.0,
                    opex: 10.0,
                    lifetime: Some(25.0),
                    ..ComponentSpec::new(KindName::Photovoltaic)
                },
                ComponentSpec {
                    profile: Some("wind".to_string()),
                    installed: Some(30.0),
                    capex: 1300.0,
                    opex: 40.0,
                    lifetime: Some(20.0),
                    ..ComponentSpec::new(KindName::Wind)
                },
                ComponentSpec {
                    installed: Some(100.0),
                    ep_ratio: Some(2.0),
                    starting_soc: Some(0.5),
                    capex: 350.0,
                    opex: 4.0,
                    lifetime: Some(12.0),
                    ..ComponentSpec::new(KindName::Lithium)
                },
                ComponentSpec {
                    installed: Some(50.0),
                    import_price: Some(0.30),
                    export_price: Some(0.08),
                    ..ComponentSpec::new(KindName::Grid)
                },
                ComponentSpec {
                    variable_cost: 10.0,
                    ..ComponentSpec::new(KindName::FinalBalance)
                },
            ],
        }
    }

    /// One-week sizing problem for PV and storage behind a grid connection.
    pub fn sizing() -> Self {
        Self {
            system: SystemConfig {
                name: "sizing".to_string(),
                horizon: 168,
                objective: ObjectiveKey::Osc,
                mode: RunMode::Optimize,
                ..SystemConfig::default()
            },
            finance: FinanceConfig::default(),
            priorities: BTreeMap::new(),
            components: vec![
                ComponentSpec {
                    profile: Some("demand".to_string()),
                    scale: 5.0,
                    ..ComponentSpec::new(KindName::Consumer)
                },
                ComponentSpec {
                    profile: Some("irradiance".to_string()),
                    dof: true,
                    bounds: Some([0.0, 50.0]),
                    capex: 700.0,
                    opex: 10.0,
                    lifetime: Some(25.0),
                    ..ComponentSpec::new(KindName::Photovoltaic)
                },
                ComponentSpec {
                    dof: true,
                    bounds: Some([0.0, 100.0]),
                    ep_ratio: Some(4.0),
                    starting_soc: Some(0.5),
                    capex: 300.0,
                    opex: 3.0,
                    lifetime: Some(15.0),
                    ..ComponentSpec::new(KindName::Lithium)
                },
                ComponentSpec {
                    installed: Some(20.0),
                    import_price: Some(0.35),
                    export_price: Some(0.05),
                    ..ComponentSpec::new(KindName::Grid)
                },
                ComponentSpec {
                    variable_cost: 50.0,
                    allow_curtailment: Some(true),
                    ..ComponentSpec::new(KindName::FinalBalance)
                },
            ],
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["island", "grid_tied", "sizing"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "island" => Ok(Self::island()),
            "grid_tied" => Ok(Self::grid_tied()),
            "sizing" => Ok(Self::sizing()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parsed horizon start.
    pub fn start(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.system.start, START_FORMAT).ok()
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. Missing
    /// kind-specific attributes are reported later, when components are
    /// registered.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.system;

        if s.horizon == 0 {
            errors.push(ConfigError::new("system.horizon", "must be > 0"));
        }
        if self.start().is_none() {
            errors.push(ConfigError::new(
                "system.start",
                format!("must match {START_FORMAT}, got \"{}\"", s.start),
            ));
        }

        let f = &self.finance;
        if f.interest_rate < 0.0 || !f.interest_rate.is_finite() {
            errors.push(ConfigError::new("finance.interest_rate", "must be >= 0"));
        }
        if f.lifetime <= 0.0 {
            errors.push(ConfigError::new("finance.lifetime", "must be > 0"));
        }
        if let Some(crf) = f.capital_recovery_factor {
            if crf <= 0.0 {
                errors.push(ConfigError::new(
                    "finance.capital_recovery_factor",
                    "must be > 0",
                ));
            }
        }

        for (tag, tier) in &self.priorities {
            if *tier == 0 {
                errors.push(ConfigError::new(
                    format!("priorities.{tag}"),
                    "tiers start at 1",
                ));
            }
        }

        for (i, c) in self.components.iter().enumerate() {
            validate_component(i, c, &mut errors);
        }

        errors
    }
}

fn validate_component(i: usize, c: &ComponentSpec, errors: &mut Vec<ConfigError>) {
    let path = |field: &str| format!("components[{i}].{field}");

    for option in c.set_options() {
        if !c.kind.accepts(option) {
            errors.push(ConfigError::new(
                path(option),
                format!("not an option for kind {:?}", c.kind),
            ));
        }
    }

    if let Some(installed) = c.installed {
        if installed < 0.0 || !installed.is_finite() {
            errors.push(ConfigError::new(path("installed"), "must be finite and >= 0"));
        }
    }
    if let Some([lower, upper]) = c.bounds {
        if lower > upper {
            errors.push(ConfigError::new(path("bounds"), "lower must be <= upper"));
        }
        if c.dof && lower < 0.0 {
            errors.push(ConfigError::new(
                path("bounds"),
                "sizing bounds must be non-negative",
            ));
        }
    }
    if let Some(lifetime) = c.lifetime {
        if lifetime <= 0.0 {
            errors.push(ConfigError::new(path("lifetime"), "must be > 0"));
        }
    }
    if let Some(ep) = c.ep_ratio {
        if ep <= 0.0 {
            errors.push(ConfigError::new(path("ep_ratio"), "must be > 0"));
        }
    }
    if let Some(soc) = c.starting_soc {
        if !(0.0..=1.0).contains(&soc) {
            errors.push(ConfigError::new(path("starting_soc"), "must be in [0.0, 1.0]"));
        }
    }
    if let Some(rate) = c.self_discharge {
        if !(0.0..1.0).contains(&rate) {
            errors.push(ConfigError::new(path("self_discharge"), "must be in [0.0, 1.0)"));
        }
    }
    let import = c.import_price.unwrap_or(0.0);
    let export = c.export_price.unwrap_or(0.0);
    if export > import {
        errors.push(ConfigError::new(
            path("export_price"),
            format!("must not exceed import_price ({import})"),
        ));
    }
}
