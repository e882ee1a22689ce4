//! Crate-wide error type.

use thiserror::Error;

/// Errors raised while configuring, building, or persisting an energy system.
///
/// Non-optimal solver termination is not an error: it is reported as an
/// [`OptimizeOutcome`](crate::sim::system::OptimizeOutcome) variant.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more scenario fields failed validation.
    #[error("invalid configuration: {}", join_config_errors(.0))]
    Config(Vec<crate::config::ConfigError>),

    /// A component is missing attributes its kind requires.
    ///
    /// Every missing attribute is listed, not only the first one found.
    #[error("component \"{component}\" is missing required attributes: {}", .missing.join(", "))]
    MissingAttributes {
        component: String,
        missing: Vec<&'static str>,
    },

    /// A component declares a finite lifetime without any capital expenditure.
    #[error("component \"{component}\" has a finite lifetime ({lifetime} a) but zero capex")]
    ZeroCapexWithLifetime { component: String, lifetime: f64 },

    /// A variable suffix has no matching state column. Internal defect.
    #[error("variable suffix \"{0}\" has no state column mapping")]
    UnmappedSuffix(&'static str),

    /// A time series does not match the system horizon.
    #[error("series \"{name}\" has {actual} steps, horizon has {expected}")]
    HorizonMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A component references a resource column that was not provided.
    #[error("component \"{component}\" references unknown resource column \"{column}\"")]
    UnknownResource { component: String, column: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

fn join_config_errors(errors: &[crate::config::ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_attributes_lists_every_name() {
        let err = Error::MissingAttributes {
            component: "Lithium 1".to_string(),
            missing: vec!["ep_ratio", "starting_soc"],
        };
        let msg = err.to_string();
        assert!(msg.contains("ep_ratio"));
        assert!(msg.contains("starting_soc"));
    }
}
