//! Persisted result document consumed by reporting and plotting tools.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::components::Styling;
use crate::components::types::POWER;
use crate::config::ComponentSpec;
use crate::error::Result;
use crate::sim::{LastCall, System};

/// Value written when no solve has produced capacities.
pub const NOT_AVAILABLE: &str = "Not available";

/// Top-level result document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub components: BTreeMap<String, ComponentEntry>,
    pub system: SystemEntry,
}

/// Per-component section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Every state column except `power`.
    pub state: BTreeMap<String, Vec<f64>>,
    pub styling: Styling,
    pub settings: ComponentSpec,
    pub name: String,
}

/// System section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEntry {
    pub dates: Vec<NaiveDateTime>,
    pub name: String,
    pub date: NaiveDateTime,
    pub last_call: Option<LastCall>,
    pub installed_capacities: InstalledCapacities,
    pub objective_outcome: Option<f64>,
}

/// Capacity map, or a marker string when the last call did not solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstalledCapacities {
    Table(BTreeMap<String, f64>),
    Unavailable(String),
}

impl ResultDocument {
    /// Snapshots a system into a document.
    pub fn from_system(system: &System) -> Self {
        let components = system
            .components()
            .iter()
            .map(|c| {
                let state = c
                    .state()
                    .columns()
                    .filter(|(name, _)| *name != POWER)
                    .map(|(name, values)| (name.to_string(), values.to_vec()))
                    .collect();
                let entry = ComponentEntry {
                    state,
                    styling: c.styling().clone(),
                    settings: c.settings().clone(),
                    name: c.name().to_string(),
                };
                (c.key().to_string(), entry)
            })
            .collect();

        let installed_capacities = match system.installed_capacities() {
            Some(table) => InstalledCapacities::Table(table.rows.iter().cloned().collect()),
            None => InstalledCapacities::Unavailable(NOT_AVAILABLE.to_string()),
        };

        Self {
            components,
            system: SystemEntry {
                dates: system.horizon().dates(),
                name: system.name().to_string(),
                date: system.date(),
                last_call: system.last_call(),
                installed_capacities,
                objective_outcome: system.objective_outcome(),
            },
        }
    }

    /// Writes the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::error::Error::Json) on serialization failure.
    pub fn write_to(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Parses a document from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::error::Error::Json) if the input is not a
    /// valid document.
    pub fn read_from(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Writes a system's result document to `path`.
///
/// # Errors
///
/// Returns an I/O or JSON error if the file cannot be written.
pub fn write_document(system: &System, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    ResultDocument::from_system(system).write_to(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Reads a result document from `path`.
///
/// # Errors
///
/// Returns an I/O or JSON error if the file cannot be read or parsed.
pub fn read_document(path: &Path) -> Result<ResultDocument> {
    ResultDocument::read_from(BufReader::new(File::open(path)?))
}
