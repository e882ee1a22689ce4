//! CSV export of component state columns.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::error::Result;
use crate::sim::System;

/// Exports every component state column to a CSV file at `path`.
///
/// One row per timestep. Columns are `timestep`, `date`, then
/// `<component key>.<column>` in merit order and column-name order.
///
/// # Errors
///
/// Returns an I/O or CSV error if file creation or writing fails.
pub fn export_csv(system: &System, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_csv(system, io::BufWriter::new(file))
}

/// Writes component state as CSV to any writer.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_csv(system: &System, writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let mut header = vec!["timestep".to_string(), "date".to_string()];
    let mut columns: Vec<&[f64]> = Vec::new();
    for c in system.components() {
        for (name, values) in c.state().columns() {
            header.push(format!("{}.{name}", c.key()));
            columns.push(values);
        }
    }
    wtr.write_record(&header)?;

    for (t, date) in system.horizon().dates().iter().enumerate() {
        let mut row = Vec::with_capacity(header.len());
        row.push(t.to_string());
        row.push(date.format("%Y-%m-%dT%H:%M:%S").to_string());
        for values in &columns {
            row.push(values.get(t).map_or_else(String::new, |v| format!("{v:.6}")));
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioConfig;
    use crate::resource::ResourceTable;

    fn dispatched(horizon: usize) -> System {
        let mut cfg = ScenarioConfig::grid_tied();
        cfg.system.horizon = horizon;
        let mut system = System::from_config(&cfg).unwrap_or_else(|e| panic!("{e}"));
        system
            .attach_resources(&ResourceTable::synthetic(horizon, 11))
            .unwrap_or_else(|e| panic!("{e}"));
        system.run_merit_order().unwrap_or_else(|e| panic!("{e}"));
        system
    }

    #[test]
    fn row_count_matches_horizon() {
        let mut buf = Vec::new();
        assert!(write_csv(&dispatched(24), &mut buf).is_ok());
        let output = String::from_utf8(buf).unwrap_or_default();
        // 1 header + 24 data rows
        assert_eq!(output.lines().count(), 25);
    }

    #[test]
    fn header_lists_component_columns() {
        let mut buf = Vec::new();
        assert!(write_csv(&dispatched(4), &mut buf).is_ok());
        let output = String::from_utf8(buf).unwrap_or_default();
        let header = output.lines().next().unwrap_or("");
        assert!(header.starts_with("timestep,date,"));
        assert!(header.contains("grid_1.power_pos"));
        assert!(header.contains("lithium_1.energy"));
    }

    #[test]
    fn deterministic_output() {
        let system = dispatched(8);
        let mut buf1 = Vec::new();
        let mut buf2 = Vec::new();
        assert!(write_csv(&system, &mut buf1).is_ok());
        assert!(write_csv(&system, &mut buf2).is_ok());
        assert_eq!(buf1, buf2);
    }

    #[test]
    fn cells_parse_as_numbers() {
        let mut buf = Vec::new();
        assert!(write_csv(&dispatched(3), &mut buf).is_ok());
        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        for record in rdr.records() {
            let rec = record.ok();
            assert!(rec.is_some(), "every row should parse");
            if let Some(rec) = rec {
                for cell in rec.iter().skip(2) {
                    assert!(cell.parse::<f64>().is_ok(), "{cell} should parse as f64");
                }
            }
        }
    }
}
