//! Hourly resource and demand tables.
//!
//! Stand-ins for the weather/demand provider and the per-component yield
//! calculators: a table is either loaded from CSV or generated from a seed.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::Path;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::components::{Component, MeritTag};
use crate::error::{Error, Result};

/// Column name for per-unit solar irradiance.
pub const IRRADIANCE: &str = "irradiance";
/// Column name for per-unit wind capacity factor.
pub const WIND: &str = "wind";
/// Column name for normalized demand.
pub const DEMAND: &str = "demand";

/// Sunrise hour (inclusive) of the synthetic daylight window.
const SUNRISE: f64 = 6.0;
/// Sunset hour (exclusive) of the synthetic daylight window.
const SUNSET: f64 = 20.0;
/// AR(1) persistence of the synthetic wind series.
const WIND_ALPHA: f64 = 0.9;

/// Named hourly columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceTable {
    len: usize,
    columns: BTreeMap<String, Vec<f64>>,
}

impl ResourceTable {
    /// Creates an empty table of `len` hours.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            columns: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Column names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Inserts or replaces a column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HorizonMismatch`] if `values` does not have `len` rows.
    pub fn insert(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len {
            return Err(Error::HorizonMismatch {
                name: name.to_string(),
                expected: self.len,
                actual: values.len(),
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Generates reproducible demo series for `len` hours.
    ///
    /// - `irradiance`: half-cosine daylight shape in [0, 1] with Gaussian noise
    /// - `wind`: AR(1) capacity factor clamped to [0, 1]
    /// - `demand`: daily sinusoid around 1.0 with Gaussian noise
    ///
    /// # Examples
    ///
    /// ```
    /// use meritsim::resource::ResourceTable;
    ///
    /// let a = ResourceTable::synthetic(48, 7);
    /// let b = ResourceTable::synthetic(48, 7);
    /// assert_eq!(a, b);
    /// assert_eq!(a.column("wind").map(<[f64]>::len), Some(48));
    /// ```
    pub fn synthetic(len: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut irradiance = Vec::with_capacity(len);
        let mut wind = Vec::with_capacity(len);
        let mut demand = Vec::with_capacity(len);
        let mut wind_state: f64 = 0.4;

        for t in 0..len {
            let hour = (t % 24) as f64;

            let shape = if (SUNRISE..SUNSET).contains(&hour) {
                let x = (hour - SUNRISE) / (SUNSET - SUNRISE);
                (PI * x).sin()
            } else {
                0.0
            };
            let sun = if shape > 0.0 {
                (shape * (1.0 + gaussian_noise(&mut rng, 0.15))).clamp(0.0, 1.0)
            } else {
                0.0
            };
            irradiance.push(sun);

            let target = 0.4 + gaussian_noise(&mut rng, 0.25);
            wind_state = (WIND_ALPHA * wind_state + (1.0 - WIND_ALPHA) * target).clamp(0.0, 1.0);
            wind.push(wind_state);

            let daily = 1.0 + 0.3 * (2.0 * PI * (hour - 13.0) / 24.0).cos();
            demand.push((daily + gaussian_noise(&mut rng, 0.05)).max(0.0));
        }

        let mut columns = BTreeMap::new();
        columns.insert(IRRADIANCE.to_string(), irradiance);
        columns.insert(WIND.to_string(), wind);
        columns.insert(DEMAND.to_string(), demand);
        Self { len, columns }
    }

    /// Loads a table from a CSV file whose header row names the columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Csv`] on unreadable files or non-numeric cells.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut data: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

        for record in reader.deserialize::<Vec<f64>>() {
            let row = record?;
            for (column, value) in data.iter_mut().zip(row) {
                column.push(value);
            }
        }

        let len = data.first().map_or(0, Vec::len);
        let columns = headers.into_iter().zip(data).collect();
        Ok(Self { len, columns })
    }

    /// Keeps the first `len` rows of every column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HorizonMismatch`] if the table is shorter than `len`.
    pub fn truncate(mut self, len: usize) -> Result<Self> {
        if self.len < len {
            return Err(Error::HorizonMismatch {
                name: "resource table".to_string(),
                expected: len,
                actual: self.len,
            });
        }
        for values in self.columns.values_mut() {
            values.truncate(len);
        }
        self.len = len;
        Ok(self)
    }

    /// Computes the raw series a component contributes.
    ///
    /// Volatile sources get `profile × scale` as per-unit yield; loads get
    /// `−profile × scale` so that consumption is negative. Dispatchable
    /// components have no series and return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResource`] if the profile column is absent.
    pub fn series_for(&self, component: &Component) -> Result<Option<Vec<f64>>> {
        let Some(profile) = component.profile() else {
            return Ok(None);
        };
        let column = self.column(profile).ok_or_else(|| Error::UnknownResource {
            component: component.name().to_string(),
            column: profile.to_string(),
        })?;
        let sign = match component.merit_tag() {
            MeritTag::MustMeetLoad => -1.0,
            _ => 1.0,
        };
        let scale = sign * component.scale();
        Ok(Some(column.iter().map(|v| v * scale).collect()))
    }
}

/// Generates zero-mean Gaussian noise with the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentFactory;
    use crate::config::{ComponentSpec, KindName};

    #[test]
    fn synthetic_is_reproducible_and_bounded() {
        let table = ResourceTable::synthetic(24 * 7, 3);
        assert_eq!(table, ResourceTable::synthetic(24 * 7, 3));
        assert_ne!(table, ResourceTable::synthetic(24 * 7, 4));
        for name in [IRRADIANCE, WIND] {
            let col = table.column(name).unwrap_or_default();
            assert_eq!(col.len(), 168);
            assert!(col.iter().all(|v| (0.0..=1.0).contains(v)), "{name} out of range");
        }
    }

    #[test]
    fn irradiance_is_zero_at_night() {
        let table = ResourceTable::synthetic(48, 1);
        let sun = table.column(IRRADIANCE).unwrap_or_default();
        assert_eq!(sun[0], 0.0);
        assert_eq!(sun[23], 0.0);
        assert!(sun[12] > 0.0);
    }

    #[test]
    fn load_series_is_negative() {
        let table = ResourceTable::synthetic(24, 1);
        let spec = ComponentSpec {
            profile: Some(DEMAND.to_string()),
            scale: 2.0,
            ..ComponentSpec::new(KindName::Consumer)
        };
        let load = ComponentFactory::new().build(spec).ok();
        let series = load.and_then(|c| table.series_for(&c).ok().flatten());
        let demand = table.column(DEMAND).unwrap_or_default();
        let series = series.unwrap_or_default();
        assert_eq!(series.len(), 24);
        assert!((series[5] + 2.0 * demand[5]).abs() < 1e-12);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let table = ResourceTable::synthetic(24, 1);
        let spec = ComponentSpec {
            profile: Some("tide".to_string()),
            installed: Some(1.0),
            ..ComponentSpec::new(KindName::Wind)
        };
        let wind = ComponentFactory::new().build(spec).ok();
        let result = wind.map(|c| table.series_for(&c));
        assert!(matches!(result, Some(Err(Error::UnknownResource { .. }))));
    }

    #[test]
    fn insert_checks_length() {
        let mut table = ResourceTable::new(3);
        assert!(table.insert("x", vec![1.0, 2.0, 3.0]).is_ok());
        assert!(table.insert("y", vec![1.0]).is_err());
    }
}
