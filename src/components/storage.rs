//! Energy storage components and the heuristic battery control policy.

use serde::{Deserialize, Serialize};

use super::types::{Capabilities, MeritTag};

/// Default weight of the linear charge/discharge throughput penalty.
pub const DEFAULT_REFLUX_PENALTY: f64 = 1e-4;

/// Storage technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Lithium,
    Hydrogen,
}

/// Operating mode of the battery state machine for one timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryMode {
    Charging,
    Discharging,
    Idle,
}

/// A storage element: always power-controllable and energy-stateful.
///
/// Capacity is expressed in energy units; rated power is
/// `capacity / ep_ratio`.
#[derive(Debug, Clone, PartialEq)]
pub struct Storage {
    pub kind: StorageKind,
    /// Energy-to-power ratio (hours at rated power).
    pub ep_ratio: f64,
    /// Initial state of charge as a fraction of capacity (0.0 to 1.0).
    pub starting_soc: f64,
    /// Fraction of stored energy lost per hour (hydrogen only).
    pub self_discharge: f64,
    /// Weight of the throughput penalty added to the objective.
    pub reflux_penalty: f64,
}

/// Per-step outcome of the heuristic storage policy.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageDispatch {
    /// Power in source convention (charging negative, discharging positive).
    pub power: Vec<f64>,
    /// Stored energy after each step.
    pub energy: Vec<f64>,
    /// Standing loss of each step, `self_discharge × energy at step start`.
    pub losses: Vec<f64>,
    pub modes: Vec<BatteryMode>,
}

impl Storage {
    pub fn label(&self) -> &'static str {
        match self.kind {
            StorageKind::Lithium => "Lithium",
            StorageKind::Hydrogen => "Hydrogen",
        }
    }

    pub fn merit_tag(&self) -> MeritTag {
        MeritTag::Storage
    }

    pub fn capabilities(&self) -> Capabilities {
        let base = Capabilities::POWER_CONTROLLABLE | Capabilities::ENERGY_STATEFUL;
        match self.kind {
            StorageKind::Lithium => base,
            StorageKind::Hydrogen => base | Capabilities::LOSS_STATEFUL,
        }
    }

    /// Rated charge/discharge power for the given energy capacity.
    pub fn rated_power(&self, capacity: f64) -> f64 {
        capacity / self.ep_ratio
    }

    /// Runs the charge/discharge state machine against a balance series.
    ///
    /// Charges from surplus while there is room, discharges into deficit
    /// while there is energy, and idles otherwise. Each step is limited by
    /// rated power and by the remaining room or stored energy.
    ///
    /// # Arguments
    ///
    /// * `balance` - Cumulative balance before the storage tier (positive = surplus)
    /// * `capacity` - Installed energy capacity
    pub fn dispatch(&self, balance: &[f64], capacity: f64) -> StorageDispatch {
        let rated = self.rated_power(capacity);
        let mut soc = self.starting_soc * capacity;
        let mut out = StorageDispatch {
            power: Vec::with_capacity(balance.len()),
            energy: Vec::with_capacity(balance.len()),
            losses: Vec::with_capacity(balance.len()),
            modes: Vec::with_capacity(balance.len()),
        };

        for &b in balance {
            // Standing loss is taken on the energy held at the start of the step.
            let loss = self.self_discharge * soc;
            let held = soc - loss;
            let (mode, amount) = if held < capacity && b > 0.0 {
                let charge = rated.min(b).min(capacity - held);
                (BatteryMode::Charging, charge)
            } else if held > 0.0 && b < 0.0 {
                let discharge = (-rated).max(b).max(-held);
                (BatteryMode::Discharging, discharge)
            } else {
                (BatteryMode::Idle, 0.0)
            };

            soc = held + amount;

            out.power.push(if amount == 0.0 { 0.0 } else { -amount });
            out.energy.push(soc);
            out.losses.push(loss);
            out.modes.push(mode);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lithium(ep_ratio: f64, starting_soc: f64) -> Storage {
        Storage {
            kind: StorageKind::Lithium,
            ep_ratio,
            starting_soc,
            self_discharge: 0.0,
            reflux_penalty: DEFAULT_REFLUX_PENALTY,
        }
    }

    #[test]
    fn charges_until_full_then_discharges_at_rated_power() {
        let bat = lithium(2.0, 0.7);
        let out = bat.dispatch(&[3.0, 3.0, -20.0, 0.0], 10.0);
        assert_eq!(out.power, vec![-3.0, 0.0, 5.0, 0.0]);
        assert_eq!(out.energy, vec![10.0, 10.0, 5.0, 5.0]);
        assert_eq!(
            out.modes,
            vec![
                BatteryMode::Charging,
                BatteryMode::Idle,
                BatteryMode::Discharging,
                BatteryMode::Idle
            ]
        );
    }

    #[test]
    fn discharge_limited_by_stored_energy() {
        let bat = lithium(1.0, 0.1);
        let out = bat.dispatch(&[-5.0], 10.0);
        assert_eq!(out.power, vec![1.0]);
        assert_eq!(out.energy, vec![0.0]);
    }

    #[test]
    fn charge_limited_by_rated_power() {
        let bat = lithium(4.0, 0.0);
        let out = bat.dispatch(&[10.0], 8.0);
        assert_eq!(out.power, vec![-2.0]);
        assert_eq!(out.energy, vec![2.0]);
    }

    #[test]
    fn hydrogen_loses_energy_while_idle() {
        let tank = Storage {
            kind: StorageKind::Hydrogen,
            self_discharge: 0.1,
            ..lithium(10.0, 1.0)
        };
        let out = tank.dispatch(&[0.0, 0.0], 100.0);
        assert!((out.energy[0] - 90.0).abs() < 1e-9);
        assert!((out.energy[1] - 81.0).abs() < 1e-9);
        assert!((out.losses[1] - 9.0).abs() < 1e-9);
        assert!(tank.capabilities().contains(Capabilities::LOSS_STATEFUL));
    }

    #[test]
    fn loss_is_taken_on_energy_before_the_step() {
        let tank = Storage {
            kind: StorageKind::Hydrogen,
            self_discharge: 0.1,
            ..lithium(10.0, 0.5)
        };
        let out = tank.dispatch(&[-100.0], 100.0);
        assert!((out.losses[0] - 5.0).abs() < 1e-9);
        assert_eq!(out.power, vec![10.0]);
        assert!((out.energy[0] - 35.0).abs() < 1e-9);
    }
}
