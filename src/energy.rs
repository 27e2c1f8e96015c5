//! Per-tick energy accounting
//!
//! Splits the charger's instantaneous power draw into a grid-sourced and a
//! solar-sourced portion and converts both into kWh increments for the tick.
//! The increments are ephemeral; session and lifetime counters accumulate
//! them downstream.

/// Energy delivered to the EV during one tick, split by source
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergySplit {
    /// Grid-sourced energy in kWh
    pub grid_kwh: f64,

    /// Solar-sourced energy in kWh
    pub solar_kwh: f64,
}

/// Longest tick the accumulator will credit, bounding bursts after a stall
pub const MAX_TICK_SECS: f64 = 60.0;

impl EnergySplit {
    /// Compute the split for one tick.
    ///
    /// The grid portion is whatever the charger draws that the grid is
    /// currently importing; anything beyond that must be covered by local
    /// production. `elapsed_secs` is clamped to [`MAX_TICK_SECS`] so a missed
    /// tick cannot book an hour of energy in one step.
    pub fn compute(charger_power_w: f64, grid_power_w: f64, elapsed_secs: f64) -> Self {
        let mut grid_portion_w = 0.0;
        let mut solar_portion_w = 0.0;

        if charger_power_w > 0.0 {
            if grid_power_w > 0.0 {
                grid_portion_w = charger_power_w.min(grid_power_w);
            }
            solar_portion_w = (charger_power_w - grid_portion_w).max(0.0);
        }

        let safe_secs = elapsed_secs.clamp(0.0, MAX_TICK_SECS);
        Self {
            grid_kwh: grid_portion_w * safe_secs / 3_600_000.0,
            solar_kwh: solar_portion_w * safe_secs / 3_600_000.0,
        }
    }

    /// Total energy of the tick in kWh
    pub fn total_kwh(&self) -> f64 {
        self.grid_kwh + self.solar_kwh
    }
}
