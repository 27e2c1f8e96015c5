//! Persistence layer for lifetime energy counters
//!
//! The controller itself holds no durable state; only the accumulating
//! lifetime energy totals survive restarts. They are saved best-effort as a
//! small JSON file each tick and restored at startup.

use crate::error::Result;
use crate::logging::get_logger;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// State written to disk across restarts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistentState {
    /// Lifetime grid-sourced charging energy in kWh
    pub lifetime_grid_kwh: f64,

    /// Lifetime solar-sourced charging energy in kWh
    pub lifetime_solar_kwh: f64,

    /// Lifetime total charging energy in kWh
    pub lifetime_total_kwh: f64,
}

/// Session and lifetime energy counters fed from per-tick increments
#[derive(Debug, Clone, Default)]
pub struct EnergyCounters {
    /// Session counters, zeroed on every plug-in
    pub session_grid_kwh: f64,
    pub session_solar_kwh: f64,
    pub session_total_kwh: f64,

    /// Lifetime counters, monotonically increasing
    pub lifetime_grid_kwh: f64,
    pub lifetime_solar_kwh: f64,
    pub lifetime_total_kwh: f64,
}

impl EnergyCounters {
    /// Restore lifetime totals from persisted state; sessions start at zero
    pub fn restore(state: &PersistentState) -> Self {
        Self {
            lifetime_grid_kwh: state.lifetime_grid_kwh,
            lifetime_solar_kwh: state.lifetime_solar_kwh,
            lifetime_total_kwh: state.lifetime_total_kwh,
            ..Default::default()
        }
    }

    /// Fold one tick's published increments into the counters
    pub fn apply(&mut self, reset_session: bool, inc_grid_kwh: f64, inc_solar_kwh: f64) {
        if reset_session {
            self.session_grid_kwh = 0.0;
            self.session_solar_kwh = 0.0;
            self.session_total_kwh = 0.0;
        }

        self.session_grid_kwh += inc_grid_kwh;
        self.session_solar_kwh += inc_solar_kwh;
        self.session_total_kwh += inc_grid_kwh + inc_solar_kwh;

        self.lifetime_grid_kwh += inc_grid_kwh;
        self.lifetime_solar_kwh += inc_solar_kwh;
        self.lifetime_total_kwh += inc_grid_kwh + inc_solar_kwh;
    }

    /// Snapshot of the durable part of the counters
    pub fn to_persistent(&self) -> PersistentState {
        PersistentState {
            lifetime_grid_kwh: self.lifetime_grid_kwh,
            lifetime_solar_kwh: self.lifetime_solar_kwh,
            lifetime_total_kwh: self.lifetime_total_kwh,
        }
    }
}

/// Persistence manager
pub struct PersistenceManager {
    file_path: String,
    state: PersistentState,
    logger: crate::logging::StructuredLogger,
}

impl PersistenceManager {
    /// Create a new persistence manager
    pub fn new(file_path: &str) -> Self {
        let logger = get_logger("persistence");
        let state = PersistentState::default();

        Self {
            file_path: file_path.to_string(),
            state,
            logger,
        }
    }

    /// Load state from disk
    pub fn load(&mut self) -> Result<()> {
        let path = Path::new(&self.file_path);

        if !path.exists() {
            self.logger
                .info("No persistent state file found, using defaults");
            return Ok(());
        }

        let contents = std::fs::read_to_string(path)?;
        self.state = serde_json::from_str(&contents)?;
        self.logger.info("Loaded persistent state from disk");

        Ok(())
    }

    /// Save state to disk
    pub fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(&self.file_path, contents)?;
        self.logger.debug("Saved persistent state to disk");

        Ok(())
    }

    /// Current in-memory state
    pub fn state(&self) -> &PersistentState {
        &self.state
    }

    /// Replace the in-memory state (callers persist with [`save`])
    ///
    /// [`save`]: PersistenceManager::save
    pub fn set_state(&mut self, state: PersistentState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_reset_session() {
        let mut counters = EnergyCounters::default();
        counters.apply(false, 0.010, 0.005);
        counters.apply(false, 0.010, 0.005);
        assert!((counters.session_total_kwh - 0.030).abs() < 1e-12);
        assert!((counters.lifetime_total_kwh - 0.030).abs() < 1e-12);

        // Plug-in resets the session scope only
        counters.apply(true, 0.001, 0.0);
        assert!((counters.session_total_kwh - 0.001).abs() < 1e-12);
        assert!((counters.lifetime_total_kwh - 0.031).abs() < 1e-12);
    }

    #[test]
    fn restore_keeps_lifetime_only() {
        let state = PersistentState {
            lifetime_grid_kwh: 12.0,
            lifetime_solar_kwh: 8.0,
            lifetime_total_kwh: 20.0,
        };
        let counters = EnergyCounters::restore(&state);
        assert!((counters.lifetime_total_kwh - 20.0).abs() < f64::EPSILON);
        assert_eq!(counters.session_total_kwh, 0.0);
    }
}
