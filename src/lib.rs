//! Amphora: automatic EV charging current control
//!
//! Amphora drives an EV charger from live household measurements. Every
//! tick it reads grid, solar and charger values through a [`hub::MeterHub`],
//! resolves the selected charging mode into a desired current, reconciles
//! that against tariff-block power limits with ramping and hysteresis, and
//! issues the minimal switch/current commands to the charger. Session and
//! lifetime energy counters split consumption into grid and solar portions
//! and survive restarts through a small JSON state file.

pub mod config;
pub mod controller;
pub mod controls;
pub mod energy;
pub mod error;
pub mod hub;
pub mod limits;
pub mod logging;
pub mod measurement;
pub mod persistence;
pub mod session;

pub use config::Config;
pub use controller::{ChargeController, ControllerCommand, TickResult};
pub use controls::ChargingMode;
pub use error::{AmphoraError, Result};
