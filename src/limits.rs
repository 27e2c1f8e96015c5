//! Power limit calculation
//!
//! Derives the three power thresholds (increase / maintain / emergency) for
//! the active mode and tariff block, and the equivalent current limits after
//! subtracting the rest of the house's consumption.

use crate::config::Config;
use crate::controls::ChargingMode;

/// Power thresholds and derived current limits for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLimits {
    /// Household consumption excluding the charger itself, in watts
    pub house_load: f64,

    /// Below this total draw the charger may ramp up (base - buffer)
    pub limit_increase: f64,

    /// The base limit the controller tries to hold (base)
    pub limit_maintain: f64,

    /// Above this total draw the emergency path engages (base + buffer)
    pub limit_emergency: f64,

    /// Max amps that keep total draw under `limit_increase`
    pub amps_limit_increase: i32,

    /// Max amps that keep total draw under `limit_maintain`
    pub amps_limit_maintain: i32,
}

impl PowerLimits {
    /// Compute the limits for the active mode and tariff block.
    ///
    /// Dynamic and Schedule follow the tariff block ceiling; every other
    /// active mode is bounded only by the fuse. The charger's own draw is
    /// excluded from the house load so the limit reflects non-EV consumption.
    pub fn compute(config: &Config, mode: ChargingMode, tariff: u8, grid_power: f64, charger_power: f64) -> Self {
        let house_load = grid_power - charger_power;
        let power_per_amp = config.charger.power_per_amp();
        let fuse_limit_w = f64::from(config.charger.max_fuse_amps) * power_per_amp;

        let limit_base = match mode {
            ChargingMode::Dynamic | ChargingMode::Schedule => config.tariff.block_limit(tariff),
            _ => fuse_limit_w,
        };

        let limit_increase = limit_base - config.charger.buffer_watts;
        let limit_maintain = limit_base;
        let limit_emergency = limit_base + config.charger.buffer_watts;

        let amps_for = |threshold: f64| -> i32 {
            let amps = ((threshold - house_load) / power_per_amp).floor() as i32;
            amps.min(config.charger.max_fuse_amps)
        };

        Self {
            house_load,
            limit_increase,
            limit_maintain,
            limit_emergency,
            amps_limit_increase: amps_for(limit_increase),
            amps_limit_maintain: amps_for(limit_maintain),
        }
    }
}
