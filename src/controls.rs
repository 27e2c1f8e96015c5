//! Charging control algorithms for Amphora
//!
//! This module contains the per-mode target current policies and the
//! ramp/hysteresis controller that reconciles a desired current against the
//! safety limits and the previous hardware setpoint.

use crate::limits::PowerLimits;
use crate::logging::get_logger;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Minimum viable charging current; chargers cannot regulate below this
pub const MIN_CHARGE_AMPS: i32 = 6;

/// Max amps added per rate-limited upward adjustment
pub const RAMP_UP_STEP: i32 = 2;

/// Per-mode current ceiling before safety clamping
pub const MODE_MAX_AMPS: i32 = 32;

/// Charging mode enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChargingMode {
    /// Charging disabled
    Off,

    /// Charge only from surplus solar production
    PvOnly,

    /// Charge at least the minimum current, topped up with solar surplus
    MinPv,

    /// Charge as fast as the tariff block limit allows
    Dynamic,

    /// Charge as fast as the fuse allows
    MaxPower,

    /// Charge at full rate inside the configured time window
    Schedule,
}

impl std::fmt::Display for ChargingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChargingMode::Off => "Off",
            ChargingMode::PvOnly => "PV Only",
            ChargingMode::MinPv => "Min + PV",
            ChargingMode::Dynamic => "Dynamic",
            ChargingMode::MaxPower => "Max Power",
            ChargingMode::Schedule => "Schedule",
        };
        f.write_str(s)
    }
}

/// Mode applied automatically when a cable is plugged in.
///
/// `NoChange` is a configuration value only, never an active mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PluginAutoMode {
    #[default]
    NoChange,
    Off,
    PvOnly,
    MinPv,
    Dynamic,
    MaxPower,
    Schedule,
}

impl PluginAutoMode {
    /// The charging mode to switch to, or `None` for no-change
    pub fn as_mode(self) -> Option<ChargingMode> {
        match self {
            PluginAutoMode::NoChange => None,
            PluginAutoMode::Off => Some(ChargingMode::Off),
            PluginAutoMode::PvOnly => Some(ChargingMode::PvOnly),
            PluginAutoMode::MinPv => Some(ChargingMode::MinPv),
            PluginAutoMode::Dynamic => Some(ChargingMode::Dynamic),
            PluginAutoMode::MaxPower => Some(ChargingMode::MaxPower),
            PluginAutoMode::Schedule => Some(ChargingMode::Schedule),
        }
    }
}

/// Desired current for a tick, before safety clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRequest {
    /// Desired current in amps; may be negative for PV surplus modes
    pub amps: i32,

    /// Whether the charging session should remain active
    pub session_active: bool,
}

/// Inputs to one ramp/hysteresis adjustment
#[derive(Debug, Clone, Copy)]
pub struct RampInput {
    /// Active charging mode
    pub mode: ChargingMode,

    /// Mode policy current, unclamped
    pub target_mode_amps: i32,

    /// Current hardware setpoint as reported by the charger
    pub current_hw_amps: f64,

    /// Grid power in watts (positive importing)
    pub grid_power: f64,

    /// Grid data is stale this tick
    pub data_is_stale: bool,

    /// Power thresholds and amp limits for this tick
    pub limits: PowerLimits,

    /// Main fuse rating in amps
    pub max_fuse_amps: i32,

    /// Watts per amp across all phases
    pub power_per_amp: f64,

    /// Seconds since the hardware setpoint last changed
    pub secs_since_last_change: f64,

    /// Configured rate-limit period in seconds
    pub control_interval_secs: f64,
}

/// Outcome of one ramp/hysteresis adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampDecision {
    /// Resolved setpoint in amps, within `[0, max_fuse_amps]`
    pub amps: i32,

    /// The emergency decrease path was taken
    pub emergency: bool,
}

/// Charging control system
pub struct ChargingControls {
    logger: crate::logging::StructuredLogger,
}

impl ChargingControls {
    /// Create new charging controls
    pub fn new() -> Self {
        let logger = get_logger("controls");
        Self { logger }
    }

    /// Whether `now` falls inside the `[start, end)` window; the window wraps
    /// past midnight when `start > end`.
    pub fn is_schedule_active(start: NaiveTime, end: NaiveTime, now: NaiveTime) -> bool {
        if start <= end {
            start <= now && now < end
        } else {
            now >= start || now < end
        }
    }

    /// Map the active mode to a desired current, ignoring safety limits.
    ///
    /// A session that reached its SoC target overrides every mode to 0.
    pub fn resolve_target(
        &self,
        mode: ChargingMode,
        should_stop_session: bool,
        charger_power: f64,
        grid_power: f64,
        power_per_amp: f64,
        schedule_active: bool,
    ) -> TargetRequest {
        if should_stop_session {
            return TargetRequest {
                amps: 0,
                session_active: false,
            };
        }

        match mode {
            ChargingMode::Off => TargetRequest {
                amps: 0,
                session_active: false,
            },
            ChargingMode::MaxPower | ChargingMode::Dynamic => TargetRequest {
                amps: MODE_MAX_AMPS,
                session_active: true,
            },
            ChargingMode::Schedule => TargetRequest {
                amps: if schedule_active { MODE_MAX_AMPS } else { 0 },
                session_active: true,
            },
            ChargingMode::PvOnly | ChargingMode::MinPv => {
                // Surplus production currently flowing toward the grid plus
                // whatever the charger is already consuming of it.
                let excess_w = charger_power - grid_power;
                let solar_amps = (excess_w / power_per_amp).floor() as i32;
                let amps = if mode == ChargingMode::PvOnly {
                    solar_amps
                } else {
                    solar_amps.max(MIN_CHARGE_AMPS)
                };
                TargetRequest {
                    amps,
                    session_active: true,
                }
            }
        }
    }

    /// Reconcile the desired current against limits and the previous
    /// hardware setpoint.
    ///
    /// Decreases are immediate on emergency (two-stage: down to the minimum
    /// viable current first, then 0), otherwise rate-limited. Increases are
    /// rate-limited and ramped in [`RAMP_UP_STEP`] steps, except the startup
    /// fast-path which jumps straight to the minimum viable current. Any
    /// result below the minimum is forced to exactly 0.
    pub fn adjust_current(&self, input: &RampInput) -> RampDecision {
        let min_amps = f64::from(MIN_CHARGE_AMPS);
        let current = input.current_hw_amps;
        let limits = &input.limits;

        let candidate = if input.data_is_stale {
            0
        } else {
            input.target_mode_amps.min(limits.amps_limit_maintain)
        };

        let mut emergency = false;
        let mut adjusted = current;

        if f64::from(candidate) < current {
            // Decrease path: check for fuse overload or grid draw past the
            // emergency threshold (MaxPower deliberately ignores the latter).
            let current_total_amps = current + limits.house_load / input.power_per_amp;
            if current_total_amps > f64::from(input.max_fuse_amps) {
                emergency = true;
            }
            if input.mode != ChargingMode::MaxPower && input.grid_power > limits.limit_emergency {
                emergency = true;
            }

            if emergency {
                self.logger
                    .info("Critical overload, reducing current immediately");
                adjusted = if current > min_amps { min_amps } else { 0.0 };
            } else if input.secs_since_last_change >= input.control_interval_secs {
                adjusted = f64::from(candidate);
            }
        } else if f64::from(candidate) > current {
            // Increase path: re-check against the tighter increase limit
            let safe_target_up = input.target_mode_amps.min(limits.amps_limit_increase);

            if f64::from(safe_target_up) > current {
                let is_startup = current < min_amps && safe_target_up >= MIN_CHARGE_AMPS;
                if is_startup {
                    // Jump straight to the minimum viable current so charging
                    // starts promptly without overshooting the ramp.
                    adjusted = min_amps;
                } else if input.secs_since_last_change >= input.control_interval_secs {
                    adjusted = f64::from(safe_target_up).min(current + f64::from(RAMP_UP_STEP));
                }
            }
            // else: deadband, hold instead of chasing an unreachable target
        }

        if adjusted < min_amps {
            adjusted = 0.0;
        }

        RampDecision {
            amps: (adjusted.floor() as i32).clamp(0, input.max_fuse_amps),
            emergency,
        }
    }
}

impl Default for ChargingControls {
    fn default() -> Self {
        Self::new()
    }
}
