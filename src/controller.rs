//! Core control loop for Amphora
//!
//! [`ChargeController`] owns the per-charger state and runs the periodic
//! tick: read measurements, track the session, derive limits, resolve the
//! mode target, ramp the setpoint, and dispatch the minimal set of actuator
//! commands. External commands (mode, schedule, SoC target) funnel into the
//! same single-consumer loop, so no two ticks ever overlap.

use crate::config::Config;
use crate::controls::{
    ChargingControls, ChargingMode, MIN_CHARGE_AMPS, RampInput, TargetRequest,
};
use crate::energy::EnergySplit;
use crate::error::Result;
use crate::hub::MeterHub;
use crate::limits::PowerLimits;
use crate::logging::get_logger;
use crate::measurement::{self, Measurements};
use crate::persistence::{EnergyCounters, PersistenceManager};
use crate::session::{CableTransition, SessionTracker};
use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, interval};

/// Settle delay between switching the charger on and re-issuing the current
/// setpoint; some chargers reset their current register on power-up.
const SWITCH_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Commands accepted by the controller from external components
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Select a charging mode and re-evaluate immediately
    SetMode(ChargingMode),

    /// Move the schedule window start and re-evaluate immediately
    SetScheduleStart(NaiveTime),

    /// Move the schedule window end and re-evaluate immediately
    SetScheduleEnd(NaiveTime),

    /// Set the per-session SoC target in percent (100 disables)
    SetTargetSoc(u8),

    /// Run one tick outside the timer
    Refresh,

    /// Stop the control loop
    Shutdown,
}

/// Structured result published after every tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickResult {
    pub timestamp: String,
    pub grid_power: f64,
    pub solar_power: f64,
    pub charger_power: f64,
    pub tariff: u8,
    pub mode: ChargingMode,
    pub target_current: u32,
    pub is_charging: bool,
    pub safety_amps_limit: i32,
    pub data_is_stale: bool,
    pub current_soc: Option<u8>,
    pub energy_inc_grid: f64,
    pub energy_inc_solar: f64,
    pub reset_session: bool,
}

/// Main per-charger controller
pub struct ChargeController {
    config: Config,
    config_path: Option<PathBuf>,
    hub: Arc<dyn MeterHub>,
    logger: crate::logging::StructuredLogger,
    controls: ChargingControls,
    tracker: SessionTracker,
    counters: EnergyCounters,
    persistence: PersistenceManager,

    selected_mode: ChargingMode,
    calculated_amp: i32,
    is_charging: bool,
    target_soc: u8,
    schedule_start: NaiveTime,
    schedule_end: NaiveTime,

    /// Advances only when the hardware setpoint actually changes
    last_amp_change: Option<Instant>,
    last_update: Instant,

    commands_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    result_tx: watch::Sender<Arc<TickResult>>,
    result_rx: watch::Receiver<Arc<TickResult>>,
}

impl ChargeController {
    /// Create a controller from the default configuration locations and
    /// initialize logging. The hub is the platform integration seam.
    pub fn new(
        hub: Arc<dyn MeterHub>,
        commands_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    ) -> Result<Self> {
        let config = Config::load().map_err(|e| {
            eprintln!("Failed to load configuration: {}", e);
            e
        })?;
        config.validate()?;

        crate::logging::init_logging(&config.logging)?;

        let config_path = find_config_path();
        Self::build(config, config_path, hub, commands_rx)
    }

    /// Create a controller around an explicit configuration, without touching
    /// the default config locations or logging init. Used by embedders and
    /// tests.
    pub fn with_config(
        config: Config,
        hub: Arc<dyn MeterHub>,
        commands_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    ) -> Result<Self> {
        config.validate()?;
        Self::build(config, None, hub, commands_rx)
    }

    fn build(
        config: Config,
        config_path: Option<PathBuf>,
        hub: Arc<dyn MeterHub>,
        commands_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    ) -> Result<Self> {
        let logger = get_logger("controller");
        logger.info("Initializing charge controller");

        // Restore lifetime counters (best-effort)
        let mut persistence = PersistenceManager::new(&config.persistence_file);
        if let Err(e) = persistence.load() {
            logger.warn(&format!("Could not load persisted counters: {}", e));
        }
        let counters = EnergyCounters::restore(persistence.state());

        let initial = Arc::new(TickResult {
            timestamp: Utc::now().to_rfc3339(),
            grid_power: 0.0,
            solar_power: 0.0,
            charger_power: 0.0,
            tariff: 1,
            mode: ChargingMode::Off,
            target_current: 0,
            is_charging: false,
            safety_amps_limit: 0,
            data_is_stale: false,
            current_soc: None,
            energy_inc_grid: 0.0,
            energy_inc_solar: 0.0,
            reset_session: false,
        });
        let (result_tx, result_rx) = watch::channel(initial);

        Ok(Self {
            config,
            config_path,
            hub,
            logger,
            controls: ChargingControls::new(),
            tracker: SessionTracker::new(),
            counters,
            persistence,
            selected_mode: ChargingMode::Off,
            calculated_amp: 0,
            is_charging: false,
            target_soc: 100,
            schedule_start: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            schedule_end: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            last_amp_change: None,
            last_update: Instant::now(),
            commands_rx,
            result_tx,
            result_rx,
        })
    }

    /// Run the control loop until a `Shutdown` command arrives
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info("Starting charge controller main loop");

        let mut tick_interval = interval(Duration::from_secs(self.config.tick_interval_secs));

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if let Err(e) = self.tick().await {
                        self.logger.error(&format!("Tick failed: {}", e));
                        // Keep ticking even on errors
                    }
                }
                Some(cmd) = self.commands_rx.recv() => {
                    if matches!(cmd, ControllerCommand::Shutdown) {
                        self.logger.info("Shutdown command received");
                        break;
                    }
                    self.handle_command(cmd).await;
                }
            }
        }

        self.logger.info("Charge controller shutdown complete");
        Ok(())
    }

    /// Handle an external command; each triggers an immediate re-evaluation
    /// tick so the result publish does not wait for the timer.
    pub async fn handle_command(&mut self, cmd: ControllerCommand) {
        match cmd {
            ControllerCommand::SetMode(mode) => self.set_mode(mode),
            ControllerCommand::SetScheduleStart(t) => {
                self.logger.info(&format!("Schedule start set to {}", t));
                self.schedule_start = t;
            }
            ControllerCommand::SetScheduleEnd(t) => {
                self.logger.info(&format!("Schedule end set to {}", t));
                self.schedule_end = t;
            }
            ControllerCommand::SetTargetSoc(pct) => {
                self.target_soc = pct.min(100);
                self.logger.info(&format!("SoC target set to {}%", self.target_soc));
            }
            ControllerCommand::Refresh | ControllerCommand::Shutdown => {}
        }

        if let Err(e) = self.tick().await {
            self.logger.error(&format!("Command-triggered tick failed: {}", e));
        }
    }

    /// Select a charging mode
    pub fn set_mode(&mut self, mode: ChargingMode) {
        if mode != self.selected_mode {
            self.logger
                .info(&format!("Mode changed: {} -> {}", self.selected_mode, mode));
        }
        self.selected_mode = mode;
    }

    /// Run one control tick: read, decide, actuate, publish.
    pub async fn tick(&mut self) -> Result<Arc<TickResult>> {
        self.reload_config();

        let time_diff = self.last_update.elapsed().as_secs_f64();
        self.last_update = Instant::now();

        let now_utc = Utc::now();
        let m = measurement::read_all(self.hub.as_ref(), &self.config.sensors, now_utc).await;
        self.is_charging = m.is_charging;

        if m.data_is_stale && self.selected_mode != ChargingMode::Off {
            self.logger
                .warn("Grid data stale or missing, pausing charging");
        }

        let split = EnergySplit::compute(m.charger_power, m.grid_power, time_diff);

        // Cable transitions come before any decision so auto-mode and mode
        // reset apply within this tick. The pre-transition cable state still
        // governs the switch-off suppress check below: an unplug observed
        // this tick must get its switch-off, later ticks must not.
        let cable_connected_at_read = self.tracker.cable_connected();
        let mut reset_session = false;
        match self.tracker.observe_cable(m.cable_connected) {
            CableTransition::PluggedIn => {
                reset_session = true;
                if let Some(mode) = self.config.charger.auto_mode_on_plugin.as_mode() {
                    self.logger
                        .info(&format!("Auto mode on plug-in: {}", mode));
                    self.selected_mode = mode;
                }
            }
            CableTransition::Unplugged => {
                if self.config.charger.reset_on_unplug {
                    self.logger.info("Reset on unplug: forcing mode Off");
                    self.selected_mode = ChargingMode::Off;
                }
            }
            CableTransition::None => {}
        }
        let cable_for_off_check = cable_connected_at_read || self.tracker.cable_connected();

        // Mode Off short-circuit: no limit or target computation, but the
        // result is still published so reporting keeps working.
        if self.selected_mode == ChargingMode::Off {
            self.calculated_amp = 0;
            self.apply_changes(0, false, m.charger_hw_amps, cable_for_off_check)
                .await;

            return Ok(self.finish_tick(&m, 0, 0, split, reset_session));
        }

        let should_stop_session = self.tracker.check_soc_target(m.soc, self.target_soc);

        let limits = PowerLimits::compute(
            &self.config,
            self.selected_mode,
            m.tariff,
            m.grid_power,
            m.charger_power,
        );

        let schedule_active = self.is_schedule_active_now();
        let target: TargetRequest = self.controls.resolve_target(
            self.selected_mode,
            should_stop_session,
            m.charger_power,
            m.grid_power,
            self.config.charger.power_per_amp(),
            schedule_active,
        );

        let decision = self.controls.adjust_current(&RampInput {
            mode: self.selected_mode,
            target_mode_amps: target.amps,
            current_hw_amps: m.charger_hw_amps,
            grid_power: m.grid_power,
            data_is_stale: m.data_is_stale,
            limits,
            max_fuse_amps: self.config.charger.max_fuse_amps,
            power_per_amp: self.config.charger.power_per_amp(),
            secs_since_last_change: self.secs_since_last_change(),
            control_interval_secs: self.config.charger.control_interval_secs as f64,
        });
        self.calculated_amp = decision.amps;

        // Switch decision: an "on" charger stays on while the session should
        // remain active, even when paused at 0 A. An "off" charger turns on
        // only once the resolved current reaches the start threshold.
        let final_switch_state = if self.is_charging {
            target.session_active
        } else {
            target.session_active && decision.amps >= MIN_CHARGE_AMPS
        };

        self.apply_changes(
            decision.amps,
            final_switch_state,
            m.charger_hw_amps,
            cable_for_off_check,
        )
        .await;

        Ok(self.finish_tick(
            &m,
            decision.amps,
            limits.amps_limit_maintain,
            split,
            reset_session,
        ))
    }

    /// Issue the minimal set of actuator commands to reach the resolved
    /// setpoint. Failures are logged and left for the next tick to converge.
    async fn apply_changes(
        &mut self,
        target_amps: i32,
        should_be_active: bool,
        current_hw_amps: f64,
        cable_connected: bool,
    ) {
        let current_handle = self.config.sensors.charger_current.clone();
        let switch_handle = self.config.sensors.charger_switch.clone();

        // Current setpoint (0 A = paused session)
        if f64::from(target_amps) != current_hw_amps && (self.is_charging || should_be_active) {
            self.logger.info(&format!(
                "Current {:.0}A -> {}A",
                current_hw_amps, target_amps
            ));
            match self
                .hub
                .write_number(&current_handle, f64::from(target_amps))
                .await
            {
                Ok(()) => self.last_amp_change = Some(Instant::now()),
                Err(e) => self
                    .logger
                    .warn(&format!("Failed to write current setpoint: {}", e)),
            }
        }

        // Switch state
        if should_be_active && !self.is_charging {
            self.logger.info("Start session (switch on)");
            match self.hub.write_switch(&switch_handle, true).await {
                Ok(()) => {
                    if target_amps > 0 {
                        // Charger may reset its current register on power-up
                        tokio::time::sleep(SWITCH_SETTLE_DELAY).await;
                        if let Err(e) = self
                            .hub
                            .write_number(&current_handle, f64::from(target_amps))
                            .await
                        {
                            self.logger
                                .warn(&format!("Failed to re-issue current after start: {}", e));
                        }
                    }
                }
                Err(e) => self.logger.warn(&format!("Failed to switch on: {}", e)),
            }
        } else if !should_be_active && self.is_charging {
            if cable_connected {
                self.logger.info("End session (switch off)");
                if let Err(e) = self.hub.write_switch(&switch_handle, false).await {
                    self.logger.warn(&format!("Failed to switch off: {}", e));
                }
            } else {
                self.logger
                    .debug("Session inactive but cable unplugged, skipping switch off");
            }
        }
    }

    /// Build the tick result, feed the counters, persist, and publish.
    fn finish_tick(
        &mut self,
        m: &Measurements,
        target_amps: i32,
        safety_amps_limit: i32,
        split: EnergySplit,
        reset_session: bool,
    ) -> Arc<TickResult> {
        let result = Arc::new(TickResult {
            timestamp: Utc::now().to_rfc3339(),
            grid_power: m.grid_power,
            solar_power: m.solar_power,
            charger_power: m.charger_power,
            tariff: m.tariff,
            mode: self.selected_mode,
            target_current: u32::try_from(target_amps).unwrap_or(0),
            is_charging: m.is_charging,
            safety_amps_limit,
            data_is_stale: m.data_is_stale,
            current_soc: m.soc,
            energy_inc_grid: split.grid_kwh,
            energy_inc_solar: split.solar_kwh,
            reset_session,
        });

        self.counters
            .apply(reset_session, split.grid_kwh, split.solar_kwh);
        self.persistence.set_state(self.counters.to_persistent());
        if let Err(e) = self.persistence.save() {
            self.logger
                .debug(&format!("Could not persist counters: {}", e));
        }

        let _ = self.result_tx.send(result.clone());
        result
    }

    /// Best-effort configuration reload so live edits apply without restart
    fn reload_config(&mut self) {
        let Some(path) = &self.config_path else {
            return;
        };
        match Config::from_file(path) {
            Ok(config) => match config.validate() {
                Ok(()) => self.config = config,
                Err(e) => self
                    .logger
                    .warn(&format!("Ignoring invalid config update: {}", e)),
            },
            Err(e) => self
                .logger
                .warn(&format!("Config reload failed, keeping previous: {}", e)),
        }
    }

    fn secs_since_last_change(&self) -> f64 {
        self.last_amp_change
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(f64::INFINITY)
    }

    fn is_schedule_active_now(&self) -> bool {
        let now = Utc::now().with_timezone(&self.config.tz()).time();
        ChargingControls::is_schedule_active(self.schedule_start, self.schedule_end, now)
    }

    /// Subscribe to published tick results
    pub fn subscribe_results(&self) -> watch::Receiver<Arc<TickResult>> {
        self.result_rx.clone()
    }

    /// Currently selected mode
    pub fn mode(&self) -> ChargingMode {
        self.selected_mode
    }

    /// Last computed target current in amps
    pub fn calculated_amp(&self) -> i32 {
        self.calculated_amp
    }

    /// Last observed charger switch state
    pub fn is_charging(&self) -> bool {
        self.is_charging
    }

    /// Configured schedule window
    pub fn schedule(&self) -> (NaiveTime, NaiveTime) {
        (self.schedule_start, self.schedule_end)
    }

    /// Session and lifetime energy counters
    pub fn counters(&self) -> &EnergyCounters {
        &self.counters
    }

    /// Configuration reference
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn find_config_path() -> Option<PathBuf> {
    [
        "amphora_config.yaml",
        "/data/amphora_config.yaml",
        "/etc/amphora/config.yaml",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}
