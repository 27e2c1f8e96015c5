//! Measurement normalization
//!
//! Raw hub readings arrive as strings with arbitrary freshness. This module
//! turns them into one typed [`Measurements`] value per tick, substituting
//! safe defaults for anything missing or unparseable and flagging stale grid
//! data so the control loop can pause instead of acting on dead numbers.

use crate::config::SensorsConfig;
use crate::hub::MeterHub;
use chrono::{DateTime, Utc};

/// Grid readings older than this are treated as stale (seconds)
pub const STALE_DATA_THRESHOLD_SECS: f64 = 60.0;

/// Status strings that mean "no cable plugged"
const IDLE_STATUS_VALUES: [&str; 6] = [
    "0",
    "State A - Idle",
    "unavailable",
    "unknown",
    "False",
    "No cable plugged",
];

/// Normalized sensor snapshot for a single control tick
#[derive(Debug, Clone, Default)]
pub struct Measurements {
    /// Grid power in watts, positive when importing (default 0.0)
    pub grid_power: f64,

    /// Solar production in watts (default 0.0)
    pub solar_power: f64,

    /// Charger measured power in watts (default 0.0)
    pub charger_power: f64,

    /// Last current setpoint as reported by the charger (default 6.0 A)
    pub charger_hw_amps: f64,

    /// Whether the charger switch currently reports "on"
    pub is_charging: bool,

    /// Cable presence derived from the status sensor; `None` when the status
    /// sensor is unconfigured or has never reported
    pub cable_connected: Option<bool>,

    /// Tariff block, clamped to 1..=5 (default 1)
    pub tariff: u8,

    /// EV state of charge in percent, only when configured and parseable
    pub soc: Option<u8>,

    /// Grid data is missing or older than [`STALE_DATA_THRESHOLD_SECS`]
    pub data_is_stale: bool,
}

/// Read every configured sensor and normalize the results.
///
/// Never fails: individual read problems degrade to defaults, and only the
/// grid sensor contributes to the staleness flag.
pub async fn read_all(
    hub: &dyn MeterHub,
    sensors: &SensorsConfig,
    now: DateTime<Utc>,
) -> Measurements {
    let mut m = Measurements {
        charger_hw_amps: 6.0,
        tariff: 1,
        ..Default::default()
    };

    match hub.read(&sensors.grid_power).await {
        Some(reading) => match reading.value.trim().parse::<f64>() {
            Ok(v) => {
                m.grid_power = v;
                if reading.age_secs(now) > STALE_DATA_THRESHOLD_SECS {
                    m.data_is_stale = true;
                }
            }
            Err(_) => m.data_is_stale = true,
        },
        None => m.data_is_stale = true,
    }

    m.solar_power = read_f64(hub, &sensors.solar_power).await.unwrap_or(0.0);
    m.charger_power = read_f64(hub, &sensors.charger_power).await.unwrap_or(0.0);

    if let Some(amps) = read_f64(hub, &sensors.charger_current).await {
        // Missing/unparseable keeps the 6.0 default: assuming the minimum
        // viable current avoids fabricating a startup fast-path on dropouts.
        m.charger_hw_amps = amps;
    }

    m.is_charging = matches!(hub.read(&sensors.charger_switch).await,
        Some(r) if r.value.trim().eq_ignore_ascii_case("on"));

    if let Some(t) = read_f64(hub, &sensors.tariff).await {
        m.tariff = (t as i64).clamp(1, 5) as u8;
    }

    m.cable_connected = match hub.read(&sensors.charger_status).await {
        Some(reading) => {
            let v = reading.value.trim();
            Some(!IDLE_STATUS_VALUES.iter().any(|idle| v == *idle))
        }
        None => None,
    };

    if let Some(handle) = &sensors.ev_soc {
        m.soc = hub
            .read(handle)
            .await
            .and_then(|r| r.value.trim().parse::<u8>().ok())
            .filter(|v| *v <= 100);
    }

    m
}

async fn read_f64(hub: &dyn MeterHub, handle: &str) -> Option<f64> {
    if handle.is_empty() {
        return None;
    }
    hub.read(handle)
        .await
        .and_then(|r| r.value.trim().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MemoryHub;
    use chrono::Duration;

    fn sensors() -> SensorsConfig {
        SensorsConfig::default()
    }

    #[tokio::test]
    async fn missing_everything_yields_safe_defaults() {
        let hub = MemoryHub::new();
        let m = read_all(&hub, &sensors(), Utc::now()).await;
        assert!(m.data_is_stale);
        assert_eq!(m.grid_power, 0.0);
        assert_eq!(m.solar_power, 0.0);
        assert!((m.charger_hw_amps - 6.0).abs() < f64::EPSILON);
        assert_eq!(m.tariff, 1);
        assert!(!m.is_charging);
        assert!(m.cable_connected.is_none());
        assert!(m.soc.is_none());
    }

    #[tokio::test]
    async fn fresh_grid_reading_is_not_stale() {
        let hub = MemoryHub::new();
        hub.set_value("sensor.grid_power", "1234.5").await;
        let m = read_all(&hub, &sensors(), Utc::now()).await;
        assert!(!m.data_is_stale);
        assert!((m.grid_power - 1234.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn old_grid_reading_sets_stale_flag() {
        let hub = MemoryHub::new();
        let now = Utc::now();
        hub.set_value_at("sensor.grid_power", "500", now - Duration::seconds(90))
            .await;
        let m = read_all(&hub, &sensors(), now).await;
        assert!(m.data_is_stale);
        // The value itself is still carried for reporting
        assert!((m.grid_power - 500.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn unparseable_grid_counts_as_stale() {
        let hub = MemoryHub::new();
        hub.set_value("sensor.grid_power", "unavailable").await;
        let m = read_all(&hub, &sensors(), Utc::now()).await;
        assert!(m.data_is_stale);
        assert_eq!(m.grid_power, 0.0);
    }

    #[tokio::test]
    async fn tariff_is_clamped_into_block_range() {
        let hub = MemoryHub::new();
        hub.set_value("sensor.grid_power", "0").await;
        hub.set_value("sensor.tariff_block", "9").await;
        let m = read_all(&hub, &sensors(), Utc::now()).await;
        assert_eq!(m.tariff, 5);

        hub.set_value("sensor.tariff_block", "0").await;
        let m = read_all(&hub, &sensors(), Utc::now()).await;
        assert_eq!(m.tariff, 1);
    }

    #[tokio::test]
    async fn cable_presence_follows_idle_status_set() {
        let hub = MemoryHub::new();
        hub.set_value("sensor.charger_status", "State A - Idle").await;
        let m = read_all(&hub, &sensors(), Utc::now()).await;
        assert_eq!(m.cable_connected, Some(false));

        hub.set_value("sensor.charger_status", "State C - Charging")
            .await;
        let m = read_all(&hub, &sensors(), Utc::now()).await;
        assert_eq!(m.cable_connected, Some(true));
    }

    #[tokio::test]
    async fn soc_requires_configured_handle_and_valid_value() {
        let hub = MemoryHub::new();
        hub.set_value("sensor.ev_soc", "85").await;

        // Unconfigured: ignored
        let m = read_all(&hub, &sensors(), Utc::now()).await;
        assert!(m.soc.is_none());

        let mut cfg = sensors();
        cfg.ev_soc = Some("sensor.ev_soc".to_string());
        let m = read_all(&hub, &cfg, Utc::now()).await;
        assert_eq!(m.soc, Some(85));

        hub.set_value("sensor.ev_soc", "charging").await;
        let m = read_all(&hub, &cfg, Utc::now()).await;
        assert!(m.soc.is_none());

        hub.set_value("sensor.ev_soc", "150").await;
        let m = read_all(&hub, &cfg, Utc::now()).await;
        assert!(m.soc.is_none());
    }
}
