//! Sensor/actuator hub abstraction
//!
//! The controller never talks to a meter or charger directly; it reads named
//! live values and issues commands through the narrow [`MeterHub`] capability
//! interface. A platform integration implements this trait over its entity
//! registry; [`MemoryHub`] is the in-process implementation used by tests and
//! the standalone binary.

use crate::error::{AmphoraError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A single sensor value together with its last-updated timestamp
#[derive(Debug, Clone)]
pub struct Reading {
    /// Raw value as reported by the platform (numbers arrive as strings too)
    pub value: String,

    /// When the value was last refreshed
    pub last_updated: DateTime<Utc>,
}

impl Reading {
    /// Convenience constructor with the current time as timestamp
    pub fn now<S: Into<String>>(value: S) -> Self {
        Self {
            value: value.into(),
            last_updated: Utc::now(),
        }
    }

    /// Age of the reading in seconds relative to `now`
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_updated).num_milliseconds() as f64 / 1000.0
    }
}

/// Narrow read/write capability the control loop depends on
#[async_trait::async_trait]
pub trait MeterHub: Send + Sync {
    /// Read the current value of a handle; `None` when the handle is unknown
    /// or has never reported a value.
    async fn read(&self, handle: &str) -> Option<Reading>;

    /// Set a numeric value on an actuator handle
    async fn write_number(&self, handle: &str, value: f64) -> Result<()>;

    /// Turn a switch-like actuator handle on or off
    async fn write_switch(&self, handle: &str, on: bool) -> Result<()>;
}

/// A command observed by [`MemoryHub`], recorded in issue order
#[derive(Debug, Clone, PartialEq)]
pub enum HubCommand {
    SetNumber { handle: String, value: f64 },
    SetSwitch { handle: String, on: bool },
}

#[derive(Default)]
struct MemoryHubInner {
    values: HashMap<String, Reading>,
    commands: Vec<HubCommand>,
    fail_writes: bool,
}

/// In-memory hub: a key-value store of named live values
///
/// Writes are reflected back into the value map the way a well-behaved
/// charger would report them, so a tick following a command observes the new
/// hardware state. Tests can inspect the command log and inject write
/// failures.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<RwLock<MemoryHubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value with the current timestamp
    pub async fn set_value<S: Into<String>>(&self, handle: &str, value: S) {
        let mut inner = self.inner.write().await;
        inner.values.insert(handle.to_string(), Reading::now(value));
    }

    /// Store a value with an explicit timestamp (for staleness tests)
    pub async fn set_value_at<S: Into<String>>(
        &self,
        handle: &str,
        value: S,
        last_updated: DateTime<Utc>,
    ) {
        let mut inner = self.inner.write().await;
        inner.values.insert(
            handle.to_string(),
            Reading {
                value: value.into(),
                last_updated,
            },
        );
    }

    /// Remove a value so subsequent reads return `None`
    pub async fn clear_value(&self, handle: &str) {
        let mut inner = self.inner.write().await;
        inner.values.remove(handle);
    }

    /// Make all subsequent write commands fail
    pub async fn set_fail_writes(&self, fail: bool) {
        let mut inner = self.inner.write().await;
        inner.fail_writes = fail;
    }

    /// Drain and return the recorded command log
    pub async fn take_commands(&self) -> Vec<HubCommand> {
        let mut inner = self.inner.write().await;
        std::mem::take(&mut inner.commands)
    }
}

#[async_trait::async_trait]
impl MeterHub for MemoryHub {
    async fn read(&self, handle: &str) -> Option<Reading> {
        let inner = self.inner.read().await;
        inner.values.get(handle).cloned()
    }

    async fn write_number(&self, handle: &str, value: f64) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.fail_writes {
            return Err(AmphoraError::hub(format!(
                "write_number rejected for {}",
                handle
            )));
        }
        inner.commands.push(HubCommand::SetNumber {
            handle: handle.to_string(),
            value,
        });
        inner
            .values
            .insert(handle.to_string(), Reading::now(format!("{}", value)));
        Ok(())
    }

    async fn write_switch(&self, handle: &str, on: bool) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.fail_writes {
            return Err(AmphoraError::hub(format!(
                "write_switch rejected for {}",
                handle
            )));
        }
        inner.commands.push(HubCommand::SetSwitch {
            handle: handle.to_string(),
            on,
        });
        inner
            .values
            .insert(handle.to_string(), Reading::now(if on { "on" } else { "off" }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_returns_none_for_unknown_handle() {
        let hub = MemoryHub::new();
        assert!(hub.read("sensor.missing").await.is_none());
    }

    #[tokio::test]
    async fn writes_are_recorded_and_reflected() {
        let hub = MemoryHub::new();
        hub.write_number("number.current", 8.0).await.unwrap();
        hub.write_switch("switch.charger", true).await.unwrap();

        let reading = hub.read("number.current").await.unwrap();
        assert_eq!(reading.value, "8");
        let reading = hub.read("switch.charger").await.unwrap();
        assert_eq!(reading.value, "on");

        let commands = hub.take_commands().await;
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0],
            HubCommand::SetNumber {
                handle: "number.current".to_string(),
                value: 8.0
            }
        );
    }

    #[tokio::test]
    async fn injected_failures_surface_as_hub_errors() {
        let hub = MemoryHub::new();
        hub.set_fail_writes(true).await;
        let err = hub.write_switch("switch.charger", false).await.unwrap_err();
        assert!(matches!(err, AmphoraError::Hub { .. }));
        assert!(hub.take_commands().await.is_empty());
    }
}
