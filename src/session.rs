//! Charging session tracking
//!
//! Detects cable plug/unplug transitions from the normalized status readings
//! and tracks per-session completion (state-of-charge target reached). The
//! controller reacts to the transitions; this module only observes.

use crate::logging::get_logger;
use uuid::Uuid;

/// Cable state change observed on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CableTransition {
    /// No change (or no usable status reading this tick)
    None,

    /// Cable was just plugged in
    PluggedIn,

    /// Cable was just unplugged
    Unplugged,
}

/// Tracks cable presence and SoC-based session completion across ticks
pub struct SessionTracker {
    cable_connected: bool,
    session_id: Option<Uuid>,
    soc_stop: bool,
    logger: crate::logging::StructuredLogger,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            cable_connected: false,
            session_id: None,
            soc_stop: false,
            logger: get_logger("session"),
        }
    }

    /// Last observed cable presence
    pub fn cable_connected(&self) -> bool {
        self.cable_connected
    }

    /// Identifier of the session started at the last plug-in, if any
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Fold this tick's cable reading into the tracker.
    ///
    /// A `None` reading (status sensor unavailable) keeps the previous state
    /// and never produces a transition. Plug-in starts a fresh session and
    /// clears any SoC completion latch.
    pub fn observe_cable(&mut self, connected: Option<bool>) -> CableTransition {
        let Some(connected) = connected else {
            return CableTransition::None;
        };

        let transition = match (self.cable_connected, connected) {
            (false, true) => {
                let id = Uuid::new_v4();
                self.session_id = Some(id);
                self.soc_stop = false;
                self.logger
                    .info(&format!("Cable plugged in, starting session {}", id));
                CableTransition::PluggedIn
            }
            (true, false) => {
                if let Some(id) = self.session_id.take() {
                    self.logger
                        .info(&format!("Cable unplugged, ending session {}", id));
                } else {
                    self.logger.info("Cable unplugged");
                }
                CableTransition::Unplugged
            }
            _ => CableTransition::None,
        };

        self.cable_connected = connected;
        transition
    }

    /// Check whether the session has reached its SoC target.
    ///
    /// A target of 100 disables the check. Once reached, the completion
    /// outcome sticks until the next plug-in.
    pub fn check_soc_target(&mut self, soc: Option<u8>, target_soc: u8) -> bool {
        if !self.soc_stop
            && target_soc < 100
            && let Some(soc) = soc
            && soc >= target_soc
        {
            self.logger.debug(&format!(
                "SoC target reached ({}% >= {}%), stopping session",
                soc, target_soc
            ));
            self.soc_stop = true;
        }
        self.soc_stop
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plug_in_and_unplug_transitions() {
        let mut tracker = SessionTracker::new();
        assert_eq!(tracker.observe_cable(Some(false)), CableTransition::None);
        assert_eq!(tracker.observe_cable(Some(true)), CableTransition::PluggedIn);
        assert!(tracker.session_id().is_some());
        assert_eq!(tracker.observe_cable(Some(true)), CableTransition::None);
        assert_eq!(tracker.observe_cable(Some(false)), CableTransition::Unplugged);
        assert!(tracker.session_id().is_none());
    }

    #[test]
    fn missing_status_keeps_previous_state() {
        let mut tracker = SessionTracker::new();
        tracker.observe_cable(Some(true));
        assert_eq!(tracker.observe_cable(None), CableTransition::None);
        assert!(tracker.cable_connected());
    }

    #[test]
    fn soc_target_latches_until_next_plug_in() {
        let mut tracker = SessionTracker::new();
        tracker.observe_cable(Some(true));

        assert!(!tracker.check_soc_target(Some(75), 80));
        assert!(tracker.check_soc_target(Some(85), 80));
        // Sticks even if the reading drops out afterwards
        assert!(tracker.check_soc_target(None, 80));

        // Next plug-in clears the latch
        tracker.observe_cable(Some(false));
        tracker.observe_cable(Some(true));
        assert!(!tracker.check_soc_target(None, 80));
    }

    #[test]
    fn target_of_100_disables_the_check() {
        let mut tracker = SessionTracker::new();
        assert!(!tracker.check_soc_target(Some(100), 100));
    }
}
