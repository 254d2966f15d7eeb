//! Tunables for the actuator protocol, locator and controller.
//!
//! Every field has a default, so a partial config file only overrides what
//! it names. Durations are stored as seconds or milliseconds to keep config
//! files readable, and converted with the accessor methods.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::secs;
use crate::error::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub link: LinkSettings,
    #[serde(default)]
    pub locate: LocateSettings,
    #[serde(default)]
    pub controller: ControllerSettings,
    #[serde(default)]
    pub actions: ActionSettings,
}

impl Settings {
    /// Reject values that would make a wait unbounded or a loop meaningless.
    pub fn validate(&self) -> Result<(), ApiError> {
        let durations = [
            ("link.ack_timeout", self.link.ack_timeout),
            ("link.boot_grace", self.link.boot_grace),
            ("link.ready_timeout", self.link.ready_timeout),
            ("locate.locate_timeout", self.locate.locate_timeout),
            ("locate.poll_interval", self.locate.poll_interval),
            ("locate.retry_gap", self.locate.retry_gap),
            ("controller.max_center_time", self.controller.max_center_time),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ApiError::invalid_input_with_suggestion(
                    format!("{} must be a non-negative number of seconds, got {}", name, value),
                    "Use a value such as 0.5 or 8.0",
                ));
            }
        }

        let confidence = self.locate.confidence;
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(ApiError::invalid_input_with_suggestion(
                format!("locate.confidence must be in (0, 1], got {}", confidence),
                "Typical values are between 0.7 and 0.95",
            ));
        }
        if self.controller.step_cap < 1 {
            return Err(ApiError::invalid_input(
                "controller.step_cap must be at least 1",
            ));
        }
        if self.controller.stall_threshold == 0 {
            return Err(ApiError::invalid_input(
                "controller.stall_threshold must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Acknowledgement and start-up timing for the actuator link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSettings {
    /// Seconds to wait for `OK` after each command.
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout: f64,
    /// Extra attempts after the first one fails.
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,
    /// Seconds to let the device reset after the port opens.
    #[serde(default = "default_boot_grace")]
    pub boot_grace: f64,
    /// Seconds to wait for the initial `READY`.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout: f64,
}

fn default_ack_timeout() -> f64 {
    1.2
}

fn default_send_retries() -> u32 {
    2
}

fn default_boot_grace() -> f64 {
    1.8
}

fn default_ready_timeout() -> f64 {
    1.0
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            ack_timeout: default_ack_timeout(),
            send_retries: default_send_retries(),
            boot_grace: default_boot_grace(),
            ready_timeout: default_ready_timeout(),
        }
    }
}

impl LinkSettings {
    pub fn ack_timeout(&self) -> Duration {
        secs(self.ack_timeout)
    }

    pub fn boot_grace(&self) -> Duration {
        secs(self.boot_grace)
    }

    pub fn ready_timeout(&self) -> Duration {
        secs(self.ready_timeout)
    }
}

/// Template search budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateSettings {
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Seconds per locate attempt.
    #[serde(default = "default_locate_timeout")]
    pub locate_timeout: f64,
    /// Seconds between matcher polls within one attempt.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    /// Seconds to wait before retrying after a miss.
    #[serde(default = "default_retry_gap")]
    pub retry_gap: f64,
    /// Attempts after the first miss.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_confidence() -> f32 {
    0.78
}

fn default_locate_timeout() -> f64 {
    8.0
}

fn default_poll_interval() -> f64 {
    0.15
}

fn default_retry_gap() -> f64 {
    5.0
}

fn default_max_retries() -> u32 {
    6
}

impl Default for LocateSettings {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            locate_timeout: default_locate_timeout(),
            poll_interval: default_poll_interval(),
            retry_gap: default_retry_gap(),
            max_retries: default_max_retries(),
        }
    }
}

impl LocateSettings {
    pub fn locate_timeout(&self) -> Duration {
        secs(self.locate_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval)
    }

    pub fn retry_gap(&self) -> Duration {
        secs(self.retry_gap)
    }
}

/// Cursor servo parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Milliseconds to let a move register before re-reading the cursor.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    /// Largest per-axis step, in pixels.
    #[serde(default = "default_step_cap")]
    pub step_cap: i32,
    /// Seconds before giving up on convergence.
    #[serde(default = "default_max_center_time")]
    pub max_center_time: f64,
    /// Unchanged reads before switching to unit steps.
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold: u32,
    /// Milliseconds between unit steps during stall recovery.
    #[serde(default = "default_recovery_step_ms")]
    pub recovery_step_ms: u64,
}

fn default_pause_ms() -> u64 {
    16
}

fn default_step_cap() -> i32 {
    12
}

fn default_max_center_time() -> f64 {
    6.0
}

fn default_stall_threshold() -> u32 {
    4
}

fn default_recovery_step_ms() -> u64 {
    6
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            pause_ms: default_pause_ms(),
            step_cap: default_step_cap(),
            max_center_time: default_max_center_time(),
            stall_threshold: default_stall_threshold(),
            recovery_step_ms: default_recovery_step_ms(),
        }
    }
}

impl ControllerSettings {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn max_center_time(&self) -> Duration {
        secs(self.max_center_time)
    }

    pub fn recovery_step_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_step_ms)
    }
}

/// Pacing around clicks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSettings {
    /// Milliseconds between reaching the target and clicking.
    #[serde(default = "default_click_settle_ms")]
    pub click_settle_ms: u64,
}

fn default_click_settle_ms() -> u64 {
    50
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            click_settle_ms: default_click_settle_ms(),
        }
    }
}

impl ActionSettings {
    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }
}
