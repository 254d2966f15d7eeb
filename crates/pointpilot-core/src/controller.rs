//! Closed-loop cursor positioning.
//!
//! The actuator only understands relative moves and knows nothing about
//! screen coordinates, so the controller dead-reckons: it reads the real
//! cursor position, sends one bounded step toward the target, waits for the
//! move to register and reads again, until the cursor sits exactly on the
//! target or the time budget runs out.
//!
//! # Step size
//!
//! | Distance (max axis) | Step magnitude |
//! |---------------------|----------------|
//! | 0..=11 | 1 |
//! | 12..=71 | distance / 6 |
//! | 72+ | `step_cap` (default 12) |
//!
//! # Stall recovery
//!
//! Large relative moves are sometimes dropped or clipped by the input stack,
//! most often near screen edges. When the cursor reads unchanged
//! `stall_threshold` times in a row while the step magnitude is above one,
//! the controller sends `magnitude` single-pixel moves instead, which
//! usually gets the cursor moving again.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::actuator::Actuator;
use crate::clock::Clock;
use crate::geometry::Point;
use crate::link::Link;
use crate::settings::ControllerSettings;

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("cursor sensor unavailable: {0}")]
    Unavailable(String),

    #[error("unreadable cursor position: {0:?}")]
    Parse(String),

    #[error("cursor sensor I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Live cursor position source.
///
/// Must report the same coordinate space as the screen matcher.
pub trait CursorSensor {
    fn current_position(&mut self) -> Result<Point, SensorError>;
}

impl<S: CursorSensor + ?Sized> CursorSensor for Box<S> {
    fn current_position(&mut self) -> Result<Point, SensorError> {
        (**self).current_position()
    }
}

/// How a positioning run ended. Only `Converged` is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerOutcome {
    Converged,
    TimedOut,
    /// A move was never acknowledged.
    ActuatorFailed,
    SensorFailed,
    Cancelled,
}

impl ControllerOutcome {
    pub fn describe(self) -> &'static str {
        match self {
            ControllerOutcome::Converged => "converged",
            ControllerOutcome::TimedOut => "timed out before reaching the target",
            ControllerOutcome::ActuatorFailed => "actuator did not acknowledge a move",
            ControllerOutcome::SensorFailed => "cursor position could not be read",
            ControllerOutcome::Cancelled => "cancelled",
        }
    }
}

/// One planned relative move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub dx: i32,
    pub dy: i32,
    /// Per-axis clamp used for this step.
    pub magnitude: i32,
}

impl Step {
    /// Direction of this step as -1, 0 or 1 per axis.
    pub fn unit(self) -> (i32, i32) {
        (self.dx.signum(), self.dy.signum())
    }
}

/// Plan the next move from `current` toward `target`.
///
/// The magnitude is a sixth of the larger axis distance, at least 1 and at
/// most `step_cap`. Each axis is clamped to it independently, so a step never
/// overshoots and never points away from the target.
pub fn plan_step(current: Point, target: Point, step_cap: i32) -> Step {
    let (dx, dy) = current.delta_to(target);
    let distance = current.chebyshev(target);
    let magnitude = (distance / 6).max(1).min(step_cap.max(1));
    Step {
        dx: dx.clamp(-magnitude, magnitude),
        dy: dy.clamp(-magnitude, magnitude),
        magnitude,
    }
}

pub struct PositionController<C: Clock> {
    settings: ControllerSettings,
    clock: C,
}

impl<C: Clock> PositionController<C> {
    pub fn new(settings: ControllerSettings, clock: C) -> Self {
        Self { settings, clock }
    }

    /// Drive the cursor onto `target`.
    ///
    /// Returns as soon as a sensor read equals `target`. If the cursor is
    /// already there, no command is sent.
    pub fn move_to<L, S>(
        &self,
        actuator: &mut Actuator<L, C>,
        sensor: &mut S,
        target: Point,
    ) -> ControllerOutcome
    where
        L: Link,
        S: CursorSensor + ?Sized,
    {
        let start = self.clock.now();
        let deadline = start + self.settings.max_center_time();
        let mut moves = 0usize;

        let Some(mut last) = sense(sensor) else {
            return ControllerOutcome::SensorFailed;
        };
        let mut stalled = 0u32;

        while self.clock.now() < deadline {
            let Some(current) = sense(sensor) else {
                return ControllerOutcome::SensorFailed;
            };
            if current == target {
                debug!(
                    "Reached {} after {} moves in {:?}",
                    target,
                    moves,
                    self.clock.now().saturating_duration_since(start)
                );
                return ControllerOutcome::Converged;
            }
            if self.clock.is_cancelled() {
                return ControllerOutcome::Cancelled;
            }

            let step = plan_step(current, target, self.settings.step_cap);
            trace!("At {}, stepping ({}, {})", current, step.dx, step.dy);
            if !actuator.move_by(step.dx, step.dy) {
                warn!("Move toward {} was not acknowledged, giving up", target);
                return ControllerOutcome::ActuatorFailed;
            }
            moves += 1;
            self.clock.sleep(self.settings.pause());

            let Some(sensed) = sense(sensor) else {
                return ControllerOutcome::SensorFailed;
            };
            if sensed != last {
                stalled = 0;
                last = sensed;
                continue;
            }

            stalled += 1;
            if stalled >= self.settings.stall_threshold && step.magnitude > 1 {
                let (ux, uy) = step.unit();
                debug!(
                    "Cursor stuck at {} for {} reads, sending {} unit steps",
                    sensed, stalled, step.magnitude
                );
                for _ in 0..step.magnitude {
                    if !actuator.move_by(ux, uy) {
                        warn!("Unit step toward {} was not acknowledged, giving up", target);
                        return ControllerOutcome::ActuatorFailed;
                    }
                    moves += 1;
                    self.clock.sleep(self.settings.recovery_step_delay());
                }
                stalled = 0;
            }
        }

        info!(
            "Cursor did not reach {} within {:?} ({} moves)",
            target,
            self.settings.max_center_time(),
            moves
        );
        ControllerOutcome::TimedOut
    }
}

fn sense<S: CursorSensor + ?Sized>(sensor: &mut S) -> Option<Point> {
    match sensor.current_position() {
        Ok(point) => Some(point),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}
