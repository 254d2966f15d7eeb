//! Send-with-acknowledgement driver for the actuator.
//!
//! The protocol is strictly request/response: a command is written only after
//! the previous command's acknowledgement wait has ended, one way or another.
//! Failures are reported as `false` and logged, never raised, so the caller
//! decides whether a missing acknowledgement ends the run.

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::command::{ClickKind, Command, Reply};
use crate::link::{Link, LinkError};
use crate::settings::LinkSettings;

/// Result of a single write-and-wait attempt.
#[derive(Debug)]
enum Attempt {
    Acked,
    Rejected(String),
    NoReply,
    Failed(LinkError),
}

/// Actuator protocol over an exclusively owned [`Link`].
///
/// Dropping the actuator drops the link, which closes the channel.
pub struct Actuator<L: Link, C: Clock> {
    link: L,
    clock: C,
    settings: LinkSettings,
}

impl<L: Link, C: Clock> Actuator<L, C> {
    pub fn new(link: L, clock: C, settings: LinkSettings) -> Self {
        Self {
            link,
            clock,
            settings,
        }
    }

    /// Let the device finish its reset, then wait for its greeting.
    ///
    /// Opening a serial port resets many USB microcontrollers, so the device
    /// stays silent for a moment. A missing greeting is tolerated.
    pub fn handshake(&mut self) -> bool {
        self.clock.sleep(self.settings.boot_grace());
        if let Err(e) = self.link.clear_input() {
            warn!("Failed to clear link input after boot: {}", e);
        }
        let ready = self.await_ready(self.settings.ready_timeout());
        if ready {
            info!("Actuator ready");
        } else {
            warn!("Actuator sent no READY, continuing anyway");
        }
        ready
    }

    /// Read lines until `READY` or `OK` arrives or `timeout` elapses.
    pub fn await_ready(&mut self, timeout: std::time::Duration) -> bool {
        let deadline = self.clock.now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(self.clock.now());
            if remaining.is_zero() {
                return false;
            }
            match self.link.read_line(remaining) {
                Ok(Some(line)) => match Reply::parse(&line) {
                    Reply::Ready | Reply::Ok => return true,
                    _ => debug!("Ignoring boot output: {}", line.trim()),
                },
                Ok(None) => {}
                Err(e) => {
                    warn!("Link error while waiting for READY: {}", e);
                    return false;
                }
            }
        }
    }

    /// Send a command and wait for `OK`, retrying on failure.
    ///
    /// Makes at most `send_retries + 1` attempts.
    pub fn send(&mut self, command: &Command) -> bool {
        let line = command.to_string();
        let attempts = self.settings.send_retries + 1;

        for attempt in 1..=attempts {
            match self.attempt(&line) {
                Attempt::Acked => return true,
                Attempt::Rejected(reason) => {
                    warn!("Actuator rejected '{}': {}", line, reason);
                }
                Attempt::NoReply => {
                    debug!(
                        "No acknowledgement for '{}' (attempt {}/{})",
                        line, attempt, attempts
                    );
                }
                Attempt::Failed(e) => {
                    warn!("Link error while sending '{}': {}", line, e);
                }
            }
        }

        warn!("No acknowledgement for '{}' after {} attempts", line, attempts);
        false
    }

    fn attempt(&mut self, line: &str) -> Attempt {
        // A stale OK from an earlier command must not acknowledge this one.
        if let Err(e) = self.link.clear_input() {
            debug!("Failed to clear link input: {}", e);
        }

        if let Err(e) = self.link.write_line(line) {
            return Attempt::Failed(e);
        }
        debug!("Sent: {}", line);

        let deadline = self.clock.now() + self.settings.ack_timeout();
        loop {
            let remaining = deadline.saturating_duration_since(self.clock.now());
            if remaining.is_zero() {
                return Attempt::NoReply;
            }
            match self.link.read_line(remaining) {
                Ok(Some(reply)) => match Reply::parse(&reply) {
                    Reply::Ok => return Attempt::Acked,
                    Reply::Err(reason) => return Attempt::Rejected(reason),
                    Reply::Ready | Reply::Other(_) => {
                        debug!("Ignoring unsolicited line: {}", reply.trim());
                    }
                },
                Ok(None) => {}
                Err(e) => return Attempt::Failed(e),
            }
        }
    }

    pub fn move_by(&mut self, dx: i32, dy: i32) -> bool {
        self.send(&Command::move_by(dx, dy))
    }

    pub fn hold_button(&mut self) -> bool {
        self.send(&Command::HoldButton)
    }

    pub fn release_button(&mut self) -> bool {
        self.send(&Command::ReleaseButton)
    }

    pub fn click(&mut self, kind: ClickKind) -> bool {
        self.send(&Command::Click(kind))
    }

    /// Send a named key event. Unknown names are logged and not sent.
    pub fn key_event(&mut self, name: &str) -> bool {
        match Command::key(name) {
            Ok(command) => self.send(&command),
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Type literal text. Text that cannot be framed is logged and not sent.
    pub fn type_text(&mut self, text: &str) -> bool {
        match Command::text(text) {
            Ok(command) => self.send(&command),
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }
}
