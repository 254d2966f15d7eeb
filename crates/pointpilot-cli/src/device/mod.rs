//! Host-side adapters: serial link, cursor sensor and screen matcher.

pub mod matcher;
mod process;
pub mod sensor;
#[cfg(unix)]
pub mod serial;

pub use matcher::CommandMatcher;
pub use sensor::CommandSensor;

use std::time::Duration;

use pointpilot_core::link::{Link, LinkError};

/// Open the actuator's serial port.
#[cfg(unix)]
pub fn open_link(
    port: &str,
    baud: u32,
    write_timeout: Duration,
) -> Result<Box<dyn Link + Send>, LinkError> {
    Ok(Box::new(serial::SerialLink::open(port, baud, write_timeout)?))
}

#[cfg(not(unix))]
pub fn open_link(
    port: &str,
    _baud: u32,
    _write_timeout: Duration,
) -> Result<Box<dyn Link + Send>, LinkError> {
    Err(LinkError::Unsupported(format!(
        "serial port {} needs a Unix host",
        port
    )))
}
