//! Byte channel to the actuator.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("link I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("link closed by the device")]
    Closed,

    #[error("device stopped accepting data, write blocked for {0:?}")]
    WriteTimeout(Duration),

    #[error("link unsupported: {0}")]
    Unsupported(String),
}

/// Line-framed duplex channel.
///
/// Implementations own the underlying transport and close it on drop.
pub trait Link {
    /// Discard anything already received but not yet read.
    fn clear_input(&mut self) -> Result<(), LinkError>;

    /// Write `line` followed by `\n`, and flush before returning.
    ///
    /// Must not block indefinitely when the device stops reading.
    fn write_line(&mut self, line: &str) -> Result<(), LinkError>;

    /// Wait up to `timeout` for one complete line.
    ///
    /// Returns `Ok(None)` when no full line arrived in time. The line is
    /// returned without its terminator.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, LinkError>;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn clear_input(&mut self) -> Result<(), LinkError> {
        (**self).clear_input()
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        (**self).write_line(line)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, LinkError> {
        (**self).read_line(timeout)
    }
}
