//! Raw serial port link (Unix only).
//!
//! The port is opened without becoming the controlling terminal and put in
//! raw mode at the configured baud rate. The descriptor stays non-blocking;
//! reads and writes wait with `poll(2)` up to a deadline.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use pointpilot_core::link::{Link, LinkError};
use tracing::debug;

/// Baud rates the link accepts.
pub const SUPPORTED_BAUD_RATES: [u32; 6] = [9600, 19200, 38400, 57600, 115200, 230400];

fn baud_constant(baud: u32) -> Option<libc::speed_t> {
    match baud {
        9600 => Some(libc::B9600),
        19200 => Some(libc::B19200),
        38400 => Some(libc::B38400),
        57600 => Some(libc::B57600),
        115200 => Some(libc::B115200),
        230400 => Some(libc::B230400),
        _ => None,
    }
}

pub struct SerialLink {
    file: File,
    /// Bytes received after the last complete line.
    pending: Vec<u8>,
    write_timeout: Duration,
}

impl SerialLink {
    /// Open `path` at `baud`. A line that cannot be written within
    /// `write_timeout` fails with [`LinkError::WriteTimeout`].
    pub fn open(path: &str, baud: u32, write_timeout: Duration) -> Result<Self, LinkError> {
        let speed = baud_constant(baud).ok_or_else(|| {
            LinkError::Unsupported(format!(
                "baud rate {} (supported: {:?})",
                baud, SUPPORTED_BAUD_RATES
            ))
        })?;

        // O_NONBLOCK also keeps the open from waiting for carrier detect.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)?;
        let fd = file.as_raw_fd();
        configure(fd, speed)?;

        debug!("Opened {} at {} baud", path, baud);
        Ok(Self {
            file,
            pending: Vec::new(),
            write_timeout,
        })
    }

    /// Wait until `events` are ready on the port or `timeout` passes.
    fn wait_ready(&self, events: libc::c_short, timeout: Duration) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events,
            revents: 0,
        };
        // Round up so a sub-millisecond remainder still waits.
        let millis = timeout.as_micros().div_ceil(1000).min(i32::MAX as u128) as libc::c_int;
        // SAFETY: pfd is a valid pollfd for the duration of the call and nfds is 1.
        let ready = unsafe { libc::poll(&mut pfd, 1, millis) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        Ok(ready > 0)
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(
            String::from_utf8_lossy(&line)
                .trim_end_matches(['\r', '\n'])
                .to_string(),
        )
    }
}

fn configure(fd: RawFd, speed: libc::speed_t) -> io::Result<()> {
    // SAFETY: termios is plain data, fully initialised by tcgetattr before use,
    // and fd is an open descriptor owned by the caller.
    unsafe {
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut tio);
        tio.c_cflag |= libc::CLOCAL | libc::CREAD;
        tio.c_cc[libc::VMIN] = 0;
        tio.c_cc[libc::VTIME] = 0;
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

impl Link for SerialLink {
    fn clear_input(&mut self) -> Result<(), LinkError> {
        self.pending.clear();
        // SAFETY: tcflush only discards queued input on an open descriptor.
        if unsafe { libc::tcflush(self.file.as_raw_fd(), libc::TCIFLUSH) } != 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        let bytes = format!("{}\n", line).into_bytes();
        let deadline = Instant::now() + self.write_timeout;
        let mut written = 0;
        while written < bytes.len() {
            match self.file.write(&bytes[written..]) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(LinkError::WriteTimeout(self.write_timeout));
                    }
                    self.wait_ready(libc::POLLOUT, remaining)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, LinkError> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 256];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if !self.wait_ready(libc::POLLIN, remaining)? {
                continue;
            }
            match self.file.read(&mut buf) {
                // Readable with nothing to read means the device hung up.
                Ok(0) => return Err(LinkError::Closed),
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e)
                    if e.kind() == io::ErrorKind::Interrupted
                        || e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}
