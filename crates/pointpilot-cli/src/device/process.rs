//! Running helper programs under a time limit.

use std::io;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use tracing::warn;
use wait_timeout::ChildExt;

/// Run `program` and collect its output, or `None` if it outlives `timeout`.
///
/// A program that runs too long is killed and reaped. Output is read after
/// exit, so it has to fit in the pipe buffer; the sensor and matcher print a
/// line or two.
pub fn run_bounded(program: &str, args: &[String], timeout: Duration) -> io::Result<Option<Output>> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    match child.wait_timeout(timeout)? {
        Some(_) => child.wait_with_output().map(Some),
        None => {
            warn!("{} did not finish within {:?}, killing it", program, timeout);
            child.kill()?;
            child.wait()?;
            Ok(None)
        }
    }
}
