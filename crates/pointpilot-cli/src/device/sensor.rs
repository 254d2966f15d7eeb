//! Cursor sensor backed by an external program.

use std::time::Duration;

use pointpilot_core::controller::{CursorSensor, SensorError};
use pointpilot_core::geometry::Point;
use tracing::trace;

use super::process::run_bounded;

/// Runs a program and parses the cursor position from its output.
///
/// Accepts `xdotool getmouselocation --shell` style output (`X=..` and `Y=..`
/// lines) or a bare `x y` pair. A program that outlasts `timeout` is killed
/// and the sensor reports itself unavailable.
#[derive(Debug, Clone)]
pub struct CommandSensor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSensor {
    pub fn new(command: &[String], timeout: Duration) -> Result<Self, SensorError> {
        let Some((program, args)) = command.split_first() else {
            return Err(SensorError::Unavailable(
                "no sensor command configured".to_string(),
            ));
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }
}

impl CursorSensor for CommandSensor {
    fn current_position(&mut self) -> Result<Point, SensorError> {
        let Some(output) = run_bounded(&self.program, &self.args, self.timeout)? else {
            return Err(SensorError::Unavailable(format!(
                "{} timed out after {:?}",
                self.program, self.timeout
            )));
        };
        if !output.status.success() {
            return Err(SensorError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let point = parse_position(&stdout)?;
        trace!("Cursor at {}", point);
        Ok(point)
    }
}

/// Parse `X=.. Y=..` lines, or failing that the first two numbers.
pub fn parse_position(output: &str) -> Result<Point, SensorError> {
    let mut x = None;
    let mut y = None;
    for line in output.lines() {
        if let Some(value) = line.trim().strip_prefix("X=") {
            x = parse_coordinate(value);
        } else if let Some(value) = line.trim().strip_prefix("Y=") {
            y = parse_coordinate(value);
        }
    }
    if let (Some(x), Some(y)) = (x, y) {
        return Ok(Point::new(x, y));
    }

    let mut numbers = output
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty());
    match (
        numbers.next().and_then(parse_coordinate),
        numbers.next().and_then(parse_coordinate),
    ) {
        (Some(x), Some(y)) => Ok(Point::new(x, y)),
        _ => Err(SensorError::Parse(output.trim().to_string())),
    }
}

/// Whole or fractional pixels, truncated toward zero.
fn parse_coordinate(value: &str) -> Option<i32> {
    let value = value.trim();
    value
        .parse::<i32>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i32))
}
