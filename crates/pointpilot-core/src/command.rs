//! Line protocol spoken with the actuator.
//!
//! Every command is one ASCII line. The actuator answers each line with
//! `OK` or `ERR <reason>`, and may print `READY` after it boots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Which click the actuator performs once the cursor is on target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickKind {
    #[default]
    Left,
    Right,
    /// Left click with Alt held.
    Alt,
}

impl fmt::Display for ClickKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClickKind::Left => write!(f, "left"),
            ClickKind::Right => write!(f, "right"),
            ClickKind::Alt => write!(f, "alt"),
        }
    }
}

/// A single actuator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `R <dx> <dy>`
    Move { dx: i32, dy: i32 },
    /// `B1`
    HoldButton,
    /// `B0`
    ReleaseButton,
    /// `C`, `CR` or `AC`
    Click(ClickKind),
    /// `KE <name>`, name already normalised.
    Key(String),
    /// `KT <text>`
    Text(String),
}

impl Command {
    pub fn move_by(dx: i32, dy: i32) -> Self {
        Command::Move { dx, dy }
    }

    /// Build a key event, normalising the key name.
    pub fn key(name: &str) -> Result<Self, ApiError> {
        normalize_key_name(name).map(|key| Command::Key(key.to_string())).ok_or_else(|| {
            ApiError::invalid_input_with_suggestion(
                format!("Unknown key name '{}'", name),
                "Use a named key such as ENTER, ESC, TAB, SPACE, BACKSPACE, UP or F1",
            )
        })
    }

    /// Build a literal text command.
    ///
    /// Text must fit on one line, so control characters are rejected.
    pub fn text(text: &str) -> Result<Self, ApiError> {
        if text.is_empty() {
            return Err(ApiError::invalid_input("Text to type cannot be empty"));
        }
        if let Some(c) = text.chars().find(|c| c.is_control()) {
            return Err(ApiError::invalid_input_with_suggestion(
                format!("Text contains control character {:?}", c),
                "Send line breaks as separate ENTER key events",
            ));
        }
        Ok(Command::Text(text.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move { dx, dy } => write!(f, "R {} {}", dx, dy),
            Command::HoldButton => write!(f, "B1"),
            Command::ReleaseButton => write!(f, "B0"),
            Command::Click(ClickKind::Left) => write!(f, "C"),
            Command::Click(ClickKind::Right) => write!(f, "CR"),
            Command::Click(ClickKind::Alt) => write!(f, "AC"),
            Command::Key(name) => write!(f, "KE {}", name),
            Command::Text(text) => write!(f, "KT {}", text),
        }
    }
}

impl FromStr for Command {
    type Err = ApiError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (op, rest) = match line.split_once(' ') {
            Some((op, rest)) => (op, Some(rest)),
            None => (line, None),
        };

        match (op, rest) {
            ("R", Some(args)) => {
                let mut parts = args.split_whitespace();
                let (Some(dx), Some(dy), None) = (parts.next(), parts.next(), parts.next()) else {
                    return Err(ApiError::invalid_input(format!(
                        "Move needs exactly two offsets: '{}'",
                        line
                    )));
                };
                let parse = |v: &str| {
                    v.parse::<i32>().map_err(|_| {
                        ApiError::invalid_input(format!("Invalid move offset '{}'", v))
                    })
                };
                Ok(Command::Move {
                    dx: parse(dx)?,
                    dy: parse(dy)?,
                })
            }
            ("B1", None) => Ok(Command::HoldButton),
            ("B0", None) => Ok(Command::ReleaseButton),
            ("C", None) => Ok(Command::Click(ClickKind::Left)),
            ("CR", None) => Ok(Command::Click(ClickKind::Right)),
            ("AC", None) => Ok(Command::Click(ClickKind::Alt)),
            ("KE", Some(name)) => Command::key(name),
            ("KT", Some(text)) => Command::text(text),
            _ => Err(ApiError::invalid_input_with_suggestion(
                format!("Unrecognised command line '{}'", line),
                "Valid commands: R <dx> <dy>, B1, B0, C, CR, AC, KE <name>, KT <text>",
            )),
        }
    }
}

/// A line received from the actuator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Ready,
    /// `ERR <reason>`; reason may be empty.
    Err(String),
    /// Debug output or noise; never an acknowledgement.
    Other(String),
}

impl Reply {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "OK" => Reply::Ok,
            "READY" => Reply::Ready,
            _ => match line.strip_prefix("ERR") {
                Some(reason) => Reply::Err(reason.trim().to_string()),
                None => Reply::Other(line.to_string()),
            },
        }
    }
}

/// Normalise a key name to the upper-case name the firmware expects.
///
/// Case insensitive. Accepts common aliases (`return`, `escape`, `pgup`).
pub fn normalize_key_name(name: &str) -> Option<&'static str> {
    let key = match name.trim().to_lowercase().as_str() {
        "enter" | "return" => "ENTER",
        "escape" | "esc" => "ESC",
        "tab" => "TAB",
        "backspace" => "BACKSPACE",
        "delete" | "del" => "DELETE",
        "space" => "SPACE",
        "insert" | "ins" => "INSERT",

        "up" | "arrowup" => "UP",
        "down" | "arrowdown" => "DOWN",
        "left" | "arrowleft" => "LEFT",
        "right" | "arrowright" => "RIGHT",
        "home" => "HOME",
        "end" => "END",
        "pageup" | "pgup" => "PAGEUP",
        "pagedown" | "pgdn" => "PAGEDOWN",

        "f1" => "F1",
        "f2" => "F2",
        "f3" => "F3",
        "f4" => "F4",
        "f5" => "F5",
        "f6" => "F6",
        "f7" => "F7",
        "f8" => "F8",
        "f9" => "F9",
        "f10" => "F10",
        "f11" => "F11",
        "f12" => "F12",

        _ => return None,
    };
    Some(key)
}
