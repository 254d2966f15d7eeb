//! Core types and logic for pointpilot.
//!
//! This crate drives a serial mouse actuator (a microcontroller that emulates
//! a relative-motion mouse) onto targets found by template matching on the
//! live screen. It is used by the `pointpilot` CLI and has no I/O of its own:
//! the serial channel, cursor sensor and screen matcher are traits.
//!
//! # Modules
//!
//! - [`error`]: API error types with actionable suggestions
//! - [`command`]: Line protocol commands and replies
//! - [`link`]: Byte channel abstraction used by the actuator
//! - [`actuator`]: Send-with-acknowledgement protocol driver
//! - [`controller`]: Closed-loop cursor positioning
//! - [`locator`]: Bounded-retry template search
//! - [`sequencer`]: Find, move and click composition
//! - [`script`]: Serialisable step scripts
//! - [`settings`]: Tunables passed to each component
//!
//! # Wire Protocol
//!
//! | Command | Meaning |
//! |---------|---------|
//! | `R <dx> <dy>` | Relative move |
//! | `B1` / `B0` | Hold / release primary button |
//! | `C`, `CR`, `AC` | Left, right, alt-modified click |
//! | `KE <name>` | Named key event |
//! | `KT <text>` | Literal text |
//!
//! Every command is answered by one `OK` or `ERR <reason>` line.

pub mod actuator;
pub mod clock;
pub mod command;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod link;
pub mod locator;
pub mod script;
pub mod sequencer;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;
