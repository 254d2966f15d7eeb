//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Drive a serial mouse actuator onto on-screen targets.
///
/// Finds targets by template matching, steers the real cursor onto them in
/// small relative steps through a microcontroller that acts as a USB mouse,
/// and clicks or types. Results are printed as JSON, logs go to stderr.
#[derive(Debug, Parser)]
#[command(name = "pointpilot", version)]
pub struct Cli {
    /// Config file [default: $POINTPILOT_CONFIG or <config dir>/pointpilot/config.toml]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Serial port of the actuator [default: $POINTPILOT_PORT or config]
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// Serial baud rate [default: config or 115200]
    #[arg(long, global = true)]
    pub baud: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a JSON or TOML step script
    #[command(after_help = "\
Examples:
  pointpilot run route.toml             # Run every step, stop at the first failure
  pointpilot run route.json -p /dev/ttyACM1")]
    Run(RunArgs),

    /// Find a template, move onto it and click
    #[command(after_help = "\
Examples:
  pointpilot click flag1.png            # Left click
  pointpilot click flag1.png --wait 19  # Click, then wait 19 seconds
  pointpilot click upboat.png -b right  # Right click")]
    Click(ClickArgs),

    /// Find a template and click it with Alt held
    AltClick(TemplateArgs),

    /// Move the cursor onto a screen position
    Move(MoveArgs),

    /// Send a named key (ENTER, ESC, TAB, F1, ...)
    Key(KeyArgs),

    /// Type literal text
    #[command(name = "type")]
    Type(TypeArgs),

    /// Answer a dialogue: ENTER, text, ENTER, ENTER, confirmation, ENTER, ESC
    Dialogue(DialogueArgs),

    /// Search the screen for a template without touching the device
    Locate(LocateArgs),

    /// Print the cursor position reported by the sensor
    Position,

    /// Show an example config and script
    Examples,
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Script file (.json for JSON, anything else is TOML)
    pub script: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct ClickArgs {
    /// Template image of the target
    pub template: PathBuf,

    /// Which click to perform
    #[arg(short, long, value_enum, default_value_t = Button::Left)]
    pub button: Button,

    /// Seconds to wait after clicking
    #[arg(short, long, default_value_t = 0.0)]
    pub wait: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Button {
    Left,
    Right,
    /// Left click with Alt held
    Alt,
}

#[derive(Debug, clap::Args)]
pub struct TemplateArgs {
    /// Template image of the target
    pub template: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct MoveArgs {
    /// Target x coordinate
    #[arg(allow_negative_numbers = true)]
    pub x: i32,

    /// Target y coordinate
    #[arg(allow_negative_numbers = true)]
    pub y: i32,
}

#[derive(Debug, clap::Args)]
pub struct KeyArgs {
    /// Key name (case-insensitive, e.g. Enter, esc, PageUp)
    pub name: String,
}

#[derive(Debug, clap::Args)]
pub struct TypeArgs {
    /// Text to type (single line)
    pub text: String,
}

#[derive(Debug, clap::Args)]
pub struct DialogueArgs {
    /// Text to say
    pub text: String,

    /// Confirmation typed after the text
    #[arg(long, default_value = "yes")]
    pub confirm: String,
}

#[derive(Debug, clap::Args)]
pub struct LocateArgs {
    /// Template image to search for
    pub template: PathBuf,

    /// Search once instead of retrying after misses
    #[arg(long)]
    pub once: bool,
}

/// Example text for the `examples` command.
pub const EXAMPLES_TEXT: &str = r#"Example: a route of clicks ending in a dialogue

# ~/.config/pointpilot/config.toml
[device]
port = "/dev/ttyACM0"
baud = 115200

[sensor]
command = ["xdotool", "getmouselocation", "--shell"]
timeout = 2

[matcher]
# Called as: <command..> <template> [--confidence C] [--grayscale]
# Exit 0 and print "x y" when found, exit 1 when not.
command = ["find-on-screen"]
# Killed after this many seconds, or sooner when the search budget runs out
timeout = 10

[locate]
confidence = 0.78
max_retries = 6

# route.toml
[[steps]]
action = "click"
template = "flag1.png"
wait = 19

[[steps]]
action = "click"
template = "upboat.png"
button = "right"
wait = 5

[[steps]]
action = "alt_click"
template = "npc.png"

[[steps]]
action = "dialogue"
text = "spiritual"

# Run it (Ctrl+C stops after the current command)
pointpilot run route.toml

# Try pieces on their own
pointpilot locate flag1.png --once
pointpilot position
pointpilot click flag1.png --wait 3
pointpilot key esc
"#;

#[cfg(test)]
mod tests {
    use super::{Button, Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_click_parses_button_and_wait() {
        let cli = Cli::parse_from(["pointpilot", "click", "upboat.png", "-b", "right", "--wait", "5"]);

        match cli.command {
            Commands::Click(args) => {
                assert_eq!(args.template.to_str(), Some("upboat.png"));
                assert_eq!(args.button, Button::Right);
                assert_eq!(args.wait, 5.0);
            }
            _ => panic!("Expected click command"),
        }
    }

    #[test]
    fn test_click_defaults() {
        let cli = Cli::parse_from(["pointpilot", "click", "flag1.png"]);
        match cli.command {
            Commands::Click(args) => {
                assert_eq!(args.button, Button::Left);
                assert_eq!(args.wait, 0.0);
            }
            _ => panic!("Expected click command"),
        }
    }

    #[test]
    fn test_move_accepts_negative_coordinates() {
        let cli = Cli::parse_from(["pointpilot", "move", "-1280", "40"]);
        match cli.command {
            Commands::Move(args) => assert_eq!((args.x, args.y), (-1280, 40)),
            _ => panic!("Expected move command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["pointpilot", "key", "enter", "--port", "/dev/ttyUSB0", "--baud", "9600"]);
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(cli.baud, Some(9600));
        assert!(matches!(cli.command, Commands::Key(_)));
    }

    #[test]
    fn test_dialogue_default_confirmation() {
        let cli = Cli::parse_from(["pointpilot", "dialogue", "spiritual"]);
        match cli.command {
            Commands::Dialogue(args) => {
                assert_eq!(args.text, "spiritual");
                assert_eq!(args.confirm, "yes");
            }
            _ => panic!("Expected dialogue command"),
        }
    }

    #[test]
    fn test_alt_click_subcommand_name() {
        let cli = Cli::parse_from(["pointpilot", "alt-click", "npc.png"]);
        assert!(matches!(cli.command, Commands::AltClick(_)));
    }
}
