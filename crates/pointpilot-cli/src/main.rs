//! pointpilot CLI entry point.

mod args;
mod config;
mod device;
mod report;
mod runner;

use clap::Parser;
use pointpilot_core::clock::{CancelToken, SystemClock};
use pointpilot_core::command::ClickKind;
use pointpilot_core::controller::CursorSensor;
use pointpilot_core::error::ApiError;
use pointpilot_core::locator::{Locator, Template};
use pointpilot_core::script::{Script, Step};
use tracing::error;

use crate::args::{Button, Cli, Commands};
use crate::config::Config;
use crate::device::{CommandMatcher, CommandSensor};
use crate::report::LocateReport;

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn click_kind(button: Button) -> ClickKind {
    match button {
        Button::Left => ClickKind::Left,
        Button::Right => ClickKind::Right,
        Button::Alt => ClickKind::Alt,
    }
}

/// Convert device subcommands to a one-step script.
///
/// Returns None for commands that don't drive the actuator.
fn cli_to_script(command: &Commands) -> anyhow::Result<Option<Script>> {
    let step = match command {
        Commands::Run(args) => return runner::load_script(&args.script).map(Some),
        Commands::Click(args) => Step::Click {
            template: Template::new(&args.template),
            button: click_kind(args.button),
            wait: args.wait,
        },
        Commands::AltClick(args) => Step::AltClick {
            template: Template::new(&args.template),
        },
        Commands::Move(args) => Step::MoveTo {
            x: args.x,
            y: args.y,
        },
        Commands::Key(args) => Step::Key {
            name: args.name.clone(),
            after: 0.0,
        },
        Commands::Type(args) => Step::Type {
            text: args.text.clone(),
            after: 0.0,
        },
        Commands::Dialogue(args) => Step::Dialogue {
            text: args.text.clone(),
            confirmation: args.confirm.clone(),
        },
        Commands::Locate(_) | Commands::Position | Commands::Examples => return Ok(None),
    };
    let script = Script::new(vec![step]);
    script.validate()?;
    Ok(Some(script))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // Examples command just prints and exits
    if let Commands::Examples = cli.command {
        println!("{}", crate::args::EXAMPLES_TEXT);
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?.with_overrides(cli.port.clone(), cli.baud);

    match &cli.command {
        Commands::Locate(args) => return locate(&config, &Template::new(&args.template), args.once),
        Commands::Position => return position(&config),
        _ => {}
    }

    let Some(script) = cli_to_script(&cli.command)? else {
        return Ok(());
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let report = runtime.block_on(runner::run_until(
        cancel,
        move || runner::run_script(&config, &script, token),
        runner::shutdown_signal(),
    ))??;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn locate(config: &Config, template: &Template, once: bool) -> anyhow::Result<()> {
    let matcher = CommandMatcher::new(&config.matcher.command, config.matcher.timeout()).map_err(|e| {
        ApiError::invalid_input_with_suggestion(
            e.to_string(),
            "Set [matcher] command in the config file to a template matching program",
        )
    })?;
    let mut locator = Locator::new(matcher, config.settings.locate.clone(), SystemClock::new());
    let result = if once {
        locator.locate(template)
    } else {
        locator.locate_with_retry(template)
    };

    let report = LocateReport {
        template: template.to_string(),
        found: result.found().is_some(),
        position: result.found(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn position(config: &Config) -> anyhow::Result<()> {
    let mut sensor = CommandSensor::new(&config.sensor.command, config.sensor.timeout())?;
    let point = sensor.current_position()?;
    println!("{}", serde_json::to_string_pretty(&point)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_commands_become_one_step_scripts() {
        let cli = Cli::parse_from(["pointpilot", "click", "upboat.png", "-b", "right", "-w", "5"]);
        let script = cli_to_script(&cli.command).unwrap().unwrap();
        assert_eq!(
            script.steps,
            vec![Step::Click {
                template: Template::new("upboat.png"),
                button: ClickKind::Right,
                wait: 5.0,
            }]
        );

        let cli = Cli::parse_from(["pointpilot", "dialogue", "edron", "--confirm", "no"]);
        let script = cli_to_script(&cli.command).unwrap().unwrap();
        assert_eq!(script.steps[0].action(), "dialogue");
    }

    #[test]
    fn test_non_device_commands_have_no_script() {
        for args in [
            vec!["pointpilot", "position"],
            vec!["pointpilot", "examples"],
            vec!["pointpilot", "locate", "flag1.png"],
        ] {
            let cli = Cli::parse_from(args);
            assert!(cli_to_script(&cli.command).unwrap().is_none());
        }
    }

    #[test]
    fn test_invalid_arguments_fail_before_running() {
        let cli = Cli::parse_from(["pointpilot", "key", "hyper"]);
        assert!(cli_to_script(&cli.command).is_err());

        let cli = Cli::parse_from(["pointpilot", "click", "flag1.png", "--wait=-3"]);
        assert!(cli_to_script(&cli.command).is_err());
    }
}
