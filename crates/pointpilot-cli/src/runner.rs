//! Script execution against the real device.
//!
//! The sequence itself is blocking, so it runs on a blocking thread while the
//! async side waits for it or for a shutdown signal. A signal sets the shared
//! [`CancelToken`]; the sequence notices it at its next check and returns.

use std::future::Future;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use pointpilot_core::clock::{CancelToken, Clock, SystemClock};
use pointpilot_core::error::ApiError;
use pointpilot_core::script::{Script, Step};
use pointpilot_core::sequencer::Sequencer;
use tracing::{info, warn};

use crate::config::Config;
use crate::device::{self, CommandMatcher, CommandSensor};
use crate::report::RunReport;

/// Load a script from JSON (`.json`) or TOML (anything else).
pub fn load_script(path: &Path) -> anyhow::Result<Script> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let script = if is_json {
        Script::from_json(&contents)?
    } else {
        let script: Script = toml::from_str(&contents)
            .with_context(|| format!("Invalid script {}", path.display()))?;
        script.validate()?;
        script
    };
    Ok(script)
}

fn needs_matcher(step: &Step) -> bool {
    matches!(step, Step::Click { .. } | Step::AltClick { .. })
}

/// Run every step until one fails or the run is cancelled.
///
/// Errors only when the run cannot start: bad configuration or a port that
/// will not open. Step failures are part of the report.
pub fn run_script(config: &Config, script: &Script, cancel: CancelToken) -> Result<RunReport, ApiError> {
    script.validate()?;
    let port = config.device.port.as_str();

    let matcher = match CommandMatcher::new(&config.matcher.command, config.matcher.timeout()) {
        Ok(matcher) => Some(matcher),
        Err(_) if !script.steps.iter().any(needs_matcher) => None,
        Err(e) => {
            return Err(ApiError::invalid_input_with_suggestion(
                e.to_string(),
                "Set [matcher] command in the config file to a template matching program",
            ))
        }
    };
    let sensor = CommandSensor::new(&config.sensor.command, config.sensor.timeout()).map_err(|e| {
        ApiError::invalid_input_with_suggestion(
            e.to_string(),
            "Set [sensor] command in the config file",
        )
    })?;

    let write_timeout = config.settings.link.ack_timeout();
    let link = device::open_link(port, config.device.baud, write_timeout)
        .map_err(|e| ApiError::link_unavailable(port, &e.to_string()))?;
    info!("Connected to {} at {} baud", port, config.device.baud);

    let clock = SystemClock::with_cancel(cancel);
    let mut report = RunReport::new(port);
    let mut sequencer = Sequencer::new(link, sensor, matcher, &config.settings, clock.clone());
    sequencer.handshake();

    let total = script.steps.len();
    for (index, step) in script.steps.iter().enumerate() {
        if clock.is_cancelled() {
            report.mark_cancelled();
            break;
        }
        info!("Step {}/{}: {}", index + 1, total, step.action());
        let started = Instant::now();
        let outcome = sequencer.run_step(step);
        if !report.record(step, outcome, started.elapsed()) {
            break;
        }
    }

    let report = report.finish(total);
    if report.cancelled {
        warn!("Run cancelled by user");
    } else if report.completed {
        info!("Sequence finished");
    } else if let Some(failed) = report.steps.last().and_then(|s| s.error.as_ref()) {
        warn!("Run stopped: {}", failed);
    }
    Ok(report)
}

/// Run `job` on a blocking thread until it finishes or `shutdown` resolves.
///
/// On shutdown the token is cancelled and the job is still awaited, so the
/// device is released by the time this returns. A job that panics is an
/// internal error.
pub async fn run_until<T, F, S>(cancel: CancelToken, job: F, shutdown: S) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
    S: Future<Output = ()>,
{
    let mut task = tokio::task::spawn_blocking(job);
    tokio::select! {
        result = &mut task => return result.map_err(runner_stopped),
        _ = shutdown => {}
    }
    cancel.cancel();
    task.await.map_err(runner_stopped)
}

fn runner_stopped(e: tokio::task::JoinError) -> ApiError {
    ApiError::internal(format!("step runner stopped: {}", e))
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, stopping after the current command");
        }
        _ = sigterm() => {
            info!("Received SIGTERM, stopping after the current command");
        }
    }
}

/// Wait for SIGTERM signal (Unix only).
///
/// If signal registration fails, logs a warning and waits indefinitely.
#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(
                "Failed to register SIGTERM handler: {}, only SIGINT will cancel the run",
                e
            );
            std::future::pending::<()>().await;
        }
    }
}

/// SIGTERM is not available on non-Unix platforms; use a never-completing future.
#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointpilot_core::error::ErrorCode;
    use std::time::Duration;

    #[tokio::test]
    async fn test_finished_job_is_returned() {
        let value = run_until(CancelToken::new(), || 42, std::future::pending::<()>())
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_and_waits_for_job() {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let job = move || {
            let clock = SystemClock::with_cancel(token);
            let started = Instant::now();
            // Would take a minute unless cancelled.
            clock.sleep(Duration::from_secs(60));
            (clock.is_cancelled(), started.elapsed())
        };

        let (cancelled, elapsed) = run_until(cancel.clone(), job, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        })
        .await
        .unwrap();

        assert!(cancelled);
        assert!(cancel.is_cancelled());
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_panicking_job_is_internal_error() {
        let err = run_until(
            CancelToken::new(),
            || -> u32 { panic!("sequencer bug") },
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_missing_port_is_link_unavailable() {
        let mut config = Config::default();
        config.device.port = "/dev/pointpilot-missing-port".to_string();
        let script = Script::new(vec![Step::Key {
            name: "enter".to_string(),
            after: 0.0,
        }]);

        let err = run_script(&config, &script, CancelToken::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::LinkUnavailable);
        assert!(err.message.contains("/dev/pointpilot-missing-port"));
    }

    #[test]
    fn test_click_without_matcher_is_rejected_before_opening_port() {
        let config = Config::default();
        let script = Script::new(vec![Step::AltClick {
            template: pointpilot_core::locator::Template::new("npc.png"),
        }]);

        let err = run_script(&config, &script, CancelToken::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.suggestion.unwrap().contains("[matcher]"));
    }

    #[test]
    fn test_load_script_json_and_toml() {
        let dir = std::env::temp_dir();
        let stem = format!("pointpilot-script-{}", std::process::id());

        let json_path = dir.join(format!("{}.json", stem));
        std::fs::write(
            &json_path,
            r#"{"steps": [{"action": "click", "template": "flag1.png", "wait": 19}]}"#,
        )
        .unwrap();
        let script = load_script(&json_path).unwrap();
        std::fs::remove_file(&json_path).ok();
        assert_eq!(script.steps.len(), 1);

        let toml_path = dir.join(format!("{}.toml", stem));
        std::fs::write(
            &toml_path,
            r#"
            [[steps]]
            action = "click"
            template = "upboat.png"
            button = "right"
            wait = 5.0

            [[steps]]
            action = "dialogue"
            text = "spiritual"
            "#,
        )
        .unwrap();
        let script = load_script(&toml_path).unwrap();
        std::fs::remove_file(&toml_path).ok();
        assert_eq!(script.steps.len(), 2);
        assert_eq!(script.steps[1].action(), "dialogue");
    }
}
