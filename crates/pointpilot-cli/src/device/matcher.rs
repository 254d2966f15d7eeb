//! Screen matcher backed by an external program.
//!
//! The program is called as
//! `<program> <args..> <template> [--confidence C] [--grayscale]` and must:
//!
//! | Exit status | stdout | Meaning |
//! |-------------|--------|---------|
//! | 0 | `x y` (centre, may be fractional) | Found |
//! | 1 | anything | Not on screen |
//! | other | anything | Matcher failure |
//!
//! A run that outlasts the configured timeout or the rest of the search
//! budget is killed and counts as a failure.

use std::time::Duration;

use pointpilot_core::locator::{MatchCenter, MatchError, MatchQuery, ScreenMatcher, Template};
use tracing::trace;

use super::process::run_bounded;

#[derive(Debug, Clone)]
pub struct CommandMatcher {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandMatcher {
    pub fn new(command: &[String], timeout: Duration) -> Result<Self, MatchError> {
        let Some((program, args)) = command.split_first() else {
            return Err(MatchError::Failed(
                "no matcher command configured".to_string(),
            ));
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    /// Full argument list for one query.
    fn arguments(&self, template: &Template, query: &MatchQuery) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(template.path().display().to_string());
        if let Some(confidence) = query.confidence {
            args.push("--confidence".to_string());
            args.push(confidence.to_string());
        }
        if query.grayscale {
            args.push("--grayscale".to_string());
        }
        args
    }
}

impl ScreenMatcher for CommandMatcher {
    fn find_on_screen(
        &mut self,
        template: &Template,
        query: &MatchQuery,
    ) -> Result<Option<MatchCenter>, MatchError> {
        let args = self.arguments(template, query);
        trace!("Running {} {:?}", self.program, args);
        let limit = self.timeout.min(query.time_limit);
        let Some(output) = run_bounded(&self.program, &args, limit)? else {
            return Err(MatchError::Failed(format!(
                "{} timed out after {:?}",
                self.program, limit
            )));
        };

        match output.status.code() {
            Some(0) => parse_center(&String::from_utf8_lossy(&output.stdout)).map(Some),
            Some(1) => Ok(None),
            _ => Err(MatchError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}

/// Parse the first two numbers of the first non-empty line.
pub fn parse_center(output: &str) -> Result<MatchCenter, MatchError> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let mut numbers = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok().filter(|v| v.is_finite()));
    match (numbers.next().flatten(), numbers.next().flatten()) {
        (Some(x), Some(y)) => Ok(MatchCenter { x, y }),
        _ => Err(MatchError::Parse(output.trim().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(command: &[&str]) -> CommandMatcher {
        let command: Vec<String> = command.iter().map(|s| s.to_string()).collect();
        CommandMatcher::new(&command, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_center() {
        assert_eq!(
            parse_center("412.5 96\n").unwrap(),
            MatchCenter { x: 412.5, y: 96.0 }
        );
        assert_eq!(
            parse_center("\n  10,20\nextra").unwrap(),
            MatchCenter { x: 10.0, y: 20.0 }
        );
        assert!(parse_center("found").is_err());
        assert!(parse_center("").is_err());
    }

    #[test]
    fn test_arguments_follow_query() {
        let m = matcher(&["findimg", "--screen", "0"]);
        let template = Template::new("assets/flag1.png");

        let args = m.arguments(
            &template,
            &MatchQuery {
                confidence: Some(0.78),
                grayscale: true,
                time_limit: Duration::from_secs(8),
            },
        );
        assert_eq!(
            args,
            vec!["--screen", "0", "assets/flag1.png", "--confidence", "0.78", "--grayscale"]
        );

        let args = m.arguments(
            &template,
            &MatchQuery {
                confidence: None,
                grayscale: false,
                time_limit: Duration::from_secs(8),
            },
        );
        assert_eq!(args, vec!["--screen", "0", "assets/flag1.png"]);
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(CommandMatcher::new(&[], Duration::from_secs(5)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_protocol() {
        let template = Template::new("flag1.png");
        let query = MatchQuery {
            confidence: None,
            grayscale: false,
            time_limit: Duration::from_secs(8),
        };

        let mut found = matcher(&["sh", "-c", "echo '120.9 45'", "matcher"]);
        assert_eq!(
            found.find_on_screen(&template, &query).unwrap(),
            Some(MatchCenter { x: 120.9, y: 45.0 })
        );

        let mut missing = matcher(&["sh", "-c", "exit 1", "matcher"]);
        assert_eq!(missing.find_on_screen(&template, &query).unwrap(), None);

        let mut broken = matcher(&["sh", "-c", "echo 'no screen' >&2; exit 3", "matcher"]);
        let err = broken.find_on_screen(&template, &query).unwrap_err();
        assert!(err.to_string().contains("no screen"));
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_matcher_is_cut_off_by_search_budget() {
        let template = Template::new("flag1.png");
        let query = MatchQuery {
            confidence: Some(0.78),
            grayscale: false,
            time_limit: Duration::from_millis(300),
        };
        let mut hung = matcher(&["sh", "-c", "exec sleep 6", "matcher"]);

        let started = std::time::Instant::now();
        let err = hung.find_on_screen(&template, &query).unwrap_err();
        assert!(matches!(err, MatchError::Failed(_)));
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_returns_within_budget_when_matcher_hangs() {
        use pointpilot_core::clock::SystemClock;
        use pointpilot_core::locator::{Locator, SearchResult};
        use pointpilot_core::settings::LocateSettings;

        let settings = LocateSettings {
            locate_timeout: 0.3,
            max_retries: 0,
            ..LocateSettings::default()
        };
        let mut locator = Locator::new(
            matcher(&["sh", "-c", "exec sleep 6", "matcher"]),
            settings,
            SystemClock::new(),
        );

        let started = std::time::Instant::now();
        assert_eq!(locator.locate(&Template::new("flag1.png")), SearchResult::Miss);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
