//! Template search with bounded polling and retries.
//!
//! A single [`Locator::locate`] call polls the screen matcher until a time
//! budget runs out, trying a fixed list of match strategies on each poll.
//! [`Locator::locate_with_retry`] repeats whole searches after a gap, for
//! targets that take a while to appear.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{wait_logged, Clock};
use crate::geometry::Point;
use crate::settings::LocateSettings;

/// Reference image of a target, identified by its file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(PathBuf);

impl Template {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File name for logs and error messages.
    pub fn name(&self) -> String {
        match self.0.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.0.display().to_string(),
        }
    }

    pub fn exists(&self) -> bool {
        self.0.is_file()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Parameters for one matcher call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchQuery {
    /// Minimum match score, or `None` for the matcher's own default.
    pub confidence: Option<f32>,
    pub grayscale: bool,
    /// What is left of the search budget. Matchers should give up after it.
    pub time_limit: Duration,
}

/// Centre of a match in screen coordinates. May be fractional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCenter {
    pub x: f64,
    pub y: f64,
}

impl MatchCenter {
    /// Truncate toward zero to whole pixels.
    pub fn to_point(self) -> Point {
        Point::new(self.x as i32, self.y as i32)
    }
}

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("failed to run matcher: {0}")]
    Io(#[from] std::io::Error),

    #[error("matcher failed: {0}")]
    Failed(String),

    #[error("unreadable matcher output: {0:?}")]
    Parse(String),
}

/// Finds a template on the live screen.
///
/// `Ok(None)` means the screen was searched and nothing matched.
pub trait ScreenMatcher {
    fn find_on_screen(
        &mut self,
        template: &Template,
        query: &MatchQuery,
    ) -> Result<Option<MatchCenter>, MatchError>;
}

impl<M: ScreenMatcher + ?Sized> ScreenMatcher for Box<M> {
    fn find_on_screen(
        &mut self,
        template: &Template,
        query: &MatchQuery,
    ) -> Result<Option<MatchCenter>, MatchError> {
        (**self).find_on_screen(template, query)
    }
}

/// `None` stands for "no matcher configured" and fails every query.
impl<M: ScreenMatcher> ScreenMatcher for Option<M> {
    fn find_on_screen(
        &mut self,
        template: &Template,
        query: &MatchQuery,
    ) -> Result<Option<MatchCenter>, MatchError> {
        match self {
            Some(matcher) => matcher.find_on_screen(template, query),
            None => Err(MatchError::Failed("no screen matcher configured".to_string())),
        }
    }
}

/// One way of asking the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Configured confidence, colour.
    Requested,
    /// Matcher's own default threshold.
    MatcherDefault,
    /// Configured confidence, grayscale.
    RequestedGrayscale,
}

impl MatchStrategy {
    /// Strategies tried on every poll, in order.
    pub const FALLBACK_ORDER: [MatchStrategy; 3] = [
        MatchStrategy::Requested,
        MatchStrategy::MatcherDefault,
        MatchStrategy::RequestedGrayscale,
    ];

    pub fn query(self, confidence: f32, time_limit: Duration) -> MatchQuery {
        let (confidence, grayscale) = match self {
            MatchStrategy::Requested => (Some(confidence), false),
            MatchStrategy::MatcherDefault => (None, false),
            MatchStrategy::RequestedGrayscale => (Some(confidence), true),
        };
        MatchQuery {
            confidence,
            grayscale,
            time_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    Found(Point),
    Miss,
}

impl SearchResult {
    pub fn found(self) -> Option<Point> {
        match self {
            SearchResult::Found(point) => Some(point),
            SearchResult::Miss => None,
        }
    }
}

/// Run `search` once, then up to `retries` more times after `gap`.
///
/// `search` receives the 1-based attempt number. Stops at the first hit or
/// when the clock is cancelled.
pub fn retry_search<C, F>(clock: &C, retries: u32, gap: Duration, mut search: F) -> SearchResult
where
    C: Clock + ?Sized,
    F: FnMut(u32) -> SearchResult,
{
    let attempts = retries + 1;
    for attempt in 1..=attempts {
        let result = search(attempt);
        if result != SearchResult::Miss {
            return result;
        }
        if attempt == attempts || clock.is_cancelled() {
            break;
        }
        info!("Miss on attempt {}/{}, retrying in {:?}", attempt, attempts, gap);
        wait_logged(clock, gap, "retry gap");
        if clock.is_cancelled() {
            break;
        }
    }
    SearchResult::Miss
}

pub struct Locator<M: ScreenMatcher, C: Clock> {
    matcher: M,
    settings: LocateSettings,
    clock: C,
}

impl<M: ScreenMatcher, C: Clock> Locator<M, C> {
    pub fn new(matcher: M, settings: LocateSettings, clock: C) -> Self {
        Self {
            matcher,
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &LocateSettings {
        &self.settings
    }

    /// Poll the matcher until a hit or `locate_timeout` elapses.
    pub fn locate(&mut self, template: &Template) -> SearchResult {
        locate_once(&mut self.matcher, &self.settings, &self.clock, template)
    }

    /// [`Self::locate`] once, then up to `max_retries` more times after a
    /// `retry_gap` wait.
    pub fn locate_with_retry(&mut self, template: &Template) -> SearchResult {
        let Self {
            matcher,
            settings,
            clock,
        } = self;
        let (settings, clock) = (&*settings, &*clock);
        retry_search(clock, settings.max_retries, settings.retry_gap(), |_| {
            locate_once(&mut *matcher, settings, clock, template)
        })
    }
}

fn locate_once<M, C>(
    matcher: &mut M,
    settings: &LocateSettings,
    clock: &C,
    template: &Template,
) -> SearchResult
where
    M: ScreenMatcher + ?Sized,
    C: Clock + ?Sized,
{
    if !template.exists() {
        warn!("Template file {} does not exist", template);
    }

    let deadline = clock.now() + settings.locate_timeout();
    while clock.now() < deadline {
        if clock.is_cancelled() {
            break;
        }
        if let Some(center) = poll(matcher, clock, deadline, settings.confidence, template) {
            let point = center.to_point();
            debug!("Found {} at {}", template.name(), point);
            return SearchResult::Found(point);
        }
        clock.sleep(settings.poll_interval());
    }
    SearchResult::Miss
}

/// One pass over every strategy, cut short at `deadline`.
fn poll<M, C>(
    matcher: &mut M,
    clock: &C,
    deadline: Instant,
    confidence: f32,
    template: &Template,
) -> Option<MatchCenter>
where
    M: ScreenMatcher + ?Sized,
    C: Clock + ?Sized,
{
    for strategy in MatchStrategy::FALLBACK_ORDER {
        let now = clock.now();
        if now >= deadline || clock.is_cancelled() {
            break;
        }
        let query = strategy.query(confidence, deadline - now);
        match matcher.find_on_screen(template, &query) {
            Ok(Some(center)) => return Some(center),
            Ok(None) => {}
            Err(e) => debug!("{:?} match for {} failed: {}", strategy, template.name(), e),
        }
    }
    None
}
