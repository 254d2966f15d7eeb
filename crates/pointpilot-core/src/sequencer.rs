//! Find, move and click composition.
//!
//! The [`Sequencer`] owns every collaborator for a run: the actuator, the
//! cursor sensor, the locator and the controller. Each high-level action
//! returns a [`StepOutcome`] and never panics or raises on device trouble.

use std::time::Duration;

use tracing::{info, warn};

use crate::actuator::Actuator;
use crate::clock::{secs, wait_logged, Clock};
use crate::command::{ClickKind, Command};
use crate::controller::{ControllerOutcome, CursorSensor, PositionController};
use crate::error::ApiError;
use crate::geometry::Point;
use crate::link::Link;
use crate::locator::{Locator, ScreenMatcher, SearchResult, Template};
use crate::script::Step;
use crate::settings::{ActionSettings, Settings};

/// A template to find and the click to perform on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRequest {
    pub template: Template,
    pub click: ClickKind,
}

impl TargetRequest {
    pub fn new(template: Template, click: ClickKind) -> Self {
        Self { template, click }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// Every search attempt missed. Nothing was sent.
    NotFound { template: String, attempts: u32 },
    /// The controller gave up. The button hold was released.
    NotCentered {
        target: String,
        outcome: ControllerOutcome,
    },
    /// A command other than a move was never acknowledged.
    ActuatorFailed { command: String },
    /// Arguments were invalid. Nothing was sent.
    Rejected(ApiError),
    Cancelled,
}

impl StepOutcome {
    pub fn into_error(self) -> Option<ApiError> {
        match self {
            StepOutcome::Done => None,
            StepOutcome::NotFound { template, attempts } => {
                Some(ApiError::template_not_found(&template, attempts))
            }
            StepOutcome::NotCentered { target, outcome } => {
                Some(ApiError::not_centered(&target, outcome.describe()))
            }
            StepOutcome::ActuatorFailed { command } => Some(ApiError::actuator_failed(&command)),
            StepOutcome::Rejected(err) => Some(err),
            StepOutcome::Cancelled => Some(ApiError::cancelled()),
        }
    }
}

/// One command of a key script and the pause after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStroke {
    pub command: Command,
    pub after: Duration,
}

/// Keyboard commands sent in order, each followed by a pause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyScript {
    strokes: Vec<KeyStroke>,
}

impl KeyScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, command: Command, after: Duration) -> Self {
        self.strokes.push(KeyStroke { command, after });
        self
    }

    /// ENTER, `text`, ENTER, ENTER, `confirmation`, ENTER, ESC.
    pub fn dialogue(text: &str, confirmation: &str) -> Result<Self, ApiError> {
        let half = Duration::from_millis(500);
        let one = Duration::from_secs(1);
        Ok(KeyScript::new()
            .then(Command::key("ENTER")?, half)
            .then(Command::text(text)?, one)
            .then(Command::key("ENTER")?, one)
            .then(Command::key("ENTER")?, one)
            .then(Command::text(confirmation)?, one)
            .then(Command::key("ENTER")?, half)
            .then(Command::key("ESC")?, half))
    }

    pub fn strokes(&self) -> &[KeyStroke] {
        &self.strokes
    }
}

pub struct Sequencer<L, S, M, C>
where
    L: Link,
    S: CursorSensor,
    M: ScreenMatcher,
    C: Clock + Clone,
{
    actuator: Actuator<L, C>,
    sensor: S,
    locator: Locator<M, C>,
    controller: PositionController<C>,
    actions: ActionSettings,
    clock: C,
}

impl<L, S, M, C> Sequencer<L, S, M, C>
where
    L: Link,
    S: CursorSensor,
    M: ScreenMatcher,
    C: Clock + Clone,
{
    pub fn new(link: L, sensor: S, matcher: M, settings: &Settings, clock: C) -> Self {
        Self {
            actuator: Actuator::new(link, clock.clone(), settings.link.clone()),
            sensor,
            locator: Locator::new(matcher, settings.locate.clone(), clock.clone()),
            controller: PositionController::new(settings.controller.clone(), clock.clone()),
            actions: settings.actions.clone(),
            clock,
        }
    }

    pub fn handshake(&mut self) -> bool {
        self.actuator.handshake()
    }

    /// Find `request.template`, hold the button, centre on it and click.
    pub fn move_click(&mut self, request: &TargetRequest, post_click_wait: Duration) -> StepOutcome {
        let name = request.template.name();
        if self.clock.is_cancelled() {
            return StepOutcome::Cancelled;
        }

        let target = match self.locator.locate_with_retry(&request.template) {
            SearchResult::Found(point) => point,
            SearchResult::Miss => {
                if self.clock.is_cancelled() {
                    return StepOutcome::Cancelled;
                }
                let attempts = self.locator.settings().max_retries + 1;
                warn!("{} not found after {} attempts", name, attempts);
                return StepOutcome::NotFound {
                    template: name,
                    attempts,
                };
            }
        };
        if self.clock.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        info!("Found {} at {}, centring for {} click", name, target, request.click);

        if !self.actuator.hold_button() {
            self.release_after_failure();
            return StepOutcome::ActuatorFailed {
                command: Command::HoldButton.to_string(),
            };
        }

        let outcome = self
            .controller
            .move_to(&mut self.actuator, &mut self.sensor, target);
        match outcome {
            ControllerOutcome::Converged => {}
            ControllerOutcome::Cancelled => return StepOutcome::Cancelled,
            failed => {
                warn!("Could not centre on {}: {}", name, failed.describe());
                self.release_after_failure();
                return StepOutcome::NotCentered {
                    target: name,
                    outcome: failed,
                };
            }
        }

        self.clock.sleep(self.actions.click_settle());
        let click = Command::Click(request.click);
        if !self.actuator.send(&click) {
            self.release_after_failure();
            return StepOutcome::ActuatorFailed {
                command: click.to_string(),
            };
        }
        if !self.actuator.release_button() {
            return StepOutcome::ActuatorFailed {
                command: Command::ReleaseButton.to_string(),
            };
        }

        if !post_click_wait.is_zero() {
            info!("Waiting {:?} after {}", post_click_wait, name);
            wait_logged(&self.clock, post_click_wait, &name);
            if self.clock.is_cancelled() {
                return StepOutcome::Cancelled;
            }
        }
        StepOutcome::Done
    }

    /// Alt-modified click on a template, without a post-click wait.
    pub fn alt_click(&mut self, template: &Template) -> StepOutcome {
        let request = TargetRequest::new(template.clone(), ClickKind::Alt);
        self.move_click(&request, Duration::ZERO)
    }

    /// Centre the cursor on a fixed point without clicking.
    pub fn move_to(&mut self, target: Point) -> StepOutcome {
        if self.clock.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        match self
            .controller
            .move_to(&mut self.actuator, &mut self.sensor, target)
        {
            ControllerOutcome::Converged => StepOutcome::Done,
            ControllerOutcome::Cancelled => StepOutcome::Cancelled,
            failed => StepOutcome::NotCentered {
                target: target.to_string(),
                outcome: failed,
            },
        }
    }

    /// Answer a dialogue with `text` and the default `yes` confirmation.
    pub fn type_literal(&mut self, text: &str) -> StepOutcome {
        self.dialogue(text, "yes")
    }

    pub fn dialogue(&mut self, text: &str, confirmation: &str) -> StepOutcome {
        match KeyScript::dialogue(text, confirmation) {
            Ok(script) => self.run_key_script(&script),
            Err(e) => StepOutcome::Rejected(e),
        }
    }

    /// Send each stroke and pause after it. Stops at the first failure.
    pub fn run_key_script(&mut self, script: &KeyScript) -> StepOutcome {
        for stroke in script.strokes() {
            if self.clock.is_cancelled() {
                return StepOutcome::Cancelled;
            }
            if !self.actuator.send(&stroke.command) {
                return StepOutcome::ActuatorFailed {
                    command: stroke.command.to_string(),
                };
            }
            self.clock.sleep(stroke.after);
        }
        if self.clock.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        StepOutcome::Done
    }

    pub fn run_step(&mut self, step: &Step) -> StepOutcome {
        match step {
            Step::Click {
                template,
                button,
                wait,
            } => {
                let request = TargetRequest::new(template.clone(), *button);
                self.move_click(&request, secs(*wait))
            }
            Step::AltClick { template } => self.alt_click(template),
            Step::MoveTo { x, y } => self.move_to(Point::new(*x, *y)),
            Step::Key { name, after } => match Command::key(name) {
                Ok(command) => self.run_key_script(&KeyScript::new().then(command, secs(*after))),
                Err(e) => StepOutcome::Rejected(e),
            },
            Step::Type { text, after } => match Command::text(text) {
                Ok(command) => self.run_key_script(&KeyScript::new().then(command, secs(*after))),
                Err(e) => StepOutcome::Rejected(e),
            },
            Step::Dialogue { text, confirmation } => self.dialogue(text, confirmation),
            Step::Pause { seconds } => {
                wait_logged(&self.clock, secs(*seconds), "pause");
                if self.clock.is_cancelled() {
                    StepOutcome::Cancelled
                } else {
                    StepOutcome::Done
                }
            }
        }
    }

    fn release_after_failure(&mut self) {
        if !self.actuator.release_button() {
            warn!("Button release was not acknowledged, the button may still be held");
        }
    }
}
