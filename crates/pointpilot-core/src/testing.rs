//! Simulated collaborators for unit tests.
//!
//! [`Desk`] models the actuator and the screen cursor together: moves written
//! to its [`SimLink`] shift the cursor that its [`SimSensor`] reports.
//! [`FakeClock`] only advances when something sleeps or a read times out.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::command::Command;
use crate::controller::{CursorSensor, SensorError};
use crate::geometry::Point;
use crate::link::{Link, LinkError};
use crate::locator::{MatchCenter, MatchError, MatchQuery, ScreenMatcher, Template};

#[derive(Debug, Clone)]
pub struct FakeClock {
    origin: Instant,
    elapsed: Rc<Cell<Duration>>,
    cancelled: Rc<Cell<bool>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
            cancelled: Rc::new(Cell::new(false)),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckMode {
    Ok,
    Silent,
    Error(String),
}

#[derive(Debug)]
struct DeskState {
    cursor: Point,
    sent: Vec<String>,
    inbox: VecDeque<String>,
    ack: AckMode,
    dropped_acks: usize,
    chatter: Option<String>,
    greeting: Option<String>,
    fail_writes: bool,
    clip_above: Option<i32>,
    frozen: bool,
    sensor_reads: usize,
    sensor_fails: bool,
}

/// Shared state behind a simulated actuator and cursor.
#[derive(Debug, Clone)]
pub struct Desk(Rc<RefCell<DeskState>>);

impl Desk {
    pub fn at(x: i32, y: i32) -> Self {
        Self(Rc::new(RefCell::new(DeskState {
            cursor: Point::new(x, y),
            sent: Vec::new(),
            inbox: VecDeque::new(),
            ack: AckMode::Ok,
            dropped_acks: 0,
            chatter: None,
            greeting: None,
            fail_writes: false,
            clip_above: None,
            frozen: false,
            sensor_reads: 0,
            sensor_fails: false,
        })))
    }

    pub fn link(&self, clock: &FakeClock) -> SimLink {
        SimLink {
            desk: self.clone(),
            clock: clock.clone(),
        }
    }

    pub fn sensor(&self) -> SimSensor {
        SimSensor { desk: self.clone() }
    }

    pub fn cursor(&self) -> Point {
        self.0.borrow().cursor
    }

    pub fn sent(&self) -> Vec<String> {
        self.0.borrow().sent.clone()
    }

    pub fn sensor_reads(&self) -> usize {
        self.0.borrow().sensor_reads
    }

    pub fn set_ack(&self, mode: AckMode) {
        self.0.borrow_mut().ack = mode;
    }

    /// Leave the next `count` commands unanswered.
    pub fn drop_acks(&self, count: usize) {
        self.0.borrow_mut().dropped_acks = count;
    }

    /// Queue a line as if it had arrived before the next send.
    pub fn push_stale(&self, line: &str) {
        self.0.borrow_mut().inbox.push_back(line.to_string());
    }

    /// Emit `line` ahead of every acknowledgement.
    pub fn set_chatter(&self, line: &str) {
        self.0.borrow_mut().chatter = Some(line.to_string());
    }

    /// Deliver `line` on the first read that finds the inbox empty.
    pub fn greet_with(&self, line: &str) {
        self.0.borrow_mut().greeting = Some(line.to_string());
    }

    pub fn fail_writes(&self, fail: bool) {
        self.0.borrow_mut().fail_writes = fail;
    }

    /// Acknowledge but ignore moves larger than `limit` on either axis.
    pub fn clip_above(&self, limit: i32) {
        self.0.borrow_mut().clip_above = Some(limit);
    }

    /// Acknowledge but ignore every move.
    pub fn freeze(&self, frozen: bool) {
        self.0.borrow_mut().frozen = frozen;
    }

    pub fn fail_sensor(&self, fail: bool) {
        self.0.borrow_mut().sensor_fails = fail;
    }
}

pub struct SimLink {
    desk: Desk,
    clock: FakeClock,
}

impl Link for SimLink {
    fn clear_input(&mut self) -> Result<(), LinkError> {
        self.desk.0.borrow_mut().inbox.clear();
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        let mut state = self.desk.0.borrow_mut();
        if state.fail_writes {
            return Err(LinkError::Closed);
        }
        state.sent.push(line.to_string());

        if let Ok(Command::Move { dx, dy }) = line.parse::<Command>() {
            let clipped = state
                .clip_above
                .is_some_and(|limit| dx.abs() > limit || dy.abs() > limit);
            if !clipped && !state.frozen {
                state.cursor = state.cursor.offset(dx, dy);
            }
        }

        if let Some(chatter) = state.chatter.clone() {
            state.inbox.push_back(chatter);
        }
        if state.dropped_acks > 0 {
            state.dropped_acks -= 1;
            return Ok(());
        }
        match state.ack.clone() {
            AckMode::Ok => state.inbox.push_back("OK".to_string()),
            AckMode::Silent => {}
            AckMode::Error(reason) => state.inbox.push_back(format!("ERR {}", reason)),
        }
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, LinkError> {
        let mut state = self.desk.0.borrow_mut();
        if let Some(line) = state.inbox.pop_front() {
            return Ok(Some(line));
        }
        if let Some(line) = state.greeting.take() {
            return Ok(Some(line));
        }
        drop(state);
        self.clock.advance(timeout);
        Ok(None)
    }
}

pub struct SimSensor {
    desk: Desk,
}

impl CursorSensor for SimSensor {
    fn current_position(&mut self) -> Result<Point, SensorError> {
        let mut state = self.desk.0.borrow_mut();
        state.sensor_reads += 1;
        if state.sensor_fails {
            return Err(SensorError::Unavailable("sensor unplugged".to_string()));
        }
        Ok(state.cursor)
    }
}

type MatchFn = dyn FnMut(&Template, &MatchQuery) -> Result<Option<MatchCenter>, MatchError>;

/// Matcher driven by a closure, recording every query it receives.
pub struct ScriptedMatcher {
    respond: Box<MatchFn>,
    queries: Rc<RefCell<Vec<MatchQuery>>>,
}

impl ScriptedMatcher {
    pub fn new(
        respond: impl FnMut(&Template, &MatchQuery) -> Result<Option<MatchCenter>, MatchError>
            + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            queries: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn never() -> Self {
        Self::new(|_, _| Ok(None))
    }

    pub fn always_at(x: f64, y: f64) -> Self {
        Self::new(move |_, _| Ok(Some(MatchCenter { x, y })))
    }

    /// Handle for inspecting queries after the matcher has been moved.
    pub fn queries(&self) -> Rc<RefCell<Vec<MatchQuery>>> {
        self.queries.clone()
    }
}

impl ScreenMatcher for ScriptedMatcher {
    fn find_on_screen(
        &mut self,
        template: &Template,
        query: &MatchQuery,
    ) -> Result<Option<MatchCenter>, MatchError> {
        self.queries.borrow_mut().push(query.clone());
        (self.respond)(template, query)
    }
}
