//! Blink and yawn event tracking over a rolling window
//!
//! Time is passed in as a `Duration` since the monitoring clock's origin, so
//! trackers never read the wall clock themselves.

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::DrowsinessConfig;
use crate::labels::FrameLabels;

/// A completed blink or yawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub start: Duration,
    pub duration: Duration,
}

/// Completed events whose start lies within the window
#[derive(Debug, Clone)]
struct EventWindow {
    events: VecDeque<TimedEvent>,
    span: Duration,
}

impl EventWindow {
    fn new(span: Duration) -> Self {
        Self {
            events: VecDeque::new(),
            span,
        }
    }

    fn push(&mut self, event: TimedEvent) {
        self.events.push_back(event);
    }

    /// Drop events that started more than `span` before `now`.
    /// Events are pushed in start order, so only the front needs checking.
    fn prune(&mut self, now: Duration) {
        while let Some(front) = self.events.front() {
            if now.saturating_sub(front.start) > self.span {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn mean_duration_secs(&self) -> f64 {
        if self.events.is_empty() {
            return 0.0;
        }
        let total: f64 = self.events.iter().map(|e| e.duration.as_secs_f64()).sum();
        total / self.events.len() as f64
    }

    fn clear(&mut self) {
        self.events.clear();
    }

    fn iter(&self) -> impl Iterator<Item = &TimedEvent> {
        self.events.iter()
    }
}

/// Tracks blinks and the current continuous eye closure
#[derive(Debug, Clone)]
pub struct BlinkTracker {
    history: EventWindow,
    eyes_were_closed: bool,
    blink_start: Option<Duration>,
    closure_start: Option<Duration>,
    closure: Duration,
}

impl BlinkTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            history: EventWindow::new(window),
            eyes_were_closed: false,
            blink_start: None,
            closure_start: None,
            closure: Duration::ZERO,
        }
    }

    /// Feed one frame's labels observed at `now`
    pub fn update(&mut self, labels: &FrameLabels, now: Duration) {
        let closed = labels.eyes_closed();

        if closed {
            if !self.eyes_were_closed {
                self.blink_start = Some(now);
                self.closure_start = Some(now);
            } else if let Some(start) = self.closure_start {
                self.closure = now.saturating_sub(start);
            }
        } else if self.eyes_were_closed {
            if let Some(start) = self.blink_start.take() {
                let duration = now.saturating_sub(start);
                trace!("Blink finished after {:?}", duration);
                self.history.push(TimedEvent { start, duration });
            }
            self.closure_start = None;
            self.closure = Duration::ZERO;
        }

        self.eyes_were_closed = closed;
        self.history.prune(now);
    }

    /// Blinks in the window
    pub fn blink_count(&self) -> usize {
        self.history.len()
    }

    /// Mean blink duration in seconds, 0 with no blinks
    pub fn avg_blink_duration(&self) -> f64 {
        self.history.mean_duration_secs()
    }

    /// Current continuous closure in seconds, 0 while eyes are open
    pub fn total_eye_closure_duration(&self) -> f64 {
        self.closure.as_secs_f64()
    }

    /// Completed blinks still inside the window
    pub fn events(&self) -> impl Iterator<Item = &TimedEvent> {
        self.history.iter()
    }

    /// Back to a fresh eyes-open state with no history
    pub fn reset(&mut self) {
        self.history.clear();
        self.eyes_were_closed = false;
        self.blink_start = None;
        self.closure_start = None;
        self.closure = Duration::ZERO;
    }
}

/// Tracks completed yawns of plausible length
#[derive(Debug, Clone)]
pub struct YawnTracker {
    history: EventWindow,
    valid_secs: RangeInclusive<f64>,
    was_yawning: bool,
    yawn_start: Option<Duration>,
}

impl YawnTracker {
    pub fn new(window: Duration, valid_secs: RangeInclusive<f64>) -> Self {
        Self {
            history: EventWindow::new(window),
            valid_secs,
            was_yawning: false,
            yawn_start: None,
        }
    }

    /// Feed one frame's labels observed at `now`.
    ///
    /// A yawn only completes on an explicit `no_yawn` frame; a frame with
    /// neither label leaves it pending until the next yawn restarts it.
    pub fn update(&mut self, labels: &FrameLabels, now: Duration) {
        let yawning = labels.yawning();

        if yawning {
            if !self.was_yawning {
                self.yawn_start = Some(now);
            }
        } else if labels.not_yawning() && self.was_yawning {
            if let Some(start) = self.yawn_start.take() {
                let duration = now.saturating_sub(start);
                if self.valid_secs.contains(&duration.as_secs_f64()) {
                    debug!("Yawn accepted ({:.2}s)", duration.as_secs_f64());
                    self.history.push(TimedEvent { start, duration });
                } else {
                    debug!("Yawn discarded ({:.2}s outside range)", duration.as_secs_f64());
                }
            }
        }

        self.was_yawning = yawning;
        self.history.prune(now);
    }

    /// Accepted yawns in the window
    pub fn yawn_count(&self) -> usize {
        self.history.len()
    }

    pub fn events(&self) -> impl Iterator<Item = &TimedEvent> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.was_yawning = false;
        self.yawn_start = None;
    }
}

/// Statistics handed to the evaluator and the session recorder
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverStats {
    pub blink_count: usize,
    /// Seconds
    pub avg_blink_duration: f64,
    /// Seconds
    pub total_eye_closure_duration: f64,
    pub yawn_count: usize,
}

/// Both trackers, updated together once per frame
#[derive(Debug, Clone)]
pub struct EventTrackers {
    pub blink: BlinkTracker,
    pub yawn: YawnTracker,
}

impl EventTrackers {
    pub fn new(config: &DrowsinessConfig) -> Self {
        Self {
            blink: BlinkTracker::new(config.window()),
            yawn: YawnTracker::new(config.window(), config.yawn_range()),
        }
    }

    pub fn update(&mut self, labels: &FrameLabels, now: Duration) {
        self.blink.update(labels, now);
        self.yawn.update(labels, now);
    }

    pub fn stats(&self) -> DriverStats {
        DriverStats {
            blink_count: self.blink.blink_count(),
            avg_blink_duration: self.blink.avg_blink_duration(),
            total_eye_closure_duration: self.blink.total_eye_closure_duration(),
            yawn_count: self.yawn.yawn_count(),
        }
    }

    pub fn reset(&mut self) {
        self.blink.reset();
        self.yawn.reset();
    }
}
