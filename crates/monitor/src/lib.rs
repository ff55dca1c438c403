//! Drowsiness Monitoring Loop
//!
//! One worker per driving session:
//! - Capture → classify → track → evaluate → act → record, every cycle
//! - Escalation: alarm, reroute prompt, forced reroute
//! - Session rows sampled once per interval and persisted once at the end
//! - UI communication only through `MonitorEvent` messages

pub mod clock;
pub mod config;
pub mod events;
pub mod recorder;
pub mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LoopConfig, MonitorConfig};
pub use events::{ChannelConfirmer, ConfirmationRequest, LoopPhase, MonitorEvent};
pub use recorder::{SessionIdentity, SessionRecorder};
pub use worker::{LoopOutcome, MonitorHandle, MonitoringLoop, MonitoringLoopBuilder, StopReason};

use thiserror::Error;

/// Monitor errors
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Monitoring worker failed: {0}")]
    Worker(String),
}
