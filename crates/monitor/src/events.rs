//! Worker → UI messages and the reroute confirmation rendezvous

use alerting::{Confirmation, Confirmer};
use async_trait::async_trait;
use drowsiness::{DriverStats, DrowsinessState};
use routing::RerouteOutcome;
use std::time::Duration;
use storage::SessionRecord;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Monitoring loop phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Running,
    AwaitingConfirmation,
    Stopping,
    Stopped,
}

/// Everything the worker tells the UI
#[derive(Debug)]
pub enum MonitorEvent {
    /// Fresh verdict for the latest frame
    StatusChanged {
        state: DrowsinessState,
        message: String,
        stats: DriverStats,
    },
    PhaseChanged(LoopPhase),
    /// The worker is suspended until this is answered
    ConfirmationRequested(ConfirmationRequest),
    /// A rest stop was chosen; the UI decides whether to open the link
    Rerouted(RerouteOutcome),
    /// Final record, sent once after the flush attempt
    SessionComplete { record: SessionRecord, persisted: bool },
}

/// Yes/no question awaiting the driver's answer
#[derive(Debug)]
pub struct ConfirmationRequest {
    prompt: String,
    responder: oneshot::Sender<bool>,
}

impl ConfirmationRequest {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The worker stopped waiting (timeout, cancellation or shutdown)
    pub fn is_stale(&self) -> bool {
        self.responder.is_closed()
    }

    /// Answer the prompt. Dropping the request unanswered counts as "no".
    pub fn respond(self, accept: bool) {
        if self.responder.send(accept).is_err() {
            debug!("Confirmation answered after the worker stopped waiting");
        }
    }
}

/// Confirmer that asks the UI over the event channel.
///
/// The wait ends on an answer, on cancellation, or after `timeout`.
pub struct ChannelConfirmer {
    events: mpsc::UnboundedSender<MonitorEvent>,
    cancel: CancellationToken,
    timeout: Duration,
}

impl ChannelConfirmer {
    pub fn new(events: mpsc::UnboundedSender<MonitorEvent>, cancel: CancellationToken, timeout: Duration) -> Self {
        Self { events, cancel, timeout }
    }
}

#[async_trait]
impl Confirmer for ChannelConfirmer {
    async fn confirm(&self, prompt: &str) -> Confirmation {
        let (responder, answer) = oneshot::channel();
        let request = ConfirmationRequest {
            prompt: prompt.to_string(),
            responder,
        };

        if self.events.send(MonitorEvent::ConfirmationRequested(request)).is_err() {
            warn!("No UI listening for the reroute prompt; treating it as declined");
            return Confirmation::Declined;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Confirmation::Cancelled,
            answer = answer => match answer {
                Ok(true) => Confirmation::Accepted,
                Ok(false) => Confirmation::Declined,
                Err(_) => {
                    warn!("Reroute prompt dropped without an answer; treating it as declined");
                    Confirmation::Declined
                }
            },
            _ = tokio::time::sleep(self.timeout) => {
                info!("Reroute prompt unanswered after {:?}", self.timeout);
                Confirmation::TimedOut
            }
        }
    }
}
