//! The monitoring worker

use std::sync::Arc;
use std::time::Duration;

use alerting::{Confirmation, Playback, ResponseDispatcher};
use camera_capture::{CameraError, CaptureDevice};
use drowsiness::{
    evaluate, Action, AlertSound, Assessment, Classifier, ClassifierError, DriverStats, DrowsinessConfig, EventTrackers,
    FrameLabels,
};
use metrics::counter;
use storage::{MetricRow, RerouteFlag, SessionRecord, SessionStore};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::LoopConfig;
use crate::events::{ChannelConfirmer, LoopPhase, MonitorEvent};
use crate::recorder::{SessionIdentity, SessionRecorder};
use crate::MonitorError;

const REROUTE_PROMPT: &str = "Moderate drowsiness detected. Reroute to the nearest rest stop?";

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stop signal observed at a cycle boundary
    Cancelled,
    /// The capture device failed or ran out of frames
    CaptureFailed,
    /// STRONG drowsiness forced a reroute
    StrongReroute,
    /// The driver accepted a MODERATE reroute
    RerouteAccepted,
    /// Stop signal arrived while a reroute prompt was open
    ConfirmationCancelled,
}

/// Result of one loop execution
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub stop_reason: StopReason,
    pub record: SessionRecord,
    pub persisted: bool,
}

/// What one capture and classify pass produced
enum Perceived {
    Labels(FrameLabels),
    Skipped { sequence: u32, error: ClassifierError },
    CaptureFailed(CameraError),
}

/// Capture device and classifier, moved onto the blocking pool for each
/// frame. The device is released exactly once.
struct Perception {
    device: Option<Box<dyn CaptureDevice>>,
    classifier: Box<dyn Classifier>,
}

impl Perception {
    fn perceive(&mut self) -> Perceived {
        let frame = match self.device.as_mut() {
            Some(device) => match device.read_frame() {
                Ok(frame) => frame,
                Err(e) => return Perceived::CaptureFailed(e),
            },
            None => return Perceived::CaptureFailed(CameraError::NotInitialized),
        };

        match self.classifier.classify(&frame) {
            Ok(detections) => Perceived::Labels(FrameLabels::from_detections(&detections)),
            Err(error) => Perceived::Skipped {
                sequence: frame.sequence,
                error,
            },
        }
    }

    fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            info!("Capture device released");
        }
    }
}

/// Builder for [`MonitoringLoop`]; every collaborator is injected
pub struct MonitoringLoopBuilder {
    identity: Option<SessionIdentity>,
    camera: Option<Box<dyn CaptureDevice>>,
    classifier: Option<Box<dyn Classifier>>,
    dispatcher: Option<ResponseDispatcher>,
    store: Option<Arc<dyn SessionStore>>,
    clock: Arc<dyn Clock>,
    thresholds: DrowsinessConfig,
    cycle: LoopConfig,
    pace: Option<Duration>,
}

impl MonitoringLoopBuilder {
    pub fn identity(mut self, identity: SessionIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn camera(mut self, camera: Box<dyn CaptureDevice>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn dispatcher(mut self, dispatcher: ResponseDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn thresholds(mut self, thresholds: DrowsinessConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn loop_config(mut self, cycle: LoopConfig) -> Self {
        self.cycle = cycle;
        self
    }

    /// Wait at least `period` between cycles
    pub fn pace(mut self, period: Duration) -> Self {
        self.pace = Some(period);
        self
    }

    pub fn build(self) -> Result<MonitoringLoop, MonitorError> {
        let missing = |what: &str| MonitorError::Config(format!("monitoring loop needs a {what}"));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(MonitoringLoop {
            identity: self.identity.ok_or_else(|| missing("signed-in user"))?,
            perception: Some(Perception {
                device: Some(self.camera.ok_or_else(|| missing("capture device"))?),
                classifier: self.classifier.ok_or_else(|| missing("classifier"))?,
            }),
            dispatcher: self.dispatcher.ok_or_else(|| missing("response dispatcher"))?,
            store: self.store.ok_or_else(|| missing("session store"))?,
            clock: self.clock,
            thresholds: self.thresholds,
            cycle: self.cycle,
            pace: self.pace,
            cancel: CancellationToken::new(),
            events: events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// Capture → classify → track → evaluate → act → record, once per cycle.
///
/// Phases: `Running → AwaitingConfirmation → Running | Stopping → Stopped`.
/// Cancellation is observed at the top of each cycle, during pacing and
/// while a reroute prompt is open; nothing else is interrupted.
pub struct MonitoringLoop {
    identity: SessionIdentity,
    /// `None` only while a frame is being processed off the async workers
    perception: Option<Perception>,
    dispatcher: ResponseDispatcher,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    thresholds: DrowsinessConfig,
    cycle: LoopConfig,
    pace: Option<Duration>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<MonitorEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<MonitorEvent>>,
}

impl MonitoringLoop {
    pub fn builder() -> MonitoringLoopBuilder {
        MonitoringLoopBuilder {
            identity: None,
            camera: None,
            classifier: None,
            dispatcher: None,
            store: None,
            clock: Arc::new(SystemClock::new()),
            thresholds: DrowsinessConfig::default(),
            cycle: LoopConfig::default(),
            pace: None,
        }
    }

    /// Take the event receiver; `None` once taken
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<MonitorEvent>> {
        self.events_rx.take()
    }

    /// Token that stops the loop at its next cycle boundary
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the loop on its own task
    pub fn spawn(mut self) -> MonitorHandle {
        let events = self.take_events();
        let cancel = self.cancel.clone();
        let task = tokio::spawn(self.run());

        MonitorHandle { events, cancel, task }
    }

    /// Run the loop to completion on the current task
    pub async fn run(mut self) -> LoopOutcome {
        let started_at = self.clock.wall();
        let mut recorder = SessionRecorder::start(self.identity.clone(), started_at);
        let mut trackers = EventTrackers::new(&self.thresholds);
        let confirmer = ChannelConfirmer::new(self.events.clone(), self.cancel.clone(), self.cycle.confirmation_timeout());
        let sample_interval = self.cycle.sample_interval();
        let mut last_sample = self.clock.now();

        let mut ticker = self.pace.map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        info!("Monitoring {} ({})", self.identity.username(), recorder.session_id());
        self.set_phase(LoopPhase::Running);

        let stop_reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            if let Some(ticker) = ticker.as_mut() {
                tokio::select! {
                    _ = self.cancel.cancelled() => break StopReason::Cancelled,
                    _ = ticker.tick() => {}
                }
            }

            let labels = match self.perceive().await {
                Perceived::Labels(labels) => labels,
                Perceived::Skipped { sequence, error } => {
                    counter!("frames_skipped").increment(1);
                    debug!("Skipping frame {}: {}", sequence, error);
                    continue;
                }
                Perceived::CaptureFailed(e) => {
                    warn!("Capture failed, stopping: {}", e);
                    break StopReason::CaptureFailed;
                }
            };
            counter!("frames_processed").increment(1);

            let now = self.clock.now();
            trackers.update(&labels, now);
            let stats = trackers.stats();
            let assessment = evaluate(&stats, &labels, &self.thresholds);
            self.emit_status(&assessment, stats);

            if now.saturating_sub(last_sample) >= sample_interval {
                recorder.record(self.row(&stats, &assessment, RerouteFlag::None));
                last_sample = now;
            }

            match assessment.action {
                Action::Continue => {}
                Action::ForceReroute => {
                    warn!("{}", assessment.message);
                    self.release_device();
                    counter!("alerts_dispatched").increment(1);
                    self.dispatcher.alarm(AlertSound::StrongAlarm, Playback::Blocking).await;

                    if let Some(outcome) = self.dispatcher.reroute().await {
                        self.emit(MonitorEvent::Rerouted(outcome));
                    }
                    recorder.record(self.row(&stats, &assessment, RerouteFlag::Yes));
                    break StopReason::StrongReroute;
                }
                Action::SuggestReroute => {
                    warn!("{}", assessment.message);
                    counter!("alerts_dispatched").increment(1);
                    self.dispatcher.alarm(AlertSound::Alarm, Playback::FireAndForget).await;

                    self.set_phase(LoopPhase::AwaitingConfirmation);
                    let answer = self.dispatcher.confirm_reroute(&confirmer, REROUTE_PROMPT).await;
                    recorder.record(self.row(&stats, &assessment, RerouteFlag::from_answer(answer.accepted())));

                    match answer {
                        Confirmation::Accepted => {
                            if let Some(outcome) = self.dispatcher.reroute().await {
                                self.emit(MonitorEvent::Rerouted(outcome));
                            }
                            break StopReason::RerouteAccepted;
                        }
                        Confirmation::Cancelled => break StopReason::ConfirmationCancelled,
                        Confirmation::Declined | Confirmation::TimedOut => {
                            trackers.reset();
                            last_sample = self.clock.now();
                            self.set_phase(LoopPhase::Running);
                        }
                    }
                }
            }
        };

        info!("Monitoring stopping: {:?}", stop_reason);
        self.set_phase(LoopPhase::Stopping);
        self.release_device();

        let (record, persisted) = recorder.finish(self.store.as_ref()).await;
        self.emit(MonitorEvent::SessionComplete {
            record: record.clone(),
            persisted,
        });
        self.set_phase(LoopPhase::Stopped);

        LoopOutcome {
            stop_reason,
            record,
            persisted,
        }
    }

    /// Read and classify one frame on the blocking pool
    async fn perceive(&mut self) -> Perceived {
        let Some(mut perception) = self.perception.take() else {
            return Perceived::CaptureFailed(CameraError::NotInitialized);
        };

        let task = tokio::task::spawn_blocking(move || {
            let perceived = perception.perceive();
            (perception, perceived)
        });

        match task.await {
            Ok((perception, perceived)) => {
                self.perception = Some(perception);
                perceived
            }
            Err(e) => {
                warn!("Frame worker failed, capture device lost: {}", e);
                Perceived::CaptureFailed(CameraError::NotInitialized)
            }
        }
    }

    fn release_device(&mut self) {
        if let Some(perception) = self.perception.as_mut() {
            perception.release();
        }
    }

    fn row(&self, stats: &DriverStats, assessment: &Assessment, flag: RerouteFlag) -> MetricRow {
        MetricRow::new(self.clock.wall(), stats, assessment.state, flag)
    }

    fn emit_status(&self, assessment: &Assessment, stats: DriverStats) {
        self.emit(MonitorEvent::StatusChanged {
            state: assessment.state,
            message: assessment.message.clone(),
            stats,
        });
    }

    fn set_phase(&self, phase: LoopPhase) {
        debug!("Phase -> {:?}", phase);
        self.emit(MonitorEvent::PhaseChanged(phase));
    }

    fn emit(&self, event: MonitorEvent) {
        // A closed channel only means nobody is watching; the loop carries on
        let _ = self.events.send(event);
    }
}

/// A spawned monitoring worker
pub struct MonitorHandle {
    /// Worker messages; `None` if the receiver was taken before spawning
    pub events: Option<mpsc::UnboundedReceiver<MonitorEvent>>,
    cancel: CancellationToken,
    task: JoinHandle<LoopOutcome>,
}

impl MonitorHandle {
    /// Ask the worker to stop at its next cycle boundary
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token for stopping the worker from elsewhere
    pub fn stopper(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the worker to finish
    pub async fn join(self) -> Result<LoopOutcome, MonitorError> {
        self.task.await.map_err(|e| MonitorError::Worker(e.to_string()))
    }
}
