//! Terminal front end for a running monitoring session
//!
//! Runs on the caller's task and only talks to the worker through
//! `MonitorEvent` messages and the stop token.

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use drowsiness::DrowsinessState;
use monitor::{ConfirmationRequest, LoopOutcome, LoopPhase, MonitorEvent, MonitorHandle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Drive the terminal until the worker finishes. Ctrl-C stops monitoring.
pub async fn run_terminal(mut handle: MonitorHandle) -> Result<LoopOutcome> {
    let events = handle.events.take().context("monitor events already taken")?;

    println!("Monitoring started. Press Ctrl-C to stop.");
    drive_terminal(events, handle.stopper(), stdin_lines()).await;

    Ok(handle.join().await?)
}

/// Lines typed on stdin. One detached thread owns stdin for the whole
/// process, so a read left pending at exit never blocks runtime shutdown.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Could not read stdin: {}", e);
                        break;
                    }
                }
            }
        });

    if let Err(e) = spawned {
        warn!("Could not start stdin reader, prompts will be declined: {}", e);
    }
    rx
}

async fn drive_terminal(
    mut events: mpsc::UnboundedReceiver<MonitorEvent>,
    stopper: CancellationToken,
    mut input: mpsc::UnboundedReceiver<String>,
) {
    let mut terminal = Terminal::default();
    let mut input_open = true;

    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => terminal.show(event),
                None => break,
            },
            line = input.recv(), if input_open => match line {
                Some(line) => terminal.answer(&line),
                None => {
                    input_open = false;
                    terminal.input_closed();
                }
            },
            signal = tokio::signal::ctrl_c(), if !stopper.is_cancelled() => {
                if let Err(e) = signal {
                    warn!("Ctrl-C handler failed: {}", e);
                }
                println!("Stopping monitoring...");
                stopper.cancel();
            }
        }
    }
}

/// What the terminal currently shows
#[derive(Default)]
struct Terminal {
    last_state: Option<DrowsinessState>,
    /// At most one open reroute question
    prompt: Option<ConfirmationRequest>,
}

impl Terminal {
    fn show(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::StatusChanged { state, message, stats } => {
                // Only state changes reach the terminal; every frame goes to the log
                debug!("[{}] {} {:?}", state, message, stats);
                if self.last_state != Some(state) {
                    println!("[STATE: {}] {}", state, message);
                    self.last_state = Some(state);
                }
            }
            MonitorEvent::PhaseChanged(phase) => {
                debug!("Monitor phase {:?}", phase);
                if phase != LoopPhase::AwaitingConfirmation {
                    self.prompt = None;
                }
                if phase == LoopPhase::Running {
                    self.last_state = None;
                }
            }
            MonitorEvent::ConfirmationRequested(request) => {
                println!("{} [y/N]", request.prompt());
                self.prompt = Some(request);
            }
            MonitorEvent::Rerouted(outcome) => {
                println!(
                    "Nearest stop: {} ({}) {} away, about {}",
                    outcome.stop.name, outcome.stop.category, outcome.route.distance_text, outcome.route.duration_text
                );
                println!("Directions: {}", outcome.directions_url);
            }
            MonitorEvent::SessionComplete { record, persisted } => {
                let summary = record.summary();
                println!(
                    "Session {} complete: {} rows, {} reroutes{}",
                    summary.session_id,
                    summary.total_rows,
                    summary.reroutes,
                    if persisted { "" } else { " (not saved)" }
                );
            }
        }
    }

    /// A typed line answers the open prompt; anything else is ignored
    fn answer(&mut self, line: &str) {
        match self.prompt.take() {
            Some(request) if !request.is_stale() => request.respond(parse_answer(line)),
            Some(_) => println!("That question has expired."),
            None => debug!("No question open, ignoring input {:?}", line),
        }
    }

    fn input_closed(&mut self) {
        warn!("stdin closed; reroute questions will be declined");
        if let Some(request) = self.prompt.take() {
            request.respond(false);
        }
    }
}

fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{Confirmation, Confirmer};
    use monitor::ChannelConfirmer;
    use std::time::Duration;

    struct Session {
        events: mpsc::UnboundedSender<MonitorEvent>,
        lines: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
        terminal: tokio::task::JoinHandle<()>,
    }

    impl Session {
        fn start() -> Self {
            let (events, events_rx) = mpsc::unbounded_channel();
            let (lines, lines_rx) = mpsc::unbounded_channel();
            let cancel = CancellationToken::new();
            let terminal = tokio::spawn(drive_terminal(events_rx, cancel.clone(), lines_rx));
            Self {
                events,
                lines,
                cancel,
                terminal,
            }
        }

        fn confirmer(&self) -> ChannelConfirmer {
            ChannelConfirmer::new(self.events.clone(), self.cancel.clone(), Duration::from_secs(30))
        }

        /// Ask on a separate task and let the terminal show the question
        async fn ask(&self) -> tokio::task::JoinHandle<Confirmation> {
            let confirmer = self.confirmer();
            let asked = tokio::spawn(async move { confirmer.confirm("Reroute?").await });
            tokio::time::sleep(Duration::from_millis(10)).await;
            asked
        }

        async fn finish(self) {
            drop(self.events);
            drop(self.lines);
            self.terminal.await.unwrap();
        }
    }

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("y\n"));
        assert!(parse_answer(" YES "));
        assert!(!parse_answer("\n"));
        assert!(!parse_answer("nope"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_goes_to_the_open_question_only() {
        let session = Session::start();

        // Nobody answers the first question
        assert_eq!(session.confirmer().confirm("Reroute?").await, Confirmation::TimedOut);

        // A late answer must not leak into the next question
        session.lines.send("n".into()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = session.ask().await;
        session.lines.send("y".into()).unwrap();
        assert_eq!(second.await.unwrap(), Confirmation::Accepted);

        session.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_input_declines() {
        let session = Session::start();

        let asked = session.ask().await;
        let Session {
            events,
            lines,
            terminal,
            ..
        } = session;
        drop(lines);
        assert_eq!(asked.await.unwrap(), Confirmation::Declined);

        drop(events);
        terminal.await.unwrap();
    }
}
