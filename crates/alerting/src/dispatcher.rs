//! Response dispatch for drowsiness actions

use async_trait::async_trait;
use drowsiness::AlertSound;
use routing::{RerouteOutcome, Rerouter};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::notifier::{Notifier, Playback};

/// Answer to a reroute prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accepted,
    Declined,
    /// No answer before the deadline
    TimedOut,
    /// Monitoring was stopped while waiting
    Cancelled,
}

impl Confirmation {
    pub fn accepted(&self) -> bool {
        matches!(self, Confirmation::Accepted)
    }
}

/// UI boundary that answers yes/no prompts
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, prompt: &str) -> Confirmation;
}

/// Maps actions onto notifier, routing and confirmation calls.
///
/// Every call is best effort: failures are logged and never propagated, so a
/// STRONG response always runs to completion.
pub struct ResponseDispatcher {
    notifier: Arc<dyn Notifier>,
    rerouter: Option<Rerouter>,
}

impl ResponseDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, rerouter: Option<Rerouter>) -> Self {
        if rerouter.is_none() {
            info!("Rerouting disabled; reroute requests will be logged only");
        }
        Self { notifier, rerouter }
    }

    /// Play an alarm. Returns whether playback succeeded.
    pub async fn alarm(&self, sound: AlertSound, playback: Playback) -> bool {
        match self.notifier.play(sound, playback).await {
            Ok(()) => true,
            Err(e) => {
                error!("Alarm {} failed: {}", sound.as_str(), e);
                false
            }
        }
    }

    /// Find the nearest rest stop
    pub async fn reroute(&self) -> Option<RerouteOutcome> {
        let Some(rerouter) = &self.rerouter else {
            warn!("Reroute requested but no routing provider is configured");
            return None;
        };

        match rerouter.nearest_stop().await {
            Ok(outcome) => {
                info!("Rerouting to {}: {}", outcome.stop.name, outcome.directions_url);
                Some(outcome)
            }
            Err(e) => {
                error!("Reroute failed: {}", e);
                None
            }
        }
    }

    /// Ask the driver whether to reroute
    pub async fn confirm_reroute(&self, confirmer: &dyn Confirmer, prompt: &str) -> Confirmation {
        let answer = confirmer.confirm(prompt).await;
        info!("Reroute prompt answered: {:?}", answer);
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NotifyError;
    use routing::{Coordinates, FixedLocation, Route, RoutingConfig, RoutingError, RoutingProvider, Stop};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        played: Mutex<Vec<(AlertSound, Playback)>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn play(&self, sound: AlertSound, playback: Playback) -> Result<(), NotifyError> {
            self.played.lock().unwrap().push((sound, playback));
            if self.fail {
                Err(NotifyError::PlayerFailed("exit status: 1".into()))
            } else {
                Ok(())
            }
        }
    }

    struct OneStop;

    #[async_trait]
    impl RoutingProvider for OneStop {
        async fn nearby_stops(&self, _: Coordinates, category: &str, _: usize) -> Result<Vec<Stop>, RoutingError> {
            Ok(vec![Stop {
                name: format!("{category} 1"),
                location: Coordinates::new(19.2, 73.1),
                category: category.to_string(),
            }])
        }

        async fn route(&self, _: Coordinates, _: Coordinates) -> Result<Route, RoutingError> {
            Ok(Route {
                distance_m: 800,
                distance_text: "0.8 km".into(),
                duration_s: 120,
                duration_text: "2 mins".into(),
            })
        }
    }

    struct Always(Confirmation);

    #[async_trait]
    impl Confirmer for Always {
        async fn confirm(&self, _prompt: &str) -> Confirmation {
            self.0
        }
    }

    fn rerouter() -> Rerouter {
        Rerouter::new(
            Arc::new(OneStop),
            Arc::new(FixedLocation(Coordinates::new(19.0, 73.0))),
            &RoutingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_alarm_failure_is_swallowed() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let dispatcher = ResponseDispatcher::new(notifier.clone(), None);

        assert!(!dispatcher.alarm(AlertSound::StrongAlarm, Playback::Blocking).await);
        assert_eq!(
            notifier.played.lock().unwrap().as_slice(),
            &[(AlertSound::StrongAlarm, Playback::Blocking)]
        );
    }

    #[tokio::test]
    async fn test_reroute_without_provider_is_noop() {
        let dispatcher = ResponseDispatcher::new(Arc::new(RecordingNotifier::default()), None);
        assert!(dispatcher.reroute().await.is_none());
    }

    #[tokio::test]
    async fn test_reroute_returns_outcome() {
        let dispatcher = ResponseDispatcher::new(Arc::new(RecordingNotifier::default()), Some(rerouter()));
        let outcome = dispatcher.reroute().await.unwrap();
        assert_eq!(outcome.route.distance_m, 800);
        assert!(outcome.directions_url.starts_with("https://www.google.com/maps/dir/?api=1"));
    }

    #[tokio::test]
    async fn test_confirm_passes_answer_through() {
        let dispatcher = ResponseDispatcher::new(Arc::new(RecordingNotifier::default()), None);
        let answer = dispatcher
            .confirm_reroute(&Always(Confirmation::TimedOut), "Reroute?")
            .await;
        assert_eq!(answer, Confirmation::TimedOut);
        assert!(!answer.accepted());
    }
}
