//! Collaborator wiring from configuration

use std::sync::Arc;
use std::time::Duration;

use alerting::{CommandNotifier, LogNotifier, Notifier, ResponseDispatcher};
use anyhow::{Context, Result};
use drowsiness::OnnxClassifier;
use monitor::{MonitorConfig, MonitoringLoop, SessionIdentity};
use routing::{Coordinates, FixedLocation, GoMapsClient, ProviderKind, Rerouter};
use storage::SessionStore;
use tracing::info;

/// Open the configured session store
pub async fn open_store(config: &MonitorConfig) -> Result<Arc<dyn SessionStore>> {
    storage::open_store(&config.storage)
        .await
        .with_context(|| format!("opening session store {}", config.storage.database_url))
}

/// Notifier and optional rerouter
pub fn build_dispatcher(config: &MonitorConfig) -> Result<ResponseDispatcher> {
    let notifier: Arc<dyn Notifier> = if config.alerts.enabled {
        Arc::new(CommandNotifier::new(&config.alerts))
    } else {
        Arc::new(LogNotifier)
    };

    let rerouter = match config.routing.provider {
        ProviderKind::Gomaps => {
            let origin: Coordinates = config.routing.origin.parse().context("parsing routing.origin")?;
            let client = GoMapsClient::new(&config.routing).context("creating routing client")?;
            Some(Rerouter::new(
                Arc::new(client),
                Arc::new(FixedLocation(origin)),
                &config.routing,
            ))
        }
        ProviderKind::Disabled => None,
    };

    Ok(ResponseDispatcher::new(notifier, rerouter))
}

/// Cycle period for the camera's nominal rate
pub fn pace_for(config: &MonitorConfig) -> Option<Duration> {
    let fps = config.camera.fps;
    (config.cycle.pace_to_camera && fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(fps)))
}

/// Validate config and assemble a ready-to-run monitoring loop for `username`
pub async fn build_monitor(config: &MonitorConfig, username: &str) -> Result<MonitoringLoop> {
    config.validate()?;
    let identity = SessionIdentity::new(username)?;

    let store = open_store(config).await?;
    let dispatcher = build_dispatcher(config)?;
    let classifier = OnnxClassifier::load(&config.classifier).context("loading drowsiness detector")?;
    let camera = camera_capture::open_capture(&config.camera).context("opening camera")?;

    let mut builder = MonitoringLoop::builder()
        .identity(identity)
        .camera(camera)
        .classifier(Box::new(classifier))
        .dispatcher(dispatcher)
        .store(store)
        .thresholds(config.thresholds.clone())
        .loop_config(config.cycle.clone());

    if let Some(period) = pace_for(config) {
        info!("Pacing cycles to {:?}", period);
        builder = builder.pace(period);
    }

    Ok(builder.build()?)
}
