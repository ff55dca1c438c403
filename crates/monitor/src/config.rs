//! Layered monitor configuration
//!
//! Sources, later wins:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. `DROWSY__`-prefixed environment variables, `__` between sections
//!    (e.g. `DROWSY__ROUTING__API_KEY`)

use alerting::AlertsConfig;
use camera_capture::CameraConfig;
use config::{Config, Environment, File, FileFormat, FileSourceFile, Source};
use drowsiness::{ClassifierConfig, DrowsinessConfig};
use routing::{Coordinates, ProviderKind, RoutingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use storage::StorageConfig;
use tracing::{debug, info};

use crate::MonitorError;

const ENV_PREFIX: &str = "DROWSY";
const ENV_SEPARATOR: &str = "__";

/// Loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Minimum spacing between sampled metric rows (seconds)
    pub sample_interval_secs: f64,
    /// How long a reroute prompt waits for an answer before it counts as declined
    pub confirmation_timeout_secs: u64,
    /// Pace cycles to the camera's nominal fps
    pub pace_to_camera: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 1.0,
            confirmation_timeout_secs: 30,
            pace_to_camera: true,
        }
    }
}

impl LoopConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(self.sample_interval_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

/// Everything the `monitor` and `serve` commands need
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub thresholds: DrowsinessConfig,
    pub camera: CameraConfig,
    pub classifier: ClassifierConfig,
    pub alerts: AlertsConfig,
    pub routing: RoutingConfig,
    pub storage: StorageConfig,
    #[serde(rename = "loop")]
    pub cycle: LoopConfig,
}

impl MonitorConfig {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        let env = environment();
        match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_sources(Some(File::from(path)), env)
            }
            None => Self::from_sources(None::<File<FileSourceFile, FileFormat>>, env),
        }
    }

    fn from_sources<S>(file: Option<S>, env: Environment) -> Result<Self, MonitorError>
    where
        S: Source + Send + Sync + 'static,
    {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(file);
        }

        let config: MonitorConfig = builder
            .add_source(env)
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| MonitorError::Config(e.to_string()))?;

        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    /// Check everything the monitoring loop needs before it starts
    pub fn validate(&self) -> Result<(), MonitorError> {
        let t = &self.thresholds;
        require_positive("thresholds.strong_closure_secs", t.strong_closure_secs)?;
        require_positive("thresholds.min_yawn_secs", t.min_yawn_secs)?;
        require_positive("thresholds.max_yawn_secs", t.max_yawn_secs)?;
        require_positive("loop.sample_interval_secs", self.cycle.sample_interval_secs)?;
        if t.window_secs == 0 {
            return Err(MonitorError::Config("thresholds.window_secs must be at least 1".into()));
        }
        if t.moderate_yawn_count == 0 {
            return Err(MonitorError::Config("thresholds.moderate_yawn_count must be at least 1".into()));
        }
        if t.min_yawn_secs > t.max_yawn_secs {
            return Err(MonitorError::Config(format!(
                "thresholds: min_yawn_secs {} exceeds max_yawn_secs {}",
                t.min_yawn_secs, t.max_yawn_secs
            )));
        }

        if self.routing.provider == ProviderKind::Gomaps {
            let has_key = self
                .routing
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty());
            if !has_key {
                return Err(MonitorError::Config(format!(
                    "routing.api_key is required for the gomaps provider (set {ENV_PREFIX}{ENV_SEPARATOR}ROUTING{ENV_SEPARATOR}API_KEY)"
                )));
            }
            self.routing
                .origin
                .parse::<Coordinates>()
                .map_err(|e| MonitorError::Config(format!("routing.origin: {e}")))?;
        }

        Ok(())
    }
}

/// Seconds must be finite and above zero; NaN and infinity are rejected
fn require_positive(key: &str, secs: f64) -> Result<(), MonitorError> {
    if secs.is_finite() && secs > 0.0 {
        Ok(())
    } else {
        Err(MonitorError::Config(format!("{key} must be a positive number of seconds, got {secs}")))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
