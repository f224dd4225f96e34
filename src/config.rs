use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use config::{Environment, File};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::gateway::{DEFAULT_MIN_DISTANCE_M, DEFAULT_MIN_INTERVAL};
use crate::location::SelectionPolicy;

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

pub const ENV_PREFIX: &str = "GEOTICK";
pub const DEFAULT_TARGET_URL: &str = "http://localhost:8080/ticks";

// Anything shorter cannot be a usable URL and falls back to the default.
const MIN_URL_LEN: usize = 6;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub report: ReportConfig,
    pub subscription: SubscriptionConfig,
    pub selection: SelectionPolicy,
    pub transmit: TransmitConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
    pub device_id: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            device_id: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub interval: SendInterval,
    pub url: Option<String>,
}

impl ReportConfig {
    pub fn target_url(&self) -> String {
        resolve_target_url(self.url.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    pub min_interval_ms: u64,
    pub min_distance_m: f32,
}

impl SubscriptionConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_MIN_INTERVAL.as_millis() as u64,
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    pub timeout_secs: u64,
}

impl TransmitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub step_ms: u64,
    pub providers: Vec<SimulatedProviderConfig>,
    pub track: Vec<TrackPoint>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_ms: 5_000,
            providers: vec![
                SimulatedProviderConfig {
                    name: "network".to_string(),
                    accuracy: 20.0,
                },
                SimulatedProviderConfig {
                    name: "gps".to_string(),
                    accuracy: 3.0,
                },
            ],
            track: vec![TrackPoint {
                lat: 59.9343,
                lng: 30.3351,
                alt: 12.0,
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulatedProviderConfig {
    pub name: String,
    pub accuracy: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub alt: f64,
}

/// The send intervals offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u64")]
pub enum SendInterval {
    #[default]
    Secs15,
    Secs30,
    Min1,
    Min5,
}

impl SendInterval {
    pub const ALL: [SendInterval; 4] = [Self::Secs15, Self::Secs30, Self::Min1, Self::Min5];

    pub fn as_secs(self) -> u64 {
        match self {
            Self::Secs15 => 15,
            Self::Secs30 => 30,
            Self::Min1 => 60,
            Self::Min5 => 300,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Secs15 => "15s",
            Self::Secs30 => "30s",
            Self::Min1 => "1m",
            Self::Min5 => "5m",
        }
    }
}

impl TryFrom<u64> for SendInterval {
    type Error = String;

    fn try_from(secs: u64) -> std::result::Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_secs() == secs)
            .ok_or_else(|| format!("unsupported send interval {}s, expected 15, 30, 60 or 300", secs))
    }
}

impl fmt::Display for SendInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Use `url` when it looks usable, otherwise the default endpoint.
pub fn resolve_target_url(url: Option<&str>) -> String {
    match url {
        Some(url) if url.chars().count() >= MIN_URL_LEN => url.to_string(),
        _ => DEFAULT_TARGET_URL.to_string(),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let env = std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let config_path = PathBuf::from(format!("config/{}.toml", env));
        let fallback_path = PathBuf::from(format!("/etc/geotick/{}.toml", env));

        let path = if config_path.exists() {
            config_path
        } else {
            fallback_path
        };
        Self::load_with(&path, false, ENV_PREFIX)
    }

    /// Layer defaults, the file at `path` and `<env_prefix>_*` variables.
    pub fn load_with(path: &Path, required: bool, env_prefix: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config = settings.try_deserialize()?;
        Ok(config)
    }
}
