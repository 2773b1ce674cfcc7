use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GeoLinkError, Result};
use crate::geo::Coordinates;
use crate::projection::DEFAULT_RADAR_SCALE_DEG;
use crate::simulation::DEFAULT_SIMULATION_INTERVAL_MS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_page_url")]
    pub page_url: String,
    #[serde(default)]
    pub entry_url: Option<String>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default = "default_simulation_interval_ms")]
    pub simulation_interval_ms: u64,
    #[serde(default = "default_radar_scale_deg")]
    pub radar_scale_deg: f64,
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub high_accuracy: bool,
    #[serde(default)]
    pub maximum_age_ms: u64,
    #[serde(default = "default_telemetry_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default)]
    pub track_path: Option<String>,
    #[serde(default)]
    pub fixed_position: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_generator_base_url")]
    pub base_url: String,
    // Without a key the offline generator is used.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            page_url: default_page_url(),
            entry_url: None,
            telemetry: TelemetryConfig::default(),
            simulation_interval_ms: default_simulation_interval_ms(),
            radar_scale_deg: default_radar_scale_deg(),
            render_interval_ms: default_render_interval_ms(),
            generator: GeneratorConfig::default(),
            contacts: Vec::new(),
            output_path: None,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age_ms: 0,
            timeout_ms: default_telemetry_timeout_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            track_path: None,
            fixed_position: None,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_generator_base_url(),
            api_key_env: default_api_key_env(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        let cfg = serde_json::from_slice(&data)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(GeoLinkError::Config("username must not be empty".into()));
        }
        if self.simulation_interval_ms == 0 || self.render_interval_ms == 0 {
            return Err(GeoLinkError::Config(
                "simulationIntervalMs and renderIntervalMs must be > 0".into(),
            ));
        }
        if self.telemetry.timeout_ms == 0 || self.telemetry.sample_interval_ms == 0 {
            return Err(GeoLinkError::Config(
                "telemetry timeoutMs and sampleIntervalMs must be > 0".into(),
            ));
        }
        if !(self.radar_scale_deg.is_finite() && self.radar_scale_deg > 0.0) {
            return Err(GeoLinkError::Config(format!(
                "radarScaleDeg must be a positive number, got {}",
                self.radar_scale_deg
            )));
        }
        if self.telemetry.track_path.is_none() && self.telemetry.fixed_position.is_none() {
            return Err(GeoLinkError::Config(
                "telemetry needs either trackPath or fixedPosition".into(),
            ));
        }
        url::Url::parse(&self.page_url)?;
        if let Some(entry) = &self.entry_url {
            url::Url::parse(entry)?;
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_page_url() -> String {
    "http://localhost:3000/".to_string()
}

fn default_simulation_interval_ms() -> u64 {
    DEFAULT_SIMULATION_INTERVAL_MS
}

fn default_radar_scale_deg() -> f64 {
    DEFAULT_RADAR_SCALE_DEG
}

fn default_render_interval_ms() -> u64 {
    1_000
}

fn default_telemetry_timeout_ms() -> u64 {
    5_000
}

fn default_sample_interval_ms() -> u64 {
    1_000
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_generator_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}
