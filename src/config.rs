use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BoothcamConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Root directory for accepted photos and host-side recordings
    #[serde(default = "default_save_root")]
    pub save_root: String,

    /// Subdirectory inside each date bucket that accepted photos land in
    #[serde(default = "default_accept_subdir")]
    pub accept_subdir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ViewportConfig {
    /// Live-view viewport width in pixels
    #[serde(default = "default_viewport_width")]
    pub width: u32,

    /// Live-view viewport height in pixels
    #[serde(default = "default_viewport_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkflowConfig {
    /// Required serial-number length for capture and accept/reject
    #[serde(default = "default_serial_length")]
    pub serial_length: usize,

    /// JPEG quality for accepted photos (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Local hour at which the shooting day rolls over. Captures before
    /// this hour belong to the previous calendar day.
    #[serde(default = "default_rollover_hour")]
    pub rollover_hour: u32,

    /// How long the accept/reject feedback flash stays visible
    #[serde(default = "default_feedback_millis")]
    pub feedback_millis: u64,

    /// Default bulb exposure duration in milliseconds
    #[serde(default = "default_bulb_duration_ms")]
    pub bulb_duration_ms: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Per-kind capacity of the callback event channels
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_save_root() -> String {
    "./photos".to_string()
}

fn default_accept_subdir() -> String {
    "Pre".to_string()
}

fn default_viewport_width() -> u32 {
    640
}

fn default_viewport_height() -> u32 {
    480
}

fn default_serial_length() -> usize {
    12
}

fn default_jpeg_quality() -> u8 {
    75
}

fn default_rollover_hour() -> u32 {
    5
}

fn default_feedback_millis() -> u64 {
    400
}

fn default_bulb_duration_ms() -> u32 {
    1000
}

fn default_event_channel_capacity() -> usize {
    64
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_root: default_save_root(),
            accept_subdir: default_accept_subdir(),
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: default_viewport_width(),
            height: default_viewport_height(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            serial_length: default_serial_length(),
            jpeg_quality: default_jpeg_quality(),
            rollover_hour: default_rollover_hour(),
            feedback_millis: default_feedback_millis(),
            bulb_duration_ms: default_bulb_duration_ms(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl Default for BoothcamConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            viewport: ViewportConfig::default(),
            workflow: WorkflowConfig::default(),
            system: SystemConfig::default(),
        }
    }
}

impl BoothcamConfig {
    /// Load configuration from a TOML file, with `BOOTHCAM_*` environment
    /// variables taking precedence. A missing file yields the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);
        if !path.as_ref().exists() {
            info!("Configuration file {} not found, using defaults", path_str);
        }

        let settings = Config::builder()
            .add_source(File::with_name(&path_str).required(false))
            .add_source(Environment::with_prefix("BOOTHCAM").separator("__"))
            .build()?;

        let config: BoothcamConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(config::ConfigError::Message(
                "viewport dimensions must be non-zero".to_string(),
            )
            .into());
        }
        if self.workflow.serial_length == 0 {
            return Err(config::ConfigError::Message(
                "workflow.serial_length must be non-zero".to_string(),
            )
            .into());
        }
        if self.workflow.jpeg_quality == 0 || self.workflow.jpeg_quality > 100 {
            return Err(config::ConfigError::Message(
                "workflow.jpeg_quality must be in 1..=100".to_string(),
            )
            .into());
        }
        if self.workflow.rollover_hour >= 24 {
            return Err(config::ConfigError::Message(
                "workflow.rollover_hour must be below 24".to_string(),
            )
            .into());
        }
        if self.system.event_channel_capacity == 0 {
            return Err(config::ConfigError::Message(
                "system.event_channel_capacity must be non-zero".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Serialize this configuration to TOML, for `--print-config`.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
