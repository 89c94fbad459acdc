//! Configuration management.

use anyhow::{Context, Result};
use cifar_panel_hw::{lcd::parse_hex_color, Orientation, PanelSettings, DISPLAY_PAUSE_MS};
use cifar_panel_infer::DEFAULT_ARENA_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::runner::{FaultPolicy, Layout};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Dataset configuration
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Display configuration
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Model and runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the model container
    #[serde(default = "default_model_path")]
    pub path: PathBuf,

    /// Tensor arena size in bytes
    #[serde(default = "default_arena_size")]
    pub arena_size: usize,

    /// What to do when a step reports a fault
    #[serde(default)]
    pub fault_policy: FaultPolicy,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            arena_size: default_arena_size(),
            fault_policy: FaultPolicy::default(),
        }
    }
}

/// Dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to a CIFAR-10 binary batch
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,

    /// Number of leading records to classify
    #[serde(default = "default_count")]
    pub count: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            count: default_count(),
        }
    }
}

/// Display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Panel orientation: landscape or portrait
    #[serde(default = "default_orientation")]
    pub orientation: String,

    /// Background color (#RRGGBB)
    #[serde(default = "default_background")]
    pub background: String,

    /// Text color (#RRGGBB)
    #[serde(default = "default_foreground")]
    pub foreground: String,

    /// Image blit position
    #[serde(default = "default_image_x")]
    pub image_x: u32,
    #[serde(default = "default_image_y")]
    pub image_y: u32,

    /// Text line for the predicted label
    #[serde(default = "default_prediction_line")]
    pub prediction_line: u16,

    /// Text line for the confidence
    #[serde(default = "default_confidence_line")]
    pub confidence_line: u16,

    /// Hold time after each image in milliseconds
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u32,

    /// Directory for per-image PNG snapshots
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            orientation: default_orientation(),
            background: default_background(),
            foreground: default_foreground(),
            image_x: default_image_x(),
            image_y: default_image_y(),
            prediction_line: default_prediction_line(),
            confidence_line: default_confidence_line(),
            pause_ms: default_pause_ms(),
            snapshot_dir: None,
        }
    }
}

impl DisplayConfig {
    /// Builds panel settings, validating orientation and colors.
    pub fn panel_settings(&self) -> Result<PanelSettings> {
        let orientation: Orientation = self.orientation.parse()?;
        let background = parse_hex_color(&self.background)
            .with_context(|| format!("Invalid background color: {}", self.background))?;
        let foreground = parse_hex_color(&self.foreground)
            .with_context(|| format!("Invalid foreground color: {}", self.foreground))?;

        Ok(PanelSettings {
            orientation,
            background,
            foreground,
            pause_ms: self.pause_ms,
            snapshot_dir: self.snapshot_dir.clone(),
        })
    }

    /// Returns where results are placed on the panel.
    pub fn layout(&self) -> Layout {
        Layout {
            image_x: self.image_x,
            image_y: self.image_y,
            prediction_line: self.prediction_line,
            confidence_line: self.confidence_line,
        }
    }
}

// Default value functions
fn default_model_path() -> PathBuf {
    PathBuf::from("models/cifar10.cpnm")
}

fn default_arena_size() -> usize {
    DEFAULT_ARENA_SIZE
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("data/test_batch.bin")
}

fn default_count() -> usize {
    10
}

fn default_orientation() -> String {
    "landscape".to_string()
}

fn default_background() -> String {
    "#FFFFFF".to_string()
}

fn default_foreground() -> String {
    "#000000".to_string()
}

fn default_image_x() -> u32 {
    300
}

fn default_image_y() -> u32 {
    100
}

fn default_prediction_line() -> u16 {
    8
}

fn default_confidence_line() -> u16 {
    9
}

fn default_pause_ms() -> u32 {
    DISPLAY_PAUSE_MS
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
