//! Configuration management for the slide tracker.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub ocr: OcrConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            polling: PollingConfig::default(),
            detection: DetectionConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether tracking is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Base poll interval in seconds
    #[serde(default = "default_base_interval")]
    pub base_interval_seconds: u64,

    /// Interval multiplier for cycles that ran OCR
    #[serde(default = "default_ocr_multiplier")]
    pub ocr_interval_multiplier: u64,

    /// Interval multiplier while the session is stale
    #[serde(default = "default_stale_multiplier")]
    pub stale_interval_multiplier: u64,

    /// Consecutive snapshots the window must be missing before the
    /// session goes stale
    #[serde(default = "default_stale_misses")]
    pub stale_after_misses: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval_seconds: 2,
            ocr_interval_multiplier: 2,
            stale_interval_multiplier: 2,
            stale_after_misses: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Process names that identify a presentation application
    #[serde(default = "default_process_signatures")]
    pub process_signatures: Vec<String>,

    /// Title fragments that identify a presentation window
    #[serde(default = "default_title_indicators")]
    pub title_indicators: Vec<String>,

    /// Consecutive cycles a disagreeing cross-method result must persist
    /// before it replaces the published position
    #[serde(default = "default_flap_hold")]
    pub flap_hold_cycles: u32,

    /// Floor below which an OCR-derived position is discarded
    #[serde(default = "default_min_ocr_confidence")]
    pub min_ocr_confidence: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            process_signatures: default_process_signatures(),
            title_indicators: default_title_indicators(),
            flap_hold_cycles: 2,
            min_ocr_confidence: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Enable the OCR fallback path
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Hard ceiling on one recognition pass, in milliseconds
    #[serde(default = "default_ocr_timeout")]
    pub timeout_ms: u64,

    /// Margin trimmed from each window edge before capture, in pixels
    #[serde(default = "default_capture_margin")]
    pub capture_margin: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 2000,
            capture_margin: 4,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_interval() -> u64 {
    2
}

fn default_ocr_multiplier() -> u64 {
    2
}

fn default_stale_multiplier() -> u64 {
    2
}

fn default_stale_misses() -> u32 {
    2
}

fn default_flap_hold() -> u32 {
    2
}

fn default_min_ocr_confidence() -> f32 {
    0.4
}

fn default_ocr_timeout() -> u64 {
    2000
}

fn default_capture_margin() -> u32 {
    4
}

fn default_process_signatures() -> Vec<String> {
    vec![
        "Microsoft PowerPoint".to_string(),
        "PowerPoint".to_string(),
        "POWERPNT.EXE".to_string(),
    ]
}

fn default_title_indicators() -> Vec<String> {
    vec![
        "PowerPoint".to_string(),
        ".pptx".to_string(),
        ".ppt".to_string(),
        "Slide".to_string(),
        "Presentation".to_string(),
    ]
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("slide-tracker")
            .join("config.toml")
    }

    /// Save configuration to the default path
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to_path(Self::default_config_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
