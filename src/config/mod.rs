//! Application Configuration
//!
//! Extraction settings stored in TOML format. Command-line flags override
//! values loaded from the file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::analysis::languages::{is_known_language, reading_direction};
use crate::command::CommandSpec;
use crate::vision::{ClusterParams, OcrBackend};

/// Fatal configuration problems, reported before any image is processed
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("confidence threshold must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("{name} must be a non-negative finite number, got {value}")]
    InvalidProximity { name: &'static str, value: f64 },

    #[error("no OCR language given")]
    NoLanguages,

    #[error("unknown OCR language `{0}`")]
    UnknownLanguage(String),

    #[error("worker count must be at least 1")]
    ZeroWorkers,
}

/// What gets written for each image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Filtered detections with coordinates and confidence
    Raw,
    /// Clustered paragraphs with language and entity annotation
    #[default]
    Paragraph,
}

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// OCR settings
    pub ocr: OcrSettings,
    /// Paragraph clustering settings
    pub clustering: ClusteringSettings,
    /// Language and entity annotation settings
    pub annotation: AnnotationSettings,
    /// Batch processing settings
    pub batch: BatchSettings,
}

/// OCR-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Where detections come from
    pub backend: OcrBackend,
    /// Languages passed to the OCR engine
    pub languages: Vec<String>,
    /// Minimum confidence for a detection to be kept (0.0 - 1.0)
    pub confidence_threshold: f64,
    /// Allow only one OCR call at a time
    pub serialize: bool,
    /// Program used by the `command` backend
    pub command: Option<CommandSpec>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Command,
            languages: vec!["en".to_string()],
            confidence_threshold: 0.5,
            serialize: false,
            command: None,
        }
    }
}

/// Paragraph clustering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringSettings {
    /// Horizontal proximity, as a fraction of box height
    pub x_ths: f64,
    /// Vertical proximity, as a fraction of box height
    pub y_ths: f64,
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self { x_ths: 1.0, y_ths: 0.5 }
    }
}

/// Annotation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSettings {
    /// Language whose paragraphs also get entity extraction
    pub primary_language: String,
    /// Language identification program; the first OCR language is assumed if unset
    pub language_command: Option<CommandSpec>,
    /// Entity extraction program
    pub entity_command: Option<CommandSpec>,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            primary_language: "en".to_string(),
            language_command: None,
            entity_command: None,
        }
    }
}

/// Batch processing settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Output shape
    pub mode: OutputMode,
    /// Worker threads (defaults to available parallelism)
    pub workers: Option<usize>,
}

impl AppConfig {
    /// Check every value that would otherwise fail mid-batch
    pub fn validate(&self) -> Result<(), ConfigError> {
        let conf = self.ocr.confidence_threshold;
        if !(0.0..=1.0).contains(&conf) {
            return Err(ConfigError::ConfidenceOutOfRange(conf));
        }

        for (name, value) in [("x_ths", self.clustering.x_ths), ("y_ths", self.clustering.y_ths)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidProximity { name, value });
            }
        }

        if self.ocr.languages.is_empty() {
            return Err(ConfigError::NoLanguages);
        }
        if let Some(unknown) = self.ocr.languages.iter().find(|l| !is_known_language(l)) {
            return Err(ConfigError::UnknownLanguage(unknown.clone()));
        }

        if self.batch.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }

        Ok(())
    }

    /// Clustering parameters with the reading direction of the OCR languages
    pub fn cluster_params(&self) -> ClusterParams {
        ClusterParams {
            x_ths: self.clustering.x_ths,
            y_ths: self.clustering.y_ths,
            direction: reading_direction(&self.ocr.languages),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
