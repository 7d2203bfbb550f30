//! Vision/OCR Layer
//!
//! Turns OCR output into immutable detections and groups them into paragraphs.
//! Supports multiple OCR backends:
//! - External OCR command (JSON on stdout)
//! - Sidecar files with precomputed OCR output

pub mod filter;
pub mod ocr;
pub mod paragraph;

pub use filter::filter_by_confidence;
pub use ocr::{build_engine, OcrEngine};
pub use paragraph::{cluster_paragraphs, ClusterParams, Paragraph};

use serde::{Deserialize, Serialize};

/// OCR backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    /// External program printing detections as JSON
    #[default]
    Command,
    /// Precomputed `<stem>.ocr.json` file next to each image
    Sidecar,
}

/// Order in which words are read within and across lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingDirection {
    /// Left to right
    #[default]
    Ltr,
    /// Right to left
    Rtl,
}

/// Corner point as reported by the OCR engine
pub type RawPoint = [f64; 2];

/// Corner point after integer coercion
pub type Point = [i32; 2];

/// A detection exactly as the OCR engine reported it.
///
/// Accepts both the tuple layout `[[[x, y] x4], text, confidence]` and the
/// object layout `{"coordinates": ..., "text": ..., "confidence": ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDetection {
    Tuple([RawPoint; 4], String, f64),
    Object {
        #[serde(alias = "box")]
        coordinates: [RawPoint; 4],
        text: String,
        confidence: f64,
    },
}

impl RawDetection {
    pub fn corners(&self) -> &[RawPoint; 4] {
        match self {
            RawDetection::Tuple(corners, _, _) => corners,
            RawDetection::Object { coordinates, .. } => coordinates,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            RawDetection::Tuple(_, text, _) => text,
            RawDetection::Object { text, .. } => text,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            RawDetection::Tuple(_, _, confidence) => *confidence,
            RawDetection::Object { confidence, .. } => *confidence,
        }
    }
}

/// Single OCR-recognized text box with integer geometry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Corner points (top-left, top-right, bottom-right, bottom-left)
    pub coordinates: [Point; 4],
    /// Recognized text
    pub text: String,
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f64,
}

impl Detection {
    pub fn new(coordinates: [Point; 4], text: impl Into<String>, confidence: f64) -> Self {
        Self {
            coordinates,
            text: text.into(),
            confidence,
        }
    }

    /// Coerce a raw detection, truncating coordinates toward zero.
    ///
    /// Returns `None` if a coordinate is not finite or does not fit an `i32`,
    /// or if the confidence is not within `[0.0, 1.0]`.
    pub fn from_raw(raw: &RawDetection) -> Option<Self> {
        let confidence = raw.confidence();
        if !(0.0..=1.0).contains(&confidence) {
            return None;
        }

        let mut coordinates = [[0i32; 2]; 4];
        for (dst, src) in coordinates.iter_mut().zip(raw.corners()) {
            *dst = [truncate_coordinate(src[0])?, truncate_coordinate(src[1])?];
        }

        Some(Self::new(coordinates, raw.text(), confidence))
    }

    /// Axis-aligned extents as (min_x, min_y, max_x, max_y)
    pub fn extents(&self) -> (i32, i32, i32, i32) {
        let xs = self.coordinates.iter().map(|p| p[0]);
        let ys = self.coordinates.iter().map(|p| p[1]);
        (
            xs.clone().min().unwrap_or(0),
            ys.clone().min().unwrap_or(0),
            xs.max().unwrap_or(0),
            ys.max().unwrap_or(0),
        )
    }
}

fn truncate_coordinate(value: f64) -> Option<i32> {
    let value = value.trunc();
    // NaN fails the range check
    (f64::from(i32::MIN)..=f64::from(i32::MAX))
        .contains(&value)
        .then_some(value as i32)
}

#[cfg(test)]
impl Detection {
    /// Build an axis-aligned detection from its top-left corner and size
    pub fn from_rect(x: i32, y: i32, width: i32, height: i32, text: &str, confidence: f64) -> Self {
        Self::new(
            [
                [x, y],
                [x + width, y],
                [x + width, y + height],
                [x, y + height],
            ],
            text,
            confidence,
        )
    }
}

/// Coerce every raw detection, logging and dropping the malformed ones
pub fn coerce_detections(raw: &[RawDetection]) -> Vec<Detection> {
    raw.iter()
        .filter_map(|r| {
            let detection = Detection::from_raw(r);
            if detection.is_none() {
                tracing::warn!(
                    "Skipping detection {:?} with out-of-range geometry or confidence",
                    r.text()
                );
            }
            detection
        })
        .collect()
}
