//! Confidence filtering of OCR detections

use super::Detection;

/// Keep detections whose confidence is at least `threshold`, preserving order
pub fn filter_by_confidence(detections: Vec<Detection>, threshold: f64) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.confidence >= threshold)
        .collect()
}
