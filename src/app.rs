//! Batch Coordinator
//!
//! Runs every image through OCR, filtering, clustering and annotation on a
//! pool of worker threads. Each image ends in its own outcome; one failing
//! image never stops the rest of the batch.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analysis::Annotator;
use crate::config::{AppConfig, OutputMode};
use crate::storage::{artifact_name, write_artifact};
use crate::vision::{
    cluster_paragraphs, coerce_detections, filter_by_confidence, ClusterParams, OcrEngine,
};

/// What happened to a single image
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    /// Artifact written with this many records
    Written { output: PathBuf, records: usize },
    /// Image could not be read or decoded
    Skipped { reason: String },
    /// OCR, annotation or writing failed
    Failed { reason: String },
}

/// Outcome tagged with its image
#[derive(Debug, Clone)]
pub struct ImageReport {
    pub image: PathBuf,
    pub outcome: ImageOutcome,
}

/// Aggregated outcomes of a batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Per-image reports, sorted by image path
    pub reports: Vec<ImageReport>,
}

impl BatchSummary {
    pub fn from_reports(mut reports: Vec<ImageReport>) -> Self {
        reports.sort_by(|a, b| a.image.cmp(&b.image));
        Self { reports }
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Written { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ImageOutcome::Failed { .. }))
    }

    /// True when there was work and none of it succeeded
    pub fn all_failed(&self) -> bool {
        self.total() > 0 && self.written() == 0
    }

    fn count(&self, pred: impl Fn(&ImageOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Log skipped and failed images followed by the totals
    pub fn log(&self) {
        for report in &self.reports {
            match &report.outcome {
                ImageOutcome::Skipped { reason } => warn!("Skipped {:?}: {}", report.image, reason),
                ImageOutcome::Failed { reason } => warn!("Failed {:?}: {}", report.image, reason),
                ImageOutcome::Written { .. } => {}
            }
        }

        info!(
            "Processed {} images: {} written, {} skipped, {} failed",
            self.total(),
            self.written(),
            self.skipped(),
            self.failed()
        );
    }
}

/// Per-image extraction, shared read-only by all workers
pub struct Extractor {
    engine: Box<dyn OcrEngine>,
    annotator: Annotator,
    params: ClusterParams,
    confidence_threshold: f64,
    mode: OutputMode,
    output_dir: PathBuf,
}

impl Extractor {
    pub fn new(
        engine: Box<dyn OcrEngine>,
        annotator: Annotator,
        config: &AppConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            annotator,
            params: config.cluster_params(),
            confidence_threshold: config.ocr.confidence_threshold,
            mode: config.batch.mode,
            output_dir: output_dir.into(),
        }
    }

    /// Process one image end to end
    pub fn process_image(&self, image: &Path) -> ImageOutcome {
        debug!("Reading: {:?}", image);

        if let Err(e) = image::image_dimensions(image) {
            return ImageOutcome::Skipped {
                reason: format!("unreadable image: {}", e),
            };
        }

        let start = Instant::now();
        match self.extract(image) {
            Ok((output, records)) => {
                debug!(
                    "Wrote {} records for {:?} in {:?}",
                    records,
                    image,
                    start.elapsed()
                );
                ImageOutcome::Written { output, records }
            }
            Err(e) => ImageOutcome::Failed {
                reason: format!("{:#}", e),
            },
        }
    }

    fn extract(&self, image: &Path) -> Result<(PathBuf, usize)> {
        let raw = self.engine.read(image).context("OCR failed")?;
        let detections = filter_by_confidence(coerce_detections(&raw), self.confidence_threshold);
        debug!(
            "{:?}: {} detections, {} above confidence {}",
            image,
            raw.len(),
            detections.len(),
            self.confidence_threshold
        );

        let name = artifact_name(image, self.mode);
        match self.mode {
            OutputMode::Raw => {
                let output = write_artifact(&self.output_dir, &name, &detections)?;
                Ok((output, detections.len()))
            }
            OutputMode::Paragraph => {
                let paragraphs = cluster_paragraphs(&detections, &self.params);
                let records = self
                    .annotator
                    .annotate(&paragraphs)
                    .context("Annotation failed")?;
                let output = write_artifact(&self.output_dir, &name, &records)?;
                Ok((output, records.len()))
            }
        }
    }
}

/// Default worker count
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Process `images` on up to `workers` threads.
///
/// Images whose artifact name was already claimed by an earlier image are
/// reported as failed without being processed.
pub fn run_batch(extractor: &Extractor, images: &[PathBuf], workers: usize) -> BatchSummary {
    let (jobs, mut reports) = claim_artifact_names(images, extractor.mode);
    let workers = workers.clamp(1, jobs.len().max(1));
    info!("Processing {} images with {} workers", jobs.len(), workers);

    let (job_tx, job_rx) = bounded::<&Path>(workers);
    let (report_tx, report_rx) = unbounded::<ImageReport>();

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let job_rx = job_rx.clone();
            let report_tx = report_tx.clone();
            scope.spawn(move || {
                for image in job_rx.iter() {
                    let outcome = extractor.process_image(image);
                    // The receiver lives until the scope ends
                    let _ = report_tx.send(ImageReport {
                        image: image.to_path_buf(),
                        outcome,
                    });
                }
                debug!("Worker {} exiting", worker);
            });
        }
        drop(job_rx);
        drop(report_tx);

        for image in jobs {
            if job_tx.send(image).is_err() {
                break;
            }
        }
        drop(job_tx);
    });

    reports.extend(report_rx.try_iter());
    BatchSummary::from_reports(reports)
}

/// Split `images` into those that own their artifact name and failure reports
/// for later images that would overwrite it
fn claim_artifact_names(images: &[PathBuf], mode: OutputMode) -> (Vec<&Path>, Vec<ImageReport>) {
    let mut claimed: HashMap<String, &Path> = HashMap::new();
    let mut jobs = Vec::with_capacity(images.len());
    let mut collisions = Vec::new();

    for image in images {
        match claimed.entry(artifact_name(image, mode)) {
            Entry::Occupied(first) => collisions.push(ImageReport {
                image: image.clone(),
                outcome: ImageOutcome::Failed {
                    reason: format!(
                        "output name {} collides with {:?}",
                        first.key(),
                        first.get()
                    ),
                },
            }),
            Entry::Vacant(slot) => {
                slot.insert(image.as_path());
                jobs.push(image.as_path());
            }
        }
    }

    (jobs, collisions)
}
