//! Paragraph clustering
//!
//! Groups axis-aligned text boxes into paragraphs using only their geometry.
//! Boxes are first bucketed into lines by vertical center, each line is split
//! into runs of horizontally-close boxes, and runs are chained downwards into
//! paragraphs while both the horizontal and vertical gaps stay within the
//! height-scaled thresholds. All comparisons against a threshold are inclusive.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Detection, Point, ReadingDirection};

/// Proximity thresholds and reading direction for clustering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Horizontal proximity, as a fraction of box height
    pub x_ths: f64,
    /// Vertical proximity, as a fraction of box height
    pub y_ths: f64,
    /// Reading direction within and across lines
    pub direction: ReadingDirection,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            x_ths: 1.0,
            y_ths: 0.5,
            direction: ReadingDirection::Ltr,
        }
    }
}

/// A group of detections forming one reading unit
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// Member detections in reading order
    pub members: Vec<Detection>,
    /// Axis-aligned union of member corners
    pub bounds: [Point; 4],
    /// Member texts joined by a single space
    pub text: String,
}

/// Cached geometry of one input detection
#[derive(Debug, Clone, Copy)]
struct BoxGeom {
    index: usize,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    center_y: f64,
}

impl BoxGeom {
    fn new(index: usize, detection: &Detection) -> Self {
        let (min_x, min_y, max_x, max_y) = detection.extents();
        let (min_x, min_y, max_x, max_y) = (min_x as f64, min_y as f64, max_x as f64, max_y as f64);
        Self {
            index,
            min_x,
            min_y,
            max_x,
            max_y,
            center_y: (min_y + max_y) / 2.0,
        }
    }

    fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Horizontally-close boxes of a single line, in reading order
#[derive(Debug, Clone)]
struct Run {
    boxes: Vec<BoxGeom>,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    mean_height: f64,
}

impl Run {
    fn new(boxes: Vec<BoxGeom>) -> Self {
        let min_x = boxes.iter().map(|b| b.min_x).fold(f64::INFINITY, f64::min);
        let min_y = boxes.iter().map(|b| b.min_y).fold(f64::INFINITY, f64::min);
        let max_x = boxes.iter().map(|b| b.max_x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = boxes.iter().map(|b| b.max_y).fold(f64::NEG_INFINITY, f64::max);
        let mean_height = boxes.iter().map(BoxGeom::height).sum::<f64>() / boxes.len() as f64;
        Self {
            boxes,
            min_x,
            min_y,
            max_x,
            max_y,
            mean_height,
        }
    }

    /// Distance between the x-extents of two runs, zero when they overlap
    fn horizontal_gap(&self, other: &Run) -> f64 {
        (self.min_x.max(other.min_x) - self.max_x.min(other.max_x)).max(0.0)
    }
}

/// Paragraph under construction
struct Group {
    boxes: Vec<BoxGeom>,
    last_run: Run,
    last_line: usize,
}

impl Group {
    fn new(run: Run, line: usize) -> Self {
        Self {
            boxes: run.boxes.clone(),
            last_run: run,
            last_line: line,
        }
    }

    fn extend(&mut self, run: Run, line: usize) {
        self.boxes.extend_from_slice(&run.boxes);
        self.last_run = run;
        self.last_line = line;
    }

    /// Vertical gap to `run` if it may continue this paragraph
    fn continuation_gap(&self, run: &Run, line: usize, params: &ClusterParams) -> Option<f64> {
        if self.last_line >= line {
            return None;
        }

        let height = self.last_run.mean_height.min(run.mean_height);
        let h_gap = self.last_run.horizontal_gap(run);
        let v_gap = run.min_y - self.last_run.max_y;

        (h_gap <= params.x_ths * height && v_gap <= params.y_ths * height).then_some(v_gap)
    }

    fn finish(self, detections: &[Detection]) -> Paragraph {
        let members: Vec<Detection> = self
            .boxes
            .iter()
            .map(|b| detections[b.index].clone())
            .collect();

        let min_x = self.boxes.iter().map(|b| b.min_x).fold(f64::INFINITY, f64::min) as i32;
        let min_y = self.boxes.iter().map(|b| b.min_y).fold(f64::INFINITY, f64::min) as i32;
        let max_x = self.boxes.iter().map(|b| b.max_x).fold(f64::NEG_INFINITY, f64::max) as i32;
        let max_y = self.boxes.iter().map(|b| b.max_y).fold(f64::NEG_INFINITY, f64::max) as i32;

        let text = members
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Paragraph {
            members,
            bounds: [[min_x, min_y], [max_x, min_y], [max_x, max_y], [min_x, max_y]],
            text,
        }
    }
}

/// Group detections into paragraphs.
///
/// Output is ordered top-to-bottom, then by reading direction. Boxes with zero
/// width or height are skipped; every other detection lands in exactly one
/// paragraph.
pub fn cluster_paragraphs(detections: &[Detection], params: &ClusterParams) -> Vec<Paragraph> {
    let mut boxes: Vec<BoxGeom> = detections
        .iter()
        .enumerate()
        .filter_map(|(i, d)| {
            let geom = BoxGeom::new(i, d);
            if geom.width() <= 0.0 || geom.height() <= 0.0 {
                warn!("Skipping zero-area box {:?} at {:?}", d.text, d.coordinates);
                None
            } else {
                Some(geom)
            }
        })
        .collect();

    // Stable: equal centers keep input order
    boxes.sort_by(|a, b| a.center_y.total_cmp(&b.center_y));

    let mut lines = group_lines(boxes, params.y_ths);
    for line in &mut lines {
        order_line(line, params.direction);
    }

    let mut groups: Vec<Group> = Vec::new();
    for (line_idx, line) in lines.into_iter().enumerate() {
        for run in split_runs(line, params) {
            let best = groups
                .iter()
                .enumerate()
                .filter_map(|(i, g)| g.continuation_gap(&run, line_idx, params).map(|gap| (gap, i)))
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            match best {
                Some((_, i)) => groups[i].extend(run, line_idx),
                None => groups.push(Group::new(run, line_idx)),
            }
        }
    }

    debug!(
        "Clustered {} detections into {} paragraphs",
        detections.len(),
        groups.len()
    );

    groups.into_iter().map(|g| g.finish(detections)).collect()
}

/// Bucket boxes (sorted by vertical center) into lines.
///
/// A box joins the current line when its center is within `y_ths` times the
/// smaller of its own height and the height of the line's first box.
fn group_lines(boxes: Vec<BoxGeom>, y_ths: f64) -> Vec<Vec<BoxGeom>> {
    let mut lines: Vec<Vec<BoxGeom>> = Vec::new();

    for geom in boxes {
        match lines.last_mut() {
            Some(line) if same_line(&line[0], &geom, y_ths) => line.push(geom),
            _ => lines.push(vec![geom]),
        }
    }

    lines
}

fn same_line(anchor: &BoxGeom, other: &BoxGeom, y_ths: f64) -> bool {
    (other.center_y - anchor.center_y).abs() <= y_ths * anchor.height().min(other.height())
}

fn order_line(line: &mut [BoxGeom], direction: ReadingDirection) {
    line.sort_by(|a, b| {
        let primary = match direction {
            ReadingDirection::Ltr => a.min_x.total_cmp(&b.min_x),
            ReadingDirection::Rtl => b.max_x.total_cmp(&a.max_x),
        };
        primary.then(a.index.cmp(&b.index))
    });
}

/// Split an ordered line wherever the reading-order gap exceeds the threshold
fn split_runs(line: Vec<BoxGeom>, params: &ClusterParams) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut current: Vec<BoxGeom> = Vec::new();

    for geom in line {
        if let Some(prev) = current.last() {
            let gap = match params.direction {
                ReadingDirection::Ltr => geom.min_x - prev.max_x,
                ReadingDirection::Rtl => prev.min_x - geom.max_x,
            };
            let limit = params.x_ths * prev.height().min(geom.height());
            if gap > limit {
                runs.push(Run::new(std::mem::take(&mut current)));
            }
        }
        current.push(geom);
    }

    if !current.is_empty() {
        runs.push(Run::new(current));
    }

    runs
}
