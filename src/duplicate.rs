//! Duplicate suppression for repeated reads of the same on-screen state.
//!
//! Score banners stay on screen for a few seconds and are re-read on every
//! poll. A candidate is a re-observation of the stored record when it arrives
//! within the window and the stored digit region is found again in the new
//! frame. Values are not compared: a flickering or partially redrawn glyph can
//! change the number while the picture stays the same.

use image::GrayImage;
use std::time::{Duration, Instant};

use crate::matcher::Correlate;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3);
pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// One accepted detection kept for comparison with the next candidate.
#[derive(Debug, Clone)]
pub struct DetectionRecord {
    pub value: i64,
    pub at: Instant,
    /// Full digit frame.
    pub frame: GrayImage,
    /// Comparable sub-region of `frame`.
    pub region: GrayImage,
    /// The value was credited downstream.
    pub counted: bool,
    /// Value of a previous record this one replaced.
    pub replaces: i64,
}

impl DetectionRecord {
    pub fn new(value: i64, at: Instant, frame: GrayImage, region: GrayImage) -> Self {
        Self {
            value,
            at,
            frame,
            region,
            counted: false,
            replaces: 0,
        }
    }

    fn is_empty(image: &GrayImage) -> bool {
        image.width() == 0 || image.height() == 0
    }
}

/// Result of checking a candidate against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    New,
    Duplicate,
    /// The candidate supersedes a credited record that lost trailing digits.
    Override { replaces: i64 },
}

#[derive(Debug)]
pub struct DuplicateSuppressor {
    window: Duration,
    threshold: f32,
    last: Option<DetectionRecord>,
}

impl DuplicateSuppressor {
    pub fn new(window: Duration, threshold: f32) -> Self {
        Self {
            window,
            threshold,
            last: None,
        }
    }

    pub fn last(&self) -> Option<&DetectionRecord> {
        self.last.as_ref()
    }

    /// Drop the stored record and its images.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Decide whether `candidate` re-observes the stored record.
    ///
    /// On a non-duplicate verdict the candidate becomes the stored record.
    pub fn is_duplicate(&mut self, candidate: DetectionRecord, correlator: &dyn Correlate) -> bool {
        if self.matches_last(&candidate, correlator) {
            return true;
        }
        self.last = Some(candidate);
        false
    }

    /// Returns the replaced value when `candidate` overrides the stored record.
    pub fn overrides(&self, candidate: &DetectionRecord) -> Option<i64> {
        let prev = self.last.as_ref()?;

        if candidate.at.saturating_duration_since(prev.at) >= self.window {
            return None;
        }
        if !prev.counted || prev.value <= 0 {
            return None;
        }
        if candidate.value <= prev.value {
            return None;
        }
        if candidate.value % prev.value != 0 {
            return None;
        }
        match candidate.value / prev.value {
            10 | 100 => Some(prev.value),
            _ => None,
        }
    }

    /// Classify `candidate` and store it unless it is a duplicate.
    pub fn check(&mut self, mut candidate: DetectionRecord, correlator: &dyn Correlate) -> Verdict {
        if let Some(replaces) = self.overrides(&candidate) {
            tracing::warn!(
                "[Duplicate] (-{}) (+{}) Potential override possible",
                replaces,
                candidate.value
            );
            candidate.replaces = replaces;
            candidate.counted = true;
            self.last = Some(candidate);
            return Verdict::Override { replaces };
        }

        candidate.counted = true;
        if self.is_duplicate(candidate, correlator) {
            return Verdict::Duplicate;
        }
        Verdict::New
    }

    fn matches_last(&self, candidate: &DetectionRecord, correlator: &dyn Correlate) -> bool {
        let Some(prev) = self.last.as_ref() else {
            return false;
        };

        if DetectionRecord::is_empty(&prev.frame) || DetectionRecord::is_empty(&candidate.region) {
            return false;
        }

        if candidate.at.saturating_duration_since(prev.at) >= self.window {
            return false;
        }

        let similarity = correlator.similarity(&candidate.frame, &prev.region);
        tracing::debug!(
            "[Duplicate] {} vs {} similarity {:.3}",
            prev.value,
            candidate.value,
            similarity
        );

        similarity >= self.threshold
    }
}

impl Default for DuplicateSuppressor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_THRESHOLD)
    }
}
