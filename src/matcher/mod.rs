//! Turning captured frames into classified outcomes.

mod classifier;
mod correlate;
mod template;

pub use classifier::TemplateMatcher;
pub use correlate::{Correlate, NccCorrelator};
pub use template::{Category, Template, TemplateLibrary, MANIFEST};

use crate::capture::{Frame, Point};
use crate::clock::Clock;
use crate::error::ClockError;
use crate::events::EventKind;
use crate::pieces::TemplateDescriptor;
use crate::team::Team;

/// What a single classification produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Found,
    NotFound,
    /// Accepted with low confidence; published but flagged.
    Missed,
    /// A template matched but the value is out of range.
    Invalid,
    Duplicate,
    /// Supersedes a credited read of `replaces`.
    Override { replaces: i64 },
}

/// Outcome plus the value read, when any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub outcome: Outcome,
    pub value: i64,
    /// Where the triggering banner was found in the frame.
    pub point: Option<Point>,
}

impl Classification {
    pub fn new(outcome: Outcome, value: i64) -> Self {
        Self {
            outcome,
            value,
            point: None,
        }
    }

    pub fn not_found() -> Self {
        Self::new(Outcome::NotFound, -1)
    }

    pub fn at(mut self, point: Point) -> Self {
        self.point = Some(point);
        self
    }
}

/// The first template of a group that matched a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchInfo {
    pub point: Point,
    pub descriptor: TemplateDescriptor,
    pub event: Option<EventKind>,
    pub confidence: f32,
}

/// Frame classifier used by the detection loops.
pub trait Classify: Send + Sync {
    /// First template in `templates` whose best correlation reaches the
    /// acceptance threshold.
    fn matches(&self, frame: &Frame, templates: &[Template]) -> Option<MatchInfo>;

    /// Read a team score banner, consulting the team's duplicate suppressor.
    fn score(&self, frame: &Frame, team: &Team) -> Classification;

    /// Read the held energy counter.
    fn energy(&self, frame: &Frame) -> Classification;

    /// Read the match clock.
    fn clock(&self, frame: &Frame) -> Result<Clock, ClockError>;
}
