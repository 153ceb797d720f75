//! Objective secured banners.

use std::time::Duration;

use super::{Context, Detector};
use crate::capture::Rect;
use crate::config::Config;
use crate::events::{EventKind, Objective, Slot};
use crate::matcher::Category;
use crate::team::{Side, TeamId};

const POLL: Duration = Duration::from_secs(1);

/// An objective slot cannot be secured again this soon.
pub const SLOT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Default)]
pub struct ObjectivesLoop;

impl ObjectivesLoop {
    pub fn new() -> Self {
        Self
    }

    /// Credit `objective` to `side` unless its slot is cooling down.
    ///
    /// A banner is credited to at most one slot per poll.
    pub fn secure(ctx: &Context, objective: Objective, side: Side) -> Option<Slot> {
        let slot = objective.slot();

        let recent = ctx.log.any_within(SLOT_COOLDOWN, |kind| {
            matches!(kind, EventKind::Secured(o, _) if o.slot() == slot)
        });
        if let Some(previous) = recent {
            tracing::debug!("[Objectives] {:?} slot cooling down since {}", slot, previous);
            return None;
        }

        let clock = ctx.clock();
        let team = ctx.teams.get(side.team());
        ctx.log.append(EventKind::Secured(objective, side), &clock, 0);
        ctx.scoreboard.publish_objective(side, objective);
        ctx.notifier.feed(
            team.id,
            team.color,
            format!("[{}] [{}] {} secured", clock, side, objective),
        );

        Some(slot)
    }
}

impl Detector for ObjectivesLoop {
    fn name(&self) -> &'static str {
        "objectives"
    }

    fn delay(&self, _ctx: &Context) -> Duration {
        POLL
    }

    fn enabled(&self, config: &Config) -> bool {
        !config.disable_objectives
    }

    fn tick(&mut self, ctx: &Context) -> Option<Duration> {
        let area = Rect::from_region(ctx.config.read().objectives);
        let frame = ctx.capture(area, "objective")?;

        let templates = ctx.library.group(Category::Secure, TeamId::Game);
        let info = ctx.classifier.matches(&frame, templates)?;

        match info.event {
            Some(EventKind::Secured(objective, side)) => {
                Self::secure(ctx, objective, side);
            }
            other => tracing::warn!(
                "[Objectives] Template {} announces {:?}",
                info.descriptor.source_id,
                other
            ),
        }
        None
    }
}
