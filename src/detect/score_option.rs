//! "Press to score" prompt presence.

use std::time::Duration;

use super::{Context, Detector};
use crate::capture::Rect;
use crate::config::Config;
use crate::events::EventKind;
use crate::matcher::Category;
use crate::team::TeamId;

const POLL: Duration = Duration::from_millis(500);

/// Pause after a prompt was seen; it stays up while the player scores.
const REST: Duration = Duration::from_secs(2);

#[derive(Default)]
pub struct ScoreOptionLoop;

impl ScoreOptionLoop {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for ScoreOptionLoop {
    fn name(&self) -> &'static str {
        "score-option"
    }

    fn delay(&self, _ctx: &Context) -> Duration {
        POLL
    }

    fn enabled(&self, config: &Config) -> bool {
        !config.disable_energy
    }

    fn tick(&mut self, ctx: &Context) -> Option<Duration> {
        let area = Rect::from_region(ctx.config.read().score_option);
        let frame = ctx.capture(area, "score option")?;

        let templates = ctx.library.group(Category::ScoreOption, TeamId::Player);
        ctx.classifier.matches(&frame, templates)?;

        let clock = ctx.clock();
        let holding = ctx.teams.energy().holding();
        ctx.log
            .append(EventKind::PressButtonToScore, &clock, holding as i64);
        ctx.notifier.feed(
            TeamId::Player,
            ctx.teams.player().color,
            format!("[{}] [Self] Score option present ({})", clock, holding),
        );

        Some(REST)
    }
}
