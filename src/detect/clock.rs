//! Match clock.

use std::time::Duration;

use super::{Context, Detector, PreviewSlot};
use crate::capture::Rect;
use crate::config::Config;
use crate::team::TeamId;

/// Extra wait after an unreadable clock.
pub const BACKOFF: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct ClockLoop;

impl ClockLoop {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for ClockLoop {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn delay(&self, ctx: &Context) -> Duration {
        ctx.teams.get(TeamId::Time).delay()
    }

    fn enabled(&self, config: &Config) -> bool {
        !config.disable_time
    }

    fn tick(&mut self, ctx: &Context) -> Option<Duration> {
        let area = Rect::from_region(ctx.config.read().time);
        let frame = ctx.capture(area, "clock")?;

        match ctx.classifier.clock(&frame) {
            Ok(clock) => {
                ctx.scoreboard.set_time(clock.minutes, clock.seconds);
                ctx.previews.set(PreviewSlot::Time, frame.rgba);
                None
            }
            Err(err) => {
                tracing::debug!("[Clock] {}; backing off {:?}", err, BACKOFF);
                Some(BACKOFF)
            }
        }
    }
}
