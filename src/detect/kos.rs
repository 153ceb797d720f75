//! Knock-out banners.

use std::time::{Duration, Instant};

use super::{Context, Detector};
use crate::capture::{Frame, Rect};
use crate::config::Config;
use crate::duplicate::{DetectionRecord, DuplicateSuppressor, DEFAULT_THRESHOLD};
use crate::events::EventKind;
use crate::matcher::Category;
use crate::team::{Side, TeamId};

const POLL: Duration = Duration::from_millis(1500);

/// KO banners linger and repeat; the same picture is ignored this long.
const KO_WINDOW: Duration = Duration::from_secs(10);

/// Border trimmed off the banner before comparing.
const BORDER: i32 = 10;

pub struct KosLoop {
    last: DuplicateSuppressor,
}

impl KosLoop {
    pub fn new() -> Self {
        Self {
            last: DuplicateSuppressor::new(KO_WINDOW, DEFAULT_THRESHOLD),
        }
    }

    fn side_of(kind: EventKind) -> Option<Side> {
        match kind {
            EventKind::Ko(side) | EventKind::KoStreak(side) => Some(side),
            _ => None,
        }
    }

    /// Credit a KO banner unless it is the one already credited.
    pub fn credit(&mut self, ctx: &Context, kind: EventKind, frame: &Frame) -> bool {
        let Some(side) = Self::side_of(kind) else {
            tracing::warn!("[KOs] {} is not a knock-out", kind);
            return false;
        };

        let inner = Rect::new(
            BORDER,
            BORDER,
            frame.width() as i32 - BORDER,
            frame.height() as i32 - BORDER,
        );
        let region = frame
            .crop(inner)
            .map(|f| f.gray)
            .unwrap_or_else(|| frame.gray.clone());
        let record = DetectionRecord::new(-1, Instant::now(), frame.gray.clone(), region);
        if self.last.is_duplicate(record, ctx.correlator.as_ref()) {
            tracing::debug!("[KOs] {} already credited", kind);
            return false;
        }

        let clock = ctx.clock();
        let team = ctx.teams.get(side.team());
        ctx.log.append(kind, &clock, -1);
        ctx.scoreboard.publish_ko(side);
        ctx.notifier
            .feed(team.id, team.color, format!("[{}] [{}] {}", clock, side, kind));
        true
    }
}

impl Default for KosLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for KosLoop {
    fn name(&self) -> &'static str {
        "kos"
    }

    fn delay(&self, _ctx: &Context) -> Duration {
        POLL
    }

    fn enabled(&self, config: &Config) -> bool {
        !config.disable_kos
    }

    fn tick(&mut self, ctx: &Context) -> Option<Duration> {
        let area = Rect::from_region(ctx.config.read().kos);
        let frame = ctx.capture(area, "KO")?;

        let templates = ctx.library.group(Category::Ko, TeamId::Game);
        let kind = ctx.classifier.matches(&frame, templates)?.event?;
        self.credit(ctx, kind, &frame);
        None
    }

    fn suspend(&mut self) {
        self.last.reset();
    }
}
