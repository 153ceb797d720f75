//! Defeat banners for the local player.

use std::time::{Duration, Instant};

use super::{Context, Detector};
use crate::capture::Rect;
use crate::config::Config;
use crate::events::EventKind;
use crate::matcher::{Category, Template};
use crate::team::TeamId;

const POLL: Duration = Duration::from_secs(1);

/// A defeat this recent marks the player as defeated on the scoreboard.
const DEFEATED_WINDOW: Duration = Duration::from_secs(60);

#[derive(Default)]
pub struct DefeatedLoop {
    area: Option<Rect>,
    /// Banners that may still trigger during this life.
    remaining: Option<Vec<Template>>,
    /// Log generation `remaining` belongs to.
    generation: u64,
}

impl DefeatedLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Middle third of the screen, below its vertical center.
    pub fn area_for(screen: Rect) -> Rect {
        let (w, h) = (screen.width(), screen.height());
        Rect::new(w / 3, h / 2, w - w / 3, h - h / 3)
    }

    pub fn remaining(&self) -> Option<usize> {
        self.remaining.as_ref().map(Vec::len)
    }

    fn reset(&mut self) {
        self.remaining = None;
    }
}

impl Detector for DefeatedLoop {
    fn name(&self) -> &'static str {
        "defeated"
    }

    fn delay(&self, _ctx: &Context) -> Duration {
        POLL
    }

    fn enabled(&self, config: &Config) -> bool {
        !config.disable_defeated
    }

    fn tick(&mut self, ctx: &Context) -> Option<Duration> {
        if self.area.is_none() {
            self.area = ctx.source.bounds().map(Self::area_for);
        }
        let frame = ctx.capture(self.area?, "defeated")?;

        let generation = ctx.log.generation();
        if generation != self.generation {
            self.generation = generation;
            self.reset();
        }

        let remaining = self
            .remaining
            .get_or_insert_with(|| ctx.library.group(Category::Killed, TeamId::Game).to_vec());

        let Some(info) = ctx.classifier.matches(&frame, remaining) else {
            self.reset();
            return None;
        };
        let Some(kind) = info.event.filter(EventKind::is_defeat) else {
            tracing::warn!("[Defeated] Template {} is not a defeat", info.descriptor.source_id);
            return None;
        };

        // The banner stays up; it must not count again this life.
        remaining.retain(|t| t.descriptor.source_id != info.descriptor.source_id);

        let clock = ctx.clock();
        let holding = ctx.teams.energy().holding();
        let with_points = kind == EventKind::KilledWithPoints;

        ctx.log.append(kind, &clock, holding as i64);
        ctx.teams.player().record_defeat(Instant::now(), with_points);

        let message = if with_points {
            format!("[{}] [Self] Defeated with unscored points ({})", clock, holding)
        } else {
            format!("[{}] [Self] Defeated", clock)
        };
        ctx.notifier
            .feed(TeamId::Player, ctx.teams.player().color, message);

        if ctx
            .log
            .any_within(DEFEATED_WINDOW, EventKind::is_defeat)
            .is_some()
        {
            ctx.scoreboard.set_defeated();
        }

        None
    }

    fn suspend(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testing::{banner, context, Scripted};
    use crate::matcher::TemplateLibrary;
    use std::sync::Arc;

    fn library() -> TemplateLibrary {
        let mut library = TemplateLibrary::new();
        for (id, kind) in [
            ("killed", EventKind::Killed),
            ("killed_with_points", EventKind::KilledWithPoints),
            ("killed_without_points", EventKind::KilledWithoutPoints),
        ] {
            library.insert(Category::Killed, TeamId::Game, banner(id, kind));
        }
        library
    }

    #[test]
    fn test_area_for_1080p() {
        assert_eq!(
            DefeatedLoop::area_for(Rect::new(0, 0, 1920, 1080)),
            Rect::new(640, 540, 1280, 720)
        );
    }

    #[test]
    fn test_found_shrinks_templates_and_records_defeat() {
        let classifier = Arc::new(Scripted::default());
        let ctx = context(classifier.clone(), library());
        ctx.teams.energy().set_holding(6);
        classifier.push_match(Some(EventKind::KilledWithPoints));

        let mut detector = DefeatedLoop::new();
        detector.tick(&ctx);

        assert_eq!(detector.remaining(), Some(2));
        let counters = ctx.teams.player().counters();
        assert!(counters.killed_with_points);
        assert!(counters.killed_at.is_some());
        assert!(ctx.scoreboard.snapshot().defeated);
        assert_eq!(
            ctx.log
                .most_recent(EventKind::KilledWithPoints, Duration::from_secs(5))
                .map(|e| e.value),
            Some(6)
        );
    }

    #[test]
    fn test_non_match_restores_templates() {
        let classifier = Arc::new(Scripted::default());
        let ctx = context(classifier.clone(), library());
        classifier.push_match(Some(EventKind::Killed));
        classifier.push_match(Some(EventKind::KilledWithoutPoints));
        classifier.push_match(None);

        let mut detector = DefeatedLoop::new();
        detector.tick(&ctx);
        detector.tick(&ctx);
        assert_eq!(detector.remaining(), Some(1));

        detector.tick(&ctx);
        assert_eq!(detector.remaining(), None);
    }

    #[test]
    fn test_match_start_restores_templates() {
        let classifier = Arc::new(Scripted::default());
        let ctx = context(classifier.clone(), library());
        classifier.push_match(Some(EventKind::Killed));
        classifier.push_match(Some(EventKind::KilledWithoutPoints));

        let mut detector = DefeatedLoop::new();
        detector.tick(&ctx);
        assert_eq!(detector.remaining(), Some(2));

        ctx.log.reset_with(EventKind::MatchStarting, "10:00", -1);
        detector.tick(&ctx);

        // Searched from the full set again.
        assert_eq!(detector.remaining(), Some(2));
        assert!(ctx
            .log
            .most_recent(EventKind::KilledWithoutPoints, Duration::from_secs(5))
            .is_some());
    }

    #[test]
    fn test_suspend_restores_templates() {
        let classifier = Arc::new(Scripted::default());
        let ctx = context(classifier.clone(), library());
        classifier.push_match(Some(EventKind::Killed));

        let mut detector = DefeatedLoop::new();
        detector.tick(&ctx);
        detector.suspend();
        assert_eq!(detector.remaining(), None);
    }
}
