//! Energy held by the local player.

use std::time::{Duration, Instant};

use super::confirm::{plural, Confirmation, Confirmer};
use super::{Context, Detector, PreviewSlot};
use crate::capture::{Frame, Rect};
use crate::config::Config;
use crate::events::EventKind;
use crate::matcher::Outcome;
use crate::team::TeamId;

/// How far back the last logged held count is trusted.
const HOLDING_MEMORY: Duration = Duration::from_secs(3600);

#[derive(Default)]
pub struct EnergyLoop {
    /// Held count before a drop, confirmed on the next successful read.
    pending: Option<u32>,
    /// Log generation `pending` belongs to.
    generation: u64,
}

impl EnergyLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<u32> {
        self.pending
    }

    /// Act on a held-count read of `points`.
    pub fn observe(&mut self, ctx: &Context, points: u32, frame: &Frame) -> Option<Confirmation> {
        let generation = ctx.log.generation();
        if generation != self.generation {
            // A drop from the previous match cannot be confirmed in this one.
            self.generation = generation;
            self.pending = None;
        }

        let confirmation = self
            .pending
            .take()
            .map(|before| Confirmer::from_context(ctx).confirm(before, points, Instant::now()));

        let last = ctx
            .log
            .most_recent(EventKind::HoldingEnergy, HOLDING_MEMORY)
            .map(|e| e.value);
        if last == Some(points as i64) {
            return confirmation;
        }

        let clock = ctx.clock();
        let player = ctx.teams.player();
        ctx.notifier.feed(
            TeamId::Player,
            player.color,
            format!("[{}] [Self] Holding {} point{}", clock, points, plural(points)),
        );
        ctx.log
            .append(EventKind::HoldingEnergy, &clock, points as i64);
        ctx.scoreboard.set_energy(points);
        ctx.previews.set(PreviewSlot::Energy, frame.rgba.clone());

        let previous = ctx.teams.energy().set_holding(points);
        if previous > 0 && points < previous {
            self.pending = Some(previous);
        }

        confirmation
    }
}

impl Detector for EnergyLoop {
    fn name(&self) -> &'static str {
        "energy"
    }

    fn delay(&self, ctx: &Context) -> Duration {
        ctx.teams.energy().delay()
    }

    fn enabled(&self, config: &Config) -> bool {
        !config.disable_energy
    }

    fn tick(&mut self, ctx: &Context) -> Option<Duration> {
        let area = Rect::from_region(ctx.config.read().energy);
        let frame = ctx.capture(area, "energy")?;

        let read = ctx.classifier.energy(&frame);
        if read.outcome != Outcome::Found {
            return None;
        }

        match u32::try_from(read.value) {
            Ok(points) => {
                self.observe(ctx, points, &frame);
            }
            Err(_) => tracing::warn!("[Energy] Ignoring held count {}", read.value),
        }
        None
    }

    fn suspend(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testing::{context, Scripted};
    use crate::matcher::{Classification, TemplateLibrary};
    use std::sync::Arc;

    fn setup() -> (Arc<Scripted>, Context) {
        let classifier = Arc::new(Scripted::default());
        let ctx = context(classifier.clone(), TemplateLibrary::new());
        (classifier, ctx)
    }

    fn push(classifier: &Scripted, values: &[i64]) {
        let mut energy = classifier.energy.lock();
        for &v in values {
            energy.push_back(Classification::new(Outcome::Found, v));
        }
    }

    #[test]
    fn test_change_is_logged_once() {
        let (classifier, ctx) = setup();
        push(&classifier, &[4, 4, 6]);

        let mut detector = EnergyLoop::new();
        for _ in 0..3 {
            detector.tick(&ctx);
        }

        let held = ctx
            .log
            .occurred_within(EventKind::HoldingEnergy, Duration::from_secs(5));
        let values: Vec<i64> = held.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![6, 4]);
        assert_eq!(ctx.teams.energy().holding(), 6);
        assert_eq!(ctx.scoreboard.snapshot().energy, 6);
    }

    #[test]
    fn test_drop_schedules_confirmation_on_next_read() {
        let (classifier, ctx) = setup();
        push(&classifier, &[5, 0]);

        let mut detector = EnergyLoop::new();
        detector.tick(&ctx);
        assert_eq!(detector.pending(), None);

        detector.tick(&ctx);
        assert_eq!(detector.pending(), Some(5));

        ctx.log.append(EventKind::PressButtonToScore, "05:00", 5);
        let frame = Frame::empty();
        let confirmation = detector.observe(&ctx, 0, &frame);
        assert_eq!(confirmation, Some(Confirmation::Confirmed { credited: 5 }));
        assert_eq!(ctx.scoreboard.scores(), (5, 0, 5));
    }

    #[test]
    fn test_suspend_drops_pending_confirmation() {
        let (classifier, ctx) = setup();
        push(&classifier, &[5, 0]);

        let mut detector = EnergyLoop::new();
        detector.tick(&ctx);
        detector.tick(&ctx);
        detector.suspend();
        assert_eq!(detector.pending(), None);
    }

    #[test]
    fn test_match_start_drops_pending_confirmation() {
        let (classifier, ctx) = setup();
        push(&classifier, &[5, 0, 0]);

        let mut detector = EnergyLoop::new();
        detector.tick(&ctx);
        detector.tick(&ctx);
        assert_eq!(detector.pending(), Some(5));

        ctx.log.reset_with(EventKind::MatchStarting, "10:00", -1);
        ctx.log.append(EventKind::PressButtonToScore, "09:58", 5);
        detector.tick(&ctx);

        assert_eq!(detector.pending(), None);
        assert_eq!(ctx.scoreboard.scores(), (0, 0, 0));
    }

    #[test]
    fn test_not_found_is_ignored() {
        let (_classifier, ctx) = setup();
        EnergyLoop::new().tick(&ctx);
        assert!(ctx.log.is_empty());
    }
}
