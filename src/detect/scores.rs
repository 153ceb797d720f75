//! Team score banners.

use std::time::Duration;

use super::{Context, Detector, PreviewSlot};
use crate::capture::{Frame, Rect};
use crate::config::Config;
use crate::events::EventKind;
use crate::matcher::{Classification, Outcome};
use crate::team::Side;

pub struct ScoresLoop {
    side: Side,
}

impl ScoresLoop {
    pub fn new(side: Side) -> Self {
        Self { side }
    }

    /// Act on one classified score read.
    pub fn handle(&self, ctx: &Context, read: Classification, frame: &Frame) {
        let team = ctx.teams.get(self.side.team());
        let clock = ctx.clock();
        let value = read.value;

        match read.outcome {
            Outcome::NotFound => {}
            Outcome::Override { replaces } => {
                ctx.log.append(EventKind::ScoreOverride, &clock, value);
                ctx.scoreboard.publish_score(team.id, -replaces);
                ctx.notifier.feed(
                    team.id,
                    team.color,
                    format!("[{}] [{}] -{} (override)", clock, self.side, replaces),
                );
                self.credit(ctx, value, &clock);
                self.snapshot(ctx, read, frame);
            }
            Outcome::Found => {
                self.credit(ctx, value, &clock);
                self.snapshot(ctx, read, frame);
            }
            Outcome::Missed => {
                ctx.scoreboard.publish_score(team.id, value);
                ctx.log.append(EventKind::ScoreMissed(self.side), &clock, value);
                ctx.notifier
                    .warn(format!("[{}] [{}] +{} (missed)", clock, self.side, value));
            }
            Outcome::Invalid => {
                ctx.notifier
                    .error(format!("[{}] [{}] +{} (invalid)", clock, self.side, value));
            }
            Outcome::Duplicate => {
                tracing::debug!("[{}] [{}] +{} (duplicate)", clock, self.side, value);
            }
        }
    }

    fn credit(&self, ctx: &Context, value: i64, clock: &str) {
        let team = ctx.teams.get(self.side.team());
        ctx.scoreboard.publish_score(team.id, value);
        ctx.log.append(EventKind::Scored(self.side), clock, value);
        team.set_counted(true);
        ctx.notifier.feed(
            team.id,
            team.color,
            format!("[{}] [{}] +{}", clock, self.side, value),
        );
    }

    fn snapshot(&self, ctx: &Context, read: Classification, frame: &Frame) {
        let team = ctx.teams.get(self.side.team());
        let area = read
            .point
            .map(|p| team.crop(p))
            .unwrap_or_else(|| frame.bounds());
        if let Some(crop) = frame.crop(area) {
            ctx.previews.set(PreviewSlot::Score(self.side), crop.rgba);
        }
    }
}

impl Detector for ScoresLoop {
    fn name(&self) -> &'static str {
        self.side.name()
    }

    fn delay(&self, ctx: &Context) -> Duration {
        ctx.teams.get(self.side.team()).delay()
    }

    fn enabled(&self, config: &Config) -> bool {
        !config.disable_scoring
    }

    fn tick(&mut self, ctx: &Context) -> Option<Duration> {
        let area = Rect::from_region(ctx.config.read().scores);
        let frame = ctx.capture(area, "score")?;

        let read = ctx.classifier.score(&frame, ctx.teams.get(self.side.team()));
        self.handle(ctx, read, &frame);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testing::{context, Scripted};
    use crate::matcher::TemplateLibrary;
    use std::sync::Arc;

    fn setup() -> (Arc<Scripted>, Context) {
        let classifier = Arc::new(Scripted::default());
        let ctx = context(classifier.clone(), TemplateLibrary::new());
        (classifier, ctx)
    }

    #[test]
    fn test_found_is_credited_and_logged() {
        let (classifier, ctx) = setup();
        classifier
            .scores
            .lock()
            .push_back(Classification::new(Outcome::Found, 12));

        ScoresLoop::new(Side::Orange).tick(&ctx);

        assert_eq!(ctx.scoreboard.scores(), (0, 12, 0));
        let logged = ctx
            .log
            .occurred_within(EventKind::Scored(Side::Orange), Duration::from_secs(5));
        assert_eq!(logged.len(), 1);
        assert!(ctx.teams.get(Side::Orange.team()).counters().counted);
        assert!(ctx.previews.get(PreviewSlot::Score(Side::Orange)).is_some());
    }

    #[test]
    fn test_override_retracts_previous_credit() {
        let (classifier, ctx) = setup();
        let mut scores = classifier.scores.lock();
        scores.push_back(Classification::new(Outcome::Found, 5));
        scores.push_back(Classification::new(Outcome::Override { replaces: 5 }, 50));
        drop(scores);

        let mut detector = ScoresLoop::new(Side::Purple);
        detector.tick(&ctx);
        detector.tick(&ctx);

        assert_eq!(ctx.scoreboard.scores().0, 50);
        assert!(ctx
            .log
            .most_recent(EventKind::ScoreOverride, Duration::from_secs(5))
            .is_some());
    }

    #[test]
    fn test_duplicate_and_invalid_are_not_published() {
        let (classifier, ctx) = setup();
        let mut scores = classifier.scores.lock();
        scores.push_back(Classification::new(Outcome::Duplicate, 8));
        scores.push_back(Classification::new(Outcome::Invalid, 250));
        drop(scores);

        let mut detector = ScoresLoop::new(Side::Purple);
        detector.tick(&ctx);
        detector.tick(&ctx);

        assert_eq!(ctx.scoreboard.scores(), (0, 0, 0));
        assert!(ctx.log.is_empty());
    }

    #[test]
    fn test_missed_is_published_and_flagged() {
        let (classifier, ctx) = setup();
        classifier
            .scores
            .lock()
            .push_back(Classification::new(Outcome::Missed, 19));

        ScoresLoop::new(Side::Purple).tick(&ctx);

        assert_eq!(ctx.scoreboard.scores().0, 19);
        assert!(ctx
            .log
            .most_recent(EventKind::ScoreMissed(Side::Purple), Duration::from_secs(5))
            .is_some());
    }
}
