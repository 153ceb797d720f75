//! Match start and end banners, and what happens around them.
//!
//! A start wipes every per-match trace: scoreboard, team counters, event log.
//! An end tallies the match for the configured profile, waits out the end
//! screen when a real match just finished, then wipes again.

use std::time::Duration;

use super::{Context, Detector};
use crate::capture::Rect;
use crate::clock::{Clock, MATCH_MINUTES};
use crate::config::Profile;
use crate::events::{EventKind, EventLog};
use crate::matcher::Category;
use crate::messaging::HudEvent;
use crate::scoreboard::Tally;
use crate::team::{Side, TeamId};

/// End-of-match screen time to wait out after a real match.
pub const END_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Default)]
pub struct PhaseLoop;

impl PhaseLoop {
    pub fn new() -> Self {
        Self
    }

    /// Handle a phase banner. Returns false for anything else.
    pub fn handle(ctx: &Context, kind: EventKind) -> bool {
        match kind {
            EventKind::MatchStarting => {
                Self::start(ctx);
                true
            }
            EventKind::MatchEnding => {
                Self::end(ctx);
                true
            }
            _ => false,
        }
    }

    pub fn start(ctx: &Context) {
        // The banner lingers after the clock was seeded.
        if ctx.clock() == Clock::start().to_string() {
            tracing::debug!("[Game] Match already started");
            return;
        }

        ctx.scoreboard.clear();
        ctx.scoreboard.set_match_started();
        ctx.teams.clear();
        ctx.previews.clear();
        ctx.log.reset_with(EventKind::MatchStarting, &ctx.clock(), -1);

        ctx.notifier.system("[Game] Match starting");
        ctx.notifier.desktop("Match Starting", "Good luck!");
        ctx.notifier.bus().publish(HudEvent::MatchStarted {
            timestamp: std::time::Instant::now(),
        });

        ctx.scoreboard.set_time(MATCH_MINUTES, 0);
    }

    pub fn end(ctx: &Context) {
        Self::tally(ctx);

        let cooldown = Self::end_cooldown(&ctx.log);
        if !cooldown.is_zero() {
            tracing::info!("[Game] Waiting {:?} for the end screen", cooldown);
            if !ctx.sleep(cooldown) {
                return;
            }
        }

        ctx.scoreboard.clear();
        ctx.teams.clear();
        ctx.log.append(EventKind::MatchEnding, &ctx.clock(), -1);
    }

    /// Wait only when a match started after the previous end banner.
    pub fn end_cooldown(log: &EventLog) -> Duration {
        let forever = Duration::MAX;
        let started = log.most_recent(EventKind::MatchStarting, forever);
        let ended = log.most_recent(EventKind::MatchEnding, forever);

        match (started, ended) {
            (Some(start), Some(end)) if start.at > end.at => END_COOLDOWN,
            (Some(_), None) => END_COOLDOWN,
            _ => Duration::ZERO,
        }
    }

    fn tally(ctx: &Context) {
        let profile = ctx.config.read().profile;
        let game = ctx.scoreboard.snapshot();
        let (purple, orange, own) = ctx.scoreboard.scores();

        match profile {
            Profile::Broadcaster => {
                if !game.started {
                    return;
                }
                ctx.notifier.system("[Game] Match ended");
                Self::feed_side(ctx, Side::Purple, None, &game.purple);
                Self::feed_side(ctx, Side::Orange, None, &game.orange);
            }
            Profile::Player => {
                if purple + orange + own <= 0 {
                    return;
                }
                ctx.notifier.system("[Game] Match ended");
                Self::feed_side(ctx, Side::Purple, Some(purple), &game.purple);
                Self::feed_side(ctx, Side::Orange, Some(orange), &game.orange);

                let player = ctx.teams.player();
                ctx.notifier
                    .feed(TeamId::Player, player.color, format!("[Self] {}", own));

                ctx.history.add(purple, orange, own);
            }
        }

        ctx.notifier.bus().publish(HudEvent::MatchEnded {
            timestamp: std::time::Instant::now(),
            purple,
            orange,
            own,
        });
    }

    fn feed_side(ctx: &Context, side: Side, score: Option<i64>, tally: &Tally) {
        let team = ctx.teams.get(side.team());
        let score = score.map(|s| format!(" {}", s)).unwrap_or_default();
        ctx.notifier.feed(
            team.id,
            team.color,
            format!(
                "[{}]{} [+{} KO{}] [+{} Regieleki{}] [+{} Regi{}] [+{} Rayquaza{}]",
                side,
                score,
                tally.kos,
                plural(tally.kos),
                tally.regieleki,
                plural(tally.regieleki),
                tally.regis,
                plural(tally.regis),
                tally.rayquaza,
                plural(tally.rayquaza),
            ),
        );
    }
}

fn plural(n: u32) -> &'static str {
    super::confirm::plural(n)
}

impl Detector for PhaseLoop {
    fn name(&self) -> &'static str {
        "phase"
    }

    fn delay(&self, ctx: &Context) -> Duration {
        ctx.teams.get(TeamId::Game).delay()
    }

    fn tick(&mut self, ctx: &Context) -> Option<Duration> {
        let area = Rect::from_region(ctx.config.read().phase);
        let frame = ctx.capture(area, "match phase")?;

        let templates = ctx.library.group(Category::Game, TeamId::Game);
        let kind = ctx.classifier.matches(&frame, templates)?.event?;
        if !Self::handle(ctx, kind) {
            tracing::warn!("[Game] Unexpected phase banner {}", kind);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::testing::{context, Scripted};
    use crate::detect::PreviewSlot;
    use crate::events::{MatchPhase, Objective};
    use crate::matcher::TemplateLibrary;
    use std::sync::Arc;
    use std::time::Instant;

    fn setup() -> (Arc<Scripted>, Context) {
        let classifier = Arc::new(Scripted::default());
        let ctx = context(classifier.clone(), TemplateLibrary::new());
        (classifier, ctx)
    }

    #[test]
    fn test_start_resets_everything() {
        let (classifier, ctx) = setup();
        ctx.scoreboard.publish_score(TeamId::Orange, 30);
        ctx.teams.energy().set_holding(9);
        ctx.teams.player().record_defeat(Instant::now(), true);
        ctx.log.append(EventKind::PostScore, "03:00", 9);
        ctx.log.append(EventKind::Killed, "02:59", -1);

        classifier.push_match(Some(EventKind::MatchStarting));
        PhaseLoop::new().tick(&ctx);

        assert_eq!(ctx.scoreboard.scores(), (0, 0, 0));
        assert_eq!(ctx.teams.energy().holding(), 0);
        assert!(ctx.teams.player().counters().killed_at.is_none());
        assert_eq!(ctx.log.len(), 1);
        assert_eq!(ctx.log.phase(), MatchPhase::Starting);
        assert_eq!(ctx.scoreboard.clock(), "10:00");
        assert!(ctx.scoreboard.match_started());
    }

    #[test]
    fn test_start_drops_previews_of_last_match() {
        let (_classifier, ctx) = setup();
        ctx.previews
            .set(PreviewSlot::Energy, image::RgbaImage::new(4, 4));
        ctx.previews
            .set(PreviewSlot::Score(Side::Orange), image::RgbaImage::new(4, 4));

        PhaseLoop::start(&ctx);
        assert!(ctx.previews.get(PreviewSlot::Energy).is_none());
        assert!(ctx.previews.get(PreviewSlot::Score(Side::Orange)).is_none());
    }

    #[test]
    fn test_lingering_start_banner_is_ignored() {
        let (_classifier, ctx) = setup();
        PhaseLoop::start(&ctx);
        ctx.log.append(EventKind::HoldingEnergy, "10:00", 2);

        PhaseLoop::start(&ctx);
        assert_eq!(ctx.log.len(), 2);
    }

    #[test]
    fn test_player_end_records_history() {
        let (_classifier, ctx) = setup();
        PhaseLoop::start(&ctx);
        ctx.scoreboard.publish_score(TeamId::Purple, 120);
        ctx.scoreboard.publish_score(TeamId::Orange, 80);
        ctx.scoreboard.publish_score(TeamId::Player, 25);
        ctx.scoreboard.publish_objective(Side::Purple, Objective::Rayquaza);

        PhaseLoop::end(&ctx);

        let records = ctx.history.records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            (records[0].purple, records[0].orange, records[0].own),
            (145, 80, 25)
        );
    }

    #[test]
    fn test_shutdown_during_end_screen_keeps_state() {
        let (_classifier, ctx) = setup();
        PhaseLoop::start(&ctx);
        ctx.scoreboard.publish_score(TeamId::Orange, 40);

        PhaseLoop::end(&ctx);
        assert_eq!(ctx.scoreboard.scores(), (0, 40, 0));
        assert!(ctx
            .log
            .most_recent(EventKind::MatchEnding, Duration::from_secs(5))
            .is_none());
    }

    #[test]
    fn test_broadcaster_end_skips_history() {
        let (_classifier, ctx) = setup();
        ctx.config.write().profile = Profile::Broadcaster;
        PhaseLoop::start(&ctx);
        ctx.scoreboard.publish_ko(Side::Orange);

        PhaseLoop::end(&ctx);
        assert!(ctx.history.is_empty());
    }

    #[test]
    fn test_end_without_scores_is_not_tallied() {
        let (_classifier, ctx) = setup();
        ctx.teams.energy().set_holding(4);
        PhaseLoop::end(&ctx);
        assert!(ctx.history.is_empty());
        assert_eq!(ctx.teams.energy().holding(), 0);
        assert!(ctx
            .log
            .most_recent(EventKind::MatchEnding, Duration::from_secs(5))
            .is_some());
    }

    #[test]
    fn test_end_cooldown_only_after_real_match() {
        let log = EventLog::new();
        assert_eq!(PhaseLoop::end_cooldown(&log), Duration::ZERO);

        log.append(EventKind::MatchStarting, "10:00", -1);
        assert_eq!(PhaseLoop::end_cooldown(&log), END_COOLDOWN);

        log.append(EventKind::MatchEnding, "00:00", -1);
        assert_eq!(PhaseLoop::end_cooldown(&log), Duration::ZERO);
    }
}
