//! Deposit confirmation for the local player.
//!
//! A drop in held energy is ambiguous: the player either scored it or was
//! defeated while carrying it. A drop only counts as a deposit when no
//! defeat-with-points was seen just before it and a fresh, unused "press to
//! score" prompt was.

use std::fmt;
use std::time::{Duration, Instant};

use super::Context;
use crate::events::{EventKind, EventLog};
use crate::notify::Notifier;
use crate::scoreboard::Scoreboard;
use crate::team::{TeamId, YELLOW};

/// A defeat this recent voids the deposit.
pub const DEFEAT_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Defeated while holding the points.
    Defeated,
    /// No unused score prompt inside the confirmation window.
    NoScoreOption,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Defeated => write!(f, "you were defeated"),
            Rejection::NoScoreOption => write!(f, "the score option was not present"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Unchanged,
    Rejected(Rejection),
    Confirmed { credited: i64 },
}

pub struct Confirmer<'a> {
    log: &'a EventLog,
    scoreboard: &'a Scoreboard,
    notifier: &'a Notifier,
    /// How far back a score prompt may be.
    delay: Duration,
    final_stretch_secs: u32,
}

impl<'a> Confirmer<'a> {
    pub fn new(
        log: &'a EventLog,
        scoreboard: &'a Scoreboard,
        notifier: &'a Notifier,
        delay: Duration,
        final_stretch_secs: u32,
    ) -> Self {
        Self {
            log,
            scoreboard,
            notifier,
            delay,
            final_stretch_secs,
        }
    }

    pub fn from_context(ctx: &'a Context) -> Self {
        let (delay, final_stretch_secs) = {
            let config = ctx.config.read();
            (config.confirm_score_delay(), config.final_stretch_secs)
        };
        Self::new(
            &ctx.log,
            &ctx.scoreboard,
            &ctx.notifier,
            delay,
            final_stretch_secs,
        )
    }

    /// Decide whether a drop from `before` to `after`, observed at `at`, was
    /// a deposit.
    pub fn confirm(&self, before: u32, after: u32, at: Instant) -> Confirmation {
        self.confirm_at(before, after, at, Instant::now())
    }

    pub fn confirm_at(&self, before: u32, after: u32, at: Instant, now: Instant) -> Confirmation {
        if before == after {
            return Confirmation::Unchanged;
        }

        let clock = self.scoreboard.clock();
        tracing::info!(
            "[{}] [Self] Confirming {} point{} scored {:?} ago",
            clock,
            before,
            plural(before),
            now.saturating_duration_since(at)
        );

        if self
            .log
            .most_recent_at(EventKind::KilledWithPoints, DEFEAT_WINDOW, now)
            .is_some()
        {
            return self.reject(Rejection::Defeated, before, &clock);
        }

        if !self.log.verify_at(EventKind::PressButtonToScore, self.delay, now) {
            return self.reject(Rejection::NoScoreOption, before, &clock);
        }

        let mut credited = before as i64;
        if self.scoreboard.is_final_stretch(self.final_stretch_secs) {
            credited *= 2;
        }

        self.scoreboard.publish_score(TeamId::Player, credited);
        self.log.append(EventKind::PostScore, &clock, credited);
        self.notifier.feed(
            TeamId::Player,
            YELLOW,
            format!("[{}] [Purple] [Self] +{}", clock, credited),
        );

        Confirmation::Confirmed { credited }
    }

    fn reject(&self, rejection: Rejection, before: u32, clock: &str) -> Confirmation {
        self.notifier.warn(format!(
            "[{}] [Self] Failed to score because {} (-{})",
            clock, rejection, before
        ));
        Confirmation::Rejected(rejection)
    }
}

pub(crate) fn plural(n: u32) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
