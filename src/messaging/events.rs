/// Event types published by the detection runtime
///
/// Events represent things that have happened (past tense).
/// They are broadcast to all subscribers.
use std::time::Instant;

use crate::events::Objective;
use crate::team::{Color, Side, TeamId};

/// Runtime events
#[derive(Debug, Clone, PartialEq)]
pub enum HudEvent {
    /// A line for the activity feed
    Feed {
        team: TeamId,
        color: Color,
        message: String,
    },

    /// A desktop notification request
    Desktop { title: String, body: String },

    /// A score was credited (negative to retract)
    Score { team: TeamId, delta: i64 },

    /// Match clock changed
    Time { minutes: u32, seconds: u32 },

    /// An objective was secured
    Objective { side: Side, objective: Objective },

    /// A knock-out was credited
    Ko { side: Side },

    /// Held energy changed
    Energy { holding: u32 },

    /// The local player was defeated
    Defeated { at: Instant },

    MatchStarted { timestamp: Instant },

    MatchEnded {
        timestamp: Instant,
        purple: i64,
        orange: i64,
        own: i64,
    },

    /// Scoreboard was reset
    Cleared,

    /// The runtime is shutting down
    Shutdown,
}
