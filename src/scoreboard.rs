//! In-memory match tally, broadcast on the event bus.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Instant;

use crate::clock::Clock;
use crate::events::{Objective, Slot};
use crate::messaging::{EventBus, HudEvent};
use crate::team::{Side, TeamId};

/// Per-side totals for one match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub score: i64,
    pub kos: u32,
    pub regieleki: u32,
    pub regis: u32,
    pub rayquaza: u32,
}

impl Tally {
    fn secure(&mut self, objective: Objective) {
        match objective.slot() {
            Slot::Top => self.regieleki += 1,
            Slot::Bottom => self.regis += 1,
            Slot::Middle => self.rayquaza += 1,
        }
    }

    pub fn objectives(&self) -> u32 {
        self.regieleki + self.regis + self.rayquaza
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Game {
    pub purple: Tally,
    pub orange: Tally,
    #[serde(rename = "self")]
    pub own: Tally,
    /// Remaining match seconds, 0 when unknown.
    pub seconds: u32,
    pub energy: u32,
    pub defeated: bool,
    pub started: bool,
}

#[derive(Default)]
pub struct Scoreboard {
    game: Mutex<Game>,
    bus: EventBus,
}

impl Scoreboard {
    pub fn new(bus: EventBus) -> Self {
        Self {
            game: Mutex::new(Game::default()),
            bus,
        }
    }

    /// Credit `delta` to `team`. Credits to the local player also count for
    /// their side.
    pub fn publish_score(&self, team: TeamId, delta: i64) {
        {
            let mut game = self.game.lock();
            match team {
                TeamId::Purple => game.purple.score += delta,
                TeamId::Orange => game.orange.score += delta,
                TeamId::Player => {
                    game.purple.score += delta;
                    game.own.score += delta;
                }
                other => {
                    tracing::warn!("Ignoring score of {} for {}", delta, other);
                    return;
                }
            }
        }

        self.bus.publish(HudEvent::Score { team, delta });
    }

    /// Set the remaining time; a zero clock means unreadable and is ignored.
    pub fn set_time(&self, minutes: u32, seconds: u32) {
        if minutes + seconds == 0 {
            return;
        }

        self.game.lock().seconds = minutes * 60 + seconds;
        self.bus.publish(HudEvent::Time { minutes, seconds });
    }

    pub fn publish_objective(&self, side: Side, objective: Objective) {
        {
            let mut game = self.game.lock();
            match side {
                Side::Purple => game.purple.secure(objective),
                Side::Orange => game.orange.secure(objective),
            }
        }
        self.bus.publish(HudEvent::Objective { side, objective });
    }

    pub fn publish_ko(&self, side: Side) {
        {
            let mut game = self.game.lock();
            match side {
                Side::Purple => game.purple.kos += 1,
                Side::Orange => game.orange.kos += 1,
            }
        }
        self.bus.publish(HudEvent::Ko { side });
    }

    pub fn set_energy(&self, holding: u32) {
        let changed = std::mem::replace(&mut self.game.lock().energy, holding) != holding;
        if changed {
            self.bus.publish(HudEvent::Energy { holding });
        }
    }

    pub fn set_defeated(&self) {
        self.game.lock().defeated = true;
        self.bus.publish(HudEvent::Defeated { at: Instant::now() });
    }

    pub fn set_match_started(&self) {
        self.game.lock().started = true;
    }

    pub fn match_started(&self) -> bool {
        self.game.lock().started
    }

    pub fn clear(&self) {
        *self.game.lock() = Game::default();
        self.bus.publish(HudEvent::Cleared);
    }

    /// Purple, orange and own score.
    pub fn scores(&self) -> (i64, i64, i64) {
        let game = self.game.lock();
        (game.purple.score, game.orange.score, game.own.score)
    }

    pub fn seconds(&self) -> u32 {
        self.game.lock().seconds
    }

    /// Remaining time as "MM:SS".
    pub fn clock(&self) -> String {
        let seconds = self.seconds();
        Clock {
            minutes: seconds / 60,
            seconds: seconds % 60,
        }
        .to_string()
    }

    pub fn is_final_stretch(&self, threshold_secs: u32) -> bool {
        let seconds = self.seconds();
        seconds != 0 && seconds <= threshold_secs
    }

    pub fn snapshot(&self) -> Game {
        self.game.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_credit_counts_for_purple() {
        let scoreboard = Scoreboard::default();
        scoreboard.publish_score(TeamId::Orange, 20);
        scoreboard.publish_score(TeamId::Player, 6);
        scoreboard.publish_score(TeamId::Purple, 10);
        assert_eq!(scoreboard.scores(), (16, 20, 6));
    }

    #[test]
    fn test_zero_time_is_ignored() {
        let scoreboard = Scoreboard::default();
        scoreboard.set_time(1, 30);
        scoreboard.set_time(0, 0);
        assert_eq!(scoreboard.seconds(), 90);
        assert_eq!(scoreboard.clock(), "01:30");
        assert!(scoreboard.is_final_stretch(120));
    }

    #[test]
    fn test_unknown_time_is_not_final_stretch() {
        assert!(!Scoreboard::default().is_final_stretch(120));
    }

    #[test]
    fn test_objectives_by_slot() {
        let scoreboard = Scoreboard::default();
        scoreboard.publish_objective(Side::Orange, Objective::Registeel);
        scoreboard.publish_objective(Side::Orange, Objective::Regice);
        scoreboard.publish_objective(Side::Purple, Objective::Rayquaza);
        scoreboard.publish_ko(Side::Purple);

        let game = scoreboard.snapshot();
        assert_eq!(game.orange.regis, 2);
        assert_eq!(game.purple.rayquaza, 1);
        assert_eq!(game.purple.kos, 1);
        assert_eq!(game.orange.objectives(), 2);
    }

    #[test]
    fn test_clear_broadcasts() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();
        let scoreboard = Scoreboard::new(bus);

        scoreboard.publish_score(TeamId::Purple, 4);
        scoreboard.set_match_started();
        scoreboard.clear();

        assert_eq!(scoreboard.snapshot(), Game::default());
        assert!(!scoreboard.match_started());
        let events: Vec<HudEvent> = rx.try_iter().collect();
        assert_eq!(events.last(), Some(&HudEvent::Cleared));
    }

    #[test]
    fn test_snapshot_serializes_self() {
        let json = serde_json::to_string(&Game::default()).unwrap();
        assert!(json.contains("\"self\""));
    }
}
