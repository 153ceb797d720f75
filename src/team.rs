//! Per-category descriptors and their per-match counters.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

use crate::capture::{Point, Rect};
use crate::duplicate::DuplicateSuppressor;

/// RGBA display color.
pub type Color = [u8; 4];

pub const PURPLE: Color = [165, 94, 234, 255];
pub const ORANGE: Color = [255, 144, 0, 255];
pub const YELLOW: Color = [252, 238, 33, 255];
pub const WHITE: Color = [255, 255, 255, 255];
pub const RED: Color = [220, 50, 47, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamId {
    Purple,
    Orange,
    /// The local player, shown as "self".
    #[serde(rename = "self")]
    Player,
    /// Energy held by the local player.
    Energy,
    /// Match-wide banners (start, end, defeats).
    Game,
    Time,
}

impl TeamId {
    pub const ALL: [TeamId; 6] = [
        TeamId::Purple,
        TeamId::Orange,
        TeamId::Player,
        TeamId::Energy,
        TeamId::Game,
        TeamId::Time,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TeamId::Purple => "purple",
            TeamId::Orange => "orange",
            TeamId::Player => "self",
            TeamId::Energy => "energy",
            TeamId::Game => "game",
            TeamId::Time => "time",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TeamId::Purple => "Purple",
            TeamId::Orange => "Orange",
            TeamId::Player => "Self",
            TeamId::Energy => "Energy",
            TeamId::Game => "Game",
            TeamId::Time => "Time",
        }
    }

    /// Category-specific acceptance, falling back to `base`.
    pub fn acceptance(&self, base: f32) -> f32 {
        match self {
            TeamId::Purple | TeamId::Orange => 0.8,
            TeamId::Player => 0.75,
            TeamId::Energy => 0.7,
            TeamId::Game | TeamId::Time => base,
        }
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the two competing sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Purple,
    Orange,
}

impl Side {
    pub fn team(&self) -> TeamId {
        match self {
            Side::Purple => TeamId::Purple,
            Side::Orange => TeamId::Orange,
        }
    }

    pub fn name(&self) -> &'static str {
        self.team().name()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.team().title())
    }
}

/// Mutable per-match state for a category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamCounters {
    /// Currently held resource count.
    pub holding: u32,
    pub killed_at: Option<Instant>,
    pub killed_with_points: bool,
    /// The last read for this category has been credited.
    pub counted: bool,
}

/// A detection category: static identity plus synchronized counters.
pub struct Team {
    pub id: TeamId,
    pub color: Color,
    delay: Duration,
    counters: Mutex<TeamCounters>,
    duplicate: Mutex<DuplicateSuppressor>,
}

impl Team {
    pub fn new(id: TeamId) -> Self {
        let (color, delay) = match id {
            TeamId::Purple => (PURPLE, Duration::from_secs(1)),
            TeamId::Orange => (ORANGE, Duration::from_secs(1)),
            TeamId::Player => (YELLOW, Duration::from_millis(250)),
            TeamId::Energy => (PURPLE, Duration::from_secs(1)),
            TeamId::Game => (WHITE, Duration::from_secs(2)),
            TeamId::Time => (WHITE, Duration::from_secs(1)),
        };

        Self {
            id,
            color,
            delay,
            counters: Mutex::new(TeamCounters::default()),
            duplicate: Mutex::new(DuplicateSuppressor::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// Base polling interval before the global rate modifier.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn acceptance(&self, base: f32) -> f32 {
        self.id.acceptance(base)
    }

    /// Area around a matched banner at `p` that holds the digits.
    pub fn crop(&self, p: Point) -> Rect {
        match self.id {
            TeamId::Player => Rect::new(p.x, p.y - 100, p.x + 300, p.y + 100),
            _ => Rect::new(p.x - 50, p.y - 30, p.x + 200, p.y + 75),
        }
    }

    /// Smaller area of a digit crop compared between reads for duplicates.
    pub fn comparable(&self) -> Rect {
        match self.id {
            TeamId::Player => Rect::new(0, 20, 225, 60),
            TeamId::Time => Rect::new(15, 30, 100, 60),
            _ => Rect::new(15, 30, 150, 60),
        }
    }

    pub fn counters(&self) -> TeamCounters {
        self.counters.lock().clone()
    }

    pub fn holding(&self) -> u32 {
        self.counters.lock().holding
    }

    /// Store a new held count, returning the previous one.
    pub fn set_holding(&self, holding: u32) -> u32 {
        std::mem::replace(&mut self.counters.lock().holding, holding)
    }

    pub fn record_defeat(&self, at: Instant, with_points: bool) {
        let mut counters = self.counters.lock();
        counters.killed_at = Some(at);
        counters.killed_with_points = with_points;
    }

    pub fn set_counted(&self, counted: bool) {
        self.counters.lock().counted = counted;
    }

    pub fn suppressor(&self) -> MutexGuard<'_, DuplicateSuppressor> {
        self.duplicate.lock()
    }

    /// Reset counters and drop the stored detection record.
    pub fn clear(&self) {
        *self.counters.lock() = TeamCounters::default();
        self.duplicate.lock().reset();
    }
}

impl fmt::Debug for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Team")
            .field("id", &self.id)
            .field("counters", &*self.counters.lock())
            .finish()
    }
}

/// Every category, created once at startup and shared by the loops.
#[derive(Debug)]
pub struct Teams {
    teams: [Team; 6],
}

impl Teams {
    pub fn new() -> Self {
        Self {
            teams: TeamId::ALL.map(Team::new),
        }
    }

    pub fn get(&self, id: TeamId) -> &Team {
        let index = TeamId::ALL
            .iter()
            .position(|t| *t == id)
            .unwrap_or_default();
        &self.teams[index]
    }

    pub fn player(&self) -> &Team {
        self.get(TeamId::Player)
    }

    pub fn energy(&self) -> &Team {
        self.get(TeamId::Energy)
    }

    pub fn clear(&self) {
        for team in &self.teams {
            team.clear();
        }
        tracing::debug!("Cleared all team counters");
    }
}

impl Default for Teams {
    fn default() -> Self {
        Self::new()
    }
}
