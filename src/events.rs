//! Append-only, newest-first log of classified game events.
//!
//! Every loop writes here and reads from here: the deposit confirmation looks
//! for defeats written by the defeated loop, objective cooldowns are windowed
//! queries, and the match phase is derived from the most recent start/end
//! banners. The log is a cheap `Clone` handle onto one shared, locked deque.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::team::Side;

/// Loops append roughly in wall-clock order; tolerate this much reordering.
const SKEW_TOLERANCE: Duration = Duration::from_millis(500);

/// How long after a phase banner the phase is reported as transitional.
const PHASE_TRANSITION: Duration = Duration::from_secs(10);

/// Map objectives, grouped by the screen slot that announces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Objective {
    Regieleki,
    Regice,
    Regirock,
    Registeel,
    Rayquaza,
}

/// Independent objective announcement slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Slot {
    Top,
    Bottom,
    Middle,
}

impl Objective {
    pub const ALL: [Objective; 5] = [
        Objective::Regieleki,
        Objective::Regice,
        Objective::Regirock,
        Objective::Registeel,
        Objective::Rayquaza,
    ];

    pub fn slot(&self) -> Slot {
        match self {
            Objective::Regieleki => Slot::Top,
            Objective::Regice | Objective::Regirock | Objective::Registeel => Slot::Bottom,
            Objective::Rayquaza => Slot::Middle,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Objective::Regieleki => "regieleki",
            Objective::Regice => "regice",
            Objective::Regirock => "regirock",
            Objective::Registeel => "registeel",
            Objective::Rayquaza => "rayquaza",
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::Regieleki => f.write_str("Regieleki"),
            Objective::Regice => f.write_str("Regice"),
            Objective::Regirock => f.write_str("Regirock"),
            Objective::Registeel => f.write_str("Registeel"),
            Objective::Rayquaza => f.write_str("Rayquaza"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    PreScore,
    PostScore,
    Killed,
    KilledWithPoints,
    KilledWithoutPoints,
    MatchStarting,
    MatchEnding,
    HoldingEnergy,
    Scored(Side),
    ScoreMissed(Side),
    ScoreOverride,
    PressButtonToScore,
    Secured(Objective, Side),
    Ko(Side),
    KoStreak(Side),
}

impl EventKind {
    pub fn is_defeat(&self) -> bool {
        matches!(
            self,
            EventKind::Killed | EventKind::KilledWithPoints | EventKind::KilledWithoutPoints
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::PreScore => write!(f, "Pre score"),
            EventKind::PostScore => write!(f, "Post score"),
            EventKind::Killed => write!(f, "Defeated"),
            EventKind::KilledWithPoints => write!(f, "Defeated with points"),
            EventKind::KilledWithoutPoints => write!(f, "Defeated without points"),
            EventKind::MatchStarting => write!(f, "Match Starting"),
            EventKind::MatchEnding => write!(f, "Match Ending"),
            EventKind::HoldingEnergy => write!(f, "Holding Energy"),
            EventKind::Scored(side) => write!(f, "{side} Scored"),
            EventKind::ScoreMissed(side) => write!(f, "{side} score missed"),
            EventKind::ScoreOverride => write!(f, "Override"),
            EventKind::PressButtonToScore => write!(f, "Press button to score"),
            EventKind::Secured(objective, side) => write!(f, "{objective} Secured ({side})"),
            EventKind::Ko(side) => write!(f, "+1 KO ({side})"),
            EventKind::KoStreak(side) => write!(f, "KO Streak ({side})"),
        }
    }
}

/// Parses template event names such as `killed_with_points` or
/// `regice_secure_purple`.
impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let side_of = |suffix: &str| match suffix {
            "purple" => Some(Side::Purple),
            "orange" => Some(Side::Orange),
            _ => None,
        };

        let kind = match name.as_str() {
            "pre_score" => EventKind::PreScore,
            "post_score" => EventKind::PostScore,
            "killed" => EventKind::Killed,
            "killed_with_points" => EventKind::KilledWithPoints,
            "killed_without_points" => EventKind::KilledWithoutPoints,
            "match_starting" => EventKind::MatchStarting,
            "match_ending" => EventKind::MatchEnding,
            "holding_energy" => EventKind::HoldingEnergy,
            "score_override" => EventKind::ScoreOverride,
            "press_button_to_score" => EventKind::PressButtonToScore,
            other => {
                let (head, tail) = other.rsplit_once('_').ok_or_else(|| s.to_string())?;
                let side = side_of(tail).ok_or_else(|| s.to_string())?;
                match head {
                    "scored" => EventKind::Scored(side),
                    "score_missed" => EventKind::ScoreMissed(side),
                    "ko" => EventKind::Ko(side),
                    "ko_streak" => EventKind::KoStreak(side),
                    secure => {
                        let objective = secure
                            .strip_suffix("_secure")
                            .and_then(|o| Objective::ALL.into_iter().find(|x| x.name() == o))
                            .ok_or_else(|| s.to_string())?;
                        EventKind::Secured(objective, side)
                    }
                }
            }
        };

        Ok(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub at: Instant,
    /// Match clock when the event was logged, "MM:SS".
    pub clock: String,
    pub value: i64,
    /// Consumed by a confirmation.
    pub verified: bool,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.clock, self.kind)?;
        if self.value != -1 {
            write!(f, " ({})", self.value)?;
        }
        if self.verified {
            write!(f, " (Verified)")?;
        }
        Ok(())
    }
}

/// Match lifecycle derived from the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Idle,
    Starting,
    InProgress,
    Ending,
}

#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<RwLock<VecDeque<Event>>>,
    /// Bumped whenever the log is wiped.
    generation: Arc<AtomicU64>,
    capacity: usize,
}

impl EventLog {
    /// Unbounded log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log keeping at most `capacity` events; 0 is unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(VecDeque::new())),
            generation: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    pub fn append(&self, kind: EventKind, clock: &str, value: i64) {
        self.append_at(kind, clock, value, Instant::now());
    }

    pub fn append_at(&self, kind: EventKind, clock: &str, value: i64, at: Instant) {
        let mut events = self.events.write();
        Self::push(&mut events, self.capacity, kind, clock, value, at);
        tracing::debug!("[Event] [{}] {} ({})", clock, kind, value);
    }

    /// Clear the log and append `kind` under one lock, so no other loop can
    /// slip an event in between.
    pub fn reset_with(&self, kind: EventKind, clock: &str, value: i64) {
        let mut events = self.events.write();
        events.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
        Self::push(&mut events, self.capacity, kind, clock, value, Instant::now());
    }

    fn push(
        events: &mut VecDeque<Event>,
        capacity: usize,
        kind: EventKind,
        clock: &str,
        value: i64,
        at: Instant,
    ) {
        events.push_front(Event {
            kind,
            at,
            clock: clock.to_string(),
            value,
            verified: false,
        });
        if capacity > 0 {
            events.truncate(capacity);
        }
    }

    pub fn clear(&self) {
        let mut events = self.events.write();
        events.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Changes every time the log is cleared, so a loop can tell that the
    /// match it was tracking is gone.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Events of `kind` logged within `window`, newest first.
    pub fn occurred_within(&self, kind: EventKind, window: Duration) -> Vec<Event> {
        self.occurred_within_at(kind, window, Instant::now())
    }

    pub fn occurred_within_at(&self, kind: EventKind, window: Duration, now: Instant) -> Vec<Event> {
        let events = self.events.read();
        Self::scan(&events, window, now)
            .filter(|(_, event)| event.kind == kind)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Newest event of `kind` within `window`.
    pub fn most_recent(&self, kind: EventKind, window: Duration) -> Option<Event> {
        self.most_recent_at(kind, window, Instant::now())
    }

    pub fn most_recent_at(&self, kind: EventKind, window: Duration, now: Instant) -> Option<Event> {
        let events = self.events.read();
        let found = Self::scan(&events, window, now)
            .find(|(_, event)| event.kind == kind)
            .map(|(_, event)| event.clone());
        found
    }

    /// Newest event within `window` whose kind satisfies `predicate`.
    pub fn any_within<F>(&self, window: Duration, predicate: F) -> Option<Event>
    where
        F: Fn(&EventKind) -> bool,
    {
        self.any_within_at(window, Instant::now(), predicate)
    }

    pub fn any_within_at<F>(&self, window: Duration, now: Instant, predicate: F) -> Option<Event>
    where
        F: Fn(&EventKind) -> bool,
    {
        let events = self.events.read();
        let found = Self::scan(&events, window, now)
            .find(|(_, event)| predicate(&event.kind))
            .map(|(_, event)| event.clone());
        found
    }

    /// Mark the newest unverified event of `kind` within `window` as
    /// verified. Returns false when there is none.
    pub fn verify(&self, kind: EventKind, window: Duration) -> bool {
        self.verify_at(kind, window, Instant::now())
    }

    pub fn verify_at(&self, kind: EventKind, window: Duration, now: Instant) -> bool {
        let mut events = self.events.write();
        let index = Self::scan(&events, window, now)
            .find(|(_, event)| event.kind == kind)
            .map(|(index, event)| (index, event.verified));

        match index {
            Some((index, false)) => {
                events[index].verified = true;
                true
            }
            _ => false,
        }
    }

    /// Derive the match phase from the newest start and end banners.
    pub fn phase(&self) -> MatchPhase {
        self.phase_at(Instant::now())
    }

    pub fn phase_at(&self, now: Instant) -> MatchPhase {
        let events = self.events.read();
        let newest = |kind: EventKind| events.iter().find(|e| e.kind == kind).map(|e| e.at);

        match (newest(EventKind::MatchStarting), newest(EventKind::MatchEnding)) {
            (None, None) => MatchPhase::Idle,
            (Some(start), end) if end.map_or(true, |end| start > end) => {
                if now.saturating_duration_since(start) < PHASE_TRANSITION {
                    MatchPhase::Starting
                } else {
                    MatchPhase::InProgress
                }
            }
            (_, Some(end)) => {
                if now.saturating_duration_since(end) < PHASE_TRANSITION {
                    MatchPhase::Ending
                } else {
                    MatchPhase::Idle
                }
            }
            (Some(_), None) => MatchPhase::InProgress,
        }
    }

    /// Oldest-first, human-readable history.
    pub fn dump(&self) -> Vec<String> {
        self.events.read().iter().rev().map(|e| e.to_string()).collect()
    }

    /// Walk newest-first over events within `window` of `now`.
    ///
    /// Stops at the first event older than the window plus the skew
    /// tolerance; slightly out-of-order stragglers are skipped, not returned.
    fn scan(
        events: &VecDeque<Event>,
        window: Duration,
        now: Instant,
    ) -> impl Iterator<Item = (usize, &Event)> {
        let horizon = window.saturating_add(SKEW_TOLERANCE);
        events
            .iter()
            .enumerate()
            .take_while(move |(_, event)| now.saturating_duration_since(event.at) <= horizon)
            .filter(move |(_, event)| now.saturating_duration_since(event.at) <= window)
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ago(now: Instant, secs: u64) -> Instant {
        now.checked_sub(Duration::from_secs(secs)).unwrap_or(now)
    }

    fn ago_ms(now: Instant, millis: u64) -> Instant {
        now.checked_sub(Duration::from_millis(millis)).unwrap_or(now)
    }

    #[test]
    fn test_occurred_within_newest_first() {
        let log = EventLog::new();
        let now = Instant::now();
        log.append_at(EventKind::HoldingEnergy, "09:00", 1, ago(now, 90));
        log.append_at(EventKind::HoldingEnergy, "08:40", 2, ago(now, 40));
        log.append_at(EventKind::PostScore, "08:35", 2, ago(now, 35));
        log.append_at(EventKind::HoldingEnergy, "08:30", 3, ago(now, 30));

        let events = log.occurred_within_at(EventKind::HoldingEnergy, Duration::from_secs(60), now);
        let values: Vec<i64> = events.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![3, 2]);
    }

    #[test]
    fn test_clear_empties_queries() {
        let log = EventLog::new();
        log.append(EventKind::PostScore, "05:00", 4);
        log.clear();
        assert!(log.is_empty());
        assert!(log
            .occurred_within(EventKind::PostScore, Duration::from_secs(60))
            .is_empty());
    }

    #[test]
    fn test_small_reordering_tolerated() {
        let log = EventLog::new();
        let now = Instant::now();
        // A slow loop appends an older event after a newer one.
        log.append_at(EventKind::Killed, "05:00", -1, ago_ms(now, 1000));
        log.append_at(EventKind::PostScore, "05:00", 3, now);
        log.append_at(EventKind::HoldingEnergy, "05:00", 0, ago_ms(now, 2300));

        let window = Duration::from_secs(2);
        assert!(log.most_recent_at(EventKind::Killed, window, now).is_some());
        assert!(log
            .most_recent_at(EventKind::HoldingEnergy, window, now)
            .is_none());
        assert!(log
            .any_within_at(window, now, |kind| kind.is_defeat())
            .is_some());
    }

    #[test]
    fn test_stale_straggler_ends_scan() {
        let log = EventLog::new();
        let now = Instant::now();
        log.append_at(EventKind::Killed, "05:00", -1, ago_ms(now, 1000));
        log.append_at(EventKind::HoldingEnergy, "05:00", 0, ago_ms(now, 5000));

        assert!(log
            .most_recent_at(EventKind::Killed, Duration::from_secs(2), now)
            .is_none());
        assert!(log
            .most_recent_at(EventKind::Killed, Duration::from_secs(6), now)
            .is_some());
    }

    #[test]
    fn test_verify_consumes_once() {
        let log = EventLog::new();
        log.append(EventKind::PressButtonToScore, "03:00", 5);

        let window = Duration::from_secs(5);
        assert!(log.verify(EventKind::PressButtonToScore, window));
        assert!(!log.verify(EventKind::PressButtonToScore, window));
        assert!(log
            .most_recent(EventKind::PressButtonToScore, window)
            .is_some_and(|e| e.verified));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let log = EventLog::with_capacity(2);
        log.append(EventKind::HoldingEnergy, "01:00", 1);
        log.append(EventKind::HoldingEnergy, "01:00", 2);
        log.append(EventKind::HoldingEnergy, "01:00", 3);
        assert_eq!(log.len(), 2);
        assert_eq!(log.dump(), vec!["[01:00] Holding Energy (2)", "[01:00] Holding Energy (3)"]);
    }

    #[test]
    fn test_reset_with_leaves_single_event() {
        let log = EventLog::new();
        log.append(EventKind::PostScore, "02:00", 2);
        log.append(EventKind::Killed, "02:00", -1);
        let before = log.generation();
        log.reset_with(EventKind::MatchStarting, "10:00", -1);
        assert_eq!(log.len(), 1);
        assert_ne!(log.generation(), before);
        assert_eq!(log.clone().generation(), log.generation());
        assert!(log
            .most_recent(EventKind::MatchStarting, Duration::from_secs(1))
            .is_some());
    }

    #[test]
    fn test_phase_derivation() {
        let log = EventLog::new();
        let now = Instant::now();
        assert_eq!(log.phase_at(now), MatchPhase::Idle);

        log.append_at(EventKind::MatchStarting, "10:00", -1, ago(now, 2));
        assert_eq!(log.phase_at(now), MatchPhase::Starting);
        assert_eq!(log.phase_at(now + Duration::from_secs(60)), MatchPhase::InProgress);

        log.append_at(EventKind::MatchEnding, "00:00", -1, now);
        assert_eq!(log.phase_at(now), MatchPhase::Ending);
        assert_eq!(log.phase_at(now + Duration::from_secs(60)), MatchPhase::Idle);
    }

    #[test]
    fn test_event_kind_from_template_name() {
        assert_eq!("killed_with_points".parse(), Ok(EventKind::KilledWithPoints));
        assert_eq!(
            "regice_secure_purple".parse(),
            Ok(EventKind::Secured(Objective::Regice, Side::Purple))
        );
        assert_eq!("ko_streak_orange".parse(), Ok(EventKind::KoStreak(Side::Orange)));
        assert_eq!("scored_purple".parse(), Ok(EventKind::Scored(Side::Purple)));
        assert!("banana_secure_purple".parse::<EventKind>().is_err());
        assert!("nonsense".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_objective_slots() {
        assert_eq!(Objective::Regieleki.slot(), Slot::Top);
        assert_eq!(Objective::Registeel.slot(), Slot::Bottom);
        assert_eq!(Objective::Rayquaza.slot(), Slot::Middle);
    }
}
