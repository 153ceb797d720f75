//! Results of matches watched this session.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchResult {
    Won,
    Lost,
    Tied,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchResult::Won => write!(f, "Won"),
            MatchResult::Lost => write!(f, "Lost"),
            MatchResult::Tied => write!(f, "Tied"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub purple: i64,
    pub orange: i64,
    #[serde(rename = "self")]
    pub own: i64,
    pub ended_at: SystemTime,
}

impl MatchRecord {
    /// Result from the purple side's point of view.
    pub fn outcome(&self) -> MatchResult {
        match self.purple.cmp(&self.orange) {
            std::cmp::Ordering::Greater => MatchResult::Won,
            std::cmp::Ordering::Less => MatchResult::Lost,
            std::cmp::Ordering::Equal => MatchResult::Tied,
        }
    }
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} - {} - {}",
            self.outcome(),
            self.purple,
            self.orange,
            self.own
        )
    }
}

#[derive(Debug, Default)]
pub struct MatchHistory {
    matches: Mutex<Vec<MatchRecord>>,
}

impl MatchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, purple: i64, orange: i64, own: i64) {
        let record = MatchRecord {
            purple,
            orange,
            own,
            ended_at: SystemTime::now(),
        };
        tracing::info!("[History] {}", record);
        self.matches.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.matches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.lock().is_empty()
    }

    pub fn records(&self) -> Vec<MatchRecord> {
        self.matches.lock().clone()
    }

    /// One line per recorded match, oldest first.
    pub fn dump(&self) -> Vec<String> {
        self.matches.lock().iter().map(|m| m.to_string()).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.matches.lock())
    }
}
