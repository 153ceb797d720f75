//! hudwatch: turns periodic screen captures of a game HUD into a
//! deduplicated, confirmed stream of match events.
//!
//! Capture is behind [`capture::FrameSource`], template matching behind
//! [`matcher::Correlate`] and [`matcher::Classify`], and everything the
//! loops produce goes out on a [`messaging::EventBus`].

pub mod capture;
pub mod clock;
pub mod config;
pub mod detect;
pub mod duplicate;
pub mod error;
pub mod events;
pub mod history;
pub mod matcher;
pub mod messaging;
pub mod notify;
pub mod pieces;
pub mod scoreboard;
pub mod team;
