//! Latest images for a live preview.

use image::RgbaImage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use super::{Context, Detector};
use crate::config::Config;
use crate::team::Side;

const REFRESH: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewSlot {
    Screen,
    Score(Side),
    Energy,
    Time,
}

/// Most recent snapshot per slot.
#[derive(Default)]
pub struct Previews {
    images: Mutex<HashMap<PreviewSlot, RgbaImage>>,
}

impl Previews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, slot: PreviewSlot, image: RgbaImage) {
        self.images.lock().insert(slot, image);
    }

    pub fn get(&self, slot: PreviewSlot) -> Option<RgbaImage> {
        self.images.lock().get(&slot).cloned()
    }

    pub fn clear(&self) {
        self.images.lock().clear();
    }
}

/// Refreshes the full-screen preview.
#[derive(Default)]
pub struct PreviewLoop;

impl PreviewLoop {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for PreviewLoop {
    fn name(&self) -> &'static str {
        "preview"
    }

    fn delay(&self, _ctx: &Context) -> Duration {
        REFRESH
    }

    fn enabled(&self, config: &Config) -> bool {
        !config.disable_previews
    }

    fn tick(&mut self, ctx: &Context) -> Option<Duration> {
        match ctx.source.capture_screen() {
            Ok(frame) => ctx.previews.set(PreviewSlot::Screen, frame.rgba),
            Err(err) => tracing::warn!("Failed to capture preview: {}", err),
        }
        None
    }
}
