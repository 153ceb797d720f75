use image::{DynamicImage, GrayImage, RgbaImage};
use parking_lot::Mutex;
use xcap::Monitor;

use crate::error::CaptureError;

/// A point in frame coordinates. May be negative before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Represents a screen region as half-open `[min, max)` corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: Point::new(x0, y0),
            max: Point::new(x1, y1),
        }
    }

    /// Build from a config region `[x, y, width, height]`.
    pub fn from_region(region: [u32; 4]) -> Self {
        let [x, y, w, h] = region.map(|v| v.min(i32::MAX as u32) as i32);
        Self::new(x, y, x.saturating_add(w), y.saturating_add(h))
    }

    pub fn width(&self) -> i32 {
        (self.max.x - self.min.x).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.max.y - self.min.y).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let r = Rect::new(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
        );
        if r.is_empty() {
            Rect::default()
        } else {
            r
        }
    }

    /// True when `self` lies entirely inside `outer`.
    pub fn within(&self, outer: &Rect) -> bool {
        self.min.x >= outer.min.x
            && self.min.y >= outer.min.y
            && self.max.x <= outer.max.x
            && self.max.y <= outer.max.y
    }

    pub fn as_array(&self) -> [i32; 4] {
        [self.min.x, self.min.y, self.max.x, self.max.y]
    }
}

/// A captured screen region.
///
/// `gray` is the decoded matrix used for correlation; `rgba` is the source
/// image kept for previews.
#[derive(Debug, Clone)]
pub struct Frame {
    pub rgba: RgbaImage,
    pub gray: GrayImage,
}

impl Frame {
    pub fn new(rgba: RgbaImage) -> Self {
        let gray = image::imageops::grayscale(&rgba);
        Self { rgba, gray }
    }

    pub fn from_gray(gray: GrayImage) -> Self {
        let rgba = DynamicImage::ImageLuma8(gray.clone()).to_rgba8();
        Self { rgba, gray }
    }

    pub fn empty() -> Self {
        Self::from_gray(GrayImage::new(0, 0))
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width() as i32, self.height() as i32)
    }

    /// Crop to `area`, clamped to the frame. Returns `None` when nothing is left.
    pub fn crop(&self, area: Rect) -> Option<Frame> {
        let r = area.intersect(&self.bounds());
        if r.is_empty() {
            return None;
        }

        let (x, y, w, h) = (
            r.min.x as u32,
            r.min.y as u32,
            r.width() as u32,
            r.height() as u32,
        );

        Some(Frame {
            rgba: image::imageops::crop_imm(&self.rgba, x, y, w, h).to_image(),
            gray: image::imageops::crop_imm(&self.gray, x, y, w, h).to_image(),
        })
    }
}

/// Source of frames for the detection loops.
pub trait FrameSource: Send + Sync {
    /// Capture `area` of the screen.
    fn capture(&self, area: Rect) -> Result<Frame, CaptureError>;

    /// Full screen bounds, when known.
    fn bounds(&self) -> Option<Rect>;

    fn capture_screen(&self) -> Result<Frame, CaptureError> {
        let bounds = self.bounds().ok_or(CaptureError::NoDisplays)?;
        self.capture(bounds)
    }
}

/// Screen capture backed by xcap.
///
/// xcap v0.7 captures the whole monitor as `ImageBuffer<Rgba<u8>, Vec<u8>>`;
/// the requested area is cropped afterwards. On macOS the process needs the
/// Screen Recording permission.
pub struct ScreenCapture {
    monitor_index: usize,
    bounds: Mutex<Option<Rect>>,
}

impl ScreenCapture {
    pub fn new(monitor_index: usize) -> Result<Self, CaptureError> {
        let monitors =
            Monitor::all().map_err(|e| CaptureError::MonitorsUnavailable(Box::new(e)))?;
        if monitors.is_empty() {
            return Err(CaptureError::NoDisplays);
        }
        if monitor_index >= monitors.len() {
            return Err(CaptureError::InvalidDisplayIndex(monitor_index));
        }

        tracing::info!(
            "Screen capture initialized on monitor {} of {}",
            monitor_index,
            monitors.len()
        );

        Ok(Self {
            monitor_index,
            bounds: Mutex::new(None),
        })
    }

    fn grab(&self) -> Result<RgbaImage, CaptureError> {
        let monitor = Monitor::all()
            .map_err(|e| CaptureError::MonitorsUnavailable(Box::new(e)))?
            .into_iter()
            .nth(self.monitor_index)
            .ok_or(CaptureError::InvalidDisplayIndex(self.monitor_index))?;

        let image = monitor
            .capture_image()
            .map_err(|e| CaptureError::CaptureFailed(Box::new(e)))?;

        *self.bounds.lock() = Some(Rect::new(0, 0, image.width() as i32, image.height() as i32));

        Ok(image)
    }
}

impl FrameSource for ScreenCapture {
    fn capture(&self, area: Rect) -> Result<Frame, CaptureError> {
        let screen = Frame::new(self.grab()?);
        if !area.within(&screen.bounds()) {
            return Err(CaptureError::OutOfBounds(area.as_array()));
        }
        screen
            .crop(area)
            .ok_or(CaptureError::OutOfBounds(area.as_array()))
    }

    fn bounds(&self) -> Option<Rect> {
        if let Some(bounds) = *self.bounds.lock() {
            return Some(bounds);
        }

        match self.grab() {
            Ok(image) => Some(Rect::new(0, 0, image.width() as i32, image.height() as i32)),
            Err(err) => {
                tracing::warn!("Failed to determine screen bounds: {err}");
                None
            }
        }
    }
}
