//! Normalized correlation primitive.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

use crate::capture::Point;

/// Locates a needle image inside a haystack image.
pub trait Correlate: Send + Sync {
    /// Best correlation score and its top-left location, or `None` when the
    /// needle cannot be placed inside the haystack.
    fn best(&self, haystack: &GrayImage, needle: &GrayImage) -> Option<(f32, Point)>;

    /// Best score alone; 0 when the needle does not fit.
    fn similarity(&self, haystack: &GrayImage, needle: &GrayImage) -> f32 {
        self.best(haystack, needle).map(|(value, _)| value).unwrap_or(0.0)
    }
}

/// Normalized correlation coefficient backed by imageproc.
///
/// Both images are compared around their own means, so a glyph only scores
/// high against the same shape and not against any bright patch. Flat
/// windows score 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NccCorrelator;

impl Correlate for NccCorrelator {
    fn best(&self, haystack: &GrayImage, needle: &GrayImage) -> Option<(f32, Point)> {
        if needle.width() == 0
            || needle.height() == 0
            || needle.width() > haystack.width()
            || needle.height() > haystack.height()
        {
            return None;
        }

        let (w, h) = needle.dimensions();
        let n = (w * h) as f64;
        let (needle_sum, needle_sq) = needle.pixels().fold((0.0f64, 0.0f64), |(s, sq), p| {
            let v = p[0] as f64;
            (s + v, sq + v * v)
        });
        let needle_var = needle_sq - needle_sum * needle_sum / n;

        let products = match_template(haystack, needle, MatchTemplateMethod::CrossCorrelation);
        let sums = integral_image::<_, u64>(haystack);
        let squares = integral_squared_image::<_, u64>(haystack);

        let mut scores = ImageBuffer::<Luma<f32>, Vec<f32>>::new(products.width(), products.height());
        for (x, y, product) in products.enumerate_pixels() {
            let sum = sum_image_pixels(&sums, x, y, x + w - 1, y + h - 1)[0] as f64;
            let sq = sum_image_pixels(&squares, x, y, x + w - 1, y + h - 1)[0] as f64;
            let window_var = sq - sum * sum / n;

            let denominator = (window_var * needle_var).sqrt();
            let score = if denominator > f64::EPSILON * n {
                ((product[0] as f64 - sum * needle_sum / n) / denominator).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            scores.put_pixel(x, y, Luma([score as f32]));
        }

        let extremes = find_extremes(&scores);
        if !extremes.max_value.is_finite() {
            return Some((0.0, Point::default()));
        }

        let (x, y) = extremes.max_value_location;
        Some((extremes.max_value, Point::new(x as i32, y as i32)))
    }
}
