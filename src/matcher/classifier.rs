use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

use super::{Category, Classification, Classify, Correlate, MatchInfo, Outcome, Template, TemplateLibrary};
use crate::capture::{Frame, Point};
use crate::clock::Clock;
use crate::duplicate::{DetectionRecord, Verdict};
use crate::error::ClockError;
use crate::pieces::{assemble, GlyphPiece, TemplateSet};
use crate::team::{Team, TeamId};

/// Score digits are read over at most this many glyph positions.
const SCORE_ROUNDS: usize = 3;
const ENERGY_ROUNDS: usize = 2;
const CLOCK_ROUNDS: usize = 4;

/// A glyph match with the size of the template that produced it.
struct Located {
    piece: GlyphPiece,
    width: u32,
    height: u32,
}

/// Template classifier over a loaded [`TemplateLibrary`].
///
/// Every template of a group is correlated in parallel; the first accepted
/// template in library order wins for banners, the leftmost for glyphs.
pub struct TemplateMatcher {
    library: Arc<TemplateLibrary>,
    correlator: Arc<dyn Correlate>,
    acceptance: f32,
}

impl TemplateMatcher {
    pub fn new(library: Arc<TemplateLibrary>, correlator: Arc<dyn Correlate>, acceptance: f32) -> Self {
        Self {
            library,
            correlator,
            acceptance,
        }
    }

    pub fn library(&self) -> &TemplateLibrary {
        &self.library
    }

    /// Every template of `templates` matched in `region` at `acceptance` or better.
    fn locate(&self, region: &GrayImage, templates: &[Template], acceptance: f32) -> Vec<Located> {
        templates
            .par_iter()
            .filter_map(|template| {
                let (confidence, point) = self.correlator.best(region, &template.gray)?;
                (confidence.is_finite() && confidence >= acceptance).then(|| Located {
                    piece: GlyphPiece::new(point, template.descriptor.clone(), confidence),
                    width: template.width(),
                    height: template.height(),
                })
            })
            .collect()
    }

    /// Strongest match starting within one glyph width of the leftmost.
    ///
    /// Neighbouring positions of a glyph also score for look-alike digits, so
    /// the left edge alone does not pick the glyph.
    fn leftmost(found: Vec<Located>) -> Option<Located> {
        let first = found.iter().min_by_key(|l| l.piece.point.x)?;
        let reach = first.piece.point.x + first.width as i32;

        found
            .into_iter()
            .filter(|l| l.piece.point.x <= reach)
            .max_by(|a, b| {
                a.piece
                    .confidence
                    .total_cmp(&b.piece.confidence)
                    .then(b.piece.point.x.cmp(&a.piece.point.x))
            })
    }

    /// Strongest match anywhere.
    fn strongest(found: Vec<Located>) -> Option<Located> {
        found.into_iter().max_by(|a, b| {
            a.piece
                .confidence
                .total_cmp(&b.piece.confidence)
                .then(b.piece.point.x.cmp(&a.piece.point.x))
        })
    }

    fn inset(gray: &GrayImage, inset: u32) -> Option<GrayImage> {
        (inset < gray.width()).then(|| {
            image::imageops::crop_imm(gray, inset, 0, gray.width() - inset, gray.height()).to_image()
        })
    }

    /// Read up to three score digits from a cropped banner.
    fn read_points(&self, digits: &GrayImage, team: &Team) -> (Outcome, i64) {
        let templates = self.library.group(Category::Points, team.id);
        let acceptance = team.acceptance(self.acceptance);

        let mut set = TemplateSet::new();
        let mut pieces = Vec::with_capacity(SCORE_ROUNDS);
        let mut inset = 0u32;

        for round in 0..SCORE_ROUNDS {
            let Some(region) = Self::inset(digits, inset) else {
                break;
            };
            let found = self.locate(&region, templates, acceptance);

            if round == 0 {
                for located in &found {
                    set.cache(&located.piece);
                }
                if let Some(value) = set.by_location() {
                    return (Outcome::Found, value);
                }
                if let Some(value) = set.by_confidence() {
                    tracing::warn!("[{}] Accepting {} by template confidence", team.id.title(), value);
                    return (Outcome::Missed, value);
                }
            }

            let Some(located) = Self::leftmost(found) else {
                break;
            };

            let x = located.piece.point.x + inset as i32;
            inset = x as u32 + located.width;
            pieces.push(GlyphPiece {
                point: Point::new(x, located.piece.point.y),
                ..located.piece
            });
        }

        if pieces.is_empty() {
            return (Outcome::NotFound, -1);
        }

        let (value, order) = assemble(&pieces);
        if !(1..=100).contains(&value) {
            tracing::warn!("[{}] Invalid score '{}' ({})", team.id.title(), order, value);
            return (Outcome::Invalid, value);
        }

        (Outcome::Found, value)
    }
}

impl Classify for TemplateMatcher {
    fn matches(&self, frame: &Frame, templates: &[Template]) -> Option<MatchInfo> {
        let results: Vec<Option<(f32, Point)>> = templates
            .par_iter()
            .map(|template| self.correlator.best(&frame.gray, &template.gray))
            .collect();

        templates
            .iter()
            .zip(results)
            .find_map(|(template, result)| {
                let (confidence, point) = result?;
                (confidence >= self.acceptance).then(|| MatchInfo {
                    point,
                    descriptor: template.descriptor.clone(),
                    event: template.event,
                    confidence,
                })
            })
    }

    fn score(&self, frame: &Frame, team: &Team) -> Classification {
        let Some(banner) = self.matches(frame, self.library.group(Category::Scored, team.id)) else {
            return Classification::not_found();
        };

        let area = team.crop(banner.point);
        if !area.within(&frame.bounds()) {
            tracing::warn!(
                "[{}] Score banner at {:?} is outside the configured selection",
                team.id.title(),
                area.as_array()
            );
            return Classification::new(Outcome::Invalid, -1).at(banner.point);
        }
        let Some(digits) = frame.crop(area) else {
            return Classification::new(Outcome::Invalid, -1).at(banner.point);
        };

        let (outcome, value) = self.read_points(&digits.gray, team);
        if !matches!(outcome, Outcome::Found | Outcome::Missed) {
            return Classification::new(outcome, value).at(banner.point);
        }

        let comparable = digits
            .crop(team.comparable())
            .map(|f| f.gray)
            .unwrap_or_else(|| GrayImage::new(0, 0));
        let record = DetectionRecord::new(value, Instant::now(), digits.gray, comparable);

        let outcome = match team.suppressor().check(record, self.correlator.as_ref()) {
            Verdict::New => outcome,
            Verdict::Duplicate => Outcome::Duplicate,
            Verdict::Override { replaces } => Outcome::Override { replaces },
        };

        Classification::new(outcome, value).at(banner.point)
    }

    fn energy(&self, frame: &Frame) -> Classification {
        let templates = self.library.group(Category::Points, TeamId::Energy);
        let acceptance = TeamId::Energy.acceptance(self.acceptance);

        // Matched glyphs are blanked so a repeated digit is found again;
        // assembly orders the pieces by x.
        let mut region = frame.gray.clone();
        let mut pieces = Vec::with_capacity(ENERGY_ROUNDS);

        for _ in 0..ENERGY_ROUNDS {
            let Some(located) = Self::strongest(self.locate(&region, templates, acceptance)) else {
                break;
            };

            let Point { x, y } = located.piece.point;
            draw_filled_rect_mut(
                &mut region,
                imageproc::rect::Rect::at(x, y).of_size(located.width.max(1), located.height.max(1)),
                Luma([0]),
            );
            pieces.push(located.piece);
        }

        if pieces.is_empty() {
            return Classification::not_found();
        }

        let (value, order) = assemble(&pieces);
        if !(0..=99).contains(&value) {
            tracing::warn!("[Energy] Invalid held count '{}' ({})", order, value);
            return Classification::new(Outcome::Invalid, value);
        }

        Classification::new(Outcome::Found, value)
    }

    fn clock(&self, frame: &Frame) -> Result<Clock, ClockError> {
        let templates = self.library.group(Category::Time, TeamId::Time);
        let acceptance = TeamId::Time.acceptance(self.acceptance);

        let mut digits = [-1i64; CLOCK_ROUNDS];
        let mut inset = 0u32;

        for digit in digits.iter_mut() {
            let located = Self::inset(&frame.gray, inset)
                .and_then(|region| Self::leftmost(self.locate(&region, templates, acceptance)));
            let Some(located) = located else {
                break;
            };

            *digit = located.piece.descriptor.value;
            inset += located.piece.point.x as u32 + located.width;
        }

        Clock::from_digits(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::NccCorrelator;
    use crate::pieces::TemplateDescriptor;
    use crate::team::Teams;

    /// Distinct 5x7 glyphs made of bars, one per digit.
    fn glyph(value: u8) -> GrayImage {
        GrayImage::from_fn(5, 7, |x, y| {
            let lit = (x + y * 3 + value as u32 * 7) % 4 == 0 || (x == value as u32 % 5);
            Luma([if lit { 250 } else { 10 }])
        })
    }

    fn library_with_digits(category: Category, team: TeamId, values: &[u8]) -> TemplateLibrary {
        let mut library = TemplateLibrary::new();
        for &v in values {
            library.insert(
                category,
                team,
                Template::new(
                    TemplateDescriptor::new(category.name(), format!("point_{v}"), v as i64),
                    glyph(v),
                    None,
                ),
            );
        }
        library
    }

    /// Render `values` left to right on a dark strip.
    fn strip(values: &[u8], gap: u32) -> Frame {
        let mut gray = GrayImage::from_pixel(10 + values.len() as u32 * (5 + gap), 11, Luma([10]));
        for (i, &v) in values.iter().enumerate() {
            image::imageops::replace(&mut gray, &glyph(v), 5 + (i as u32 * (5 + gap)) as i64, 2);
        }
        Frame::from_gray(gray)
    }

    fn matcher(library: TemplateLibrary) -> TemplateMatcher {
        TemplateMatcher::new(Arc::new(library), Arc::new(NccCorrelator), 0.98)
    }

    #[test]
    fn test_matches_returns_first_accepted() {
        let library = library_with_digits(Category::Killed, TeamId::Game, &[1, 4]);
        let frame = strip(&[4], 3);
        let m = matcher(library);

        let templates = m.library().group(Category::Killed, TeamId::Game);
        let info = m.matches(&frame, templates).unwrap();
        assert_eq!(info.descriptor.value, 4);
        assert_eq!(info.point, Point::new(5, 2));
    }

    #[test]
    fn test_matches_nothing_on_blank_frame() {
        let library = library_with_digits(Category::Killed, TeamId::Game, &[1, 4]);
        let m = matcher(library);
        let frame = Frame::from_gray(GrayImage::from_pixel(30, 20, Luma([10])));
        assert!(m
            .matches(&frame, m.library().group(Category::Killed, TeamId::Game))
            .is_none());
    }

    #[test]
    fn test_energy_reads_repeated_digit() {
        let library = library_with_digits(Category::Points, TeamId::Energy, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let m = matcher(library);

        let read = m.energy(&strip(&[3, 3], 4));
        assert_eq!(read.outcome, Outcome::Found);
        assert_eq!(read.value, 33);
    }

    #[test]
    fn test_energy_reads_distinct_digits() {
        let library = library_with_digits(Category::Points, TeamId::Energy, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let m = matcher(library);

        let read = m.energy(&strip(&[3, 7], 4));
        assert_eq!(read.outcome, Outcome::Found);
        assert_eq!(read.value, 37);
    }

    #[test]
    fn test_leftmost_prefers_stronger_neighbour() {
        let located = |x: i32, value: i64, confidence: f32| Located {
            piece: GlyphPiece::new(
                Point::new(x, 0),
                TemplateDescriptor::new("points", format!("point_{value}"), value),
                confidence,
            ),
            width: 5,
            height: 7,
        };

        let found = vec![
            located(4, 4, 0.93),
            located(5, 3, 1.0),
            located(6, 2, 0.93),
            located(20, 7, 1.0),
        ];
        let picked = TemplateMatcher::leftmost(found).unwrap();
        assert_eq!(picked.piece.descriptor.value, 3);
        assert_eq!(picked.piece.point.x, 5);
    }

    #[test]
    fn test_energy_not_found() {
        let library = library_with_digits(Category::Points, TeamId::Energy, &[1, 2]);
        let m = matcher(library);
        let frame = Frame::from_gray(GrayImage::from_pixel(30, 20, Luma([10])));
        assert_eq!(m.energy(&frame).outcome, Outcome::NotFound);
    }

    #[test]
    fn test_clock_reads_four_digits() {
        let library = library_with_digits(Category::Time, TeamId::Time, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let m = matcher(library);

        let clock = m.clock(&strip(&[0, 7, 4, 5], 3)).unwrap();
        assert_eq!(clock.to_string(), "07:45");
    }

    #[test]
    fn test_clock_unreadable() {
        let library = library_with_digits(Category::Time, TeamId::Time, &[0, 1]);
        let m = matcher(library);
        let frame = Frame::from_gray(GrayImage::from_pixel(40, 20, Luma([10])));
        assert!(matches!(m.clock(&frame), Err(ClockError::Unreadable(_))));
    }

    #[test]
    fn test_score_without_banner_is_not_found() {
        let m = matcher(TemplateLibrary::new());
        let teams = Teams::new();
        let frame = Frame::from_gray(GrayImage::from_pixel(40, 20, Luma([10])));
        assert_eq!(m.score(&frame, teams.get(TeamId::Purple)).outcome, Outcome::NotFound);
    }
}
