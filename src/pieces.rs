//! Assembles located single-glyph matches into multi-digit numbers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::capture::Point;

/// Two glyphs with the same stripped id closer than this are one glyph.
const SAME_GLYPH_DISTANCE: i32 = 6;

/// Cosmetic template variants that render the same glyph.
const VARIANT_SUFFIXES: [&str; 4] = ["_alt", "-alt", "_big", "-big"];

/// Identity of a template image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    /// Template group, e.g. "points", "scored", "killed".
    pub category: String,
    /// File stem the template was loaded from, e.g. "point_3_alt".
    pub source_id: String,
    /// Digit value for glyph templates.
    pub value: i64,
}

impl TemplateDescriptor {
    pub fn new(category: impl Into<String>, source_id: impl Into<String>, value: i64) -> Self {
        Self {
            category: category.into(),
            source_id: source_id.into(),
            value,
        }
    }

    /// Source id without cosmetic variant suffixes.
    pub fn stripped_id(&self) -> String {
        strip_variants(&self.source_id)
    }
}

pub fn strip_variants(id: &str) -> String {
    VARIANT_SUFFIXES
        .iter()
        .fold(id.to_string(), |acc, suffix| acc.replace(suffix, ""))
}

/// One located glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphPiece {
    pub point: Point,
    pub descriptor: TemplateDescriptor,
    pub confidence: f32,
}

impl GlyphPiece {
    pub fn new(point: Point, descriptor: TemplateDescriptor, confidence: f32) -> Self {
        Self {
            point,
            descriptor,
            confidence,
        }
    }

    /// Both pieces are matches of the same physical glyph.
    pub fn same_glyph(&self, other: &GlyphPiece) -> bool {
        self.descriptor.stripped_id() == other.descriptor.stripped_id()
            && (self.point.x - other.point.x).abs() < SAME_GLYPH_DISTANCE
    }

    fn is_digit(&self) -> bool {
        (0..=9).contains(&self.descriptor.value)
    }
}

/// Assemble `pieces` into an integer read left to right.
///
/// Returns the value and the digit order string. An unparseable order yields 0.
pub fn assemble(pieces: &[GlyphPiece]) -> (i64, String) {
    if pieces.is_empty() {
        return (0, String::new());
    }

    let mut sorted: Vec<&GlyphPiece> = pieces
        .iter()
        .filter(|piece| {
            if piece.is_digit() {
                return true;
            }
            tracing::warn!(
                "Skipping glyph {} with non-digit value {}",
                piece.descriptor.source_id,
                piece.descriptor.value
            );
            false
        })
        .collect();
    sorted.sort_by_key(|piece| piece.point.x);

    let mut unique: Vec<&GlyphPiece> = Vec::with_capacity(sorted.len());
    let mut removed = 0usize;
    for (i, &piece) in sorted.iter().enumerate() {
        if i > 0 && sorted[i - 1].same_glyph(piece) {
            removed += 1;
            continue;
        }
        unique.push(piece);
    }

    let order: String = unique
        .iter()
        .map(|piece| piece.descriptor.value.to_string())
        .collect();

    tracing::debug!(
        "Sorted {} glyphs into '{}' ({} removed)",
        unique.len(),
        order,
        removed
    );

    match order.parse::<i64>() {
        Ok(value) => (value, order),
        Err(err) => {
            tracing::warn!("Failed to convert glyph order '{order}' to an integer: {err}");
            (0, order)
        }
    }
}

#[derive(Debug, Clone)]
struct Cached {
    point: Point,
    confidence: f32,
    value: i64,
    seen: u32,
}

/// Distinct glyph templates seen in one read, for the secondary orderings.
///
/// Used when two or three different templates matched exactly once each.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    order: Vec<String>,
    cache: HashMap<String, Cached>,
    repeated: bool,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&mut self, piece: &GlyphPiece) {
        let id = piece.descriptor.stripped_id();

        // Zero never leads a number; push it to the far right.
        let point = if piece.descriptor.value == 0 {
            Point::new(i32::MAX, i32::MAX)
        } else {
            piece.point
        };

        match self.cache.get_mut(&id) {
            Some(cached) => {
                cached.seen += 1;
                self.repeated = true;
            }
            None => {
                self.cache.insert(
                    id.clone(),
                    Cached {
                        point,
                        confidence: piece.confidence,
                        value: piece.descriptor.value,
                        seen: 1,
                    },
                );
                self.order.push(id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// A template repeated in this read.
    pub fn has_repeats(&self) -> bool {
        self.repeated || self.cache.values().any(|c| c.seen > 1)
    }

    /// Order by x position; accepted for values in `[1, 100]`.
    pub fn by_location(&self) -> Option<i64> {
        if self.has_repeats() || self.is_empty() || self.len() > 3 {
            return None;
        }

        let mut entries: Vec<&Cached> = self.entries();
        entries.sort_by_key(|c| c.point.x);

        let value = Self::value(&entries);
        (1..=100).contains(&value).then_some(value)
    }

    /// Order by match confidence, weakest first; accepted for values in `(0, 100)`.
    pub fn by_confidence(&self) -> Option<i64> {
        if self.has_repeats() {
            return None;
        }

        let mut entries: Vec<&Cached> = self.entries();
        entries.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));

        let value = Self::value(&entries);
        (value > 0 && value < 100).then_some(value)
    }

    fn entries(&self) -> Vec<&Cached> {
        self.order
            .iter()
            .filter_map(|id| self.cache.get(id))
            .collect()
    }

    fn value(entries: &[&Cached]) -> i64 {
        match entries {
            [a, b] => a.value * 10 + b.value,
            [a, b, c] => a.value * 100 + b.value * 10 + c.value,
            _ => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(x: i32, value: i64, id: &str) -> GlyphPiece {
        GlyphPiece::new(
            Point::new(x, 0),
            TemplateDescriptor::new("points", id, value),
            0.9,
        )
    }

    fn confident(x: i32, value: i64, id: &str, confidence: f32) -> GlyphPiece {
        GlyphPiece {
            confidence,
            ..piece(x, value, id)
        }
    }

    #[test]
    fn test_assemble_left_to_right() {
        let pieces = vec![piece(20, 3, "point_3"), piece(10, 2, "point_2")];
        assert_eq!(assemble(&pieces), (23, "23".to_string()));
    }

    #[test]
    fn test_assemble_drops_near_variant() {
        let pieces = vec![
            piece(10, 2, "point_2"),
            piece(20, 3, "point_3"),
            piece(23, 3, "point_3_alt"),
        ];
        assert_eq!(assemble(&pieces).0, 23);
    }

    #[test]
    fn test_assemble_keeps_distant_repeat() {
        let pieces = vec![piece(10, 3, "point_3"), piece(30, 3, "point_3_big")];
        assert_eq!(assemble(&pieces).0, 33);
    }

    #[test]
    fn test_assemble_empty_is_zero() {
        assert_eq!(assemble(&[]), (0, String::new()));
    }

    #[test]
    fn test_assemble_skips_malformed_piece() {
        let pieces = vec![piece(10, 4, "point_4"), piece(20, 42, "broken")];
        assert_eq!(assemble(&pieces).0, 4);
    }

    #[test]
    fn test_assemble_overflow_degrades_to_zero() {
        let pieces: Vec<GlyphPiece> = (0..25)
            .map(|i| piece(i * 10, 9, &format!("point_9_{i}")))
            .collect();
        let (value, order) = assemble(&pieces);
        assert_eq!(value, 0);
        assert_eq!(order.len(), 25);
    }

    #[test]
    fn test_strip_variants() {
        assert_eq!(strip_variants("point_3_alt"), "point_3");
        assert_eq!(strip_variants("point-7-big"), "point-7");
        assert_eq!(strip_variants("point_1"), "point_1");
    }

    #[test]
    fn test_template_set_by_location() {
        let mut set = TemplateSet::new();
        set.cache(&piece(40, 5, "point_5"));
        set.cache(&piece(10, 1, "point_1"));
        assert_eq!(set.by_location(), Some(15));
    }

    #[test]
    fn test_template_set_zero_sorts_last() {
        let mut set = TemplateSet::new();
        set.cache(&piece(5, 0, "point_0"));
        set.cache(&piece(30, 4, "point_4"));
        assert_eq!(set.by_location(), Some(40));
    }

    #[test]
    fn test_template_set_location_out_of_range_falls_back_to_confidence() {
        let mut set = TemplateSet::new();
        set.cache(&confident(10, 9, "point_9", 0.95));
        set.cache(&confident(20, 1, "point_1", 0.80));
        set.cache(&confident(30, 2, "point_2", 0.90));

        // 912 by location is out of range.
        assert_eq!(set.by_location(), None);
        // Weakest first gives 1, 2, 9 -> 129, also out of range.
        assert_eq!(set.by_confidence(), None);

        let mut set = TemplateSet::new();
        set.cache(&confident(10, 9, "point_9", 0.95));
        set.cache(&confident(20, 1, "point_1", 0.80));
        assert_eq!(set.by_location(), Some(91));
        assert_eq!(set.by_confidence(), Some(19));
    }

    #[test]
    fn test_template_set_repeat_rejects_both_strategies() {
        let mut set = TemplateSet::new();
        set.cache(&piece(10, 2, "point_2"));
        set.cache(&piece(20, 2, "point_2_alt"));
        set.cache(&piece(30, 5, "point_5"));
        assert!(set.has_repeats());
        assert_eq!(set.by_location(), None);
        assert_eq!(set.by_confidence(), None);
    }

    #[test]
    fn test_template_set_single_template_rejected() {
        let mut set = TemplateSet::new();
        set.cache(&piece(10, 7, "point_7"));
        assert_eq!(set.by_location(), None);
        assert_eq!(set.by_confidence(), None);
    }
}
