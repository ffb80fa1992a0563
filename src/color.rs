use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Mix, Srgb};

use crate::data::model::CellValue;

// ---------------------------------------------------------------------------
// Categorical palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: cell value → Color32
// ---------------------------------------------------------------------------

/// Maps the distinct values of a coloring column to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<CellValue, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Build a colour map for a column from its distinct values.
    pub fn new(distinct_values: &BTreeSet<CellValue>) -> Self {
        let palette = generate_palette(distinct_values.len());
        let mapping: BTreeMap<CellValue, Color32> = distinct_values
            .iter()
            .zip(palette.into_iter())
            .map(|(v, c): (&CellValue, Color32)| (v.clone(), c))
            .collect();

        ColorMap {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a given value.
    pub fn color_for(&self, value: &CellValue) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }
}

// ---------------------------------------------------------------------------
// Diverging scale: green → yellow → red over a fixed anchor range
// ---------------------------------------------------------------------------

/// Shared diverging colour scale anchored to a global [min, max], so the same
/// emission value gets the same colour in every chart. Low values are green,
/// the midpoint yellow, high values red.
#[derive(Debug, Clone, Copy)]
pub struct DivergingScale {
    min: f64,
    max: f64,
}

impl DivergingScale {
    pub fn new(min: f64, max: f64) -> Self {
        DivergingScale { min, max }
    }

    /// Colour for a value; values outside the anchor range clamp to the ends.
    pub fn color_for(&self, value: f64) -> Color32 {
        let span = self.max - self.min;
        let t = if span.abs() < f64::EPSILON {
            0.5_f32
        } else {
            ((value - self.min) / span).clamp(0.0, 1.0) as f32
        };

        let green = Srgb::new(0.10f32, 0.59, 0.31).into_linear();
        let yellow = Srgb::new(1.00f32, 0.75, 0.15).into_linear();
        let red = Srgb::new(0.84f32, 0.19, 0.15).into_linear();

        let mixed = if t < 0.5 {
            green.mix(yellow, t * 2.0)
        } else {
            yellow.mix(red, (t - 0.5) * 2.0)
        };
        let rgb: Srgb = Srgb::from_linear(mixed);
        Color32::from_rgb(
            (rgb.red * 255.0) as u8,
            (rgb.green * 255.0) as u8,
            (rgb.blue * 255.0) as u8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_size_matches_request() {
        assert!(generate_palette(0).is_empty());
        assert_eq!(generate_palette(7).len(), 7);
    }

    #[test]
    fn scale_ends_are_green_and_red() {
        let scale = DivergingScale::new(100.0, 500.0);
        let low = scale.color_for(100.0);
        let high = scale.color_for(500.0);
        assert!(low.g() > low.r());
        assert!(high.r() > high.g());
        // Clamped outside the anchors.
        assert_eq!(scale.color_for(0.0), low);
        assert_eq!(scale.color_for(900.0), high);
    }

    #[test]
    fn degenerate_range_is_still_defined() {
        let scale = DivergingScale::new(200.0, 200.0);
        let c = scale.color_for(200.0);
        assert!(c.r() > 0 || c.g() > 0);
    }
}
