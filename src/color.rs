use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, Srgb};

const FALLBACK: &str = "#808080";

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// `n` visually distinct `#rrggbb` colours with evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.65, 0.5);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            format!("#{:02x}{:02x}{:02x}", rgb.red, rgb.green, rgb.blue)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: series name → colour
// ---------------------------------------------------------------------------

/// Stable colour per series; series keep the order they were given in.
#[derive(Debug, Clone)]
pub struct ColorMap {
    order: Vec<String>,
    mapping: BTreeMap<String, String>,
}

impl ColorMap {
    pub fn new<I, S>(series: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut order: Vec<String> = Vec::new();
        for name in series {
            let name = name.into();
            if !order.contains(&name) {
                order.push(name);
            }
        }
        let mapping = order
            .iter()
            .cloned()
            .zip(generate_palette(order.len()))
            .collect();
        ColorMap { order, mapping }
    }

    pub fn color_for(&self, series: &str) -> &str {
        self.mapping.get(series).map_or(FALLBACK, String::as_str)
    }

    /// `(series, colour)` in insertion order.
    pub fn legend_entries(&self) -> Vec<(&str, &str)> {
        self.order
            .iter()
            .map(|name| (name.as_str(), self.color_for(name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_is_hex_and_distinct() {
        let colors = generate_palette(3);
        assert_eq!(colors.len(), 3);
        assert!(colors.iter().all(|c| c.len() == 7 && c.starts_with('#')));
        assert_ne!(colors[0], colors[1]);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn color_map_deduplicates_and_keeps_order() {
        let map = ColorMap::new(["Modified Cosine", "Greedy Cosine", "Modified Cosine"]);
        let legend = map.legend_entries();
        assert_eq!(legend.len(), 2);
        assert_eq!(legend[0].0, "Modified Cosine");
        assert_eq!(map.color_for("unknown"), FALLBACK);
    }
}
