//! Gradient categories: contiguous, ascending percentage buckets, each
//! mapped to a rendering style.

use crate::error::GradientError;

/// Rendering style shared by both serializers.
#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    /// `#rrggbb` hex color.
    pub color: String,
    /// Line width in pixels.
    pub width: f64,
    /// Line opacity in `[0, 1]`.
    pub opacity: f64,
}

/// One gradient bucket covering `[min, max)` percent.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub min: f64,
    pub max: f64,
    pub name: String,
    pub style: LineStyle,
}

impl Category {
    /// Builds the ordered category list from gradient stops and an
    /// equal-length CSS color list.
    ///
    /// Bucket `i` covers `[stops[i], stops[i+1])`; the last bucket is
    /// pinned to an upper bound of 100 and named open-endedly
    /// (`"> 20%"`). Together the buckets partition
    /// `[stops[0], 100)` with no gaps or overlaps.
    pub fn build(
        stops: &[f64],
        colors: &[String],
        width: f64,
        opacity: f64,
    ) -> Result<Vec<Category>, GradientError> {
        if stops.len() != colors.len() {
            return Err(GradientError::StopColorMismatch {
                stops: stops.len(),
                colors: colors.len(),
            });
        }
        if stops.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(GradientError::UnsortedStops);
        }
        // Stops are ascending, so checking the last is enough to keep
        // every bucket inside [min, 100).
        if let Some(&last) = stops.last() {
            if last >= 100.0 {
                return Err(GradientError::StopOutOfRange(last));
            }
        }

        let categories = stops
            .iter()
            .zip(colors)
            .enumerate()
            .map(|(index, (&min, color))| {
                let max = stops.get(index + 1).copied().unwrap_or(100.0);
                let name = if index + 1 == stops.len() {
                    format!("> {min}%")
                } else {
                    format!("{min}-{max}%")
                };
                Category {
                    min,
                    max,
                    name,
                    style: LineStyle {
                        color: css_to_hex(color).map_or_else(|| color.clone(), str::to_owned),
                        width,
                        opacity,
                    },
                }
            })
            .collect();
        Ok(categories)
    }
}

/// Returns the index of the first category with `min <= gradient < max`,
/// if any. Infinite and NaN gradients (zero-length segments) match
/// nothing.
pub fn classify(categories: &[Category], gradient: f64) -> Option<usize> {
    categories
        .iter()
        .position(|category| category.min <= gradient && gradient < category.max)
}

/// Maps common CSS color names to hex. Unknown names (and `#rrggbb`
/// literals) pass through [`Category::build`] verbatim.
fn css_to_hex(name: &str) -> Option<&'static str> {
    let hex = match name.to_ascii_lowercase().as_str() {
        "black" => "#000000",
        "blue" => "#0000ff",
        "brown" => "#a52a2a",
        "crimson" => "#dc143c",
        "cyan" => "#00ffff",
        "darkblue" => "#00008b",
        "darkgreen" => "#006400",
        "darkorange" => "#ff8c00",
        "darkred" => "#8b0000",
        "gold" => "#ffd700",
        "gray" | "grey" => "#808080",
        "green" => "#008000",
        "indigo" => "#4b0082",
        "lime" => "#00ff00",
        "magenta" | "fuchsia" => "#ff00ff",
        "maroon" => "#800000",
        "navy" => "#000080",
        "olive" => "#808000",
        "orange" => "#ffa500",
        "pink" => "#ffc0cb",
        "purple" => "#800080",
        "red" => "#ff0000",
        "salmon" => "#fa8072",
        "silver" => "#c0c0c0",
        "teal" => "#008080",
        "violet" => "#ee82ee",
        "white" => "#ffffff",
        "yellow" => "#ffff00",
        _ => return None,
    };
    Some(hex)
}
