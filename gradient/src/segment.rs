//! Per-way gradient segmentation.
//!
//! Walks a way's coordinates with elevations filled in, computes the
//! slope of each consecutive pair, and merges same-category segments
//! into polylines.

use crate::category::{classify, Category};
use geo::{
    algorithm::HaversineDistance,
    geometry::{Coord, Point},
};

/// An ordered run of `[lng, lat]` points within one category.
pub type Polyline = Vec<[f64; 2]>;

/// One way's polylines, indexed by category.
#[derive(Debug, Clone, PartialEq)]
pub struct WaySegments {
    pub by_category: Vec<Vec<Polyline>>,
}

impl WaySegments {
    pub fn empty() -> Self {
        Self {
            by_category: Vec::new(),
        }
    }
}

/// Segment-walk state: either no point seen yet, or the previous
/// point along with the category of the segment that ended there.
enum State {
    NoPriorPoint,
    AfterPoint {
        last: Coord<f64>,
        last_elevation: f64,
        last_category: Option<usize>,
    },
}

/// Classifies each consecutive coordinate pair of one way into a
/// gradient category and merges contiguous same-category segments.
///
/// `elevations` parallels `coords`. A way with fewer than two
/// coordinates yields no segments. Segments whose gradient matches no
/// bucket (zero-length pairs, slopes of 100% or more) are dropped
/// silently, ending any contiguous run.
pub fn segment_way(
    coords: &[Coord<f64>],
    elevations: &[f64],
    categories: &[Category],
) -> WaySegments {
    debug_assert_eq!(coords.len(), elevations.len());

    let mut by_category = vec![Vec::new(); categories.len()];
    let mut state = State::NoPriorPoint;

    for (&coord, &elevation) in coords.iter().zip(elevations) {
        state = match state {
            State::NoPriorPoint => State::AfterPoint {
                last: coord,
                last_elevation: elevation,
                last_category: None,
            },
            State::AfterPoint {
                last,
                last_elevation,
                last_category,
            } => {
                let distance = Point::from(last).haversine_distance(&Point::from(coord));
                let gradient = (elevation - last_elevation).abs() / distance * 100.0;
                let category = classify(categories, gradient);

                if let Some(index) = category {
                    let polylines: &mut Vec<Polyline> = &mut by_category[index];
                    if category == last_category {
                        // Same bucket as the previous segment: the
                        // run continues.
                        if let Some(line) = polylines.last_mut() {
                            line.push([coord.x, coord.y]);
                        }
                    } else {
                        polylines.push(vec![[last.x, last.y], [coord.x, coord.y]]);
                    }
                }

                State::AfterPoint {
                    last: coord,
                    last_elevation: elevation,
                    last_category: category,
                }
            }
        };
    }

    WaySegments { by_category }
}
