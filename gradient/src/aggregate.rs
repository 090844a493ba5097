//! Dataset-wide aggregation of per-way results.

use crate::{
    segment::{Polyline, WaySegments},
    source::TagMap,
};
use geo::geometry::Coord;

/// A way emitted verbatim in passthrough mode.
#[derive(Debug, Clone)]
pub struct PassthroughWay {
    pub id: i64,
    pub tags: TagMap,
    pub coords: Vec<Coord<f64>>,
}

/// Finalized result of a processing pass, owned by the output stage.
#[derive(Debug)]
pub enum Aggregate {
    /// Per-category polyline lists, concatenated in way-completion
    /// order.
    Categorized(Vec<Vec<Polyline>>),

    /// One line per way (zero categories configured), in
    /// way-completion order.
    Passthrough(Vec<PassthroughWay>),
}

/// Result of one way's unit of work; consumed exactly once by the
/// aggregator.
#[derive(Debug)]
pub struct WayResult {
    pub id: i64,
    pub tags: TagMap,
    pub coords: Vec<Coord<f64>>,
    pub segments: WaySegments,
}

/// Incrementally folds completed ways into the final [`Aggregate`].
pub struct Aggregator(Aggregate);

impl Aggregator {
    /// Zero categories selects passthrough mode.
    pub fn new(num_categories: usize) -> Self {
        if num_categories == 0 {
            Self(Aggregate::Passthrough(Vec::new()))
        } else {
            Self(Aggregate::Categorized(vec![Vec::new(); num_categories]))
        }
    }

    pub fn add(&mut self, way: WayResult) {
        match &mut self.0 {
            Aggregate::Categorized(lines) => {
                for (index, polylines) in way.segments.by_category.into_iter().enumerate() {
                    lines[index].extend(polylines);
                }
            }
            Aggregate::Passthrough(ways) => ways.push(PassthroughWay {
                id: way.id,
                tags: way.tags,
                coords: way.coords,
            }),
        }
    }

    pub fn finish(self) -> Aggregate {
        self.0
    }
}
