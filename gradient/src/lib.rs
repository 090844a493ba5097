mod aggregate;
mod category;
mod elevation;
mod error;
mod pipeline;
mod query;
mod segment;
mod source;

pub use crate::{
    aggregate::{Aggregate, PassthroughWay},
    category::{Category, LineStyle},
    elevation::{ElevationError, ElevationSource, NoElevation, TileMode, TileStore},
    error::GradientError,
    pipeline::{Pipeline, Progress, DEFAULT_CONCURRENCY},
    query::TagQuery,
    segment::Polyline,
    source::{Batch, BatchSource, GeometryError, TagMap, Way},
};
