//! Decoded-way access: the data model handed over by an input decoder
//! and the batched read interface the pipeline drives.

use crate::error::GradientError;
use geo::geometry::Coord;
use std::collections::HashMap;
use thiserror::Error;

/// A way's key → value tag attributes.
pub type TagMap = HashMap<String, String>;

/// Why a way's coordinate sequence could not be extracted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("no location for node {0}")]
    MissingNode(i64),

    #[error("node locations not tracked by this source")]
    NotTracked,
}

/// One way as decoded from the source. Transient: lives only for the
/// duration of its unit of work.
#[derive(Debug, Clone)]
pub struct Way {
    pub id: i64,
    pub tags: TagMap,
    /// Ordered node coordinates, or the reason extraction failed.
    pub geometry: Result<Vec<Coord<f64>>, GeometryError>,
}

/// One decoder read unit's worth of ways.
#[derive(Debug, Default)]
pub struct Batch {
    pub ways: Vec<Way>,
}

/// Batched access to decoded ways.
///
/// Implementations yield ways in the decoder's natural read unit;
/// `Ok(None)` signals source exhaustion. The pipeline never reads two
/// batches concurrently.
pub trait BatchSource {
    fn next_batch(&mut self) -> Result<Option<Batch>, GradientError>;
}
