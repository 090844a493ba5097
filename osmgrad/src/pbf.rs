//! Streaming `.osm.pbf` decoding: one decoded data blob per batch.
//!
//! OSM extracts order nodes before the ways referencing them, so
//! tracking node locations as blobs stream by is enough to resolve way
//! geometry in a single pass.

use geo::geometry::Coord;
use gradient::{Batch, BatchSource, GeometryError, GradientError, TagMap, Way};
use osmpbf::{BlobDecode, BlobReader, Element};
use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

pub struct PbfSource {
    reader: BlobReader<BufReader<File>>,

    /// node id → (lng, lat); `None` skips location tracking entirely.
    locations: Option<HashMap<i64, (f64, f64)>>,
}

impl PbfSource {
    /// Reader for the processing pass: tracks node locations so way
    /// geometry can be resolved.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GradientError> {
        Ok(Self {
            reader: BlobReader::from_path(path).map_err(GradientError::source)?,
            locations: Some(HashMap::new()),
        })
    }

    /// Reader for the counting pass. Tags are decoded, geometry is
    /// not.
    pub fn ways_only<P: AsRef<Path>>(path: P) -> Result<Self, GradientError> {
        Ok(Self {
            reader: BlobReader::from_path(path).map_err(GradientError::source)?,
            locations: None,
        })
    }

    fn decode_way(&self, way: &osmpbf::Way) -> Way {
        let tags: TagMap = way
            .tags()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        let geometry = match &self.locations {
            None => Err(GeometryError::NotTracked),
            Some(locations) => way
                .refs()
                .map(|node_id| {
                    locations
                        .get(&node_id)
                        .map(|&(x, y)| Coord { x, y })
                        .ok_or(GeometryError::MissingNode(node_id))
                })
                .collect(),
        };
        Way {
            id: way.id(),
            tags,
            geometry,
        }
    }
}

impl BatchSource for PbfSource {
    fn next_batch(&mut self) -> Result<Option<Batch>, GradientError> {
        while let Some(blob) = self.reader.next() {
            let blob = blob.map_err(GradientError::source)?;
            let block = match blob.decode().map_err(GradientError::source)? {
                BlobDecode::OsmData(block) => block,
                BlobDecode::OsmHeader(_) | BlobDecode::Unknown(_) => continue,
            };

            let mut ways = Vec::new();
            for element in block.elements() {
                match element {
                    Element::Node(node) => {
                        if let Some(locations) = &mut self.locations {
                            locations.insert(node.id(), (node.lon(), node.lat()));
                        }
                    }
                    Element::DenseNode(node) => {
                        if let Some(locations) = &mut self.locations {
                            locations.insert(node.id(), (node.lon(), node.lat()));
                        }
                    }
                    Element::Way(ref way) => ways.push(self.decode_way(way)),
                    Element::Relation(_) => {}
                }
            }
            return Ok(Some(Batch { ways }));
        }
        Ok(None)
    }
}
