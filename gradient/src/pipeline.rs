//! Two-pass streaming pipeline: a counting pass for progress totals,
//! then a batch-at-a-time processing pass with bounded per-way
//! concurrency.

use crate::{
    aggregate::{Aggregate, Aggregator, WayResult},
    category::Category,
    elevation::ElevationSource,
    error::GradientError,
    query::TagQuery,
    segment::{segment_way, WaySegments},
    source::{BatchSource, TagMap, Way},
};
use futures::{future::try_join_all, stream, StreamExt};
use geo::geometry::Coord;
use log::warn;

/// Default number of concurrently processed ways within one batch.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Injected progress reporter: one increment per counted way during
/// the counting pass, one per completed way during the processing
/// pass.
pub trait Progress {
    fn inc(&self);
}

impl Progress for () {
    fn inc(&self) {}
}

pub struct Pipeline<'a> {
    query: &'a TagQuery,
    categories: &'a [Category],
    concurrency: usize,
}

impl<'a> Pipeline<'a> {
    /// An empty category list selects passthrough mode: ways are
    /// emitted verbatim and no elevation requests are issued.
    pub fn new(query: &'a TagQuery, categories: &'a [Category]) -> Self {
        Self {
            query,
            categories,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Counting pass: drains `source`, returning how many ways match
    /// the filter.
    pub fn count_ways<S>(&self, mut source: S, progress: &impl Progress) -> Result<u64, GradientError>
    where
        S: BatchSource,
    {
        let mut count = 0;
        while let Some(batch) = source.next_batch()? {
            for way in &batch.ways {
                if self.query.matches(&way.tags) {
                    count += 1;
                    progress.inc();
                }
            }
        }
        Ok(count)
    }

    /// Processing pass: per batch, selects ways passing the filter and
    /// runs one unit of work per way with bounded concurrency. The
    /// next batch is not read until every unit of the current batch
    /// has completed.
    ///
    /// A way whose geometry could not be extracted is logged and
    /// skipped; any failure inside a unit of work aborts the whole
    /// pass.
    pub async fn run<S, R>(
        &self,
        mut source: S,
        resolver: &R,
        progress: &impl Progress,
    ) -> Result<Aggregate, GradientError>
    where
        S: BatchSource,
        R: ElevationSource,
    {
        let mut aggregator = Aggregator::new(self.categories.len());

        while let Some(batch) = source.next_batch()? {
            let selected = self.select(batch.ways);
            let mut units = stream::iter(
                selected
                    .into_iter()
                    .map(|(id, tags, coords)| self.process_way(resolver, id, tags, coords)),
            )
            .buffer_unordered(self.concurrency);

            // Barrier: fully drain this batch's units before reading
            // the next batch, bounding memory and tile-cache pressure.
            while let Some(result) = units.next().await {
                aggregator.add(result?);
                progress.inc();
            }
        }

        Ok(aggregator.finish())
    }

    fn select(&self, ways: Vec<Way>) -> Vec<(i64, TagMap, Vec<Coord<f64>>)> {
        let mut selected = Vec::new();
        for way in ways {
            if !self.query.matches(&way.tags) {
                continue;
            }
            match way.geometry {
                Ok(coords) => selected.push((way.id, way.tags, coords)),
                Err(err) => warn!("skipping way {}: {err}", way.id),
            }
        }
        selected
    }

    /// One way's unit of work: resolve every coordinate's elevation
    /// concurrently (first failure fails the way), then segment by
    /// gradient. Passthrough mode skips both steps.
    async fn process_way<R>(
        &self,
        resolver: &R,
        id: i64,
        tags: TagMap,
        coords: Vec<Coord<f64>>,
    ) -> Result<WayResult, GradientError>
    where
        R: ElevationSource,
    {
        let segments = if self.categories.is_empty() {
            WaySegments::empty()
        } else {
            let elevations =
                try_join_all(coords.iter().map(|&coord| resolver.elevation(coord))).await?;
            segment_way(&coords, &elevations, self.categories)
        };
        Ok(WayResult {
            id,
            tags,
            coords,
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Pipeline, Progress};
    use crate::{
        aggregate::Aggregate,
        category::{classify, Category},
        elevation::{ElevationError, ElevationSource},
        error::GradientError,
        query::TagQuery,
        source::{Batch, BatchSource, GeometryError, TagMap, Way},
    };
    use geo::{
        algorithm::HaversineDistance,
        geometry::{Coord, Point},
    };
    use std::{
        future::Future,
        sync::atomic::{AtomicU64, Ordering},
    };

    struct VecSource(std::vec::IntoIter<Batch>);

    impl VecSource {
        fn new(batches: Vec<Batch>) -> Self {
            Self(batches.into_iter())
        }
    }

    impl BatchSource for VecSource {
        fn next_batch(&mut self) -> Result<Option<Batch>, GradientError> {
            Ok(self.0.next())
        }
    }

    /// Closure-backed resolver.
    struct FnElevation<F>(F);

    impl<F> ElevationSource for FnElevation<F>
    where
        F: Fn(Coord<f64>) -> Result<f64, ElevationError>,
    {
        fn elevation(
            &self,
            coord: Coord<f64>,
        ) -> impl Future<Output = Result<f64, ElevationError>> + Send {
            std::future::ready((self.0)(coord))
        }
    }

    impl Progress for AtomicU64 {
        fn inc(&self) {
            self.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn way(id: i64, tags: &[(&str, &str)], coords: Vec<Coord<f64>>) -> Way {
        Way {
            id,
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            geometry: Ok(coords),
        }
    }

    fn trail_categories() -> Vec<Category> {
        let colors = vec!["green".to_owned(), "yellow".to_owned(), "red".to_owned()];
        Category::build(&[0.0, 10.0, 20.0], &colors, 2.0, 1.0).unwrap()
    }

    #[test]
    fn test_count_ways() {
        let query = TagQuery::compile(&["[highway=path]"]);
        let pipeline = Pipeline::new(&query, &[]);
        let source = VecSource::new(vec![
            Batch {
                ways: vec![
                    way(1, &[("highway", "path")], vec![]),
                    way(2, &[("highway", "service")], vec![]),
                ],
            },
            Batch {
                ways: vec![way(3, &[("highway", "path")], vec![])],
            },
        ]);

        let counted = AtomicU64::new(0);
        assert_eq!(pipeline.count_ways(source, &counted).unwrap(), 2);
        assert_eq!(counted.load(Ordering::Relaxed), 2);
    }

    /// A 3-point way stepping 0.001° of latitude
    /// (~111 m) per segment, elevations [100, 110, 95].
    #[tokio::test]
    async fn test_run_segments_by_gradient() {
        let categories = trail_categories();
        let query = TagQuery::compile(&["[highway=path]"]);
        let pipeline = Pipeline::new(&query, &categories);

        let coords = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 0.0, y: 0.001 },
            Coord { x: 0.0, y: 0.002 },
        ];
        let source = VecSource::new(vec![Batch {
            ways: vec![way(10, &[("highway", "path")], coords)],
        }]);
        let resolver = FnElevation(|coord: Coord<f64>| {
            Ok(if coord.y == 0.0 {
                100.0
            } else if coord.y == 0.001 {
                110.0
            } else {
                95.0
            })
        });

        // Work out the expected buckets with the same arithmetic the
        // segmenter uses.
        let step = Point::new(0.0, 0.0).haversine_distance(&Point::new(0.0, 0.001));
        let first = (110.0f64 - 100.0).abs() / step * 100.0;
        let second = (95.0f64 - 110.0).abs() / step * 100.0;
        assert_eq!(classify(&categories, first), Some(0));
        assert_eq!(classify(&categories, second), Some(1));

        let progress = AtomicU64::new(0);
        let aggregate = pipeline.run(source, &resolver, &progress).await.unwrap();
        let Aggregate::Categorized(lines) = aggregate else {
            panic!("expected categorized aggregate");
        };

        assert_eq!(lines[0], vec![vec![[0.0, 0.0], [0.0, 0.001]]]);
        assert_eq!(lines[1], vec![vec![[0.0, 0.001], [0.0, 0.002]]]);
        assert!(lines[2].is_empty());
        assert_eq!(progress.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_degenerate_way_skipped() {
        let categories = trail_categories();
        let query = TagQuery::compile(&["[highway]"]);
        let pipeline = Pipeline::new(&query, &categories);

        let broken = Way {
            id: 1,
            tags: TagMap::from([("highway".to_owned(), "path".to_owned())]),
            geometry: Err(GeometryError::MissingNode(42)),
        };
        let source = VecSource::new(vec![Batch {
            ways: vec![
                broken,
                way(
                    2,
                    &[("highway", "path")],
                    vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.001 }],
                ),
            ],
        }]);
        let resolver = FnElevation(|_| Ok(100.0));

        let progress = AtomicU64::new(0);
        let aggregate = pipeline.run(source, &resolver, &progress).await.unwrap();
        assert!(matches!(aggregate, Aggregate::Categorized(_)));
        // Only the intact way completed.
        assert_eq!(progress.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_elevation_failure_aborts_run() {
        let categories = trail_categories();
        let query = TagQuery::compile(&["[highway]"]);
        let pipeline = Pipeline::new(&query, &categories);

        let source = VecSource::new(vec![Batch {
            ways: vec![way(
                1,
                &[("highway", "path")],
                vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.001 }],
            )],
        }]);
        let resolver =
            FnElevation(|coord: Coord<f64>| Err(ElevationError::Missing(coord)));

        let err = pipeline.run(source, &resolver, &()).await.unwrap_err();
        assert!(matches!(err, GradientError::Elevation(_)));
    }

    #[tokio::test]
    async fn test_passthrough_mode() {
        let query = TagQuery::compile(&["[highway=path]"]);
        let pipeline = Pipeline::new(&query, &[]);

        let first_batch = Batch {
            ways: vec![
                way(
                    1,
                    &[("highway", "path"), ("name", "Ridge Trail")],
                    vec![Coord { x: 8.0, y: 47.0 }, Coord { x: 8.1, y: 47.1 }],
                ),
                way(2, &[("highway", "service")], vec![]),
            ],
        };
        let second_batch = Batch {
            ways: vec![way(
                3,
                &[("highway", "path")],
                vec![Coord { x: 9.0, y: 46.0 }],
            )],
        };
        let source = VecSource::new(vec![first_batch, second_batch]);

        // Passthrough must never consult the resolver.
        let resolver =
            FnElevation(|coord: Coord<f64>| Err(ElevationError::Missing(coord)));

        let aggregate = pipeline.run(source, &resolver, &()).await.unwrap();
        let Aggregate::Passthrough(ways) = aggregate else {
            panic!("expected passthrough aggregate");
        };

        // One feature per matching way; batch order preserved by the
        // barrier; coordinates and tags verbatim.
        assert_eq!(ways.len(), 2);
        assert_eq!(ways[0].id, 1);
        assert_eq!(ways[0].tags["name"], "Ridge Trail");
        assert_eq!(
            ways[0].coords,
            vec![Coord { x: 8.0, y: 47.0 }, Coord { x: 8.1, y: 47.1 }]
        );
        assert_eq!(ways[1].id, 3);
    }
}
