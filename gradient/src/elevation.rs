//! Asynchronous coordinate → elevation resolution backed by a
//! directory of SRTM `.hgt` tiles.

use dashmap::DashMap;
use geo::geometry::Coord;
use log::debug;
use srtm::{SrtmError, Tile};
use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElevationError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("no elevation tiles in {0}")]
    Path(PathBuf),

    #[error("no elevation tile covering {0:?}")]
    Missing(Coord<f64>),

    #[error(transparent)]
    Srtm(#[from] SrtmError),

    #[error("elevation lookup task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Asynchronous coordinate → elevation lookup.
///
/// The pipeline issues one request per way coordinate, concurrently,
/// and treats the resolver as an opaque service: no timeout, no
/// retries. Implementations own their tile loading and caching.
pub trait ElevationSource {
    fn elevation(
        &self,
        coord: Coord<f64>,
    ) -> impl Future<Output = Result<f64, ElevationError>> + Send;
}

/// How to back tile data.
///
/// The trade off between loading tile data into memory versus memory
/// mapping is not obvious, and you should measure both before
/// deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileMode {
    /// Parse tile and load into memory.
    InMem,

    /// Memory map file contents.
    MemMap,
}

/// On-demand SRTM tile loader with a shared in-memory cache.
#[derive(Clone, Debug)]
pub struct TileStore {
    /// Directory containing `.hgt` tile files.
    tile_dir: PathBuf,

    /// How to load tiles.
    tile_mode: TileMode,

    /// Tiles loaded so far, keyed by SW corner. Shared across all
    /// in-flight lookups.
    tiles: Arc<DashMap<Coord<i16>, Arc<Tile>>>,
}

impl TileStore {
    /// Fails early unless `tile_dir` holds at least one `.hgt` file.
    pub fn new(tile_dir: PathBuf, tile_mode: TileMode) -> Result<Self, ElevationError> {
        let mut has_height_files = false;
        for entry in std::fs::read_dir(&tile_dir)? {
            let path = entry?.path();
            if Some("hgt") == path.extension().and_then(std::ffi::OsStr::to_str) {
                has_height_files = true;
                break;
            }
        }

        if has_height_files {
            Ok(Self {
                tile_dir,
                tile_mode,
                tiles: Arc::new(DashMap::new()),
            })
        } else {
            Err(ElevationError::Path(tile_dir))
        }
    }

    /// Blocking lookup; called from `spawn_blocking`.
    fn lookup(&self, coord: Coord<f64>) -> Result<f64, ElevationError> {
        let tile = self.tile(coord)?;
        tile.interpolated(coord)
            .ok_or(ElevationError::Missing(coord))
    }

    /// Returns the tile containing `coord`, loading it from disk on
    /// first use. A missing tile file is an error: gradients computed
    /// against made-up elevations would be silently wrong.
    fn tile(&self, coord: Coord<f64>) -> Result<Arc<Tile>, ElevationError> {
        let sw_corner = sw_corner(coord);
        self.tiles
            .entry(sw_corner)
            .or_try_insert_with(|| match self.load_tile(sw_corner) {
                Ok(tile) => Ok(Arc::new(tile)),
                Err(ElevationError::Srtm(SrtmError::Io(e))) if e.kind() == ErrorKind::NotFound => {
                    Err(ElevationError::Missing(coord))
                }
                Err(e) => Err(e),
            })
            .map(|entry| entry.clone())
    }

    fn load_tile(&self, sw_corner: Coord<i16>) -> Result<Tile, ElevationError> {
        let tile_path = {
            let file_name = file_name(sw_corner);
            let mut tile_path: PathBuf = [&self.tile_dir, Path::new(&file_name)].iter().collect();
            if !tile_path.exists() {
                let file_name = file_name.to_lowercase();
                tile_path = [&self.tile_dir, Path::new(&file_name)].iter().collect();
            }
            tile_path
        };
        debug!("loading {tile_path:?}");
        match self.tile_mode {
            TileMode::InMem => Ok(Tile::load(tile_path)?),
            TileMode::MemMap => Ok(Tile::memmap(tile_path)?),
        }
    }
}

impl ElevationSource for TileStore {
    fn elevation(
        &self,
        coord: Coord<f64>,
    ) -> impl Future<Output = Result<f64, ElevationError>> + Send {
        let store = self.clone();
        async move { tokio::task::spawn_blocking(move || store.lookup(coord)).await? }
    }
}

/// Resolver stand-in for passthrough mode, where the pipeline issues
/// no elevation requests.
pub struct NoElevation;

impl ElevationSource for NoElevation {
    fn elevation(
        &self,
        _coord: Coord<f64>,
    ) -> impl Future<Output = Result<f64, ElevationError>> + Send {
        std::future::ready(Ok(0.0))
    }
}

/// Returns the southwest corner as integers for coord.
fn sw_corner(Coord { x, y }: Coord<f64>) -> Coord<i16> {
    #[allow(clippy::cast_possible_truncation)]
    Coord {
        x: (x.floor() as i16),
        y: (y.floor() as i16),
    }
}

/// Returns the expected file name for coord.
fn file_name(Coord { x, y }: Coord<i16>) -> String {
    let (n_s, lat) = {
        let lat = y.abs();
        let n_s = if y.is_negative() { 'S' } else { 'N' };
        (n_s, lat)
    };
    let (e_w, lon) = {
        let lon = x.abs();
        let e_w = if x.is_negative() { 'W' } else { 'E' };
        (e_w, lon)
    };
    format!("{n_s}{lat:02}{e_w}{lon:03}.hgt")
}

#[cfg(test)]
mod tests {
    use super::{file_name, sw_corner, Coord, ElevationError, ElevationSource, TileMode, TileStore};
    use byteorder::{BigEndian as BE, WriteBytesExt};
    use std::io::BufWriter;

    #[test]
    fn test_file_name() {
        // Mt Washington: negative longitude floors west.
        let name = file_name(sw_corner(Coord {
            x: -71.30325,
            y: 44.2705,
        }));
        assert_eq!(name, "N44W072.hgt");

        // Sydney: both components negative-floor away from zero.
        let name = file_name(sw_corner(Coord { x: 151.21, y: -33.87 }));
        assert_eq!(name, "S34E151.hgt");

        // Quito: on the southern side of the equator, single-digit
        // padding on both axes.
        let name = file_name(sw_corner(Coord { x: -78.47, y: -0.18 }));
        assert_eq!(name, "S01W079.hgt");

        // Exactly on a tile corner belongs to that tile.
        let name = file_name(sw_corner(Coord { x: 8.0, y: 47.0 }));
        assert_eq!(name, "N47E008.hgt");
    }

    #[test]
    fn test_new_requires_height_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = TileStore::new(dir.path().to_owned(), TileMode::MemMap).unwrap_err();
        assert!(matches!(err, ElevationError::Path(_)));
    }

    /// Writes a flat SRTM3 tile (1201x1201, constant elevation) for
    /// `N44W072`.
    fn write_flat_tile(dir: &std::path::Path, elevation: i16) {
        let file = std::fs::File::create(dir.join("N44W072.hgt")).unwrap();
        let mut wtr = BufWriter::new(file);
        for _ in 0..(1201 * 1201) {
            wtr.write_i16::<BE>(elevation).unwrap();
        }
    }

    #[tokio::test]
    async fn test_resolve_elevation() {
        let dir = tempfile::tempdir().unwrap();
        write_flat_tile(dir.path(), 1903);

        let store = TileStore::new(dir.path().to_owned(), TileMode::MemMap).unwrap();
        let elevation = store
            .elevation(Coord {
                x: -71.30325,
                y: 44.2705,
            })
            .await
            .unwrap();
        assert_eq!(elevation, 1903.0);
    }

    #[tokio::test]
    async fn test_missing_tile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_flat_tile(dir.path(), 0);

        let store = TileStore::new(dir.path().to_owned(), TileMode::MemMap).unwrap();
        let err = store
            .elevation(Coord { x: 8.5, y: 47.2 })
            .await
            .unwrap_err();
        assert!(matches!(err, ElevationError::Missing(_)));
    }
}
