//! SRTM elevation (`.hgt`) file format.
//!
//! # References
//!
//! 1. [30-Meter SRTM Tile Downloader](https://dwtkns.com/srtm30m)
//! 1. [Archive Team](http://fileformats.archiveteam.org/index.php?title=HGT&oldid=17250)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

mod error;

pub use crate::error::SrtmError;
use byteorder::{BigEndian as BE, ReadBytesExt};
use geo::geometry::Coord;
use memmap2::Mmap;
use std::{fs::File, io::BufReader, mem::size_of, path::Path};

/// Base floating point type used for all coordinates.
pub type C = f64;

const ARCSEC_PER_DEG: C = 3600.0;

/// Void/no-data sentinel in SRTM samples.
pub const VOID: i16 = -32768;

#[derive(Debug)]
pub struct Tile {
    /// Southwest corner of the tile.
    ///
    /// Specifically, the _center_ of the SW most sample of the tile.
    sw_corner_center: Coord<C>,

    /// Arcseconds per sample.
    resolution: u8,

    /// Number of (columns, rows) in this tile.
    dimensions: (usize, usize),

    /// Elevation samples.
    samples: SampleStore,
}

#[derive(Debug)]
enum SampleStore {
    InMem(Box<[i16]>),
    MemMap(Mmap),
}

impl SampleStore {
    fn get_unchecked(&self, index: usize) -> i16 {
        match self {
            Self::InMem(samples) => samples[index],
            Self::MemMap(raw) => {
                let start = index * size_of::<u16>();
                let end = start + size_of::<u16>();
                let bytes = &mut &raw.as_ref()[start..end];
                bytes.read_i16::<BE>().unwrap()
            }
        }
    }
}

impl Tile {
    /// Returns a Tile read into memory from the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SrtmError> {
        let (resolution, dimensions @ (cols, rows)) = extract_resolution(&path)?;
        let sw_corner_center = {
            let Coord { x, y } = parse_sw_corner(&path)?;
            Coord {
                x: C::from(x),
                y: C::from(y),
            }
        };

        let mut file = BufReader::new(File::open(path)?);

        let samples = {
            let mut sample_store = Vec::with_capacity(cols * rows);
            for _ in 0..(cols * rows) {
                let sample = file.read_i16::<BE>()?;
                sample_store.push(sample);
            }
            SampleStore::InMem(sample_store.into_boxed_slice())
        };

        Ok(Self {
            sw_corner_center,
            resolution,
            dimensions,
            samples,
        })
    }

    /// Returns a Tile using the memory-mapped file as storage.
    pub fn memmap<P: AsRef<Path>>(path: P) -> Result<Self, SrtmError> {
        let (resolution, dimensions) = extract_resolution(&path)?;
        let sw_corner_center = {
            let Coord { x, y } = parse_sw_corner(&path)?;
            Coord {
                x: C::from(x),
                y: C::from(y),
            }
        };

        let samples = {
            let file = File::open(path)?;
            let mmap = unsafe { Mmap::map(&file)? };
            SampleStore::MemMap(mmap)
        };

        Ok(Self {
            sw_corner_center,
            resolution,
            dimensions,
            samples,
        })
    }

    /// Returns a Tile backed by the provided in-memory samples.
    ///
    /// `samples` is row-major with row 0 northernmost, exactly as the
    /// on-disk layout.
    pub fn from_samples(
        sw_corner: Coord<i16>,
        resolution: u8,
        dimensions: (usize, usize),
        samples: Vec<i16>,
    ) -> Self {
        assert_eq!(samples.len(), dimensions.0 * dimensions.1);
        Self {
            sw_corner_center: Coord {
                x: C::from(sw_corner.x),
                y: C::from(sw_corner.y),
            },
            resolution,
            dimensions,
            samples: SampleStore::InMem(samples.into_boxed_slice()),
        }
    }

    /// Returns the number of samples in this tile.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        let (x, y) = self.dimensions;
        x * y
    }

    /// Returns this tile's resolution in arcseconds per sample.
    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Returns the nearest sample to the given geo coordinates.
    pub fn get(&self, coord: Coord<C>) -> Option<i16> {
        let (idx_x, idx_y) = self.coord_to_xy(coord);
        #[allow(clippy::cast_possible_wrap)]
        if 0 <= idx_x
            && idx_x < self.dimensions.0 as isize
            && 0 <= idx_y
            && idx_y < self.dimensions.1 as isize
        {
            #[allow(clippy::cast_sign_loss)]
            Some(self.get_xy((idx_x as usize, idx_y as usize)))
        } else {
            None
        }
    }

    /// Returns the bilinearly interpolated elevation at the given geo
    /// coordinates, or `None` if the coordinate falls outside this
    /// tile.
    ///
    /// Falls back to the nearest sample when any of the surrounding
    /// samples is void.
    pub fn interpolated(&self, coord: Coord<C>) -> Option<f64> {
        let (cols, rows) = self.dimensions;
        let c = ARCSEC_PER_DEG / C::from(self.resolution);
        let x_f = (coord.x - self.sw_corner_center.x) * c;
        let y_f = (coord.y - self.sw_corner_center.y) * c;

        #[allow(clippy::cast_precision_loss)]
        if x_f < 0.0 || x_f > (cols - 1) as C || y_f < 0.0 || y_f > (rows - 1) as C {
            return None;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let x_0 = (x_f.floor() as usize).min(cols - 2);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let y_0 = (y_f.floor() as usize).min(rows - 2);

        #[allow(clippy::cast_precision_loss)]
        let (d_x, d_y) = (x_f - x_0 as C, y_f - y_0 as C);

        let v_00 = self.get_xy((x_0, y_0));
        let v_10 = self.get_xy((x_0 + 1, y_0));
        let v_01 = self.get_xy((x_0, y_0 + 1));
        let v_11 = self.get_xy((x_0 + 1, y_0 + 1));

        if [v_00, v_10, v_01, v_11].contains(&VOID) {
            return self.get(coord).map(|s| if s == VOID { 0.0 } else { f64::from(s) });
        }

        let south = f64::from(v_00) * (1.0 - d_x) + f64::from(v_10) * d_x;
        let north = f64::from(v_01) * (1.0 - d_x) + f64::from(v_11) * d_x;
        Some(south * (1.0 - d_y) + north * d_y)
    }
}

/// Private API
impl Tile {
    /// `(x, y)` addresses samples with x increasing eastward and y
    /// increasing northward, while storage has row 0 northernmost.
    fn get_xy(&self, (x, y): (usize, usize)) -> i16 {
        let (cols, rows) = self.dimensions;
        let idx_1d = cols * (rows - 1 - y) + x;
        self.samples.get_unchecked(idx_1d)
    }

    fn coord_to_xy(&self, coord: Coord<C>) -> (isize, isize) {
        let c = ARCSEC_PER_DEG / C::from(self.resolution);
        // Compensate for sample-center registration so that rounding
        // lands on the nearest sample.
        let cc = 1. / (c * 2.);
        #[allow(clippy::cast_possible_truncation)]
        let x = ((coord.x - self.sw_corner_center.x + cc) * c) as isize;
        #[allow(clippy::cast_possible_truncation)]
        let y = ((coord.y - self.sw_corner_center.y + cc) * c) as isize;
        (x, y)
    }
}

fn extract_resolution<P: AsRef<Path>>(path: P) -> Result<(u8, (usize, usize)), SrtmError> {
    const RES_1_ARCSECOND_LEN: u64 = 3601 * 3601 * size_of::<u16>() as u64;
    const RES_3_ARCSECOND_LEN: u64 = 1201 * 1201 * size_of::<u16>() as u64;
    match path.as_ref().metadata().map(|m| m.len())? {
        RES_1_ARCSECOND_LEN => Ok((1, (3601, 3601))),
        RES_3_ARCSECOND_LEN => Ok((3, (1201, 1201))),
        invalid_len => Err(SrtmError::HgtLen(
            invalid_len,
            path.as_ref().to_owned(),
        )),
    }
}

/// Parses the tile's SW corner from its file name, e.g. `N44W072.hgt`.
pub fn parse_sw_corner<P: AsRef<Path>>(path: P) -> Result<Coord<i16>, SrtmError> {
    let mk_err = || SrtmError::HgtName(path.as_ref().to_owned());
    let name = path
        .as_ref()
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .ok_or_else(mk_err)?;
    if name.len() != 7 {
        return Err(mk_err());
    }
    let lat_sign = match &name[0..1] {
        "N" => 1,
        "S" => -1,
        _ => return Err(mk_err()),
    };
    let lat = lat_sign * name[1..3].parse::<i16>().map_err(|_| mk_err())?;
    let lon_sign = match &name[3..4] {
        "E" => 1,
        "W" => -1,
        _ => return Err(mk_err()),
    };
    let lon = lon_sign * name[4..7].parse::<i16>().map_err(|_| mk_err())?;
    Ok(Coord { x: lon, y: lat })
}

#[cfg(test)]
mod tests {
    use super::{extract_resolution, parse_sw_corner, Coord, Tile, VOID};
    use approx::assert_relative_eq;
    use std::io::Write;

    // A 3x3 tile whose SW corner is (0, 0), with samples spaced one
    // arcsecond apart:
    //
    //   70 80 90      row 0 (north)
    //   40 50 60
    //   10 20 30      row 2 (south)
    fn tiny_tile() -> Tile {
        let samples = vec![70, 80, 90, 40, 50, 60, 10, 20, 30];
        Tile::from_samples(Coord { x: 0, y: 0 }, 1, (3, 3), samples)
    }

    const ARCSEC: f64 = 1.0 / 3600.0;

    #[test]
    fn test_parse_hgt_name() {
        let sw_corner = parse_sw_corner("N44W072.hgt").unwrap();
        assert_eq!(sw_corner, Coord { x: -72, y: 44 });

        let sw_corner = parse_sw_corner("S01E000.hgt").unwrap();
        assert_eq!(sw_corner, Coord { x: 0, y: -1 });

        assert!(parse_sw_corner("X44W072.hgt").is_err());
        assert!(parse_sw_corner("tile.hgt").is_err());
    }

    #[test]
    fn test_extract_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("N00E000.hgt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; 1201 * 1201 * 2]).unwrap();
        assert_eq!(extract_resolution(&path).unwrap(), (3, (1201, 1201)));

        let path = dir.path().join("N00E001.hgt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0u8; 16]).unwrap();
        assert!(extract_resolution(&path).is_err());
    }

    #[test]
    fn test_nearest_sample() {
        let tile = tiny_tile();
        assert_eq!(tile.get(Coord { x: 0.0, y: 0.0 }), Some(10));
        assert_eq!(tile.get(Coord { x: 2.0 * ARCSEC, y: 0.0 }), Some(30));
        assert_eq!(tile.get(Coord { x: 0.0, y: 2.0 * ARCSEC }), Some(70));
        assert_eq!(
            tile.get(Coord {
                x: 2.0 * ARCSEC,
                y: 2.0 * ARCSEC
            }),
            Some(90)
        );
        // Clearly outside the sampled grid.
        assert_eq!(tile.get(Coord { x: -2.0 * ARCSEC, y: 0.0 }), None);
    }

    #[test]
    fn test_interpolated() {
        let tile = tiny_tile();
        // Exactly on samples.
        assert_relative_eq!(tile.interpolated(Coord { x: 0.0, y: 0.0 }).unwrap(), 10.0);
        assert_relative_eq!(
            tile.interpolated(Coord {
                x: 2.0 * ARCSEC,
                y: 2.0 * ARCSEC
            })
            .unwrap(),
            90.0
        );
        // Midway between the first two samples of the southern row.
        assert_relative_eq!(
            tile.interpolated(Coord {
                x: 0.5 * ARCSEC,
                y: 0.0
            })
            .unwrap(),
            15.0
        );
        // Center of the SW cell.
        assert_relative_eq!(
            tile.interpolated(Coord {
                x: 0.5 * ARCSEC,
                y: 0.5 * ARCSEC
            })
            .unwrap(),
            30.0
        );
        assert_eq!(tile.interpolated(Coord { x: 1.0, y: 1.0 }), None);
    }

    #[test]
    fn test_interpolated_void_falls_back_to_nearest() {
        // Void at the grid center, so every interpolation cell is
        // tainted and lookups fall back to the nearest sample.
        let samples = vec![70, 80, 90, 40, VOID, 60, 10, 20, 30];
        let tile = Tile::from_samples(Coord { x: 0, y: 0 }, 1, (3, 3), samples);
        assert_relative_eq!(
            tile.interpolated(Coord {
                x: 1.6 * ARCSEC,
                y: 1.6 * ARCSEC
            })
            .unwrap(),
            90.0
        );
        // Nearest sample itself is void: report zero rather than the
        // sentinel.
        assert_relative_eq!(
            tile.interpolated(Coord {
                x: 1.0 * ARCSEC,
                y: 1.0 * ARCSEC
            })
            .unwrap(),
            0.0
        );
    }
}
