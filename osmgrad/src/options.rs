use clap::Parser;
use std::path::{Path, PathBuf};

/// Render OSM ways as elevation-gradient-colored map layers.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input OSM extract (.osm.pbf).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Gradient-percentage category stops, ascending (e.g. `0 15 20
    /// 25`). Omit along with --colors to pass matching ways through
    /// uncolored.
    #[arg(short, long, num_args = 0..)]
    pub stops: Vec<f64>,

    /// One CSS color per stop (e.g. `green yellow orange red`).
    #[arg(short, long, num_args = 0..)]
    pub colors: Vec<String>,

    /// Overpass-style tag filters selecting ways; a way matching any
    /// filter is included (e.g. `[highway=path][sac_scale]`).
    #[arg(short, long, required = true, num_args = 1..)]
    pub filters: Vec<String>,

    /// KML output path. Defaults to the input path with a `.kml`
    /// extension.
    #[arg(short, long)]
    pub kml: Option<PathBuf>,

    /// GeoJSON output path. Defaults to the input path with a
    /// `.geojson` extension.
    #[arg(short, long)]
    pub geojson: Option<PathBuf>,

    /// Open the KML output when done.
    #[arg(short = 'x', long)]
    pub open: bool,

    /// Directory holding SRTM height (.hgt) tiles.
    #[arg(short = 'd', long, default_value = "./tmp/")]
    pub cache: PathBuf,

    /// Line width, in pixels.
    #[arg(short, long, default_value_t = 2.0)]
    pub width: f64,

    /// Line opacity, 0 to 1.
    #[arg(short, long, default_value_t = 1.0)]
    pub opacity: f64,

    /// Ways processed concurrently within a batch.
    #[arg(short, long, default_value_t = gradient::DEFAULT_CONCURRENCY)]
    pub jobs: usize,
}

/// Derives an output path next to `input`, replacing its `.osm.pbf`
/// (or `.pbf`) suffix with `extension`.
pub fn default_output(input: &Path, extension: &str) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("gradients");
    let stem = name.strip_suffix(".osm.pbf").unwrap_or(name);
    let stem = stem.strip_suffix(".pbf").unwrap_or(stem);
    input.with_file_name(format!("{stem}.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::default_output;
    use std::path::Path;

    #[test]
    fn test_default_output() {
        assert_eq!(
            default_output(Path::new("extracts/alps.osm.pbf"), "geojson"),
            Path::new("extracts/alps.geojson")
        );
        assert_eq!(
            default_output(Path::new("alps.pbf"), "kml"),
            Path::new("alps.kml")
        );
        assert_eq!(
            default_output(Path::new("alps"), "kml"),
            Path::new("alps.kml")
        );
    }
}
