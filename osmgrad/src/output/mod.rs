pub mod geojson;
pub mod kml;
