//! GeoJSON serialization: one `MultiLineString` feature per category,
//! styled with simplestyle properties so common renderers pick up the
//! colors, or one `LineString` feature per way in passthrough mode.

use anyhow::Result;
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use gradient::{Aggregate, Category, PassthroughWay, Polyline};
use std::{fs::File, io::BufWriter, path::Path};

pub fn export<P: AsRef<Path>>(
    path: P,
    categories: &[Category],
    aggregate: &Aggregate,
) -> Result<()> {
    let doc = document(categories, aggregate);
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &doc)?;
    Ok(())
}

pub fn document(categories: &[Category], aggregate: &Aggregate) -> GeoJson {
    let features = match aggregate {
        Aggregate::Categorized(lines) => categories
            .iter()
            .zip(lines)
            .map(|(category, polylines)| category_feature(category, polylines))
            .collect(),
        Aggregate::Passthrough(ways) => ways.iter().map(way_feature).collect(),
    };
    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn category_feature(category: &Category, polylines: &[Polyline]) -> Feature {
    let coords = polylines
        .iter()
        .map(|line| line.iter().map(|point| point.to_vec()).collect())
        .collect();

    let mut properties = JsonObject::new();
    properties.insert("name".to_owned(), category.name.clone().into());
    properties.insert("min".to_owned(), category.min.into());
    properties.insert("max".to_owned(), category.max.into());
    properties.insert("stroke".to_owned(), category.style.color.clone().into());
    properties.insert("stroke-width".to_owned(), category.style.width.into());
    properties.insert("stroke-opacity".to_owned(), category.style.opacity.into());

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::MultiLineString(coords))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn way_feature(way: &PassthroughWay) -> Feature {
    let coords = way.coords.iter().map(|coord| vec![coord.x, coord.y]).collect();

    let mut properties = JsonObject::new();
    for (key, value) in &way.tags {
        properties.insert(key.clone(), value.clone().into());
    }

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coords))),
        id: Some(Id::Number(way.id.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}
