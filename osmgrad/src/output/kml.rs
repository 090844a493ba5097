//! KML serialization: a shared `Style` plus a `MultiGeometry`
//! placemark per category, or one placemark per way in passthrough
//! mode. The invoking command line is recorded as the document
//! description so a layer can be regenerated later.

use anyhow::Result;
use gradient::{Aggregate, Category, LineStyle, PassthroughWay, Polyline, TagMap};
use kml::{
    types::{
        Coord, Element, Geometry, LineString, LineStyle as KmlLineStyle, MultiGeometry, Placemark,
        Style,
    },
    Kml, KmlDocument, KmlVersion, KmlWriter,
};
use std::{collections::HashMap, fs::File, io::BufWriter, path::Path};

pub fn export<P: AsRef<Path>>(
    path: P,
    name: &str,
    description: &str,
    categories: &[Category],
    aggregate: &Aggregate,
) -> Result<()> {
    let doc = document(name, description, categories, aggregate);
    let mut writer = KmlWriter::from_writer(BufWriter::new(File::create(path)?));
    writer.write(&doc)?;
    Ok(())
}

pub fn document(
    name: &str,
    description: &str,
    categories: &[Category],
    aggregate: &Aggregate,
) -> Kml {
    let mut elements = vec![
        text_element("name", name),
        text_element("description", description),
    ];

    match aggregate {
        Aggregate::Categorized(lines) => {
            for (index, category) in categories.iter().enumerate() {
                elements.push(Kml::Style(Style {
                    id: Some(style_id(index)),
                    line: Some(KmlLineStyle {
                        color: kml_color(&category.style),
                        width: category.style.width,
                        ..Default::default()
                    }),
                    ..Default::default()
                }));
            }
            for (index, (category, polylines)) in categories.iter().zip(lines).enumerate() {
                elements.push(category_placemark(index, category, polylines));
            }
        }
        Aggregate::Passthrough(ways) => {
            for way in ways {
                elements.push(way_placemark(way));
            }
        }
    }

    Kml::KmlDocument(KmlDocument {
        version: KmlVersion::V22,
        attrs: HashMap::from([(
            "xmlns".to_owned(),
            "http://www.opengis.net/kml/2.2".to_owned(),
        )]),
        elements: vec![Kml::Document {
            attrs: HashMap::new(),
            elements,
        }],
    })
}

fn category_placemark(index: usize, category: &Category, polylines: &[Polyline]) -> Kml {
    Kml::Placemark(Placemark {
        name: Some(category.name.clone()),
        geometry: Some(Geometry::MultiGeometry(MultiGeometry {
            geometries: polylines.iter().map(line_string).collect(),
            attrs: HashMap::new(),
        })),
        children: vec![Element {
            name: "styleUrl".to_owned(),
            content: Some(format!("#{}", style_id(index))),
            ..Default::default()
        }],
        ..Default::default()
    })
}

fn way_placemark(way: &PassthroughWay) -> Kml {
    let line = way
        .coords
        .iter()
        .map(|coord| [coord.x, coord.y])
        .collect::<Vec<_>>();
    Kml::Placemark(Placemark {
        name: way.tags.get("name").cloned(),
        geometry: Some(line_string(&line)),
        children: vec![extended_data(&way.tags)],
        ..Default::default()
    })
}

fn line_string(line: &Polyline) -> Geometry {
    Geometry::LineString(LineString {
        coords: line
            .iter()
            .map(|&[x, y]| Coord { x, y, z: None })
            .collect(),
        tessellate: true,
        ..Default::default()
    })
}

/// Tags ride along as `ExtendedData`, mirroring how GeoJSON
/// passthrough features keep them as properties.
fn extended_data(tags: &TagMap) -> Element {
    let mut keys: Vec<&String> = tags.keys().collect();
    keys.sort();
    Element {
        name: "ExtendedData".to_owned(),
        children: keys
            .into_iter()
            .map(|key| Element {
                name: "Data".to_owned(),
                attrs: HashMap::from([("name".to_owned(), key.clone())]),
                children: vec![Element {
                    name: "value".to_owned(),
                    content: Some(tags[key].clone()),
                    ..Default::default()
                }],
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn text_element(name: &str, content: &str) -> Kml {
    Kml::Element(Element {
        name: name.to_owned(),
        content: Some(content.to_owned()),
        ..Default::default()
    })
}

fn style_id(index: usize) -> String {
    format!("gradient-{index}")
}

/// KML colors are `aabbggrr`. Falls back to opaque gray when the style
/// color is not a `#rrggbb` literal (an unrecognized CSS name).
fn kml_color(style: &LineStyle) -> String {
    let alpha = (style.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    match parse_hex_color(&style.color) {
        Some((r, g, b)) => format!("{alpha:02x}{b:02x}{g:02x}{r:02x}"),
        None => format!("{alpha:02x}555555"),
    }
}

fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}
