use geo::LineString;
use geojson::{Feature, FeatureCollection, Geometry, GeometryValue};
use serde_json::json;

use crate::algo::projection::reproject_line;
use crate::model::{Crs, Street};
use crate::Error;

use super::{Analysis, WalkClassification};

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        features,
        bbox: None,
        foreign_members: None,
    }
}

/// GeoJSON wants lon/lat
fn to_geojson_geometry(line: &LineString<f64>, crs: Crs) -> Result<Geometry, Error> {
    let line = reproject_line(line, crs, Crs::Wgs84)?;
    Ok(Geometry::new(GeometryValue::from(&line)))
}

fn street_feature(street: &Street, crs: Crs) -> Result<Feature, Error> {
    let data_type = if street.covered {
        "covered_street"
    } else {
        "uncovered_street"
    };

    let value = json!({
        "type": "Feature",
        "geometry": to_geojson_geometry(&street.geometry, crs)?,
        "properties": {
            "street_id": street.street_id,
            "name": street.name,
            "covered": street.covered,
            "coverage_percent": street.coverage_percent,
            "data_type": data_type,
        }
    });

    serde_json::from_value::<Feature>(value).map_err(|e| Error::GeoJsonError(e.to_string()))
}

fn walk_features(walk: &WalkClassification) -> Result<Vec<Feature>, Error> {
    walk.kept
        .iter()
        .enumerate()
        .map(|(part, line)| {
            let value = json!({
                "type": "Feature",
                "geometry": to_geojson_geometry(line, walk.crs)?,
                "properties": {
                    "source_id": walk.source_id,
                    "part": part,
                    "data_type": "walk",
                    "verdict": walk.verdict,
                    "metrics": walk.metrics,
                    "total_segments": walk.total_segments,
                    "kept_segments": walk.kept_segments,
                    "start_time": walk.start_time,
                }
            });
            serde_json::from_value::<Feature>(value).map_err(|e| Error::GeoJsonError(e.to_string()))
        })
        .collect()
}

/// Streets as a `FeatureCollection` tagged covered / uncovered
pub fn streets_to_geojson(streets: &[Street], crs: Crs) -> Result<FeatureCollection, Error> {
    let features = streets
        .iter()
        .map(|street| street_feature(street, crs))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(collection(features))
}

/// Kept walk geometries, one feature per contiguous walking part
pub fn walks_to_geojson(walks: &[WalkClassification]) -> Result<FeatureCollection, Error> {
    let mut features = Vec::new();
    for walk in walks {
        features.extend(walk_features(walk)?);
    }
    Ok(collection(features))
}

impl Analysis {
    /// Streets followed by walks, in one `FeatureCollection`
    pub fn to_geojson(&self) -> Result<FeatureCollection, Error> {
        let mut streets = streets_to_geojson(&self.streets, self.crs)?;
        streets.features.extend(walks_to_geojson(&self.walks)?.features);
        Ok(streets)
    }

    pub fn to_geojson_string(&self) -> Result<String, Error> {
        serde_json::to_string(&self.to_geojson()?).map_err(|e| Error::GeoJsonError(e.to_string()))
    }
}
