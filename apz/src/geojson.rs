//! GeoJSON input and output.
//!
//! This module reads zones and structure footprints from GeoJSON feature
//! collections and writes the assessment layers back out. Enable the `geojson`
//! feature to use this module.
//!
//! Coordinates are taken as-is: zones, structures and grids must share one
//! projected coordinate system in metres.
//!
//! # Example
//!
//! ```ignore
//! use apz::geojson::{read_zones, ZoneFields};
//!
//! let text = std::fs::read_to_string("zones.geojson")?;
//! let zones = read_zones(&text, &ZoneFields::default())?;
//! ```

use std::str::FromStr;

use geo::{Geometry as GeoGeometry, MultiPolygon};
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde_json::json;

use crate::defensible::{BoundarySegment, ProtectionZone};
use crate::elevation::PartitionRegion;
use crate::error::{ApzError, Result};
use crate::pipeline::Assessment;
use crate::zone::{Structure, Zone, ZoneId};

/// Property names read from zone features.
#[derive(Debug, Clone)]
pub struct ZoneFields {
    /// Numeric zone id; falls back to the feature id, then the 1-based position.
    pub id: String,
    /// Free-text vegetation classification.
    pub vegetation: String,
}

impl Default for ZoneFields {
    fn default() -> Self {
        Self {
            id: "zone_id".to_string(),
            vegetation: "vegetation".to_string(),
        }
    }
}

fn feature_collection(text: &str) -> Result<FeatureCollection> {
    match GeoJson::from_str(text)? {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        GeoJson::Feature(feature) => Ok(FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        }),
        GeoJson::Geometry(_) => Err(ApzError::InvalidGeometry {
            message: "expected a Feature or FeatureCollection, got a bare geometry".to_string(),
        }),
    }
}

fn polygonal(feature: &Feature, position: usize) -> Result<MultiPolygon<f64>> {
    let geometry = feature.geometry.as_ref().ok_or_else(|| ApzError::InvalidGeometry {
        message: format!("feature {} has no geometry", position),
    })?;
    match GeoGeometry::<f64>::try_from(geometry.value.clone())? {
        GeoGeometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        GeoGeometry::MultiPolygon(mp) => Ok(mp),
        _ => Err(ApzError::InvalidGeometry {
            message: format!("feature {} must be a Polygon or MultiPolygon", position),
        }),
    }
}

fn feature_zone_id(feature: &Feature, field: &str, position: usize) -> Result<ZoneId> {
    let invalid = |what: String| ApzError::InvalidGeometry {
        message: format!("feature {}: {}", position, what),
    };

    if let Some(value) = feature.property(field) {
        return match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| invalid(format!("'{}' is not an integer: {}", field, n))),
            serde_json::Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| invalid(format!("'{}' is not an integer: {:?}", field, s))),
            other => Err(invalid(format!("'{}' is not an integer: {}", field, other))),
        };
    }

    match &feature.id {
        Some(Id::Number(n)) => n
            .as_i64()
            .ok_or_else(|| invalid(format!("feature id is not an integer: {}", n))),
        Some(Id::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| invalid(format!("feature id is not an integer: {:?}", s))),
        None => Ok(position as ZoneId),
    }
}

/// Read zones from a GeoJSON Feature or FeatureCollection.
///
/// # Errors
///
/// Returns an error if the text is not GeoJSON, a feature has no polygonal
/// geometry, or a zone id is not an integer.
pub fn read_zones(text: &str, fields: &ZoneFields) -> Result<Vec<Zone>> {
    feature_collection(text)?
        .features
        .iter()
        .enumerate()
        .map(|(i, feature)| {
            let position = i + 1;
            let geometry = polygonal(feature, position)?;
            let id = feature_zone_id(feature, &fields.id, position)?;
            let zone = Zone::new(id, geometry);
            Ok(match feature.property(&fields.vegetation).and_then(|v| v.as_str()) {
                Some(label) => zone.with_vegetation(label),
                None => zone,
            })
        })
        .collect()
}

/// Read structure footprints. MultiPolygon features yield one structure per part.
///
/// Structures are numbered from 1 in reading order.
pub fn read_structures(text: &str) -> Result<Vec<Structure>> {
    let mut structures = Vec::new();
    for (i, feature) in feature_collection(text)?.features.iter().enumerate() {
        for polygon in polygonal(feature, i + 1)? {
            structures.push(Structure::new(structures.len() as i64 + 1, polygon));
        }
    }
    Ok(structures)
}

fn feature(value: Value, properties: serde_json::Value) -> Feature {
    let properties: Option<JsonObject> = match properties {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    };
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties,
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Elevation partition layer.
pub fn partitions_layer(regions: &[PartitionRegion]) -> FeatureCollection {
    collection(
        regions
            .iter()
            .filter(|r| !r.region.0.is_empty())
            .map(|r| {
                feature(
                    Value::from(&r.region),
                    json!({
                        "zone_id": r.zone_id,
                        "partition_label": r.partition.label(),
                        "cell_count": r.cell_count,
                        "area_m2": r.area_m2,
                    }),
                )
            })
            .collect(),
    )
}

/// Assessment layer: one feature per partition region with its resolved distance.
pub fn assessment_layer(assessment: &Assessment) -> FeatureCollection {
    collection(
        assessment
            .partitions
            .iter()
            .zip(&assessment.assessments)
            .filter(|(r, _)| !r.region.0.is_empty())
            .map(|(r, a)| {
                feature(
                    Value::from(&r.region),
                    json!({
                        "zone_id": a.zone_id,
                        "partition_label": a.partition.label(),
                        "vegetation": a.vegetation,
                        "fuel_class": a.fuel_class.name(),
                        "effective_slope_bucket": a.bucket.map(|b| b.label()),
                        "apz_distance_m": a.distance_m,
                        "max_slope_deg": a.max_slope_deg,
                    }),
                )
            })
            .collect(),
    )
}

/// Unified protection-zone layer; empty when no zone produced geometry.
pub fn protection_zone_layer(zone: Option<&ProtectionZone>) -> FeatureCollection {
    collection(
        zone.map(|z| {
            feature(
                Value::from(&z.polygon),
                json!({
                    "zone_ids": z.zone_ids,
                    "max_apz_distance_m": z.max_distance_m,
                    "area_m2": z.area_m2,
                }),
            )
        })
        .into_iter()
        .collect(),
    )
}

/// Boundary polyline layer, one feature per segment.
pub fn boundary_layer(segments: &[BoundarySegment]) -> FeatureCollection {
    collection(
        segments
            .iter()
            .map(|s| {
                let a = &s.attributes;
                feature(
                    Value::from(&s.line),
                    json!({
                        "zone_id": a.zone_id,
                        "partition_label": a.partition.label(),
                        "apz_distance_m": a.apz_distance_m,
                        "fuel_class": a.fuel_class.name(),
                        "effective_slope_bucket": a.effective_slope_bucket.map(|b| b.label()),
                    }),
                )
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::ElevationPartition;
    use geo::{coord, Rect};

    const ZONES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "zone_id": 10, "vegetation": "Coastal Swamp Forest" },
                "geometry": { "type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]] }
            },
            {
                "type": "Feature",
                "id": 42,
                "properties": {},
                "geometry": { "type": "Polygon", "coordinates": [[[10,0],[20,0],[20,10],[10,10],[10,0]]] }
            },
            {
                "type": "Feature",
                "properties": null,
                "geometry": { "type": "MultiPolygon", "coordinates": [
                    [[[30,0],[40,0],[40,10],[30,10],[30,0]]],
                    [[[50,0],[60,0],[60,10],[50,10],[50,0]]]
                ] }
            }
        ]
    }"#;

    #[test]
    fn test_read_zones() {
        let zones = read_zones(ZONES, &ZoneFields::default()).unwrap();
        assert_eq!(zones.len(), 3);

        assert_eq!(zones[0].id(), 10);
        assert_eq!(zones[0].vegetation(), Some("Coastal Swamp Forest"));
        assert_eq!(zones[0].area(), 100.0);

        // Feature id, then position
        assert_eq!(zones[1].id(), 42);
        assert_eq!(zones[1].vegetation(), None);
        assert_eq!(zones[2].id(), 3);
        assert_eq!(zones[2].area(), 200.0);
    }

    #[test]
    fn test_read_zones_custom_fields() {
        let text = r#"{"type": "Feature", "properties": {"OBJECTID": "7", "VEG": "Grassland"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}"#;
        let fields = ZoneFields {
            id: "OBJECTID".to_string(),
            vegetation: "VEG".to_string(),
        };
        let zones = read_zones(text, &fields).unwrap();
        assert_eq!(zones[0].id(), 7);
        assert_eq!(zones[0].vegetation(), Some("Grassland"));
    }

    #[test]
    fn test_read_zones_rejects_points() {
        let text = r#"{"type": "Feature", "properties": {},
            "geometry": {"type": "Point", "coordinates": [0, 0]}}"#;
        assert!(matches!(
            read_zones(text, &ZoneFields::default()),
            Err(ApzError::InvalidGeometry { .. })
        ));
        assert!(read_zones("not json", &ZoneFields::default()).is_err());
    }

    #[test]
    fn test_read_structures_splits_multipolygons() {
        let structures = read_structures(ZONES).unwrap();
        assert_eq!(structures.len(), 4);
        assert_eq!(
            structures.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_partition_layer_properties() {
        let region = MultiPolygon::new(vec![
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 5.0, y: 5.0 }).to_polygon(),
        ]);
        let regions = vec![PartitionRegion {
            zone_id: 3,
            partition: ElevationPartition::Downslope,
            region,
            cell_count: 1,
            area_m2: 25.0,
        }];

        let layer = partitions_layer(&regions);
        assert_eq!(layer.features.len(), 1);
        let f = &layer.features[0];
        assert_eq!(f.property("partition_label").and_then(|v| v.as_str()), Some("Downslope"));
        assert_eq!(f.property("zone_id").and_then(|v| v.as_i64()), Some(3));
        assert!(matches!(
            f.geometry.as_ref().map(|g| &g.value),
            Some(Value::MultiPolygon(_))
        ));
    }

    #[test]
    fn test_empty_protection_layer() {
        assert!(protection_zone_layer(None).features.is_empty());
    }
}
