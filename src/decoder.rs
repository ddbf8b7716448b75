//! A minimal built-in [`crate::orchestrator::FileExtentDecoder`] recognizing
//! GeoJSON files.
//!
//! Per-format decoders are an external collaborator (spec §1: "per-format
//! geospatial decoders ... are treated as black boxes with defined
//! interfaces") — a real deployment supplies its own, covering shapefiles,
//! GeoTIFF, and the rest. This one exists only so the orchestrator's
//! download-then-decode path is exercisable end-to-end without pulling in a
//! format library the spec explicitly excludes (GDAL/OGR). It recognizes
//! `.geojson`/`.json` files and nothing else.

use std::path::Path;

use crate::envelope::{BoundingBox, ConvexHull, Envelope};
use crate::errors::ExtentError;
use crate::orchestrator::FileExtentDecoder;
use crate::temporal::TimeInterval;

/// Recognizes `*.geojson` and `*.json` files whose contents parse as
/// GeoJSON, extracting a `bbox` member if present or else the envelope of
/// every coordinate in the document.
#[derive(Default)]
pub struct GeoJsonProbe;

impl FileExtentDecoder for GeoJsonProbe {
    fn decode(
        &self,
        local_path: &Path,
        _assume_wgs84: bool,
    ) -> Result<Option<(Envelope, Option<TimeInterval>)>, ExtentError> {
        let extension = local_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if !matches!(extension.as_deref(), Some("geojson") | Some("json")) {
            return Ok(None);
        }

        let contents = match std::fs::read_to_string(local_path) {
            Ok(contents) => contents,
            Err(err) => {
                return Err(ExtentError::DecodeFailed {
                    name: format!("{}: {err}", local_path.display()),
                })
            }
        };

        let geojson: geojson::GeoJson = match contents.parse() {
            Ok(g) => g,
            // Not every `.json` file is GeoJSON; that's not a decode
            // failure, just "this probe doesn't recognize it".
            Err(_) => return Ok(None),
        };

        if let Some(bbox) = top_level_bbox(&geojson) {
            return Ok(Some((Envelope::BoundingBox(bbox), None)));
        }

        let mut points = Vec::new();
        collect_points(&geojson, &mut points);
        if points.is_empty() {
            return Ok(None);
        }
        Ok(Some((
            Envelope::ConvexHull(ConvexHull::from_points(&points)),
            None,
        )))
    }
}

fn top_level_bbox(geojson: &geojson::GeoJson) -> Option<BoundingBox> {
    let bbox = match geojson {
        geojson::GeoJson::FeatureCollection(fc) => fc.bbox.as_ref(),
        geojson::GeoJson::Feature(f) => f.bbox.as_ref(),
        geojson::GeoJson::Geometry(g) => g.bbox.as_ref(),
    }?;
    if bbox.len() != 4 {
        return None;
    }
    Some(BoundingBox::from_lon_lat(bbox[0], bbox[1], bbox[2], bbox[3]))
}

fn collect_points(geojson: &geojson::GeoJson, out: &mut Vec<(f64, f64)>) {
    match geojson {
        geojson::GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(geometry) = &feature.geometry {
                    collect_geometry_points(&geometry.value, out);
                }
            }
        }
        geojson::GeoJson::Feature(f) => {
            if let Some(geometry) = &f.geometry {
                collect_geometry_points(&geometry.value, out);
            }
        }
        geojson::GeoJson::Geometry(g) => collect_geometry_points(&g.value, out),
    }
}

fn collect_geometry_points(value: &geojson::Value, out: &mut Vec<(f64, f64)>) {
    use geojson::Value::*;
    match value {
        Point(p) => {
            if p.len() >= 2 {
                out.push((p[0], p[1]));
            }
        }
        MultiPoint(points) | LineString(points) => {
            for p in points {
                if p.len() >= 2 {
                    out.push((p[0], p[1]));
                }
            }
        }
        Polygon(rings) | MultiLineString(rings) => {
            for ring in rings {
                for p in ring {
                    if p.len() >= 2 {
                        out.push((p[0], p[1]));
                    }
                }
            }
        }
        MultiPolygon(polygons) => {
            for polygon in polygons {
                for ring in polygon {
                    for p in ring {
                        if p.len() >= 2 {
                            out.push((p[0], p[1]));
                        }
                    }
                }
            }
        }
        GeometryCollection(geometries) => {
            for geometry in geometries {
                collect_geometry_points(&geometry.value, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn ignores_non_geojson_extensions() {
        let probe = GeoJsonProbe;
        let path = write_temp("geoextent-decoder-test.shp", "not geojson");
        let result = probe.decode(&path, false).unwrap();
        assert!(result.is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn ignores_json_that_is_not_geojson() {
        let probe = GeoJsonProbe;
        let path = write_temp("geoextent-decoder-test-not-geojson.json", r#"{"hello":"world"}"#);
        let result = probe.decode(&path, false).unwrap();
        assert!(result.is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn extracts_top_level_bbox_when_present() {
        let probe = GeoJsonProbe;
        let contents = r#"{
            "type": "FeatureCollection",
            "bbox": [3.0, 50.0, 7.0, 53.0],
            "features": []
        }"#;
        let path = write_temp("geoextent-decoder-test-bbox.geojson", contents);
        let (envelope, temporal) = probe.decode(&path, false).unwrap().unwrap();
        assert!(temporal.is_none());
        let bbox = envelope.bounding_box();
        assert_eq!(bbox.min_lon, 3.0);
        assert_eq!(bbox.max_lat, 53.0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn falls_back_to_computing_envelope_from_geometry() {
        let probe = GeoJsonProbe;
        let contents = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {"type": "Point", "coordinates": [4.9, 52.3]}
                },
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {"type": "Point", "coordinates": [5.1, 52.1]}
                }
            ]
        }"#;
        let path = write_temp("geoextent-decoder-test-geometry.geojson", contents);
        let (envelope, _) = probe.decode(&path, false).unwrap().unwrap();
        let bbox = envelope.bounding_box();
        assert!(bbox.min_lon <= 4.9 && bbox.max_lon >= 5.1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn empty_feature_collection_yields_no_envelope() {
        let probe = GeoJsonProbe;
        let contents = r#"{"type": "FeatureCollection", "features": []}"#;
        let path = write_temp("geoextent-decoder-test-empty.geojson", contents);
        let result = probe.decode(&path, false).unwrap();
        assert!(result.is_none());
        let _ = std::fs::remove_file(&path);
    }
}
