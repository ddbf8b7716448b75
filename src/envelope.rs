//! Spatial envelopes and the WGS84 validator (spec §3, §4.8/§4.9-adjacent).
//!
//! Internally everything is computed in traditional GIS order `(x = lon, y =
//! lat)`. [`BoundingBox`]'s fields are named `min_lat`/`min_lon`/... to match
//! the EPSG:4326-native output shape directly, so there is only one boundary
//! where lon/lat order matters — the field names themselves — rather than a
//! swap performed at serialization time, the single crossing spec §3 calls
//! out as "the most common source of regressions" if done more than once or
//! in the wrong place.

use geo::{coord, Coord, ConvexHull as _};
use serde::{Deserialize, Serialize};

use crate::errors::ExtentError;

/// A spatial envelope: either an axis-aligned bounding box or a convex
/// hull. Both carry an implicit WGS84 CRS once validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Envelope {
    BoundingBox(BoundingBox),
    ConvexHull(ConvexHull),
}

impl Envelope {
    /// The axis-aligned bounding box enclosing this envelope, regardless of
    /// its underlying representation. Used by the merger when combining a
    /// bounding box with a hull.
    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Envelope::BoundingBox(b) => b.clone(),
            Envelope::ConvexHull(h) => h.bounding_box(),
        }
    }

    /// All vertices of this envelope in `(lon, lat)` order. For a bounding
    /// box this is its four corners.
    pub fn vertices_lon_lat(&self) -> Vec<(f64, f64)> {
        match self {
            Envelope::BoundingBox(b) => b.corners_lon_lat(),
            Envelope::ConvexHull(h) => h.vertices.clone(),
        }
    }
}

/// An axis-aligned bounding box, stored internally in `(lon, lat)` order.
///
/// Fields are named `min_lat`/`min_lon`/`max_lat`/`max_lon` to match the
/// EPSG:4326-native output shape from spec §3 — but every *method* on this
/// type operates in `(lon, lat)` internally and only the accessors that say
/// so perform the swap.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Build a bounding box from `(lon, lat)` pairs — the internal working
    /// order everywhere else in this crate.
    pub fn from_lon_lat(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> BoundingBox {
        BoundingBox {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Build a degenerate bounding box around a single `(lon, lat)` point.
    pub fn from_point(lon: f64, lat: f64) -> BoundingBox {
        BoundingBox::from_lon_lat(lon, lat, lon, lat)
    }

    /// The four corners of this box, in `(lon, lat)` order,
    /// counter-clockwise starting at the southwest corner.
    pub fn corners_lon_lat(&self) -> Vec<(f64, f64)> {
        vec![
            (self.min_lon, self.min_lat),
            (self.max_lon, self.min_lat),
            (self.max_lon, self.max_lat),
            (self.min_lon, self.max_lat),
        ]
    }

    /// Element-wise min/max merge of two bounding boxes. Associative and
    /// commutative (spec §8).
    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lat: self.min_lat.min(other.min_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lat: self.max_lat.max(other.max_lat),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    /// True if this box is the degenerate `[0,0,0,0]` extent — almost
    /// always evidence of an uninitialized field upstream, per spec §4.8.
    pub fn is_degenerate_zero(&self) -> bool {
        self.min_lat == 0.0 && self.min_lon == 0.0 && self.max_lat == 0.0 && self.max_lon == 0.0
    }
}

/// A convex hull: an ordered, counter-clockwise ring of `(lon, lat)`
/// vertices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvexHull {
    pub vertices: Vec<(f64, f64)>,
}

impl ConvexHull {
    /// Compute the convex hull (monotone-chain, via `geo`) of a set of
    /// `(lon, lat)` points, winding counter-clockwise.
    pub fn from_points(points: &[(f64, f64)]) -> ConvexHull {
        let coords: Vec<Coord<f64>> = points.iter().map(|&(x, y)| coord! { x: x, y: y }).collect();
        let polygon = geo::MultiPoint::from(
            coords
                .into_iter()
                .map(geo::Point::from)
                .collect::<Vec<_>>(),
        )
        .convex_hull();
        let vertices: Vec<(f64, f64)> = polygon
            .exterior()
            .points()
            .map(|p| (p.x(), p.y()))
            .collect();
        // `geo`'s convex hull closes the ring by repeating the first vertex
        // at the end; we want an open ring.
        let mut vertices = vertices;
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        ConvexHull { vertices }
    }

    /// The bounding box enclosing this hull.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut min_lon = f64::INFINITY;
        let mut min_lat = f64::INFINITY;
        let mut max_lon = f64::NEG_INFINITY;
        let mut max_lat = f64::NEG_INFINITY;
        for &(lon, lat) in &self.vertices {
            min_lon = min_lon.min(lon);
            min_lat = min_lat.min(lat);
            max_lon = max_lon.max(lon);
            max_lat = max_lat.max(lat);
        }
        BoundingBox::from_lon_lat(min_lon, min_lat, max_lon, max_lat)
    }

    /// True if `(lon, lat)` winds counter-clockwise (shoelace formula
    /// positive area), per spec §8's hull invariant.
    pub fn winds_counter_clockwise(&self) -> bool {
        signed_area(&self.vertices) > 0.0
    }
}

fn signed_area(vertices: &[(f64, f64)]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let (x1, y1) = vertices[i];
        let (x2, y2) = vertices[(i + 1) % n];
        sum += x1 * y2 - x2 * y1;
    }
    sum / 2.0
}

/// Reject envelopes that can't be genuine WGS84 geographic extents (spec
/// §4.8).
///
/// Returns `Ok(())` if `envelope` passes, or an [`ExtentError::InvalidWgs84`]
/// naming the first rule it violates.
pub fn validate_wgs84(envelope: &Envelope, assume_wgs84: bool) -> Result<(), ExtentError> {
    let bbox = envelope.bounding_box();

    if bbox.min_lon < -180.0
        || bbox.max_lon > 180.0
        || bbox.min_lat < -90.0
        || bbox.max_lat > 90.0
    {
        return Err(ExtentError::InvalidWgs84 {
            reason: format!(
                "coordinates outside [-180,180]x[-90,90]: {:?}",
                bbox
            ),
        });
    }

    if bbox.is_degenerate_zero() {
        return Err(ExtentError::InvalidWgs84 {
            reason: "degenerate [0,0,0,0] extent, likely uninitialized".to_owned(),
        });
    }

    if !assume_wgs84 && looks_projected(&bbox) {
        return Err(ExtentError::InvalidWgs84 {
            reason: "coordinate magnitude suggests a projected CRS mislabeled as WGS84"
                .to_owned(),
        });
    }

    if let Envelope::ConvexHull(hull) = envelope {
        if hull.vertices.len() >= 3 && !hull.winds_counter_clockwise() {
            return Err(ExtentError::InvalidWgs84 {
                reason: "convex hull does not wind counter-clockwise".to_owned(),
            });
        }
    }

    Ok(())
}

/// A trivial heuristic (spec §4.8): coordinates within the valid lon/lat
/// range can still be a projected CRS mislabeled as WGS84 if the magnitude
/// is suspiciously large relative to any plausible geographic extent for a
/// single dataset (e.g. northing/easting values in the tens of thousands
/// that happen to fall under 180 by coincidence don't occur in practice —
/// what *does* occur is e.g. Web Mercator meters in the hundred-thousands,
/// which already fails the `[-180,180]` check above). The remaining case
/// this heuristic catches is a box that spans (nearly) the entire valid
/// range on both axes simultaneously with sub-degree-scale precision lost,
/// a common symptom of plugging raw easting/northing into lon/lat fields
/// for a small local survey.
fn looks_projected(bbox: &BoundingBox) -> bool {
    let lon_span = bbox.max_lon - bbox.min_lon;
    let lat_span = bbox.max_lat - bbox.min_lat;
    lon_span > 359.0 && lat_span > 179.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_merge_is_commutative_and_associative() {
        let a = BoundingBox::from_lon_lat(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::from_lon_lat(-1.0, -1.0, 0.5, 0.5);
        let c = BoundingBox::from_lon_lat(2.0, 2.0, 3.0, 3.0);
        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn convex_hull_contains_every_input_point_via_bbox() {
        let points = vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0), (1.0, 1.0)];
        let hull = ConvexHull::from_points(&points);
        assert!(hull.winds_counter_clockwise());
        let bbox = hull.bounding_box();
        for &(lon, lat) in &points {
            assert!(bbox.min_lon <= lon && lon <= bbox.max_lon);
            assert!(bbox.min_lat <= lat && lat <= bbox.max_lat);
        }
    }

    #[test]
    fn rejects_out_of_range_bbox() {
        let bbox = BoundingBox::from_lon_lat(-200.0, 0.0, 0.0, 10.0);
        let envelope = Envelope::BoundingBox(bbox);
        assert!(validate_wgs84(&envelope, false).is_err());
    }

    #[test]
    fn rejects_degenerate_zero_bbox() {
        let bbox = BoundingBox::from_lon_lat(0.0, 0.0, 0.0, 0.0);
        let envelope = Envelope::BoundingBox(bbox);
        assert!(validate_wgs84(&envelope, false).is_err());
    }

    #[test]
    fn accepts_plausible_geographic_bbox() {
        let bbox = BoundingBox::from_lon_lat(3.0, 50.0, 7.0, 53.0); // Benelux-ish
        let envelope = Envelope::BoundingBox(bbox);
        assert!(validate_wgs84(&envelope, false).is_ok());
    }

    #[test]
    fn rejects_whole_world_box_as_likely_projected_artifact() {
        let bbox = BoundingBox::from_lon_lat(-180.0, -90.0, 180.0, 90.0);
        let envelope = Envelope::BoundingBox(bbox);
        assert!(validate_wgs84(&envelope, false).is_err());
    }

    #[test]
    fn assume_wgs84_flag_bypasses_projected_heuristic() {
        let bbox = BoundingBox::from_lon_lat(-180.0, -90.0, 180.0, 90.0);
        let envelope = Envelope::BoundingBox(bbox);
        assert!(validate_wgs84(&envelope, true).is_ok());
    }
}
