//! The Extent Merger (spec §4.9): combines per-file envelopes and temporal
//! intervals into one, in WGS84, re-validating before emission.

use crate::envelope::{validate_wgs84, BoundingBox, ConvexHull, Envelope};
use crate::errors::ExtentError;
use crate::temporal::TimeInterval;

/// Merge two envelopes. If either is a [`Envelope::ConvexHull`], the result
/// is a hull computed over the union of both inputs' vertices (a bounding
/// box contributes its four corners, per spec §4.9). Otherwise the result
/// is the element-wise min/max bounding box.
///
/// Associative and commutative (spec §8), since both the bounding-box merge
/// and "union vertices then recompute the hull" are.
pub fn merge_envelopes(a: &Envelope, b: &Envelope) -> Envelope {
    match (a, b) {
        (Envelope::BoundingBox(a), Envelope::BoundingBox(b)) => {
            Envelope::BoundingBox(a.merge(b))
        }
        _ => {
            let mut points = a.vertices_lon_lat();
            points.extend(b.vertices_lon_lat());
            Envelope::ConvexHull(ConvexHull::from_points(&points))
        }
    }
}

/// Fold a non-empty sequence of envelopes into one. Returns `None` for an
/// empty input.
pub fn merge_all_envelopes<'a>(envelopes: impl IntoIterator<Item = &'a Envelope>) -> Option<Envelope> {
    let mut iter = envelopes.into_iter();
    let first = iter.next()?.clone();
    Some(iter.fold(first, |acc, next| merge_envelopes(&acc, next)))
}

/// Fold a non-empty sequence of envelopes into one, honoring
/// `use_convex_hull` (spec §6.1): when set, every input — bounding boxes
/// included — contributes its vertices to a single hull, rather than only
/// producing one when an input already is a hull (spec §4.9's "when any
/// input is a bounding box, it is treated as its four corners" applies to
/// every input unconditionally in this mode, not just ones already mixed
/// with a hull).
pub fn merge_all_envelopes_configured<'a>(
    envelopes: impl IntoIterator<Item = &'a Envelope>,
    use_convex_hull: bool,
) -> Option<Envelope> {
    if !use_convex_hull {
        return merge_all_envelopes(envelopes);
    }
    let mut points = Vec::new();
    for envelope in envelopes {
        points.extend(envelope.vertices_lon_lat());
    }
    if points.is_empty() {
        return None;
    }
    Some(Envelope::ConvexHull(ConvexHull::from_points(&points)))
}

/// Merge two optional temporal intervals. `None` on either side behaves
/// like a fully-open interval contributing no constraint; the result is
/// `None` only if both inputs are `None`.
pub fn merge_temporal(
    a: Option<&TimeInterval>,
    b: Option<&TimeInterval>,
) -> Option<TimeInterval> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(*a),
        (None, Some(b)) => Some(*b),
        (Some(a), Some(b)) => Some(a.merge(b)),
    }
}

/// Merge a bounding box with its four corners as a degenerate hull-ready
/// point set. Convenience used when building hulls out of mixed inputs.
pub fn bbox_as_hull(bbox: &BoundingBox) -> ConvexHull {
    ConvexHull::from_points(&bbox.corners_lon_lat())
}

/// Merge and re-validate. This is the entry point the orchestrator calls
/// after collecting per-file envelopes (spec §4.9: "Result is re-validated
/// before emission"). `use_convex_hull` requests a hull output even when
/// every input is a plain bounding box.
pub fn merge_and_validate<'a>(
    envelopes: impl IntoIterator<Item = &'a Envelope>,
    assume_wgs84: bool,
    use_convex_hull: bool,
) -> Result<Envelope, ExtentError> {
    let merged = merge_all_envelopes_configured(envelopes, use_convex_hull).ok_or(ExtentError::EmptyResult)?;
    validate_wgs84(&merged, assume_wgs84)?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bbox(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Envelope {
        Envelope::BoundingBox(BoundingBox::from_lon_lat(min_lon, min_lat, max_lon, max_lat))
    }

    #[test]
    fn bbox_merge_is_associative_and_commutative() {
        let a = bbox(0.0, 0.0, 1.0, 1.0);
        let b = bbox(-1.0, -1.0, 0.5, 0.5);
        let c = bbox(2.0, 2.0, 3.0, 3.0);
        assert_eq!(merge_envelopes(&a, &b), merge_envelopes(&b, &a));
        assert_eq!(
            merge_envelopes(&merge_envelopes(&a, &b), &c),
            merge_envelopes(&a, &merge_envelopes(&b, &c))
        );
    }

    #[test]
    fn merge_with_hull_treats_bbox_as_its_corners() {
        let bbox_env = bbox(0.0, 0.0, 1.0, 1.0);
        let hull_env = Envelope::ConvexHull(ConvexHull::from_points(&[(5.0, 5.0)]));
        let merged = merge_envelopes(&bbox_env, &hull_env);
        let merged_bbox = merged.bounding_box();
        assert_eq!(merged_bbox.min_lon, 0.0);
        assert_eq!(merged_bbox.max_lon, 5.0);
        assert_eq!(merged_bbox.max_lat, 5.0);
    }

    #[test]
    fn merge_all_of_empty_is_none() {
        let empty: Vec<Envelope> = vec![];
        assert!(merge_all_envelopes(&empty).is_none());
    }

    #[test]
    fn temporal_merge_null_on_both_sides_is_null() {
        assert_eq!(merge_temporal(None, None), None);
    }

    #[test]
    fn temporal_merge_takes_the_wider_bound() {
        let a = TimeInterval::closed(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
        );
        let b = TimeInterval::closed(
            NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        );
        let merged = merge_temporal(Some(&a), Some(&b)).unwrap();
        assert_eq!(merged.start, Some(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap()));
        assert_eq!(merged.end, Some(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()));
    }

    #[test]
    fn merge_and_validate_rejects_degenerate_result() {
        let envelopes = vec![bbox(0.0, 0.0, 0.0, 0.0)];
        assert!(merge_and_validate(&envelopes, false, false).is_err());
    }

    #[test]
    fn merge_and_validate_accepts_plausible_result() {
        let envelopes = vec![bbox(3.0, 50.0, 7.0, 53.0)];
        assert!(merge_and_validate(&envelopes, false, false).is_ok());
    }

    #[test]
    fn use_convex_hull_folds_plain_bounding_boxes_into_a_hull() {
        let envelopes = vec![
            bbox(0.0, 0.0, 1.0, 1.0),
            bbox(2.0, 2.0, 3.0, 3.0),
        ];
        let merged = merge_and_validate(&envelopes, false, true).unwrap();
        assert!(matches!(merged, Envelope::ConvexHull(_)));
        let Envelope::ConvexHull(hull) = &merged else {
            unreachable!();
        };
        assert!(hull.winds_counter_clockwise());
        let bbox = hull.bounding_box();
        assert_eq!(bbox.min_lon, 0.0);
        assert_eq!(bbox.max_lon, 3.0);
    }

    #[test]
    fn without_use_convex_hull_plain_bounding_boxes_stay_a_bbox() {
        let envelopes = vec![bbox(0.0, 0.0, 1.0, 1.0), bbox(2.0, 2.0, 3.0, 3.0)];
        let merged = merge_and_validate(&envelopes, false, false).unwrap();
        assert!(matches!(merged, Envelope::BoundingBox(_)));
    }

    #[test]
    fn merge_all_envelopes_configured_is_none_for_empty_input() {
        let empty: Vec<Envelope> = vec![];
        assert!(merge_all_envelopes_configured(&empty, true).is_none());
    }
}
