use crate::shared::geometry::{NormalizedRect, Point};

/// True when any fingertip of any hand lies inside the mouth region.
///
/// Points exactly on an edge count as inside. Without a mouth region the
/// answer is always false.
pub fn fingertip_in_mouth(mouth_region: Option<&NormalizedRect>, fingertip_sets: &[Vec<Point>]) -> bool {
    let Some(region) = mouth_region else {
        return false;
    };
    fingertip_sets
        .iter()
        .flatten()
        .any(|tip| region.contains(*tip))
}
