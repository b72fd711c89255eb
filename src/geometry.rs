//! Geometric helper functions for collision detection and invariant checking.
//!
//! These operate on [`PlacedBlock`]s and are used both by the annealer's
//! debug assertions and by integration tests that verify invariants I1-I3
//! from the data model.

use crate::model::{Container, PlacedBlock};
use crate::types::EPSILON_GENERAL;

/// True if two placed blocks overlap in their interior. Shared faces are
/// allowed (I2).
#[inline]
pub fn intersects(a: &PlacedBlock, b: &PlacedBlock) -> bool {
    a.bounding_box().overlaps_interior(&b.bounding_box())
}

#[inline]
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}

pub fn overlap_area_xy(a: &PlacedBlock, b: &PlacedBlock) -> f64 {
    a.bounding_box().overlap_area_xy(&b.bounding_box())
}

/// True if `upper` rests directly on `lower`: their heights match within
/// `height_epsilon` and their footprints overlap.
pub fn rests_on(upper: &PlacedBlock, lower: &PlacedBlock, height_epsilon: f64) -> bool {
    if (upper.corner.z - lower.top_z()).abs() > height_epsilon {
        return false;
    }
    overlap_area_xy(upper, lower) > EPSILON_GENERAL
}

/// I1: `placed` lies entirely within `container`'s shape, given tolerance.
pub fn fully_contained(container: &Container, placed: &PlacedBlock, tolerance: f64) -> bool {
    let (cd, cw, ch) = container.shape;
    let corner = placed.corner;
    let (bd, bw, bh) = placed.block.shape;
    corner.x >= -tolerance
        && corner.y >= -tolerance
        && corner.z >= -tolerance
        && corner.x + bd <= cd + tolerance
        && corner.y + bw <= cw + tolerance
        && corner.z + bh <= ch + tolerance
}

/// I3: `placed` rests on the floor (z = 0) or on the top face of some other
/// stackable block in `others`.
pub fn is_supported(placed: &PlacedBlock, others: &[&PlacedBlock], height_epsilon: f64) -> bool {
    if placed.corner.z.abs() <= height_epsilon {
        return true;
    }
    others
        .iter()
        .any(|other| other.block.stackable && rests_on(placed, other, height_epsilon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Block;
    use crate::types::Vec3;

    fn placed(shape: (f64, f64, f64), corner: (f64, f64, f64), stackable: bool) -> PlacedBlock {
        let block = Block::new("b", shape, 1.0, None, stackable, false).unwrap();
        PlacedBlock::new(block, Vec3::from_tuple(corner))
    }

    #[test]
    fn intersects_overlapping_boxes() {
        let a = placed((10.0, 10.0, 10.0), (0.0, 0.0, 0.0), true);
        let b = placed((10.0, 10.0, 10.0), (5.0, 5.0, 5.0), true);
        assert!(intersects(&a, &b));
    }

    #[test]
    fn intersects_separated_boxes() {
        let a = placed((10.0, 10.0, 10.0), (0.0, 0.0, 0.0), true);
        let b = placed((10.0, 10.0, 10.0), (20.0, 0.0, 0.0), true);
        assert!(!intersects(&a, &b));
    }

    #[test]
    fn shared_face_is_not_interior_overlap() {
        let a = placed((10.0, 10.0, 10.0), (0.0, 0.0, 0.0), true);
        let b = placed((10.0, 10.0, 10.0), (10.0, 0.0, 0.0), true);
        assert!(!intersects(&a, &b));
    }

    #[test]
    fn rests_on_detects_support_and_gap() {
        let lower = placed((10.0, 10.0, 10.0), (0.0, 0.0, 0.0), true);
        let upper = placed((10.0, 10.0, 10.0), (0.0, 0.0, 10.0), true);
        let floating = placed((10.0, 10.0, 10.0), (0.0, 0.0, 20.0), true);
        assert!(rests_on(&upper, &lower, 1e-3));
        assert!(!rests_on(&floating, &lower, 1e-3));
    }

    #[test]
    fn fully_contained_respects_container_bounds() {
        let container = Container::new("c", (100.0, 100.0, 100.0), 1000.0).unwrap();
        let inside = placed((10.0, 10.0, 10.0), (0.0, 0.0, 0.0), true);
        let outside = placed((10.0, 10.0, 10.0), (95.0, 0.0, 0.0), true);
        assert!(fully_contained(&container, &inside, EPSILON_GENERAL));
        assert!(!fully_contained(&container, &outside, EPSILON_GENERAL));
    }

    #[test]
    fn is_supported_by_floor_or_stackable_neighbor() {
        let lower = placed((10.0, 10.0, 10.0), (0.0, 0.0, 0.0), true);
        let upper = placed((10.0, 10.0, 10.0), (0.0, 0.0, 10.0), true);
        let floor_block = placed((10.0, 10.0, 10.0), (0.0, 0.0, 0.0), true);
        assert!(is_supported(&floor_block, &[], 1e-3));
        assert!(is_supported(&upper, &[&lower], 1e-3));

        let unstackable_lower = placed((10.0, 10.0, 10.0), (0.0, 0.0, 0.0), false);
        assert!(!is_supported(&upper, &[&unstackable_lower], 1e-3));
    }
}
