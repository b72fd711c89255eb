//! Score function (component C3): turns a placement into a scalar cost with
//! the correct penalty ordering (spec §4.3).
//!
//! Three lexicographic tiers are composed additively with two large,
//! well-separated constants so the result can be decomposed by repeated
//! `divmod` for display: unpacked-block count dominates everything,
//! containers-used dominates the packing remainder.

use crate::model::PlacedBlock;

/// Dominant penalty: one unpacked block outweighs any packing difference.
pub const P_UNPACKED: f64 = 1e10;

/// Secondary penalty: one extra container used outweighs any height
/// difference within a container.
pub const P_USED: f64 = 1e5;

/// SP3D score: unpacked blocks are penalized by `P_UNPACKED` each; the
/// remainder is the tallest packed stack's height, matching the source's
/// use of the container height as the early-termination threshold (§4.5).
pub fn sp3d_score(placed: &[PlacedBlock]) -> f64 {
    let mut unpacked = 0usize;
    let mut max_height = 0.0f64;
    for p in placed {
        if p.is_unpacked() {
            unpacked += 1;
        } else {
            max_height = max_height.max(p.top_z());
        }
    }
    unpacked as f64 * P_UNPACKED + max_height
}

/// BP3D score: unpacked blocks dominate, then the count of non-empty
/// containers, then the sum of each used container's tallest stack.
///
/// `containers[j]` is every block assigned to container `j`, whether or not
/// the oracle managed to settle it (unpacked ones carry the sentinel
/// corner); the unpacked count is derived here rather than threaded through
/// by the caller.
pub fn bp3d_score(containers: &[Vec<PlacedBlock>]) -> f64 {
    let mut unpacked = 0usize;
    let mut used = 0usize;
    let mut height_sum = 0.0f64;
    for container in containers {
        if container.is_empty() {
            continue;
        }
        let mut max_height = 0.0f64;
        for p in container {
            if p.is_unpacked() {
                unpacked += 1;
            } else {
                max_height = max_height.max(p.top_z());
            }
        }
        used += 1;
        height_sum += max_height;
    }
    unpacked as f64 * P_UNPACKED + used as f64 * P_USED + height_sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Block;
    use crate::types::{Vec3, INF};

    fn packed(shape: (f64, f64, f64), z: f64) -> PlacedBlock {
        let block = Block::new("b", shape, 1.0, None, true, false).unwrap();
        PlacedBlock::new(block, Vec3::new(0.0, 0.0, z))
    }

    fn unpacked(shape: (f64, f64, f64)) -> PlacedBlock {
        let block = Block::new("b", shape, 1.0, None, true, false).unwrap();
        PlacedBlock::new(block, Vec3::new(INF, INF, INF))
    }

    #[test]
    fn sp3d_score_uses_tallest_stack_when_all_packed() {
        let placed = vec![packed((10.0, 10.0, 30.0), 0.0), packed((10.0, 10.0, 20.0), 30.0)];
        assert_eq!(sp3d_score(&placed), 50.0);
    }

    #[test]
    fn sp3d_score_dominates_with_unpacked_penalty() {
        let placed = vec![packed((10.0, 10.0, 30.0), 0.0), unpacked((10.0, 10.0, 20.0))];
        assert_eq!(sp3d_score(&placed), P_UNPACKED + 30.0);
    }

    #[test]
    fn bp3d_score_counts_used_containers_and_heights() {
        let containers = vec![
            vec![packed((10.0, 10.0, 40.0), 0.0)],
            vec![packed((10.0, 10.0, 60.0), 0.0)],
            vec![],
        ];
        let score = bp3d_score(&containers);
        assert_eq!(score, 2.0 * P_USED + 100.0);
    }

    #[test]
    fn bp3d_score_empty_container_contributes_nothing() {
        let containers: Vec<Vec<PlacedBlock>> = vec![vec![]];
        assert_eq!(bp3d_score(&containers), 0.0);
    }

    #[test]
    fn bp3d_score_counts_unpacked_blocks_within_a_container() {
        let containers = vec![vec![packed((10.0, 10.0, 10.0), 0.0), unpacked((5.0, 5.0, 5.0))]];
        assert_eq!(bp3d_score(&containers), P_UNPACKED + P_USED + 10.0);
    }
}
