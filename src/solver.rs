//! Solver façade (component C6): orchestrates initialization, the annealer
//! main loop, and response assembly for both problem families (spec §4.6).

use std::sync::atomic::AtomicBool;

use serde::Serialize;
use utoipa::ToSchema;

use crate::annealer::{self, Sp3dState};
use crate::assignment;
use crate::config::{AssignmentConfig, SolverConfig};
use crate::error::PackingError;
use crate::model::{seed_rank, Block, Container, PlacedBlock};
use crate::oracle::place_in_order;
use crate::score::sp3d_score;

/// A packed block in the response shape from spec §6: resolved (post-
/// rotation) shape plus its settled corner.
#[derive(Serialize, Clone, ToSchema)]
pub struct PackedBlockOut {
    pub name: String,
    #[schema(value_type = [f64; 3])]
    pub shape: (f64, f64, f64),
    pub weight: f64,
    pub stackable: bool,
    pub back: f64,
    pub left: f64,
    pub bottom: f64,
}

/// A block the solver could not place, per spec §6/§7.
#[derive(Serialize, Clone, ToSchema)]
pub struct UnpackedBlockOut {
    pub name: String,
    #[schema(value_type = [f64; 3])]
    pub shape: (f64, f64, f64),
    pub weight: f64,
    pub stackable: bool,
}

fn split_placed(placed: Vec<PlacedBlock>) -> (Vec<PackedBlockOut>, Vec<UnpackedBlockOut>) {
    let mut packed = Vec::new();
    let mut unpacked = Vec::new();
    for p in placed {
        if p.is_unpacked() {
            unpacked.push(UnpackedBlockOut {
                name: p.block.name,
                shape: p.block.shape,
                weight: p.block.weight,
                stackable: p.block.stackable,
            });
        } else {
            packed.push(PackedBlockOut {
                name: p.block.name,
                shape: p.block.shape,
                weight: p.block.weight,
                stackable: p.block.stackable,
                back: p.corner.x,
                left: p.corner.y,
                bottom: p.corner.z,
            });
        }
    }
    (packed, unpacked)
}

/// SP3D solver response: the packed blocks' resolved shapes/corners, the
/// unpacked blocks, and the final score.
#[derive(Serialize, ToSchema)]
pub struct Sp3dResponse {
    pub packed_blocks: Vec<PackedBlockOut>,
    pub unpacked_blocks: Vec<UnpackedBlockOut>,
    pub score: f64,
    pub iterations: u64,
}

/// A single container's result within a BP3D response.
#[derive(Serialize, ToSchema)]
pub struct BpPacking {
    pub container_name: String,
    #[schema(value_type = [f64; 3])]
    pub container_shape: (f64, f64, f64),
    pub weight_capacity: f64,
    pub packed_blocks: Vec<PackedBlockOut>,
}

/// BP3D solver response, matching the `packings`/`unpacked_blocks` JSON
/// shape from spec §6.
#[derive(Serialize, ToSchema)]
pub struct Bp3dResponse {
    pub packings: Vec<BpPacking>,
    pub unpacked_blocks: Vec<UnpackedBlockOut>,
    pub score: f64,
    pub iterations: u64,
}

/// Computes the SP3D initial permutation: indices sorted by (¬stackable
/// first, then descending volume), per §4.4's closing line reused for the
/// single-container case.
fn initial_sp3d_permutation(blocks: &[Block]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..blocks.len()).collect();
    idx.sort_by(|&a, &b| {
        seed_rank(&blocks[a])
            .partial_cmp(&seed_rank(&blocks[b]))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    idx
}

/// Solves SP3D end to end: builds the initial permutation, runs the
/// annealer to termination, and assembles the response.
#[tracing::instrument(skip(blocks, solver_config), fields(n_blocks = blocks.len()))]
pub fn solve_sp3d(
    container: &Container,
    blocks: Vec<Block>,
    solver_config: &SolverConfig,
    seed: u64,
    cancel: &AtomicBool,
    mut progress: impl FnMut(u64, f64),
) -> Sp3dResponse {
    let permutation = initial_sp3d_permutation(&blocks);
    let container_shape = container.shape_vec3();

    let result = annealer::run_sp3d(
        container_shape,
        blocks,
        permutation,
        solver_config,
        seed,
        cancel,
        |iter, score| progress(iter, score),
    );

    tracing::info!(
        score = result.opt.score,
        iterations = result.iterations,
        "sp3d solve finished"
    );

    let (packed_blocks, unpacked_blocks) = split_placed(result.opt.placed);
    Sp3dResponse {
        packed_blocks,
        unpacked_blocks,
        score: result.opt.score,
        iterations: result.iterations,
    }
}

/// Solves BP3D end to end: MILP initial assignment (C4), then the annealer
/// (C5) over the resulting per-container permutations.
#[tracing::instrument(skip(blocks, solver_config, assignment_config), fields(n_blocks = blocks.len(), n_containers = containers.len()))]
pub fn solve_bp3d(
    containers: &[Container],
    blocks: Vec<Block>,
    solver_config: &SolverConfig,
    assignment_config: &AssignmentConfig,
    seed: u64,
    cancel: &AtomicBool,
    mut progress: impl FnMut(u64, f64),
) -> Result<Bp3dResponse, PackingError> {
    let initial_assignment = {
        let _span = tracing::info_span!("bp3d.assign").entered();
        assignment::assign(&blocks, containers, assignment_config)?
    };

    let container_shapes: Vec<_> = containers.iter().map(Container::shape_vec3).collect();
    let result = annealer::run_bp3d(
        container_shapes,
        blocks,
        initial_assignment,
        solver_config,
        seed,
        cancel,
        |iter, score| progress(iter, score),
    );

    tracing::info!(
        score = result.opt.score,
        iterations = result.iterations,
        "bp3d solve finished"
    );

    let mut packings = Vec::with_capacity(containers.len());
    let mut unpacked_blocks = Vec::new();
    for (container, placed) in containers.iter().zip(result.opt.placed.into_iter()) {
        let (packed_blocks, mut unpacked) = split_placed(placed);
        unpacked_blocks.append(&mut unpacked);
        packings.push(BpPacking {
            container_name: container.name.clone(),
            container_shape: container.shape,
            weight_capacity: container.weight_capacity,
            packed_blocks,
        });
    }

    Ok(Bp3dResponse {
        packings,
        unpacked_blocks,
        score: result.opt.score,
        iterations: result.iterations,
    })
}

/// Recomputes an SP3D state's score from scratch and compares to the stored
/// value; used by invariant tests (spec §8: "score equals a recomputation
/// from scratch").
#[cfg(test)]
pub(crate) fn recomputed_sp3d_score(state: &Sp3dState, container_shape: crate::types::Vec3) -> f64 {
    let mut oracle = crate::oracle::Oracle::new();
    let placed = place_in_order(&mut oracle, container_shape, false, &state.permutation, &state.blocks);
    sp3d_score(&placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;

    fn cube(name: &str, side: f64) -> Block {
        Block::new(name, (side, side, side), 1.0, None, true, false).unwrap()
    }

    #[test]
    fn single_block_fits_exactly() {
        let container = Container::new("c", (100.0, 100.0, 100.0), 1000.0).unwrap();
        let blocks = vec![cube("a", 100.0)];
        let config = SolverConfig {
            allow_rotate: true,
            max_iter: 10,
            temperature: 0.0,
            progress_interval: 1_000_000,
        };
        let cancel = AtomicBool::new(false);
        let response = solve_sp3d(&container, blocks, &config, 1, &cancel, |_, _| {});
        assert_eq!(response.unpacked_blocks.len(), 0);
        assert_eq!(response.packed_blocks.len(), 1);
        assert_eq!(response.score, 100.0);
        let packed = &response.packed_blocks[0];
        assert_eq!((packed.back, packed.left, packed.bottom), (0.0, 0.0, 0.0));
    }

    #[test]
    fn sp3d_open_top_packs_an_overly_tall_block() {
        // SP3D always settles against an open-top container (no ceiling
        // wall), so a block taller than the container still packs, against
        // the floor, stacking above the nominal height. Rotation is disabled
        // so the annealer can't shrink the height by reorienting the block.
        let container = Container::new("c", (100.0, 100.0, 100.0), 1000.0).unwrap();
        let blocks = vec![Block::new("tall", (10.0, 10.0, 200.0), 1.0, None, true, false).unwrap()];
        let config = SolverConfig {
            allow_rotate: false,
            max_iter: 10,
            temperature: 0.0,
            progress_interval: 1_000_000,
        };
        let cancel = AtomicBool::new(false);
        let response = solve_sp3d(&container, blocks, &config, 1, &cancel, |_, _| {});
        assert_eq!(response.unpacked_blocks.len(), 0);
        assert_eq!(response.packed_blocks.len(), 1);
        assert_eq!(response.score, 200.0);
    }

    #[test]
    fn bp3d_too_tall_block_is_reported_unpacked() {
        // BP3D bounds each container with a ceiling wall, so a block taller
        // than the container cannot settle and is reported unpacked.
        // Rotation is disabled so the annealer can't reorient a shorter face
        // upward and mask the failure.
        let containers = vec![Container::new("c", (100.0, 100.0, 100.0), 1000.0).unwrap()];
        let blocks = vec![Block::new("tall", (10.0, 10.0, 200.0), 1.0, None, true, false).unwrap()];
        let solver_config = SolverConfig {
            allow_rotate: false,
            max_iter: 10,
            temperature: 0.0,
            progress_interval: 1_000_000,
        };
        let assignment_config = AssignmentConfig::default();
        let cancel = AtomicBool::new(false);
        let response = solve_bp3d(
            &containers,
            blocks,
            &solver_config,
            &assignment_config,
            1,
            &cancel,
            |_, _| {},
        )
        .unwrap();
        assert_eq!(response.unpacked_blocks.len(), 1);
        assert!(response.packings.iter().all(|p| p.packed_blocks.is_empty()));
        assert!(response.score >= crate::score::P_UNPACKED);
    }

    #[test]
    fn bp3d_splits_four_cubes_across_two_bins() {
        // Volume is well within the rho_v=0.7 cap (2*64,000 <= 700,000); it's
        // the weight cap (25, at rho_w=1.0) that limits each container to two
        // of these 10-weight blocks, forcing a four-block split across both.
        let containers = vec![
            Container::new("c1", (100.0, 100.0, 100.0), 25.0).unwrap(),
            Container::new("c2", (100.0, 100.0, 100.0), 25.0).unwrap(),
        ];
        let blocks: Vec<Block> = (0..4)
            .map(|i| Block::new(format!("b{i}"), (40.0, 40.0, 40.0), 10.0, None, true, false).unwrap())
            .collect();
        let solver_config = SolverConfig {
            allow_rotate: true,
            max_iter: 100,
            temperature: 0.0,
            progress_interval: 1_000_000,
        };
        let assignment_config = AssignmentConfig::default();
        let cancel = AtomicBool::new(false);
        let response = solve_bp3d(
            &containers,
            blocks,
            &solver_config,
            &assignment_config,
            1,
            &cancel,
            |_, _| {},
        )
        .unwrap();

        let used: usize = response
            .packings
            .iter()
            .filter(|p| !p.packed_blocks.is_empty())
            .count();
        assert_eq!(used, 2);
        assert_eq!(response.unpacked_blocks.len(), 0);
    }

    #[test]
    fn score_matches_recomputation_from_scratch() {
        let container_shape = Vec3::new(100.0, 100.0, 100.0);
        let blocks = vec![cube("a", 40.0), cube("b", 30.0)];
        let permutation = initial_sp3d_permutation(&blocks);
        let mut oracle = crate::oracle::Oracle::new();
        let placed = place_in_order(&mut oracle, container_shape, false, &permutation, &blocks);
        let score = sp3d_score(&placed);
        let state = Sp3dState {
            permutation,
            blocks,
            placed,
            score,
        };
        assert_eq!(state.score, recomputed_sp3d_score(&state, container_shape));
    }
}
