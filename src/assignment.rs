//! Initial assignment solver (component C4, BP3D only).
//!
//! Assigns blocks to containers by solving a small mixed-integer program
//! over capacity constraints (spec §4.4), minimizing the number of
//! containers used. Seeds the annealer's per-container block order by
//! (¬stackable first, then descending volume).

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use good_lp::{constraint, variable, Expression, ProblemVariables, Solution, SolverModel};

use crate::config::AssignmentConfig;
use crate::error::PackingError;
use crate::model::{Block, Container};

/// Solves the block→container assignment MILP and returns, for each
/// container, the indices of the blocks assigned to it, already ordered to
/// seed the annealer (spec §4.4's closing line).
pub fn assign(
    blocks: &[Block],
    containers: &[Container],
    config: &AssignmentConfig,
) -> Result<Vec<Vec<usize>>, PackingError> {
    let n_blocks = blocks.len();
    let n_containers = containers.len();

    let blocks = blocks.to_vec();
    let containers = containers.to_vec();
    let config = config.clone();

    let timeout = Duration::from_secs(config.milp_timeout_secs);
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = solve_milp(&blocks, &containers, &config);
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(PackingError::InitialAssignmentFailed {
            reason: format!(
                "MILP did not return within the {}s budget for {n_blocks} blocks / {n_containers} containers",
                timeout.as_secs()
            ),
        }),
    }
}

fn solve_milp(
    blocks: &[Block],
    containers: &[Container],
    config: &AssignmentConfig,
) -> Result<Vec<Vec<usize>>, PackingError> {
    let n_blocks = blocks.len();
    let n_containers = containers.len();

    if n_containers == 0 {
        return if n_blocks == 0 {
            Ok(Vec::new())
        } else {
            Err(PackingError::InitialAssignmentFailed {
                reason: "no containers configured".to_string(),
            })
        };
    }

    let mut vars = ProblemVariables::new();
    let mut assignment = vec![vec![]; n_blocks];
    for row in assignment.iter_mut() {
        for _ in 0..n_containers {
            row.push(vars.add(variable().binary()));
        }
    }
    let use_container: Vec<_> = (0..n_containers)
        .map(|_| vars.add(variable().binary()))
        .collect();

    let objective: Expression = use_container.iter().copied().sum();
    let mut model = vars.minimise(objective).using(good_lp::microlp);

    for j in 0..n_containers {
        let container = &containers[j];

        let volume_expr: Expression = (0..n_blocks)
            .map(|i| assignment[i][j] * blocks[i].volume())
            .sum();
        model = model.with(constraint!(
            volume_expr <= use_container[j] * (container.volume() * config.volume_capacity_ratio)
        ));

        let weight_expr: Expression = (0..n_blocks)
            .map(|i| assignment[i][j] * blocks[i].weight)
            .sum();
        model = model.with(constraint!(
            weight_expr
                <= use_container[j] * (container.weight_capacity * config.weight_capacity_ratio)
        ));

        let area_expr: Expression = (0..n_blocks)
            .filter(|&i| !blocks[i].stackable)
            .map(|i| assignment[i][j] * blocks[i].base_area())
            .sum();
        model = model.with(constraint!(
            area_expr <= use_container[j] * (container.base_area() * config.area_capacity_ratio)
        ));
    }

    for i in 0..n_blocks {
        let row_sum: Expression = assignment[i].iter().copied().sum();
        model = model.with(constraint!(row_sum == 1.0));
    }

    let solution = model.solve().map_err(|err| PackingError::InitialAssignmentFailed {
        reason: err.to_string(),
    })?;

    let mut result = vec![Vec::new(); n_containers];
    for (j, bucket) in result.iter_mut().enumerate() {
        let mut idxs: Vec<usize> = (0..n_blocks)
            .filter(|&i| solution.value(assignment[i][j]) > 0.5)
            .collect();
        idxs.sort_by(|&a, &b| {
            crate::model::seed_rank(&blocks[a])
                .partial_cmp(&crate::model::seed_rank(&blocks[b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        *bucket = idxs;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(name: &str, shape: (f64, f64, f64), weight: f64, stackable: bool) -> Block {
        Block::new(name, shape, weight, None, stackable, false).unwrap()
    }

    #[test]
    fn splits_four_large_blocks_across_two_bins() {
        // Volume is well within the rho_v=0.7 cap (2*64,000 <= 700,000); it's
        // the weight cap (25, at rho_w=1.0) that limits each container to two
        // of these 10-weight blocks, forcing a four-block split across both.
        let containers = vec![
            Container::new("c1", (100.0, 100.0, 100.0), 25.0).unwrap(),
            Container::new("c2", (100.0, 100.0, 100.0), 25.0).unwrap(),
        ];
        let blocks: Vec<Block> = (0..4)
            .map(|i| block(&format!("b{i}"), (40.0, 40.0, 40.0), 10.0, true))
            .collect();
        let config = AssignmentConfig::default();

        let assignment = assign(&blocks, &containers, &config).unwrap();
        assert_eq!(assignment.len(), 2);
        let total_assigned: usize = assignment.iter().map(|c| c.len()).sum();
        assert_eq!(total_assigned, 4);
        for bucket in &assignment {
            assert!(bucket.len() <= 2);
        }
    }

    #[test]
    fn single_container_receives_every_block() {
        let containers = vec![Container::new("c1", (100.0, 100.0, 100.0), 1000.0).unwrap()];
        let blocks = vec![
            block("a", (10.0, 10.0, 10.0), 1.0, true),
            block("b", (10.0, 10.0, 10.0), 1.0, false),
        ];
        let assignment = assign(&blocks, &containers, &AssignmentConfig::default()).unwrap();
        assert_eq!(assignment[0].len(), 2);
    }

    #[test]
    fn unstackable_blocks_are_ordered_first_within_a_container() {
        let containers = vec![Container::new("c1", (100.0, 100.0, 100.0), 1000.0).unwrap()];
        let blocks = vec![
            block("stackable_big", (20.0, 20.0, 20.0), 1.0, true),
            block("unstackable_small", (5.0, 5.0, 5.0), 1.0, false),
        ];
        let assignment = assign(&blocks, &containers, &AssignmentConfig::default()).unwrap();
        assert_eq!(blocks[assignment[0][0]].name, "unstackable_small");
    }
}
