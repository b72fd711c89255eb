//! Simulated-annealing search (component C5).
//!
//! Drives the placement oracle over neighborhood moves (swap, rotate, and —
//! for BP3D — shift), accepting or rejecting each proposal via the
//! Metropolis criterion, and tracks a best-so-far ("opt") snapshot
//! independent of the mutable current state (spec §4.5).

use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SolverConfig;
use crate::model::{Block, Container, PlacedBlock};
use crate::oracle::{place_in_order, Oracle};
use crate::score::{bp3d_score, sp3d_score};
use crate::types::Vec3;

/// Given temperature `t` and proposed delta `delta = s_new - s_old`, decides
/// whether to accept the move (spec §4.5). `delta <= 0` is always accepted
/// without consuming randomness; otherwise a uniform draw is clamped away
/// from 0/1 before taking its log.
fn accept(delta: f64, temperature: f64, rng: &mut impl Rng) -> bool {
    if delta <= 0.0 {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    let u: f64 = rng.gen_range(1e-9..=1.0 - 1e-9);
    u.ln() * temperature <= -delta
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Move {
    Swap,
    Rotate,
    Shift,
}

fn choose_move(rng: &mut impl Rng, allow_rotate: bool, allow_shift: bool) -> Move {
    if allow_shift {
        match rng.gen_range(0..3) {
            0 => Move::Swap,
            1 => Move::Rotate,
            _ => Move::Shift,
        }
    } else if allow_rotate {
        if rng.gen_bool(0.5) {
            Move::Swap
        } else {
            Move::Rotate
        }
    } else {
        Move::Swap
    }
}

/// The mutable state for a single SP3D run: a permutation, the blocks in
/// their current (possibly rotated) orientation, and the resulting
/// placement/score.
#[derive(Clone)]
pub struct Sp3dState {
    pub permutation: Vec<usize>,
    pub blocks: Vec<Block>,
    pub placed: Vec<PlacedBlock>,
    pub score: f64,
}

impl Sp3dState {
    fn rescore(&mut self, oracle: &mut Oracle, container_shape: Vec3) {
        self.placed = place_in_order(oracle, container_shape, false, &self.permutation, &self.blocks);
        self.score = sp3d_score(&self.placed);
    }
}

/// Drives the SP3D search one move at a time (spec §4.6's `step`), keeping
/// the current state, the best-so-far ("opt") snapshot, and the shared
/// oracle grid buffer alive across calls.
pub struct Sp3dAnnealer {
    container_shape: Vec3,
    config: SolverConfig,
    oracle: Oracle,
    rng: StdRng,
    current: Sp3dState,
    opt: Sp3dState,
    iterations: u64,
}

impl Sp3dAnnealer {
    pub fn new(
        container_shape: Vec3,
        blocks: Vec<Block>,
        initial_permutation: Vec<usize>,
        config: SolverConfig,
        seed: u64,
    ) -> Self {
        let mut oracle = Oracle::new();
        let mut current = Sp3dState {
            permutation: initial_permutation,
            blocks,
            placed: Vec::new(),
            score: 0.0,
        };
        current.rescore(&mut oracle, container_shape);
        let opt = current.clone();
        Self {
            container_shape,
            config,
            oracle,
            rng: StdRng::seed_from_u64(seed),
            current,
            opt,
            iterations: 0,
        }
    }

    /// True once the best-so-far score fits within the open container's
    /// height, i.e. no further improvement is possible (spec §4.5
    /// termination clause).
    pub fn has_converged(&self) -> bool {
        self.opt.score <= self.container_shape.z
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Proposes and resolves one neighborhood move, returning
    /// `(accepted, improved)`.
    pub fn step(&mut self) -> (bool, bool) {
        let mv = choose_move(&mut self.rng, self.config.allow_rotate, false);
        let old_score = self.current.score;
        let mut accepted = true;

        match mv {
            Move::Swap => {
                let n = self.current.permutation.len();
                if n < 2 {
                    return (true, false);
                }
                let i = self.rng.gen_range(0..n);
                let j = self.rng.gen_range(0..n);
                self.current.permutation.swap(i, j);
                self.current.rescore(&mut self.oracle, self.container_shape);
                let delta = self.current.score - old_score;
                if !accept(delta, self.config.temperature, &mut self.rng) {
                    self.current.permutation.swap(i, j);
                    self.current.score = old_score;
                    accepted = false;
                }
            }
            Move::Rotate => {
                let n = self.current.permutation.len();
                if n == 0 {
                    return (true, false);
                }
                let pos = self.rng.gen_range(0..n);
                let block_idx = self.current.permutation[pos];
                let axes = self.current.blocks[block_idx].rotatable_axes();
                let axis = axes[self.rng.gen_range(0..axes.len())];
                self.current.blocks[block_idx].rotate(axis);
                self.current.rescore(&mut self.oracle, self.container_shape);
                let delta = self.current.score - old_score;
                if !accept(delta, self.config.temperature, &mut self.rng) {
                    self.current.blocks[block_idx].rotate(axis);
                    self.current.score = old_score;
                    accepted = false;
                }
            }
            Move::Shift => unreachable!("shift is a BP3D-only move"),
        }

        let mut improved = false;
        if accepted && self.current.score <= self.opt.score {
            self.opt = self.current.clone();
            improved = true;
        }
        self.iterations += 1;
        (accepted, improved)
    }

    /// Current state, best-so-far state, and iteration count (spec §4.6's
    /// `snapshot`).
    pub fn snapshot(&self) -> (&Sp3dState, &Sp3dState, u64) {
        (&self.current, &self.opt, self.iterations)
    }

    pub fn into_opt(self) -> Sp3dState {
        self.opt
    }
}

/// Outcome of a finished or cancelled SP3D annealing run.
pub struct Sp3dResult {
    pub current: Sp3dState,
    pub opt: Sp3dState,
    pub iterations: u64,
}

/// Runs the SP3D annealer to termination: `max_iter` reached, `cancel` set,
/// or the packing already fits without stacking above the container height.
///
/// `progress` is called every `config.progress_interval` iterations with
/// `(iteration, opt_score)`, matching the source's `loop_render` generator.
pub fn run_sp3d(
    container_shape: Vec3,
    blocks: Vec<Block>,
    initial_permutation: Vec<usize>,
    config: &SolverConfig,
    seed: u64,
    cancel: &AtomicBool,
    mut progress: impl FnMut(u64, f64),
) -> Sp3dResult {
    let mut annealer = Sp3dAnnealer::new(container_shape, blocks, initial_permutation, *config, seed);

    while annealer.iterations() < config.max_iter {
        if cancel.load(Ordering::Relaxed) || annealer.has_converged() {
            break;
        }
        annealer.step();
        let iteration = annealer.iterations();
        if iteration % config.progress_interval == 0 {
            let (_, opt, _) = annealer.snapshot();
            progress(iteration, opt.score);
        }
    }

    let iterations = annealer.iterations();
    let current = annealer.current.clone();
    let opt = annealer.into_opt();
    Sp3dResult {
        current,
        opt,
        iterations,
    }
}

/// The mutable state for a single BP3D run: one permutation and placement
/// list per container.
#[derive(Clone)]
pub struct Bp3dState {
    pub blocks: Vec<Block>,
    pub assignment: Vec<Vec<usize>>,
    pub placed: Vec<Vec<PlacedBlock>>,
    pub score: f64,
}

impl Bp3dState {
    fn rescore_container(&mut self, oracle: &mut Oracle, container_shapes: &[Vec3], j: usize) {
        self.placed[j] = place_in_order(
            oracle,
            container_shapes[j],
            true,
            &self.assignment[j],
            &self.blocks,
        );
    }

    fn recompute_total(&mut self) {
        self.score = bp3d_score(&self.placed);
    }
}

pub struct Bp3dAnnealer {
    container_shapes: Vec<Vec3>,
    config: SolverConfig,
    oracle: Oracle,
    rng: StdRng,
    current: Bp3dState,
    opt: Bp3dState,
    iterations: u64,
}

impl Bp3dAnnealer {
    pub fn new(
        container_shapes: Vec<Vec3>,
        blocks: Vec<Block>,
        initial_assignment: Vec<Vec<usize>>,
        config: SolverConfig,
        seed: u64,
    ) -> Self {
        let mut oracle = Oracle::new();
        let n_containers = container_shapes.len();
        let mut current = Bp3dState {
            blocks,
            assignment: initial_assignment,
            placed: vec![Vec::new(); n_containers],
            score: 0.0,
        };
        for j in 0..n_containers {
            current.rescore_container(&mut oracle, &container_shapes, j);
        }
        current.recompute_total();
        let opt = current.clone();
        Self {
            container_shapes,
            config,
            oracle,
            rng: StdRng::seed_from_u64(seed),
            current,
            opt,
            iterations: 0,
        }
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn step(&mut self) -> (bool, bool) {
        let n_containers = self.container_shapes.len();
        let allow_shift = n_containers >= 2;
        let mv = choose_move(&mut self.rng, self.config.allow_rotate, allow_shift);
        let old_score = self.current.score;
        let mut accepted = true;

        match mv {
            Move::Swap => {
                let j = self.rng.gen_range(0..n_containers);
                let n = self.current.assignment[j].len();
                if n < 2 {
                    return (true, false);
                }
                let i = self.rng.gen_range(0..n);
                let k = self.rng.gen_range(0..n);
                self.current.assignment[j].swap(i, k);
                self.current.rescore_container(&mut self.oracle, &self.container_shapes, j);
                self.current.recompute_total();
                let delta = self.current.score - old_score;
                if !accept(delta, self.config.temperature, &mut self.rng) {
                    self.current.assignment[j].swap(i, k);
                    self.current.rescore_container(&mut self.oracle, &self.container_shapes, j);
                    self.current.score = old_score;
                    accepted = false;
                }
            }
            Move::Rotate => {
                if self.current.blocks.is_empty() {
                    return (true, false);
                }
                let block_idx = self.rng.gen_range(0..self.current.blocks.len());
                let axes = self.current.blocks[block_idx].rotatable_axes();
                let axis = axes[self.rng.gen_range(0..axes.len())];
                self.current.blocks[block_idx].rotate(axis);
                let owner = self
                    .current
                    .assignment
                    .iter()
                    .position(|bucket| bucket.contains(&block_idx));
                match owner {
                    Some(j) => {
                        self.current.rescore_container(&mut self.oracle, &self.container_shapes, j);
                        self.current.recompute_total();
                        let delta = self.current.score - old_score;
                        if !accept(delta, self.config.temperature, &mut self.rng) {
                            self.current.blocks[block_idx].rotate(axis);
                            self.current.rescore_container(&mut self.oracle, &self.container_shapes, j);
                            self.current.score = old_score;
                            accepted = false;
                        }
                    }
                    None => {
                        self.current.blocks[block_idx].rotate(axis);
                    }
                }
            }
            Move::Shift => {
                let non_empty: Vec<usize> = (0..n_containers)
                    .filter(|&j| !self.current.assignment[j].is_empty())
                    .collect();
                if non_empty.len() < 2 {
                    return (true, false);
                }
                let a = non_empty[self.rng.gen_range(0..non_empty.len())];
                let b = loop {
                    let candidate = non_empty[self.rng.gen_range(0..non_empty.len())];
                    if candidate != a {
                        break candidate;
                    }
                };
                let src_pos = self.rng.gen_range(0..self.current.assignment[a].len());
                let block_idx = self.current.assignment[a].remove(src_pos);
                let dst_pos = self.rng.gen_range(0..=self.current.assignment[b].len());
                self.current.assignment[b].insert(dst_pos, block_idx);

                self.current.rescore_container(&mut self.oracle, &self.container_shapes, a);
                self.current.rescore_container(&mut self.oracle, &self.container_shapes, b);
                self.current.recompute_total();
                let delta = self.current.score - old_score;
                if !accept(delta, self.config.temperature, &mut self.rng) {
                    let block_idx = self.current.assignment[b].remove(dst_pos);
                    self.current.assignment[a].insert(src_pos, block_idx);
                    self.current.rescore_container(&mut self.oracle, &self.container_shapes, a);
                    self.current.rescore_container(&mut self.oracle, &self.container_shapes, b);
                    self.current.score = old_score;
                    accepted = false;
                }
            }
        }

        let mut improved = false;
        if accepted && self.current.score <= self.opt.score {
            self.opt = self.current.clone();
            improved = true;
        }
        self.iterations += 1;
        (accepted, improved)
    }

    pub fn snapshot(&self) -> (&Bp3dState, &Bp3dState, u64) {
        (&self.current, &self.opt, self.iterations)
    }

    pub fn into_opt(self) -> Bp3dState {
        self.opt
    }
}

pub struct Bp3dResult {
    pub current: Bp3dState,
    pub opt: Bp3dState,
    pub iterations: u64,
}

/// Runs the BP3D annealer given a fixed initial block→container assignment
/// (from C4) and per-container seed ordering, to `max_iter` or cancellation.
pub fn run_bp3d(
    container_shapes: Vec<Vec3>,
    blocks: Vec<Block>,
    initial_assignment: Vec<Vec<usize>>,
    config: &SolverConfig,
    seed: u64,
    cancel: &AtomicBool,
    mut progress: impl FnMut(u64, f64),
) -> Bp3dResult {
    let mut annealer = Bp3dAnnealer::new(container_shapes, blocks, initial_assignment, *config, seed);

    while annealer.iterations() < config.max_iter {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        annealer.step();
        let iteration = annealer.iterations();
        if iteration % config.progress_interval == 0 {
            let (_, opt, _) = annealer.snapshot();
            progress(iteration, opt.score);
        }
    }

    let iterations = annealer.iterations();
    let current = annealer.current.clone();
    let opt = annealer.into_opt();
    Bp3dResult {
        current,
        opt,
        iterations,
    }
}
