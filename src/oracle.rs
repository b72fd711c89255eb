//! The placement oracle (component C2) — the critical algorithm.
//!
//! Given a new block's shape and the occupants already placed (including the
//! container's six virtual walls), computes the back-left-bottom corner the
//! block settles into under the bottom-left-back-fill heuristic, via a
//! No-Fit-Polytope sweep over a 3-D overlap-count grid. See spec §4.2.

use crate::error::OracleFailure;
use crate::model::{Block, PlacedBlock};
use crate::types::{Vec3, INF};

/// A previously placed box (real block or virtual wall) the oracle treats as
/// an obstacle.
#[derive(Clone, Copy, Debug)]
pub struct Occupant {
    pub shape: Vec3,
    pub corner: Vec3,
    pub stackable: bool,
}

impl Occupant {
    pub fn new(shape: Vec3, corner: Vec3, stackable: bool) -> Self {
        Self {
            shape,
            corner,
            stackable,
        }
    }
}

/// The six virtual wall occupants bounding a container (spec §4.2). All are
/// stackable; `ceiling` may be omitted by the caller for open-top strip
/// packing, in which case it should not be included in the occupant list and
/// `ceil_idx` passed to [`settle`] must be `None`.
pub struct Walls {
    pub back: Occupant,
    pub left: Occupant,
    pub floor: Occupant,
    pub front: Occupant,
    pub right: Occupant,
    pub ceiling: Occupant,
}

impl Walls {
    pub fn for_container(shape: Vec3) -> Self {
        let huge = Vec3::new(3.0 * INF, 3.0 * INF, 3.0 * INF);
        Self {
            back: Occupant::new(huge, Vec3::new(-3.0 * INF, -INF, -INF), true),
            left: Occupant::new(huge, Vec3::new(-INF, -3.0 * INF, -INF), true),
            floor: Occupant::new(huge, Vec3::new(-INF, -INF, -3.0 * INF), true),
            front: Occupant::new(huge, Vec3::new(shape.x, -INF, -INF), true),
            right: Occupant::new(huge, Vec3::new(-INF, shape.y, -INF), true),
            ceiling: Occupant::new(huge, Vec3::new(-INF, -INF, shape.z), true),
        }
    }

    /// Returns the five walls used for the open-top forward-packing flow
    /// (all but the ceiling), matching the common case where upward
    /// placement is not forbidden.
    pub fn without_ceiling(&self) -> [Occupant; 5] {
        [self.back, self.left, self.floor, self.front, self.right]
    }

    pub fn all(&self) -> [Occupant; 6] {
        [
            self.back,
            self.left,
            self.floor,
            self.front,
            self.right,
            self.ceiling,
        ]
    }
}

#[derive(Clone, Copy)]
struct Nfp {
    back: f64,
    front: f64,
    left: f64,
    right: f64,
    bottom: f64,
    top: f64,
}

fn no_fit_polytope(new_shape: Vec3, occupants: &[Occupant]) -> Vec<Nfp> {
    occupants
        .iter()
        .map(|occ| Nfp {
            back: occ.corner.x - new_shape.x,
            front: occ.corner.x + occ.shape.x,
            left: occ.corner.y - new_shape.y,
            right: occ.corner.y + occ.shape.y,
            bottom: occ.corner.z - new_shape.z,
            top: occ.corner.z + occ.shape.z,
        })
        .collect()
}

/// (value, flag, occupant index). `flag` is `+1` for an opening edge,
/// `-1` for a closing edge.
type Event = (f64, i8, usize);

/// Sorts events by (value asc, flag desc) so that, at a tied coordinate,
/// opening events are assigned a lower ordinal than closing ones (spec
/// §4.2 step 2).
fn sort_events(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.cmp(&a.1))
    });
    events
}

fn build_events(nfps: &[Nfp]) -> (Vec<Event>, Vec<Event>, Vec<Event>) {
    let mut xs = Vec::with_capacity(nfps.len() * 2);
    let mut ys = Vec::with_capacity(nfps.len() * 2);
    let mut zs = Vec::with_capacity(nfps.len() * 2);
    for (idx, nfp) in nfps.iter().enumerate() {
        xs.push((nfp.back, 1, idx));
        xs.push((nfp.front, -1, idx));
        ys.push((nfp.left, 1, idx));
        ys.push((nfp.right, -1, idx));
        zs.push((nfp.bottom, 1, idx));
        zs.push((nfp.top, -1, idx));
    }
    (sort_events(xs), sort_events(ys), sort_events(zs))
}

/// Maps (occupant index, flag) to its ordinal position in a sorted event list.
fn order_lookup(events: &[Event]) -> Vec<[usize; 2]> {
    let n = events.len() / 2;
    let mut lookup = vec![[0usize; 2]; n];
    for (order, &(_, flag, idx)) in events.iter().enumerate() {
        let slot = if flag == 1 { 0 } else { 1 };
        lookup[idx][slot] = order;
    }
    lookup
}

/// Dense overlap-count grid reused across oracle invocations (spec §5/§9:
/// the dominant allocation should be reused rather than rebuilt per move).
#[derive(Default)]
pub struct Oracle {
    grid: Vec<i32>,
}

impl Oracle {
    pub fn new() -> Self {
        Self { grid: Vec::new() }
    }

    fn grid_mut(&mut self, size: usize) -> &mut [i32] {
        let needed = size * size * size;
        if self.grid.len() < needed {
            self.grid.resize(needed, 0);
        }
        let slice = &mut self.grid[..needed];
        slice.fill(0);
        slice
    }

    /// Computes the settle corner for a new block of `new_shape`, given the
    /// already-placed `occupants` (including virtual walls). `ceil_idx`, if
    /// given, is the index into `occupants` of the ceiling wall.
    pub fn settle(
        &mut self,
        new_shape: Vec3,
        new_stackable: bool,
        occupants: &[Occupant],
        ceil_idx: Option<usize>,
    ) -> Result<Vec3, OracleFailure> {
        let nfps = no_fit_polytope(new_shape, occupants);
        let (xs, ys, zs) = build_events(&nfps);
        let x_order = order_lookup(&xs);
        let y_order = order_lookup(&ys);
        let z_order = order_lookup(&zs);
        let stackable: Vec<bool> = occupants.iter().map(|o| o.stackable).collect();

        if let Some(idx) = Self::find_stable(
            self.grid_mut(2 * occupants.len()),
            occupants.len(),
            &x_order,
            &y_order,
            &z_order,
            &stackable,
            new_stackable,
            ceil_idx,
            true,
        ) {
            let (a, b, c) = idx;
            return Ok(Vec3::new(xs[a].0, ys[b].0, zs[c].0));
        }

        // Strict pass found nothing. Relax the "occupant must be stackable
        // to support N" rule (ignore each occupant's own `stackable` flag
        // when forcing its top ordinal) to tell the two failure modes apart.
        let relaxed_found = Self::find_stable(
            self.grid_mut(2 * occupants.len()),
            occupants.len(),
            &x_order,
            &y_order,
            &z_order,
            &stackable,
            new_stackable,
            ceil_idx,
            false,
        )
        .is_some();

        if relaxed_found {
            Err(OracleFailure::NoStackablePoint)
        } else {
            Err(OracleFailure::NoStablePoint)
        }
    }

    /// Builds the overlap grid and scans it in tie-break priority order
    /// (x, then z, then y) for the first stable lattice point. When
    /// `enforce_stackability` is false, every occupant's top ordinal is left
    /// unforced regardless of its `stackable` flag (used for the relaxed
    /// pass that distinguishes the two failure modes).
    #[allow(clippy::too_many_arguments)]
    fn find_stable(
        grid: &mut [i32],
        n: usize,
        x_order: &[[usize; 2]],
        y_order: &[[usize; 2]],
        z_order: &[[usize; 2]],
        stackable: &[bool],
        new_stackable: bool,
        ceil_idx: Option<usize>,
        enforce_stackability: bool,
    ) -> Option<(usize, usize, usize)> {
        let size = 2 * n;
        if size == 0 {
            return Some((0, 0, 0));
        }

        let idx3 = |a: usize, b: usize, c: usize| (a * size + b) * size + c;

        for i in 0..n {
            let back = x_order[i][0];
            let front = x_order[i][1];
            let left = y_order[i][0];
            let right = y_order[i][1];
            let bottom = if new_stackable || Some(i) == ceil_idx {
                z_order[i][0]
            } else {
                0
            };
            let top = if !enforce_stackability || stackable[i] {
                z_order[i][1]
            } else {
                size - 1
            };

            grid[idx3(back, left, bottom)] += 1;
            grid[idx3(front, left, bottom)] -= 1;
            grid[idx3(back, right, bottom)] -= 1;
            grid[idx3(back, left, top)] -= 1;
            grid[idx3(back, right, top)] += 1;
            grid[idx3(front, left, top)] += 1;
            grid[idx3(front, right, bottom)] += 1;
            grid[idx3(front, right, top)] -= 1;
        }

        // Prefix-sum along each axis in turn (x, then y, then z).
        for b in 0..size {
            for c in 0..size {
                let mut acc = 0i32;
                for a in 0..size {
                    acc += grid[idx3(a, b, c)];
                    grid[idx3(a, b, c)] = acc;
                }
            }
        }
        for a in 0..size {
            for c in 0..size {
                let mut acc = 0i32;
                for b in 0..size {
                    acc += grid[idx3(a, b, c)];
                    grid[idx3(a, b, c)] = acc;
                }
            }
        }
        for a in 0..size {
            for b in 0..size {
                let mut acc = 0i32;
                for c in 0..size {
                    acc += grid[idx3(a, b, c)];
                    grid[idx3(a, b, c)] = acc;
                }
            }
        }

        // Tie-break priority (x, z, y): scan a outermost, c next, b innermost.
        for a in 0..size {
            for c in 0..size {
                for b in 0..size {
                    if grid[idx3(a, b, c)] != 0 {
                        continue;
                    }
                    let back_blocked = grid[idx3((a + size - 1) % size, b, c)] > 0;
                    let left_blocked = grid[idx3(a, (b + size - 1) % size, c)] > 0;
                    let below_blocked = grid[idx3(a, b, (c + size - 1) % size)] > 0;
                    if back_blocked && left_blocked && below_blocked {
                        return Some((a, b, c));
                    }
                }
            }
        }
        None
    }
}

/// Places every block named by `permutation`, in order, against the
/// container's virtual walls and whatever earlier blocks in the sequence
/// settled successfully. A block that fails to settle is recorded with the
/// unpacked sentinel and does not become an occupant for later blocks.
///
/// `include_ceiling` should be `false` for open-top strip packing and `true`
/// for bin packing, where each container has a fixed height (spec §4.2).
pub fn place_in_order(
    oracle: &mut Oracle,
    container_shape: Vec3,
    include_ceiling: bool,
    permutation: &[usize],
    blocks: &[Block],
) -> Vec<PlacedBlock> {
    let walls = Walls::for_container(container_shape);
    let mut occupants: Vec<Occupant> = if include_ceiling {
        walls.all().to_vec()
    } else {
        walls.without_ceiling().to_vec()
    };
    let ceil_idx = if include_ceiling {
        Some(occupants.len() - 1)
    } else {
        None
    };

    let wall_count = occupants.len();
    let mut placed = Vec::with_capacity(permutation.len());
    for &idx in permutation {
        let block = blocks[idx].clone();
        let shape = block.shape_vec3();
        match oracle.settle(shape, block.stackable, &occupants, ceil_idx) {
            Ok(corner) => {
                occupants.push(Occupant::new(shape, corner, block.stackable));
                placed.push(PlacedBlock::new(block, corner));
            }
            Err(failure) => {
                if occupants.len() == wall_count {
                    // No other real block is placed yet: this block alone
                    // does not fit the empty container (spec §7's
                    // `BlockTooLargeForContainer`), distinct from failing
                    // amid an already-crowded one.
                    tracing::debug!(block = %block.name, %failure, "block too large for empty container");
                } else {
                    tracing::debug!(block = %block.name, %failure, "block could not be placed");
                }
                placed.push(PlacedBlock::new(block, Vec3::new(INF, INF, INF)));
            }
        }
    }
    placed
}
