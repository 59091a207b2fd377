use crate::bits::{Bitboard, Bitvector, LazyBitboard};
use crate::board::{ALL_DIRECTIONS, Board, Direction, Index, MAX_BOXES, Position, Tile};
use crate::lower_bound::{Cost, LowerBoundEngine};
use crate::pqueue::PriorityQueue;
use crate::zobrist::Zobrist;
use arrayvec::ArrayVec;
use fnv::FnvHashSet;
use log::trace;
use std::rc::Rc;
use std::time::Instant;

/// Resource budget for the corral deadlock proof. The detector reports
/// not-proven when the budget runs out.
#[derive(Debug, Clone, Copy)]
pub struct DetectorBudget {
    pub deadline: Option<Instant>,
    pub max_nodes: usize,
}

impl DetectorBudget {
    pub fn unlimited() -> Self {
        DetectorBudget {
            deadline: None,
            max_nodes: usize::MAX,
        }
    }

    fn exhausted(&self, nodes: usize) -> bool {
        if nodes >= self.max_nodes {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

/// Runs the detector suite against a freshly pushed position, in a fixed
/// order: simple, freeze, bipartite, corral, closed-diagonal. Returns the
/// position's lower bound when no detector fires.
///
/// `base_frozen` holds the boxes proven frozen in the parent position; it is
/// fixed for the whole expansion and recomputed by `begin_expansion`.
pub struct DeadlockDetector {
    zobrist: Rc<Zobrist>,
    base_frozen: Bitvector,
}

impl DeadlockDetector {
    pub fn new(zobrist: Rc<Zobrist>) -> Self {
        DeadlockDetector {
            zobrist,
            base_frozen: Bitvector::new(),
        }
    }

    /// Recompute the frozen set for the position about to be expanded.
    pub fn begin_expansion(&mut self, board: &Board) {
        self.base_frozen = frozen_boxes(board);
    }

    pub fn frozen(&self) -> Bitvector {
        self.base_frozen
    }

    /// Check the position after `pushed` landed on `dest`. Returns the lower
    /// bound when the position survives all detectors, None on deadlock.
    pub fn check(
        &self,
        board: &Board,
        lower_bound: &LowerBoundEngine,
        pushed: Index,
        dest: Position,
        budget: &DetectorBudget,
    ) -> Option<Cost> {
        // Simple: the destination square can never reach a goal
        if board.is_dead_square(dest) {
            return None;
        }

        // Freeze: the push may have locked a cluster of boxes in place
        let new_frozen = frozen_after_push(self.base_frozen, board, pushed);
        let frozen = self.base_frozen.union(&new_frozen);
        if board.unsolved_boxes().contains_any(&frozen) {
            return None;
        }

        // Bipartite: no finite assignment of boxes to goals
        let cost = lower_bound.compute(board);
        if cost.is_deadlock() {
            return None;
        }

        // Corral: a bounded proof that a sealed region cannot be resolved
        if self.is_corral_deadlock(board, lower_bound, pushed, budget) {
            return None;
        }

        // Closed diagonal: a mutually blocking cluster around the pushed box
        if closed_diagonal_deadlock(board, pushed) {
            return None;
        }

        Some(cost)
    }

    /// Public detector contract.
    pub fn is_deadlock(
        &self,
        board: &Board,
        lower_bound: &LowerBoundEngine,
        pushed: Index,
        budget: &DetectorBudget,
    ) -> bool {
        let dest = board.box_position(pushed);
        self.check(board, lower_bound, pushed, dest, budget).is_none()
    }

    /// Prove that the region sealed behind the pushed box cannot be emptied.
    ///
    /// The proof searches a relaxed sub-puzzle containing only the boxes
    /// touching the corral (removing boxes never makes a puzzle harder): if
    /// even the relaxed puzzle cannot park all its boxes, the position is
    /// dead. Exhausting the budget counts as not-proven.
    pub fn is_corral_deadlock(
        &self,
        board: &Board,
        lower_bound: &LowerBoundEngine,
        pushed: Index,
        budget: &DetectorBudget,
    ) -> bool {
        if budget.max_nodes == 0 {
            return false;
        }

        let reach = board.compute_reach();
        let box_pos = board.box_position(pushed);

        // Find the sealed region behind the pushed box
        let mut region = LazyBitboard::new();
        let mut corral_boxes = Bitvector::new();
        let mut seeded = false;
        for &dir in &ALL_DIRECTIONS {
            if let Some(next) = board.move_position(box_pos, dir) {
                if board.get_tile(next) != Tile::Wall
                    && !board.has_box_at(next)
                    && board.is_in_play(next)
                    && !reach.squares.get(next)
                    && !region.get(next)
                {
                    flood_corral(board, next, &mut region, &mut corral_boxes);
                    seeded = true;
                }
            }
        }
        if !seeded {
            return false;
        }

        // Project down to the corral boxes plus their immediate neighbours;
        // everything else is relaxed away.
        corral_boxes.add(pushed);
        let mut projected = corral_boxes;
        for box_idx in corral_boxes {
            let pos = board.box_position(box_idx);
            for &dir in &ALL_DIRECTIONS {
                if let Some(next) = board.move_position(pos, dir) {
                    if let Some(neighbour) = board.box_index(next) {
                        projected.add(neighbour);
                    }
                }
            }
        }

        let mut sub = board.clone();
        sub.project(projected);

        self.corral_search(&mut sub, lower_bound, budget)
    }

    /// Best-first exhaustion of the relaxed sub-puzzle. True iff provably
    /// unsolvable within budget.
    fn corral_search(
        &self,
        sub: &mut Board,
        lower_bound: &LowerBoundEngine,
        budget: &DetectorBudget,
    ) -> bool {
        let initial = lower_bound.compute(sub);
        if initial.is_deadlock() {
            return true;
        }

        let mut open = PriorityQueue::new();
        let mut visited: FnvHashSet<u64> = FnvHashSet::default();
        open.push(usize::from(initial), sub.checkpoint());

        let mut nodes = 0usize;
        while let Some(checkpoint) = open.pop_min() {
            if budget.exhausted(nodes) {
                trace!("corral proof abandoned after {} nodes", nodes);
                return false;
            }
            nodes += 1;

            sub.restore(&checkpoint);
            if sub.is_solved() {
                return false;
            }

            let reach = sub.compute_reach();
            let boxes = self.zobrist.boxes_hash(
                sub.active_boxes().iter().map(|idx| sub.box_position(idx)),
            );
            let hash = boxes ^ self.zobrist.player_hash(reach.canonical());
            if !visited.insert(hash) {
                continue;
            }

            for push in &reach.pushes {
                let dest = sub
                    .move_position(sub.box_position(push.box_index), push.direction)
                    .unwrap();
                if sub.is_dead_square(dest) {
                    continue;
                }
                sub.push(push);
                let cost = lower_bound.compute(sub);
                if !cost.is_deadlock() {
                    open.push(usize::from(cost), sub.checkpoint());
                }
                sub.pull(push.to_pull());
            }
        }

        // Open list exhausted: even the relaxed puzzle has no way out
        true
    }
}

/// Flood the sealed region from a seed square, collecting the boxes on its
/// boundary. Boxes stop the flood; walls bound it.
fn flood_corral(
    board: &Board,
    seed: Position,
    region: &mut LazyBitboard,
    corral_boxes: &mut Bitvector,
) {
    let mut stack: ArrayVec<Position, { crate::board::MAX_SIZE * crate::board::MAX_SIZE }> =
        ArrayVec::new();
    region.set(seed);
    stack.push(seed);
    while let Some(pos) = stack.pop() {
        for &dir in &ALL_DIRECTIONS {
            if let Some(next) = board.move_position(pos, dir) {
                if board.get_tile(next) == Tile::Wall || region.get(next) {
                    continue;
                }
                if let Some(box_idx) = board.box_index(next) {
                    corral_boxes.add(box_idx);
                } else {
                    region.set(next);
                    stack.push(next);
                }
            }
        }
    }
}

/// All boxes that are effectively frozen in the current position.
pub fn frozen_boxes(board: &Board) -> Bitvector {
    let mut frozen = Bitvector::new();
    for box_idx in board.active_boxes() {
        if !frozen.contains(box_idx) {
            frozen.add_all(&frozen_after_push(frozen, board, box_idx));
        }
    }
    frozen
}

/// Boxes newly frozen once `box_idx` stands on its current square, given the
/// set already known frozen. Works by assuming the whole cluster around the
/// box is stuck, then releasing boxes until the assumption stabilises; what
/// survives is frozen for good.
pub fn frozen_after_push(frozen: Bitvector, board: &Board, box_idx: Index) -> Bitvector {
    assert!(!frozen.contains(box_idx));

    let cluster = connected_cluster(frozen, board, box_idx);
    let mut assumed = cluster;
    let mut pending = cluster;

    while let Some(idx) = pending.pop() {
        if !assumed.contains(idx) {
            continue;
        }
        let pos = board.box_position(idx);
        let movable = can_move_on_axis(
            board,
            pos,
            [Direction::Left, Direction::Right],
            &cluster,
            &assumed,
        ) || can_move_on_axis(
            board,
            pos,
            [Direction::Up, Direction::Down],
            &cluster,
            &assumed,
        );
        if !movable {
            continue;
        }

        assumed.remove(idx);
        // Releasing a box may in turn release the boxes leaning on it
        for &dir in &ALL_DIRECTIONS {
            if let Some(beside) = board.move_position(pos, dir) {
                if let Some(other) = board.box_index(beside) {
                    if assumed.contains(other) {
                        pending.add(other);
                    }
                }
            }
        }
    }

    assumed
}

/// The orthogonally connected group of not-yet-frozen boxes around `seed`.
fn connected_cluster(frozen: Bitvector, board: &Board, seed: Index) -> Bitvector {
    let mut cluster = Bitvector::new();
    let mut pending: ArrayVec<Index, MAX_BOXES> = ArrayVec::new();
    cluster.add(seed);
    pending.push(seed);

    while let Some(idx) = pending.pop() {
        let pos = board.box_position(idx);
        for &dir in &ALL_DIRECTIONS {
            let Some(beside) = board.move_position(pos, dir) else {
                continue;
            };
            let Some(other) = board.box_index(beside) else {
                continue;
            };
            if !cluster.contains(other) && !frozen.contains(other) {
                cluster.add(other);
                pending.push(other);
            }
        }
    }

    cluster
}

/// Whether one side of an axis leaves room for a push. A neighbouring
/// cluster box blocks only while it is still assumed stuck; any other box
/// is known frozen and blocks permanently.
fn side_open(
    board: &Board,
    pos: Position,
    dir: Direction,
    cluster: &Bitvector,
    assumed: &Bitvector,
) -> bool {
    let Some(next) = board.move_position(pos, dir) else {
        return true;
    };
    match board.box_index(next) {
        Some(other) if cluster.contains(other) => !assumed.contains(other),
        Some(_) => false,
        None => board.get_tile(next) != Tile::Wall,
    }
}

fn side_dead(board: &Board, pos: Position, dir: Direction) -> bool {
    board
        .move_position(pos, dir)
        .is_none_or(|next| board.is_dead_square(next))
}

/// A box can move along an axis when both sides are open and at least one
/// destination is worth moving to.
fn can_move_on_axis(
    board: &Board,
    pos: Position,
    dirs: [Direction; 2],
    cluster: &Bitvector,
    assumed: &Bitvector,
) -> bool {
    dirs.iter()
        .all(|&dir| side_open(board, pos, dir, cluster, assumed))
        && !dirs.iter().all(|&dir| side_dead(board, pos, dir))
}

/// Detect a mutually blocking cluster around the pushed box: a set of boxes
/// where every member is blocked on both axes by a wall or another member.
/// No push can ever free such a set, so it is dead iff a member is off goal.
pub fn closed_diagonal_deadlock(board: &Board, pushed: Index) -> bool {
    let mut members = Bitvector::new();
    let mut stack: ArrayVec<Index, MAX_BOXES> = ArrayVec::new();
    members.add(pushed);
    stack.push(pushed);

    while let Some(box_idx) = stack.pop() {
        let pos = board.box_position(box_idx);
        for dirs in [
            [Direction::Left, Direction::Right],
            [Direction::Up, Direction::Down],
        ] {
            let mut walled = false;
            let mut blockers: ArrayVec<Index, 2> = ArrayVec::new();
            for dir in dirs {
                match board.move_position(pos, dir) {
                    Some(next) => {
                        if board.get_tile(next) == Tile::Wall {
                            walled = true;
                        } else if let Some(neighbour) = board.box_index(next) {
                            blockers.push(neighbour);
                        }
                    }
                    None => walled = true,
                }
            }
            if walled {
                continue;
            }
            if blockers.is_empty() {
                // Both axis squares may come free: no proof
                return false;
            }
            for blocker in blockers {
                if !members.contains(blocker) {
                    members.add(blocker);
                    stack.push(blocker);
                }
            }
        }
    }

    board.unsolved_boxes().contains_any(&members)
}
