use crate::board::{Board, MAX_BOXES};
use crate::distances::{DIST_INFINITE, DistanceTables};
use arrayvec::ArrayVec;
use std::rc::Rc;

/// Estimated pushes-to-solve for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cost(u16);

impl Cost {
    pub const ZERO: Cost = Cost(0);
    /// No legal assignment of boxes to goals exists.
    pub const DEADLOCK: Cost = Cost(u16::MAX);

    pub fn is_deadlock(&self) -> bool {
        *self == Cost::DEADLOCK
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl From<Cost> for usize {
    fn from(cost: Cost) -> usize {
        cost.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingKind {
    /// Max of the two one-sided nearest-goal sums. Cheap, loose.
    Simple,
    /// Optimal assignment via the Hungarian algorithm. Tight.
    Matching,
}

/// Admissible pushes lower bound: assigns active boxes to goals over the
/// precomputed forward distance tables. Returns `Cost::DEADLOCK` iff no
/// finite assignment exists, which doubles as the bipartite deadlock test.
pub struct LowerBoundEngine {
    tables: Rc<DistanceTables>,
    kind: MatchingKind,
}

impl LowerBoundEngine {
    pub fn new(tables: Rc<DistanceTables>, kind: MatchingKind) -> Self {
        LowerBoundEngine { tables, kind }
    }

    pub fn tables(&self) -> &DistanceTables {
        &self.tables
    }

    pub fn compute(&self, board: &Board) -> Cost {
        match self.kind {
            MatchingKind::Simple => self.compute_simple(board),
            MatchingKind::Matching => self.compute_matching(board),
        }
    }

    /// Sum over boxes of the nearest goal distance, and (when every goal
    /// must be filled) the symmetric sum over goals; the larger of the two.
    fn compute_simple(&self, board: &Board) -> Cost {
        let goal_count = self.tables.goal_count();
        let mut box_total = 0u32;
        let mut goal_nearest = [DIST_INFINITE; MAX_BOXES];

        for box_idx in board.active_boxes() {
            let pos = board.box_position(box_idx);
            let mut nearest = DIST_INFINITE;

            for (goal_idx, slot) in goal_nearest.iter_mut().enumerate().take(goal_count) {
                let dist = self.tables.forward_min(goal_idx, pos);
                nearest = nearest.min(dist);
                *slot = (*slot).min(dist);
            }

            if nearest == DIST_INFINITE {
                return Cost::DEADLOCK;
            }
            box_total += nearest as u32;
        }

        // The goal-side sum only binds when every goal needs a box.
        let mut goal_total = 0u32;
        if board.active_boxes().len() == goal_count {
            for &dist in goal_nearest.iter().take(goal_count) {
                if dist == DIST_INFINITE {
                    return Cost::DEADLOCK;
                }
                goal_total += dist as u32;
            }
        }

        Cost(box_total.max(goal_total).min(u16::MAX as u32 - 1) as u16)
    }

    fn compute_matching(&self, board: &Board) -> Cost {
        let goal_count = self.tables.goal_count();
        let active = board.active_boxes();

        if active.is_empty() {
            return Cost::ZERO;
        }

        // Square matrix over goals; rows beyond the active boxes are dummy
        // boxes that match any goal for free.
        let mut rows: ArrayVec<[u16; MAX_BOXES], MAX_BOXES> = ArrayVec::new();
        for box_idx in active {
            let pos = board.box_position(box_idx);
            let mut row = [0u16; MAX_BOXES];
            let mut any_finite = false;
            for (goal_idx, cell) in row.iter_mut().enumerate().take(goal_count) {
                let dist = self.tables.forward_min(goal_idx, pos);
                *cell = dist;
                any_finite |= dist != DIST_INFINITE;
            }
            if !any_finite {
                return Cost::DEADLOCK;
            }
            rows.push(row);
        }
        while rows.len() < goal_count {
            rows.push([0u16; MAX_BOXES]);
        }

        // An edge marker big enough that any assignment using one costs more
        // than every all-finite assignment combined.
        const INF_EDGE: i32 = 1 << 24;
        let total = min_cost_assignment(goal_count, |i, j| {
            let d = rows[i][j];
            if d == DIST_INFINITE { INF_EDGE } else { d as i32 }
        });
        if total >= INF_EDGE {
            Cost::DEADLOCK
        } else {
            Cost(total.min(u16::MAX as i32 - 1) as u16)
        }
    }
}

/// Minimum cost of a perfect assignment on an n x n cost matrix.
// Reference: Andrey Lopatin (https://cp-algorithms.com/graph/hungarian-algorithm.html).
fn min_cost_assignment(n: usize, cost: impl Fn(usize, usize) -> i32) -> i32 {
    const INF: i32 = i32::MAX / 2;

    // 1-indexed arrays with dummy 0 element
    let mut u = new_buffer::<i32>(n, 0);
    let mut v = new_buffer::<i32>(n, 0);
    let mut p = new_buffer::<usize>(n, 0);
    let mut way = new_buffer::<usize>(n, 0);

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut minv = new_buffer::<i32>(n, INF);
        let mut used = new_buffer::<bool>(n, false);

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = INF;
            let mut j1 = 0;

            for j in 1..=n {
                if !used[j] {
                    let cur = cost(i0 - 1, j - 1) - u[i0] - v[j];
                    if cur < minv[j] {
                        minv[j] = cur;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;

            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;

            if j0 == 0 {
                break;
            }
        }
    }

    -v[0]
}

fn new_buffer<T: Copy>(n: usize, initial_value: T) -> ArrayVec<T, { MAX_BOXES + 1 }> {
    (0..=n).map(|_| initial_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(board: &Board, kind: MatchingKind) -> LowerBoundEngine {
        LowerBoundEngine::new(Rc::new(DistanceTables::new(board)), kind)
    }

    fn parse_board(text: &str) -> Board {
        Board::from_text(text.trim_matches('\n')).unwrap()
    }

    #[test]
    fn test_min_cost_assignment() {
        let a = [[8, 4, 7], [5, 2, 3], [9, 4, 8]];
        assert_eq!(min_cost_assignment(3, |i, j| a[i][j]), 15);
    }

    #[test]
    fn test_zero_iff_solved() {
        let solved = parse_board(
            r#"
####
#@*#
####
"#,
        );
        for kind in [MatchingKind::Simple, MatchingKind::Matching] {
            assert_eq!(engine(&solved, kind).compute(&solved), Cost::ZERO);
        }

        let unsolved = parse_board(
            r#"
#####
#@$.#
#####
"#,
        );
        for kind in [MatchingKind::Simple, MatchingKind::Matching] {
            let cost = engine(&unsolved, kind).compute(&unsolved);
            assert_eq!(cost, Cost(1));
        }
    }

    #[test]
    fn test_matching_two_boxes() {
        let board = parse_board(
            r#"
########
#@$.$ .#
########
"#,
        );
        // Box (2,1): 1 push to (3,1) or 4 to (6,1); box (4,1): 1 push to
        // (3,1) or 2 to (6,1). Best assignment: 1 + 2.
        let cost = engine(&board, MatchingKind::Matching).compute(&board);
        assert_eq!(cost, Cost(3));
    }

    #[test]
    fn test_deadlocked_box() {
        let board = parse_board(
            r#"
#####
#@$ #
#  .#
#####
"#,
        );
        // The box can only be pushed right or down, and both paths corner it
        // away from the goal.
        for kind in [MatchingKind::Simple, MatchingKind::Matching] {
            assert!(engine(&board, kind).compute(&board).is_deadlock());
        }
    }

    #[test]
    fn test_simple_not_above_matching() {
        let board = parse_board(
            r#"
#######
#     #
# $$  #
# ..  #
# @   #
#######
"#,
        );
        let simple = engine(&board, MatchingKind::Simple).compute(&board);
        let matching = engine(&board, MatchingKind::Matching).compute(&board);
        assert!(simple <= matching);
        assert_eq!(matching, Cost(2));
    }
}
