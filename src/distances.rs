use crate::bits::{Bitboard, LazyBitboard};
use crate::board::{ALL_DIRECTIONS, Board, Direction, MAX_SIZE, Position, Tile};
use arrayvec::ArrayVec;
use std::collections::VecDeque;

pub const DIST_INFINITE: u16 = u16::MAX;

const NO_SIDE: u8 = 255;

/// Box distances to a single target square, per starting square and per the
/// side of the box the player stands on.
pub struct SquareSideTable {
    dist: Box<[[[u16; 4]; MAX_SIZE]; MAX_SIZE]>,
}

impl SquareSideTable {
    fn new() -> Self {
        SquareSideTable {
            dist: Box::new([[[DIST_INFINITE; 4]; MAX_SIZE]; MAX_SIZE]),
        }
    }

    pub fn get(&self, pos: Position, side: Direction) -> u16 {
        self.dist[pos.1 as usize][pos.0 as usize][side.index()]
    }

    /// Minimum over the four player sides.
    pub fn min(&self, pos: Position) -> u16 {
        *self.dist[pos.1 as usize][pos.0 as usize]
            .iter()
            .min()
            .unwrap()
    }

    fn set(&mut self, pos: Position, side: usize, value: u16) {
        self.dist[pos.1 as usize][pos.0 as usize][side] = value;
    }

    fn raw(&self, pos: Position, side: usize) -> u16 {
        self.dist[pos.1 as usize][pos.0 as usize][side]
    }
}

/// For each square, connectivity of the four neighbouring sides when a lone
/// box occupies the square: two sides share a component id iff the player can
/// walk between them around the box (walls only, other boxes ignored).
struct SideComponents {
    comp: Box<[[[u8; 4]; MAX_SIZE]; MAX_SIZE]>,
}

impl SideComponents {
    fn compute(board: &Board) -> Self {
        let mut comp = Box::new([[[NO_SIDE; 4]; MAX_SIZE]; MAX_SIZE]);

        for y in 0..board.height() {
            for x in 0..board.width() {
                let pos = Position(x, y);
                if board.get_tile(pos) == Tile::Wall {
                    continue;
                }
                for side in 0..4 {
                    if comp[y as usize][x as usize][side] != NO_SIDE {
                        continue;
                    }
                    let dir = Direction::from_index(side);
                    let Some(start) = board.move_position(pos, dir) else {
                        continue;
                    };
                    if board.get_tile(start) == Tile::Wall {
                        continue;
                    }

                    // Flood from this side with the box square walled off,
                    // then label every side square the flood reached.
                    let region = flood_around(board, start, pos);
                    for other in side..4 {
                        let other_dir = Direction::from_index(other);
                        if let Some(n) = board.move_position(pos, other_dir) {
                            if region.get(n) {
                                comp[y as usize][x as usize][other] = side as u8;
                            }
                        }
                    }
                }
            }
        }

        SideComponents { comp }
    }

    fn connected(&self, pos: Position, a: usize, b: usize) -> bool {
        let sides = &self.comp[pos.1 as usize][pos.0 as usize];
        sides[a] != NO_SIDE && sides[a] == sides[b]
    }
}

/// Flood fill over non-wall squares treating `boxed` as a wall.
fn flood_around(board: &Board, start: Position, boxed: Position) -> LazyBitboard {
    let mut visited = LazyBitboard::new();
    let mut stack: ArrayVec<Position, { MAX_SIZE * MAX_SIZE }> = ArrayVec::new();
    visited.set(start);
    stack.push(start);
    while let Some(pos) = stack.pop() {
        for &dir in &ALL_DIRECTIONS {
            if let Some(next) = board.move_position(pos, dir) {
                if next != boxed && board.get_tile(next) != Tile::Wall && !visited.get(next) {
                    visited.set(next);
                    stack.push(next);
                }
            }
        }
    }
    visited
}

/// Precomputed per-goal box distance tables, parameterised by the player's
/// side of the box. All other boxes are ignored; the values are therefore
/// admissible push counts.
pub struct DistanceTables {
    sides: SideComponents,
    forward: Vec<SquareSideTable>,
}

impl DistanceTables {
    pub fn new(board: &Board) -> Self {
        let sides = SideComponents::compute(board);
        let forward = board
            .goal_positions()
            .iter()
            .map(|&goal| forward_table(board, &sides, goal))
            .collect();
        DistanceTables { sides, forward }
    }

    /// Pushes to park a box from `pos` on goal `goal_idx`, player on `side`.
    pub fn forward(&self, goal_idx: usize, pos: Position, side: Direction) -> u16 {
        self.forward[goal_idx].get(pos, side)
    }

    /// Pushes to park a box from `pos` on goal `goal_idx`, best player side.
    pub fn forward_min(&self, goal_idx: usize, pos: Position) -> u16 {
        self.forward[goal_idx].min(pos)
    }

    pub fn goal_count(&self) -> usize {
        self.forward.len()
    }

    /// Pull distances from every square to `target` (goal-room sub-solver).
    pub fn pull_distances(&self, board: &Board, target: Position) -> SquareSideTable {
        pull_table(board, &self.sides, target)
    }
}

/// BFS backwards from the goal over (box square, player side) states.
/// A push moving the box from q to p in direction d leaves the player on
/// side reverse(d) of p; the player must first walk to side reverse(d) of q.
fn forward_table(board: &Board, sides: &SideComponents, goal: Position) -> SquareSideTable {
    let mut table = SquareSideTable::new();
    let mut queue: VecDeque<(Position, usize)> = VecDeque::new();

    for side in 0..4 {
        table.set(goal, side, 0);
        queue.push_back((goal, side));
    }

    while let Some((pos, side)) = queue.pop_front() {
        let dist = table.raw(pos, side);
        let side_dir = Direction::from_index(side);

        // The box came from the square on the player's side; the player
        // pushed from one square further out.
        let Some(from) = board.move_position(pos, side_dir) else {
            continue;
        };
        let Some(player) = board.move_position(from, side_dir) else {
            continue;
        };
        if board.get_tile(from) == Tile::Wall || board.get_tile(player) == Tile::Wall {
            continue;
        }

        for prev_side in 0..4 {
            if sides.connected(from, prev_side, side) && table.raw(from, prev_side) == DIST_INFINITE
            {
                table.set(from, prev_side, dist + 1);
                queue.push_back((from, prev_side));
            }
        }
    }

    table
}

/// BFS backwards from the target over (box square, player side) states for
/// pulls. A pull moving the box from q to p in direction d leaves the player
/// on side d of p; the player must first walk to side d of q.
fn pull_table(board: &Board, sides: &SideComponents, target: Position) -> SquareSideTable {
    let mut table = SquareSideTable::new();
    let mut queue: VecDeque<(Position, usize)> = VecDeque::new();

    for side in 0..4 {
        table.set(target, side, 0);
        queue.push_back((target, side));
    }

    while let Some((pos, side)) = queue.pop_front() {
        let dist = table.raw(pos, side);
        let side_dir = Direction::from_index(side);

        // The box came from the opposite square; the player stood on this
        // square and retreated one further.
        let Some(from) = board.move_position(pos, side_dir.reverse()) else {
            continue;
        };
        let Some(beyond) = board.move_position(pos, side_dir) else {
            continue;
        };
        if board.get_tile(from) == Tile::Wall || board.get_tile(beyond) == Tile::Wall {
            continue;
        }

        for prev_side in 0..4 {
            if sides.connected(from, prev_side, side) && table.raw(from, prev_side) == DIST_INFINITE
            {
                table.set(from, prev_side, dist + 1);
                queue.push_back((from, prev_side));
            }
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_board(text: &str) -> Board {
        Board::from_text(text.trim_matches('\n')).unwrap()
    }

    #[test]
    fn test_forward_straight_push() {
        let board = parse_board(
            r#"
#####
#@$.#
#####
"#,
        );
        let tables = DistanceTables::new(&board);

        // Goal 0 at (3, 1), box square (2, 1): one push with the player on
        // the left, impossible from the walls above and below.
        assert_eq!(tables.forward(0, Position(2, 1), Direction::Left), 1);
        assert_eq!(
            tables.forward(0, Position(2, 1), Direction::Up),
            DIST_INFINITE
        );
        assert_eq!(tables.forward_min(0, Position(2, 1)), 1);
        assert_eq!(tables.forward_min(0, Position(3, 1)), 0);
    }

    #[test]
    fn test_forward_side_matters() {
        let board = parse_board(
            r#"
######
#.$ @#
######
"#,
        );
        let tables = DistanceTables::new(&board);

        // Goal at (1, 1). Pushing the box left needs the player on the
        // right; starting from the left side of the box there is no way
        // around in a one-wide corridor.
        assert_eq!(tables.forward(0, Position(2, 1), Direction::Right), 1);
        assert_eq!(
            tables.forward(0, Position(2, 1), Direction::Left),
            DIST_INFINITE
        );
    }

    #[test]
    fn test_forward_around_corner() {
        let board = parse_board(
            r#"
######
#    #
# $  #
# .  #
#@   #
######
"#,
        );
        let tables = DistanceTables::new(&board);

        // Goal at (2, 3), box at (2, 2): one push down with the player above.
        assert_eq!(tables.forward(0, Position(2, 2), Direction::Up), 1);
        // From the left side the player can walk around the box.
        assert_eq!(tables.forward(0, Position(2, 2), Direction::Left), 1);
    }

    #[test]
    fn test_forward_dead_corner() {
        let board = parse_board(
            r#"
#####
#   #
# $.#
#@  #
#####
"#,
        );
        let tables = DistanceTables::new(&board);

        // A box in the top-left corner can never reach the goal.
        assert_eq!(tables.forward_min(0, Position(1, 1)), DIST_INFINITE);
        assert_eq!(tables.forward_min(0, Position(2, 2)), 1);
    }

    #[test]
    fn test_pull_distances() {
        let board = parse_board(
            r#"
########
#@$  . #
########
"#,
        );
        let tables = DistanceTables::new(&board);
        let pulls = tables.pull_distances(&board, Position(5, 1));

        // Pulling the box from (2, 1) rightwards to (5, 1) takes three pulls;
        // the player walks backwards ahead of it.
        assert_eq!(pulls.get(Position(2, 1), Direction::Right), 3);
        assert_eq!(pulls.min(Position(5, 1)), 0);
        // The box cannot be moved to the target starting from its left side
        // in a one-wide corridor.
        assert_eq!(pulls.get(Position(2, 1), Direction::Left), DIST_INFINITE);
    }
}
