use crate::bits::{Bitboard, Bitvector, LazyBitboard, Position};
use crate::board::{ALL_DIRECTIONS, Board, MAX_SIZE, PushSet, Reach, Tile};
use arrayvec::ArrayVec;

/// Look for the cheapest PI-corral reachable from the current position.
///
/// A corral is a region the player cannot reach. It is a PI-corral when every
/// currently legal push of its boundary boxes leads into the corral and the
/// player can perform each of them; expanding only those pushes this ply
/// preserves an optimal continuation. An empty push set means the corral can
/// no longer be resolved at all.
pub fn find_pi_corral(board: &Board, reach: &Reach) -> Option<PushSet> {
    let mut visited = LazyBitboard::new();
    let mut result = None;
    let mut min_cost = usize::MAX;

    for push in reach.pushes.iter() {
        let box_pos = board.box_position(push.box_index);
        let new_pos = board.move_position(box_pos, push.direction).unwrap();

        // Only regions on the other side of a valid player push need to be
        // examined; any corral not behind a push trivially fails the "P"
        // condition of a PI-corral.
        if !reach.squares.get(new_pos) && !visited.get(new_pos) {
            if let Some((new_pushes, new_cost)) =
                analyse_corral(board, new_pos, reach, &mut visited)
            {
                // Keep the lowest-cost PI-corral found so far
                if new_cost < min_cost {
                    result = Some(new_pushes);
                    min_cost = new_cost;
                }
            }
        }
    }

    result
}

struct CorralState {
    /// Squares of the candidate region, including flooded box squares
    locally_visited: LazyBitboard,
    /// Boundary boxes the player can currently touch
    edge: Bitvector,
    /// Boxes inside the region (unreachable by the player)
    interior: Bitvector,
    /// The region needs pushes: an off-goal box or an empty goal inside
    must_be_pushed: bool,
    /// At least one candidate box is off goal
    any_box_off_goal: bool,
}

fn analyse_corral(
    board: &Board,
    pos: Position,
    reach: &Reach,
    visited: &mut LazyBitboard,
) -> Option<(PushSet, usize)> {
    assert!(!reach.squares.get(pos));

    let mut state = CorralState {
        locally_visited: LazyBitboard::new(),
        edge: Bitvector::new(),
        interior: Bitvector::new(),
        must_be_pushed: false,
        any_box_off_goal: false,
    };

    flood_region(board, pos, reach, visited, &mut state);

    // Combine with neighbouring corrals: a boundary push blocked by a box
    // that seals another unreachable region enlarges the candidate. The
    // merged candidate restricts expansion to more boxes, never fewer.
    loop {
        let mut merged = false;
        for box_idx in state.edge.iter() {
            let box_pos = board.box_position(box_idx);
            for &dir in &ALL_DIRECTIONS {
                let (Some(dest), Some(player_pos)) = (
                    board.move_position(box_pos, dir),
                    board.move_position(box_pos, dir.reverse()),
                ) else {
                    continue;
                };
                if state.locally_visited.get(player_pos)
                    || board.get_tile(player_pos) == Tile::Wall
                {
                    continue;
                }
                let Some(blocker) = board.box_index(dest) else {
                    continue;
                };
                if state.edge.contains(blocker) || state.interior.contains(blocker) {
                    continue;
                }
                // The blocking box may seal a corral of its own
                let blocker_pos = board.box_position(blocker);
                for &d2 in &ALL_DIRECTIONS {
                    if let Some(seed) = board.move_position(blocker_pos, d2) {
                        if board.get_tile(seed) != Tile::Wall
                            && !board.has_box_at(seed)
                            && !reach.squares.get(seed)
                            && !state.locally_visited.get(seed)
                        {
                            flood_region(board, seed, reach, visited, &mut state);
                            merged = true;
                        }
                    }
                }
            }
        }
        if !merged {
            break;
        }
    }

    if !state.must_be_pushed {
        return None;
    }
    // A candidate whose boxes all sit on goals brings no pruning benefit;
    // let the caller find a different corral instead.
    if !state.any_box_off_goal {
        return None;
    }

    // Verify the PI conditions on every boundary box: each push that could
    // matter has to go inwards, and the player has to be able to make it
    let mut pushes = PushSet::new();
    for box_idx in state.edge.iter() {
        let box_pos = board.box_position(box_idx);
        for &dir in &ALL_DIRECTIONS {
            let Some(dest) = board.move_position(box_pos, dir) else {
                continue;
            };
            let Some(standing) = board.move_position(box_pos, dir.reverse()) else {
                continue;
            };
            // Pushes that start inside the candidate, have nowhere to stand,
            // are blocked, or land on a dead square never count
            if state.locally_visited.get(standing) || board.get_tile(standing) == Tile::Wall {
                continue;
            }
            if board.is_blocked(dest) || board.is_dead_square(dest) {
                continue;
            }
            if !state.locally_visited.get(dest) {
                // "I": a push escaping the region disproves the candidate
                return None;
            }
            if !reach.squares.get(standing) {
                // "P": the player must already be able to take this push
                return None;
            }
            pushes.add(box_idx, dir);
        }
    }

    let cost = pushes.len();
    Some((pushes, cost))
}

/// Flood the corral region from a seed square. Reachable boxes on the
/// boundary become edge boxes and stop the flood; unreachable boxes are
/// interior and are flooded through.
fn flood_region(
    board: &Board,
    pos: Position,
    reach: &Reach,
    visited: &mut LazyBitboard,
    state: &mut CorralState,
) {
    let mut stack: ArrayVec<Position, { MAX_SIZE * MAX_SIZE }> = ArrayVec::new();

    stack.push(pos);
    state.locally_visited.set(pos);
    visited.set(pos);

    while let Some(curr_pos) = stack.pop() {
        let is_goal = board.get_tile(curr_pos) == Tile::Goal;

        if let Some(box_idx) = board.box_index(curr_pos) {
            if !is_goal {
                state.must_be_pushed = true;
                state.any_box_off_goal = true;
            }
            // Boxes the player can touch bound the corral
            if reach.boxes.contains(box_idx) {
                state.edge.add(box_idx);
                continue;
            }
            state.interior.add(box_idx);
        } else if is_goal {
            // Goal without a box: the corral requires pushes to solve
            state.must_be_pushed = true;
        }

        for &dir in &ALL_DIRECTIONS {
            if let Some(next_pos) = board.move_position(curr_pos, dir) {
                if board.get_tile(next_pos) != Tile::Wall && !state.locally_visited.get(next_pos) {
                    stack.push(next_pos);
                    state.locally_visited.set(next_pos);
                    visited.set(next_pos);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::Index;
    use crate::board::Direction;

    fn parse_board(text: &str) -> Board {
        Board::from_text(text.trim_matches('\n')).unwrap()
    }

    fn check_pi_corral(board: &Board, x: u8, y: u8, expected: Option<(PushSet, usize)>) {
        let mut visited = LazyBitboard::new();
        let reach = board.compute_reach();
        let result = analyse_corral(board, Position(x, y), &reach, &mut visited);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_pi_corral_leaky_boundary() {
        let board = parse_board(
            r#"
########
#  $  .#
#   $@.#
#  $  .#
####   #
   # $.#
   #####
"#,
        );

        // A boundary box can be pushed out of the region: not a PI-corral.
        check_pi_corral(&board, 3, 2, None);
    }

    #[test]
    fn test_pi_corral_sealed() {
        let board = parse_board(
            r#"
########
#  $  .#
#   $@.#
#  $# .#
####   #
   # $.#
   #####
"#,
        );

        let mut expected_pushes = PushSet::new();
        expected_pushes.add(Index(0), Direction::Left);
        expected_pushes.add(Index(1), Direction::Left);

        check_pi_corral(&board, 3, 2, Some((expected_pushes, 2)));
    }

    #[test]
    fn test_pi_corral_open_escape() {
        let board = parse_board(
            r#"
########
#.  $ .#
#. $@ $#
#. $$  #
####   #
   #   #
   #####
"#,
        );

        check_pi_corral(&board, 2, 2, None);
    }

    #[test]
    fn test_pi_corral_escape_walled_off() {
        let board = parse_board(
            r#"
########
#.  $ .#
#. $@ $#
#. $#  #
####   #
   #   #
   #####
"#,
        );

        let mut expected_pushes = PushSet::new();
        expected_pushes.add(Index(0), Direction::Left);
        expected_pushes.add(Index(1), Direction::Left);

        check_pi_corral(&board, 2, 2, Some((expected_pushes, 2)));
    }

    #[test]
    fn test_pi_corral_no_legal_pushes() {
        let board = parse_board(
            r#"
######
#.   #
#.$@ #
#.  $#
#  $ #
######
"#,
        );

        let reach = board.compute_reach();
        let actual = find_pi_corral(&board, &reach).unwrap();
        assert_eq!(actual, PushSet::new());
    }

    #[test]
    fn test_pi_corral_all_boxes_on_goals_not_reported() {
        let board = parse_board(
            r#"
#######
###.###
###*###
#  @ $#
#######
"#,
        );

        // The pocket above the parked box still holds an empty goal, but
        // every candidate box already sits on a goal: no pruning benefit,
        // so no PI-corral is reported.
        let reach = board.compute_reach();
        assert_eq!(find_pi_corral(&board, &reach), None);
    }
}
