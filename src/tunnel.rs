use crate::bits::Position;
use crate::board::{Board, Direction, Tile};

/// True when a box that was just pushed to `box_pos` in `dir` sits in a
/// tunnel: the square it came from is walled on both sides and at least one
/// side of its current square is walled too. Geometry then forces the next
/// push of this box to continue in the same direction, so the driver can
/// restrict the following ply to this box alone.
pub fn is_in_tunnel(board: &Board, box_pos: Position, dir: Direction) -> bool {
    if board.get_tile(box_pos) == Tile::Goal {
        return false;
    }

    let Some(prev) = board.move_position(box_pos, dir.reverse()) else {
        return false;
    };

    let sides = dir.sides();
    let walled = |pos: Position, side: Direction| match board.move_position(pos, side) {
        Some(next) => board.get_tile(next) == Tile::Wall,
        None => true,
    };

    walled(prev, sides[0])
        && walled(prev, sides[1])
        && (walled(box_pos, sides[0]) || walled(box_pos, sides[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_board(text: &str) -> Board {
        Board::from_text(text.trim_matches('\n')).unwrap()
    }

    #[test]
    fn test_corridor_is_tunnel() {
        let board = parse_board(
            r#"
########
#@$   .#
########
"#,
        );
        // As if the box had just been pushed right into (2, 1)
        assert!(is_in_tunnel(&board, Position(2, 1), Direction::Right));
    }

    #[test]
    fn test_open_room_is_not_tunnel() {
        let board = parse_board(
            r#"
#######
#     #
# $   #
#@   .#
#######
"#,
        );
        assert!(!is_in_tunnel(&board, Position(2, 2), Direction::Right));
    }

    #[test]
    fn test_box_on_goal_is_not_tunnel() {
        let board = parse_board(
            r#"
########
#@$  *.#
########
"#,
        );
        assert!(!is_in_tunnel(&board, Position(5, 1), Direction::Right));
    }

    #[test]
    fn test_tunnel_mouth() {
        // The previous square is in the open; the pattern requires walls on
        // both of its sides.
        let board = parse_board(
            r#"
#######
#     #
#@$ ###
#    .#
#######
"#,
        );
        assert!(!is_in_tunnel(&board, Position(2, 2), Direction::Right));
    }
}
