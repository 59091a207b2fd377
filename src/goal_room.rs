use crate::bits::{Bitboard, LazyBitboard, Position};
use crate::board::{ALL_DIRECTIONS, Board, Checkpoint, Pull};
use crate::distances::{DIST_INFINITE, DistanceTables};
use crate::pqueue::PriorityQueue;
use crate::zobrist::Zobrist;
use fnv::FnvHashSet;
use log::debug;
use std::rc::Rc;

/// A room holding every goal, reachable only through a single corral-forcer
/// entrance square.
#[derive(Debug, Clone)]
pub struct GoalRoom {
    pub entrance: Position,
    /// Interior squares (the entrance itself is outside the room)
    pub room: LazyBitboard,
    pub size: usize,
}

/// The order in which boxes are parked inside a goal room. `steps` are
/// (from, to) push pairs in forward play order; the driver replays the next
/// steps each time a box lands on the entrance.
#[derive(Debug, Clone)]
pub struct PackingPlan {
    pub entrance: Position,
    pub steps: Vec<(Position, Position)>,
}

/// Find the smallest room that contains every goal, has no box inside, and
/// can only be entered over one corral-forcer square the player starts
/// outside of.
pub fn find_goal_room(board: &Board) -> Option<GoalRoom> {
    let goals = board.goal_positions();
    let first_goal = *goals.first()?;
    let mut best: Option<GoalRoom> = None;

    for y in 0..board.height() {
        for x in 0..board.width() {
            let entrance = Position(x, y);
            if !board.is_in_play(entrance)
                || !board.is_corral_forcer(entrance)
                || board.is_goal(entrance)
            {
                continue;
            }

            // The component holding the goals once the entrance is walled off
            let region = board.flood_excluding(first_goal, entrance);
            if region.get(board.player()) {
                continue;
            }
            if !goals.iter().all(|&g| region.get(g)) {
                continue;
            }
            let boxes_clear = board.active_boxes().iter().all(|idx| {
                let pos = board.box_position(idx);
                !region.get(pos) && pos != entrance
            });
            if !boxes_clear {
                continue;
            }
            // The entrance must actually open into the room
            let touches = ALL_DIRECTIONS
                .iter()
                .filter_map(|&d| board.move_position(entrance, d))
                .any(|n| region.get(n));
            if !touches {
                continue;
            }

            let size = region.count();
            if best.as_ref().is_none_or(|b| size < b.size) {
                best = Some(GoalRoom {
                    entrance,
                    room: region,
                    size,
                });
            }
        }
    }

    best
}

struct Node {
    checkpoint: Checkpoint,
    parent: usize,
    /// The pull that produced this node, as (from, to) box squares
    step: Option<(Position, Position)>,
    pulls: u16,
}

/// Backward search for the packing order: start from every goal occupied,
/// pull boxes toward the entrance, retire each box that reaches it with the
/// player outside. Succeeds when every box has been retired.
pub fn solve_goal_room(
    board: &Board,
    room: &GoalRoom,
    tables: &DistanceTables,
    zobrist: &Rc<Zobrist>,
    max_nodes: usize,
) -> Option<PackingPlan> {
    let pull_dist = tables.pull_distances(board, room.entrance);

    let mut sub = board.clone();
    sub.reset_boxes(board.goal_positions());

    // Lower bound: each active box still has to be pulled to the entrance
    let lower_bound = |sub: &Board| -> Option<u16> {
        let mut total = 0u16;
        for idx in sub.active_boxes() {
            let d = pull_dist.min(sub.box_position(idx));
            if d == DIST_INFINITE {
                return None;
            }
            total += d;
        }
        Some(total)
    };

    let mut arena: Vec<Node> = Vec::new();
    let mut open: PriorityQueue<usize> = PriorityQueue::new();
    let mut visited: FnvHashSet<u64> = FnvHashSet::default();

    // The player may start in any outside region next to the entrance
    for &dir in &ALL_DIRECTIONS {
        let Some(start) = board.move_position(room.entrance, dir) else {
            continue;
        };
        if !board.is_in_play(start) || room.room.get(start) || sub.has_box_at(start) {
            continue;
        }
        sub.set_player(start);
        let Some(lb) = lower_bound(&sub) else {
            continue;
        };
        arena.push(Node {
            checkpoint: sub.checkpoint(),
            parent: usize::MAX,
            step: None,
            pulls: 0,
        });
        open.push(lb as usize, arena.len() - 1);
    }

    while let Some(node_id) = open.pop_min() {
        if arena.len() > max_nodes {
            debug!("goal room search abandoned after {} nodes", arena.len());
            return None;
        }

        let (checkpoint, pulls) = {
            let node = &arena[node_id];
            (node.checkpoint.clone(), node.pulls)
        };
        sub.restore(&checkpoint);

        if sub.active_boxes().is_empty() {
            return Some(build_plan(&arena, node_id, room.entrance));
        }

        let reach = sub.compute_reach();
        let boxes_hash = zobrist.boxes_hash(
            sub.active_boxes().iter().map(|idx| sub.box_position(idx)),
        );
        let hash = boxes_hash ^ zobrist.player_hash(reach.canonical());
        if !visited.insert(hash) {
            continue;
        }

        for mv in &reach.pulls {
            let from = sub.box_position(mv.box_index);
            let to = sub.move_position(from, mv.direction).unwrap();
            // Boxes only travel within the room until they are retired
            if !room.room.get(to) && to != room.entrance {
                continue;
            }

            sub.pull(Pull::new(mv.box_index, mv.direction));
            if to == room.entrance && !room.room.get(sub.player()) {
                sub.deactivate_box(mv.box_index);
            }

            if let Some(lb) = lower_bound(&sub) {
                arena.push(Node {
                    checkpoint: sub.checkpoint(),
                    parent: node_id,
                    step: Some((from, to)),
                    pulls: pulls + 1,
                });
                open.push((pulls + 1 + lb) as usize, arena.len() - 1);
            }

            sub.restore(&checkpoint);
        }
    }

    None
}

fn build_plan(arena: &[Node], leaf: usize, entrance: Position) -> PackingPlan {
    // Walking leaf to root yields the pulls in reverse chronological order,
    // which is exactly forward play order once each pull is flipped into the
    // push that undoes it.
    let mut steps = Vec::new();
    let mut current = leaf;
    while current != usize::MAX {
        let node = &arena[current];
        if let Some((from, to)) = node.step {
            steps.push((to, from));
        }
        current = node.parent;
    }
    PackingPlan { entrance, steps }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_board(text: &str) -> Board {
        Board::from_text(text.trim_matches('\n')).unwrap()
    }

    #[test]
    fn test_find_goal_room_corridor() {
        let board = parse_board(
            r#"
#######
#@$ $ #
### ###
###.###
###.###
#######
"#,
        );
        let room = find_goal_room(&board).expect("goal room not found");
        assert_eq!(room.entrance, Position(3, 2));
        assert_eq!(room.size, 2);
        assert!(room.room.get(Position(3, 3)));
        assert!(room.room.get(Position(3, 4)));
    }

    #[test]
    fn test_no_goal_room_when_box_inside() {
        let board = parse_board(
            r#"
#######
#@  $ #
### ###
###$###
###.###
###.###
#######
"#,
        );
        assert!(find_goal_room(&board).is_none());
    }

    #[test]
    fn test_no_goal_room_in_open_level() {
        let board = parse_board(
            r#"
######
#    #
# $. #
# @  #
######
"#,
        );
        assert!(find_goal_room(&board).is_none());
    }

    #[test]
    fn test_solve_goal_room_packing_order() {
        let board = parse_board(
            r#"
#######
#@$ $ #
### ###
###.###
###.###
#######
"#,
        );
        let room = find_goal_room(&board).unwrap();
        let tables = DistanceTables::new(&board);
        let zobrist = Rc::new(Zobrist::new());
        let plan = solve_goal_room(&board, &room, &tables, &zobrist, 10_000)
            .expect("packing plan not found");

        assert_eq!(plan.entrance, Position(3, 2));
        assert_eq!(plan.steps.len(), 3);
        // The first box entering the room is parked on the deeper goal
        assert_eq!(plan.steps[0], (Position(3, 2), Position(3, 3)));
        assert_eq!(plan.steps[1], (Position(3, 3), Position(3, 4)));
        // The second box stops on the nearer goal
        assert_eq!(plan.steps[2], (Position(3, 2), Position(3, 3)));
    }
}
