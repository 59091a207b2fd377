use crate::bits::{Index, Position};
use crate::board::{ALL_DIRECTIONS, Board, Direction, MAX_BOXES, MAX_SIZE, Push};
use crate::corral::find_pi_corral;
use crate::deadlock::{DeadlockDetector, DetectorBudget};
use crate::distances::DistanceTables;
use crate::goal_room::{PackingPlan, find_goal_room, solve_goal_room};
use crate::lower_bound::{Cost, LowerBoundEngine, MatchingKind};
use crate::pqueue::PriorityQueue;
use crate::table::{InsertResult, Layout, RecordId, TranspositionTable};
use crate::tunnel::is_in_tunnel;
use crate::zobrist::Zobrist;
use arrayvec::ArrayVec;
use log::{debug, info};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// The four search variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Best-first on relevance: any solution, as fast as possible
    Any,
    /// A*: minimal pushes
    Pushes,
    /// Iterative deepening on pushes, preferring fewer moves within a bound
    PushesMoves,
    /// A*: minimal moves, tie-broken by pushes
    MovesPushes,
}

/// Terminal result of a search run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Solution as a string over `udlrUDLR`; empty when already solved
    Solved(String),
    Unsolvable,
    Cancelled,
    Timeout,
    OutOfMemory,
}

impl Status {
    pub fn solution(&self) -> Option<&str> {
        match self {
            Status::Solved(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub expanded: usize,
    pub generated: usize,
    pub duplicates: usize,
    pub deadlocks: usize,
    pub iterations: usize,
}

pub struct Outcome {
    pub status: Status,
    pub stats: Stats,
}

pub struct SolverOptions {
    pub variant: Variant,
    pub lower_bound: MatchingKind,
    /// Transposition table record budget; exhaustion aborts the run
    pub max_records: usize,
    pub time_limit: Option<Duration>,
    /// Wall-clock budget for a single corral deadlock proof
    pub corral_budget: Duration,
    pub corral_max_nodes: usize,
    /// Precompute a goal-room packing plan for the Any variant
    pub goal_room_packing: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            variant: Variant::Pushes,
            lower_bound: MatchingKind::Matching,
            max_records: 1 << 20,
            time_limit: None,
            corral_budget: Duration::from_millis(150),
            corral_max_nodes: 2000,
            goal_room_packing: true,
        }
    }
}

/// Weight of packing-plan progress in the Any variant's relevance score.
const PACKING_WEIGHT: usize = 16;
/// Spread factor for the moves-pushes cost key: the move estimate is the
/// primary term, push counts below this bound break ties.
const MOVES_TIE_BREAK: usize = 64;
const PROGRESS_INTERVAL: usize = 50_000;

pub struct Solver {
    board: Board,
    initial: Board,
    options: SolverOptions,
    zobrist: Rc<Zobrist>,
    lower_bound: LowerBoundEngine,
    detector: DeadlockDetector,
    table: TranspositionTable,
    queue: PriorityQueue<RecordId>,
    plan: Option<PackingPlan>,
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
    bound_exceeded: bool,
    stats: Stats,
}

/// Search metadata of the position being expanded.
#[derive(Clone, Copy)]
struct ParentInfo {
    id: RecordId,
    pushes: u16,
    moves: u16,
    packing: u8,
}

enum Expanded {
    Done,
    /// The Any variant accepts a solved successor at generation time
    SolvedAt(RecordId),
}

impl Solver {
    pub fn new(board: Board, options: SolverOptions) -> Self {
        let zobrist = Rc::new(Zobrist::new());
        let tables = Rc::new(DistanceTables::new(&board));
        let lower_bound = LowerBoundEngine::new(tables, options.lower_bound);
        let detector = DeadlockDetector::new(zobrist.clone());
        let table = TranspositionTable::new(zobrist.clone(), options.max_records);

        Solver {
            initial: board.clone(),
            board,
            options,
            zobrist,
            lower_bound,
            detector,
            table,
            queue: PriorityQueue::new(),
            plan: None,
            cancel: Arc::new(AtomicBool::new(false)),
            deadline: None,
            bound_exceeded: false,
            stats: Stats::default(),
        }
    }

    /// Flag the host sets to request cancellation; polled between successor
    /// generations and between deepening iterations.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn solve(&mut self) -> Outcome {
        self.deadline = self.options.time_limit.map(|limit| Instant::now() + limit);

        let start_cost = self.lower_bound.compute(&self.board);
        if start_cost.is_deadlock() {
            return self.finish(Status::Unsolvable);
        }
        if self.board.is_solved() {
            return self.finish(Status::Solved(String::new()));
        }

        if self.options.goal_room_packing && self.options.variant == Variant::Any {
            if let Some(room) = find_goal_room(&self.board) {
                self.plan = solve_goal_room(
                    &self.board,
                    &room,
                    self.lower_bound.tables(),
                    &self.zobrist,
                    100_000,
                );
                if let Some(plan) = &self.plan {
                    info!(
                        "goal room at {} with {} packing steps",
                        plan.entrance,
                        plan.steps.len()
                    );
                }
            }
        }

        let root = self.insert_root(start_cost);
        let status = match self.options.variant {
            Variant::PushesMoves => self.run_deepening(start_cost),
            _ => self.run_best_first(root, start_cost),
        };
        self.finish(status)
    }

    fn finish(&mut self, status: Status) -> Outcome {
        self.table.clear();
        self.queue.clear();
        Outcome {
            status,
            stats: self.stats.clone(),
        }
    }

    fn insert_root(&mut self, cost: Cost) -> RecordId {
        let reach = self.board.compute_reach();
        let canonical = reach.canonical();
        let hash = self.table.position_hash(&self.board, canonical);
        let layout = Layout::Absolute {
            boxes: self.board.box_positions().iter().copied().collect(),
            player: self.board.player(),
        };
        let result = self.table.insert_or_replace(
            layout,
            hash,
            canonical,
            &self.board.box_bitboard(),
            0,
            0,
            cost.value(),
            0,
        );
        match result {
            InsertResult::Inserted(id) => id,
            InsertResult::Existing(_) => unreachable!("root inserted into empty table"),
        }
    }

    /// Poll the cancel flag, the deadline, and the record budget.
    fn interrupted(&self) -> Option<Status> {
        if self.cancel.load(Ordering::Relaxed) {
            return Some(Status::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(Status::Timeout);
            }
        }
        if self.table.is_full() {
            return Some(Status::OutOfMemory);
        }
        None
    }

    fn run_best_first(&mut self, root: RecordId, start_cost: Cost) -> Status {
        let key = self.queue_key(start_cost.value() as usize, 0, 0, 0, 0);
        self.queue.push(key, root);

        while let Some(id) = self.queue.pop_min() {
            if let Some(status) = self.interrupted() {
                return status;
            }

            {
                let record = self.table.record_mut(id);
                if record.expanded {
                    self.stats.duplicates += 1;
                    continue;
                }
                record.expanded = true;
            }

            if self.table.record(id).lower_bound == 0 {
                return Status::Solved(self.build_solution(id));
            }

            match self.expand(id, None) {
                Ok(Expanded::Done) => {}
                Ok(Expanded::SolvedAt(solved)) => {
                    return Status::Solved(self.build_solution(solved));
                }
                Err(status) => return status,
            }
        }

        Status::Unsolvable
    }

    /// Iterative deepening on pushes: each round reopens every stored
    /// position within the widened bound and orders expansion by moves.
    /// The per-record iteration tag remembers the bound a position was last
    /// queued or expanded at, so a round never takes the same position twice.
    fn run_deepening(&mut self, start_cost: Cost) -> Status {
        let mut bound = start_cost.value() as u32;

        loop {
            self.stats.iterations += 1;
            self.queue.clear();
            let bound_tag = bound.min(u16::MAX as u32) as u16;

            let mut reopened = 0usize;
            for id in self.table.record_ids() {
                let record = self.table.record(id);
                let f = record.pushes as u32 + record.lower_bound as u32;
                if f > bound || record.iteration == bound_tag {
                    continue;
                }
                let moves = record.moves as usize;
                let record = self.table.record_mut(id);
                record.iteration = bound_tag;
                record.expanded = false;
                self.queue.push(moves, id);
                reopened += 1;
            }
            debug!(
                "deepening to {} pushes, {} positions reopened",
                bound, reopened
            );
            if reopened == 0 {
                return Status::Unsolvable;
            }

            let mut exceeded_this_round = false;
            while let Some(id) = self.queue.pop_min() {
                if let Some(status) = self.interrupted() {
                    return status;
                }

                {
                    let record = self.table.record_mut(id);
                    if record.iteration == bound_tag && record.expanded {
                        self.stats.duplicates += 1;
                        continue;
                    }
                    record.iteration = bound_tag;
                    record.expanded = true;
                }

                if self.table.record(id).lower_bound == 0 {
                    return Status::Solved(self.build_solution(id));
                }

                match self.expand(id, Some(bound)) {
                    Ok(Expanded::Done) => {}
                    Ok(Expanded::SolvedAt(solved)) => {
                        return Status::Solved(self.build_solution(solved));
                    }
                    Err(status) => return status,
                }
                exceeded_this_round |= self.bound_exceeded;
            }

            // Suspension point between deepening iterations
            if let Some(status) = self.interrupted() {
                return status;
            }
            // Nothing was cut off by the bound: the space is fully explored
            if !exceeded_this_round {
                return Status::Unsolvable;
            }
            // Widening by two keeps the lower bound's push parity
            bound += 2;
        }
    }

    /// Generate the successors of a stored position.
    fn expand(&mut self, id: RecordId, bound: Option<u32>) -> Result<Expanded, Status> {
        self.bound_exceeded = false;

        let (boxes, player) = self.table.reconstruct(id);
        self.board.reset_boxes(&boxes);
        self.board.set_player(player);

        let parent = {
            let record = self.table.record(id);
            ParentInfo {
                id,
                pushes: record.pushes,
                moves: record.moves,
                packing: record.packing,
            }
        };
        let last_push = self.table.record(id).last_push();

        self.stats.expanded += 1;
        if self.stats.expanded % PROGRESS_INTERVAL == 0 {
            info!(
                "{} positions expanded, {} stored, {} queued",
                self.stats.expanded,
                self.table.len(),
                self.queue.len()
            );
        }

        self.detector.begin_expansion(&self.board);
        let frozen = self.detector.frozen();
        let reach = self.board.compute_reach();
        let walk_dist = self.board.compute_reach_distances();

        // A box in a tunnel forces its own continuation, provided that
        // continuation is currently possible
        let tunnel_push = last_push
            .filter(|push| {
                is_in_tunnel(
                    &self.board,
                    self.board.box_position(push.box_index),
                    push.direction,
                )
            })
            .filter(|push| reach.pushes.contains(*push));

        // A proven PI-corral collapses the branching factor to its boundary.
        // The tunnel and corral proofs each justify their own restriction;
        // they are alternatives, never intersected.
        let corral_pushes = if tunnel_push.is_none() {
            find_pi_corral(&self.board, &reach)
        } else {
            None
        };

        // Most-recently-pushed box first
        let mut box_order: ArrayVec<Index, MAX_BOXES> = ArrayVec::new();
        if let Some(push) = last_push {
            box_order.push(push.box_index);
        }
        for idx in self.board.active_boxes() {
            if Some(idx) != last_push.map(|p| p.box_index) {
                box_order.push(idx);
            }
        }

        let checkpoint = self.board.checkpoint();

        for &box_index in &box_order {
            if frozen.contains(box_index) {
                continue;
            }
            for &direction in &ALL_DIRECTIONS {
                let push = Push::new(box_index, direction);
                if let Some(tunnel) = tunnel_push {
                    if push != tunnel {
                        continue;
                    }
                } else if let Some(corral) = &corral_pushes {
                    if !corral.contains(push) {
                        continue;
                    }
                }
                if !reach.pushes.contains(push) {
                    continue;
                }

                // Suspension point between successor generations
                if let Some(status) = self.interrupted() {
                    return Err(status);
                }

                let from = self.board.box_position(box_index);
                let dest = self.board.move_position(from, direction).unwrap();
                if self.board.is_dead_square(dest) {
                    self.stats.deadlocks += 1;
                    continue;
                }
                let side = self
                    .board
                    .move_position(from, direction.reverse())
                    .expect("push side in bounds");
                let walk = walk_dist.get(side);
                debug_assert_ne!(walk, u16::MAX);

                self.board.push(push);

                let budget = DetectorBudget {
                    deadline: Some(Instant::now() + self.options.corral_budget),
                    max_nodes: self.options.corral_max_nodes,
                };
                let verdict =
                    self.detector
                        .check(&self.board, &self.lower_bound, box_index, dest, &budget);

                let solved = match verdict {
                    None => {
                        self.stats.deadlocks += 1;
                        None
                    }
                    Some(cost) => self.admit_child(
                        parent,
                        push,
                        cost,
                        parent.pushes + 1,
                        parent.moves + walk + 1,
                        parent.packing,
                        bound,
                    ),
                };

                if let Some(solved) = solved {
                    if self.options.variant == Variant::Any {
                        return Ok(Expanded::SolvedAt(solved));
                    }
                }

                self.board.restore(&checkpoint);
            }
        }

        Ok(Expanded::Done)
    }

    /// Insert or improve the successor currently on the board. Returns its
    /// record id when the successor is already solved.
    #[allow(clippy::too_many_arguments)]
    fn admit_child(
        &mut self,
        parent: ParentInfo,
        push: Push,
        cost: Cost,
        child_pushes: u16,
        child_moves: u16,
        child_packing: u8,
        bound: Option<u32>,
    ) -> Option<RecordId> {
        if let Some(bound) = bound {
            if child_pushes as u32 + cost.value() as u32 > bound {
                self.bound_exceeded = true;
                return None;
            }
        }

        let min_walk = self.child_min_walk();
        let canonical = self.board.compute_reach().canonical();
        let hash = self.table.position_hash(&self.board, canonical);
        let key = self.queue_key(
            cost.value() as usize,
            child_pushes,
            child_moves,
            child_packing,
            min_walk,
        );

        let result = self.table.insert_or_replace(
            Layout::Relative {
                parent: parent.id,
                push,
            },
            hash,
            canonical,
            &self.board.box_bitboard(),
            child_pushes,
            child_moves,
            cost.value(),
            child_packing,
        );

        let id = match result {
            InsertResult::Inserted(id) => {
                self.stats.generated += 1;
                if let Some(bound) = bound {
                    self.table.record_mut(id).iteration = bound.min(u16::MAX as u32) as u16;
                }
                self.queue.push(key, id);
                id
            }
            InsertResult::Existing(id) => {
                self.stats.duplicates += 1;
                let existing = self.table.record(id);
                let better = child_pushes < existing.pushes
                    || (child_pushes == existing.pushes && child_moves < existing.moves);
                if !better {
                    return None;
                }
                // Adopt the better path and reopen the position
                let record = self.table.record_mut(id);
                record.pushes = child_pushes;
                record.moves = child_moves;
                record.packing = child_packing;
                record.expanded = false;
                if let Some(bound) = bound {
                    record.iteration = bound.min(u16::MAX as u32) as u16;
                }
                self.table.update_layout(
                    id,
                    Layout::Relative {
                        parent: parent.id,
                        push,
                    },
                );
                self.queue.push(key, id);
                id
            }
        };

        if cost == Cost::ZERO {
            return Some(id);
        }

        // Splice in the goal-room packing replay when a box lands on the
        // entrance of the goal room
        if self.options.variant == Variant::Any {
            if let Some(solved) = self.replay_packing(id, child_pushes, child_moves, child_packing)
            {
                return Some(solved);
            }
        }
        None
    }

    /// Walk distance to the nearest pushable side in the current (child)
    /// position; part of the admissible move estimate.
    fn child_min_walk(&self) -> u16 {
        if self.options.variant != Variant::MovesPushes {
            return 0;
        }
        let reach = self.board.compute_reach();
        let dist = self.board.compute_reach_distances();
        reach
            .pushes
            .iter()
            .filter_map(|p| {
                let box_pos = self.board.box_position(p.box_index);
                self.board.move_position(box_pos, p.direction.reverse())
            })
            .map(|side| dist.get(side))
            .filter(|&w| w != u16::MAX)
            .min()
            .unwrap_or(0)
    }

    /// Replay the packing plan after a push onto the goal-room entrance.
    /// Each forced push becomes its own relative record; only the end of the
    /// consumed segment is enqueued. Returns Some(id) when the replay ends
    /// in a solved position.
    fn replay_packing(
        &mut self,
        arrival: RecordId,
        mut pushes: u16,
        mut moves: u16,
        packing: u8,
    ) -> Option<RecordId> {
        let steps: Vec<(Position, Position)> = {
            let plan = self.plan.as_ref()?;
            if (packing as usize) >= plan.steps.len()
                || plan.steps[packing as usize].0 != plan.entrance
                || !self.board.has_box_at(plan.entrance)
            {
                return None;
            }
            plan.steps.clone()
        };
        let entrance = self.plan.as_ref().unwrap().entrance;

        let mut parent = arrival;
        let mut step = packing as usize;
        let mut consumed = 0usize;

        while step < steps.len() {
            let (from, to) = steps[step];
            if consumed > 0 && from == entrance {
                // The next segment waits for another box to arrive
                break;
            }
            let Some(box_index) = self.board.box_index(from) else {
                break;
            };
            let Some(direction) = direction_between(from, to) else {
                break;
            };
            let push = Push::new(box_index, direction);
            let reach = self.board.compute_reach();
            if !reach.pushes.contains(push) {
                break;
            }
            let walk_dist = self.board.compute_reach_distances();
            let side = self
                .board
                .move_position(from, direction.reverse())
                .expect("replay side in bounds");
            let walk = walk_dist.get(side);

            self.board.push(push);
            pushes += 1;
            moves += walk + 1;
            let cost = self.lower_bound.compute(&self.board);

            let canonical = self.board.compute_reach().canonical();
            let hash = self.table.position_hash(&self.board, canonical);
            let result = self.table.insert_or_replace(
                Layout::Relative { parent, push },
                hash,
                canonical,
                &self.board.box_bitboard(),
                pushes,
                moves,
                cost.value(),
                (step + 1).min(u8::MAX as usize) as u8,
            );
            parent = match result {
                InsertResult::Inserted(id) => {
                    self.stats.generated += 1;
                    id
                }
                InsertResult::Existing(id) => id,
            };
            step += 1;
            consumed += 1;

            if cost == Cost::ZERO {
                return Some(parent);
            }
        }

        if consumed > 0 {
            let (lb, pushes, moves, packing) = {
                let record = self.table.record(parent);
                (
                    record.lower_bound as usize,
                    record.pushes,
                    record.moves,
                    record.packing,
                )
            };
            let key = self.queue_key(lb, pushes, moves, packing, 0);
            self.queue.push(key, parent);
        }
        None
    }

    /// The bucket-queue cost key for the configured variant.
    fn queue_key(
        &self,
        lower_bound: usize,
        pushes: u16,
        moves: u16,
        packing: u8,
        min_walk: u16,
    ) -> usize {
        match self.options.variant {
            Variant::Any => {
                // Negated relevance: packing progress and a low bound are
                // both attractive
                let remaining = self
                    .plan
                    .as_ref()
                    .map(|plan| plan.steps.len().saturating_sub(packing as usize))
                    .unwrap_or(0);
                lower_bound + remaining * PACKING_WEIGHT
            }
            Variant::Pushes => pushes as usize + lower_bound,
            Variant::PushesMoves => moves as usize,
            Variant::MovesPushes => {
                // Equal move estimates resolve in favour of fewer pushes
                let estimate = moves as usize + lower_bound + min_walk as usize;
                estimate * MOVES_TIE_BREAK + (pushes as usize).min(MOVES_TIE_BREAK - 1)
            }
        }
    }

    /// Turn the push chain of a solved record into the letter string.
    fn build_solution(&self, id: RecordId) -> String {
        let pushes = self.table.pushes_from_root(id);
        let mut game = self.initial.clone();
        let mut out = String::new();

        for push in pushes {
            let from = game.box_position(push.box_index);
            let side = game
                .move_position(from, push.direction.reverse())
                .expect("push side in bounds");
            walk_path(&game, game.player(), side, &mut out);
            game.push(push);
            out.push(push.direction.push_letter());
        }

        assert!(game.is_solved(), "reconstructed solution does not solve");
        out
    }
}

/// Append the letters of a shortest player walk from `from` to `to`.
fn walk_path(board: &Board, from: Position, to: Position, out: &mut String) {
    if from == to {
        return;
    }

    const NO_DIR: u8 = 255;
    const START: u8 = 4;
    let mut came_by = [[NO_DIR; MAX_SIZE]; MAX_SIZE];
    let mut queue = VecDeque::new();
    came_by[from.1 as usize][from.0 as usize] = START;
    queue.push_back(from);

    'search: while let Some(pos) = queue.pop_front() {
        for &dir in &ALL_DIRECTIONS {
            if let Some(next) = board.move_position(pos, dir) {
                if !board.is_blocked(next) && came_by[next.1 as usize][next.0 as usize] == NO_DIR {
                    came_by[next.1 as usize][next.0 as usize] = dir.index() as u8;
                    if next == to {
                        break 'search;
                    }
                    queue.push_back(next);
                }
            }
        }
    }

    assert_ne!(
        came_by[to.1 as usize][to.0 as usize],
        NO_DIR,
        "no player path for solution walk"
    );

    let mut letters = Vec::new();
    let mut pos = to;
    while pos != from {
        let dir = Direction::from_index(came_by[pos.1 as usize][pos.0 as usize] as usize);
        letters.push(dir.move_letter());
        pos = board.move_position(pos, dir.reverse()).unwrap();
    }
    letters.reverse();
    out.extend(letters);
}

fn direction_between(from: Position, to: Position) -> Option<Direction> {
    let dx = to.0 as i16 - from.0 as i16;
    let dy = to.1 as i16 - from.1 as i16;
    match (dx, dy) {
        (0, -1) => Some(Direction::Up),
        (0, 1) => Some(Direction::Down),
        (-1, 0) => Some(Direction::Left),
        (1, 0) => Some(Direction::Right),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_board(text: &str) -> Board {
        Board::from_text(text.trim_matches('\n')).unwrap()
    }

    fn solve_variant(text: &str, variant: Variant) -> Status {
        let board = parse_board(text);
        let mut solver = Solver::new(
            board,
            SolverOptions {
                variant,
                ..SolverOptions::default()
            },
        );
        solver.solve().status
    }

    /// Replay a solution string on the board and check it solves.
    fn verify_solution(text: &str, solution: &str) {
        let mut board = parse_board(text);
        for letter in solution.chars() {
            let direction = match letter.to_ascii_lowercase() {
                'u' => Direction::Up,
                'd' => Direction::Down,
                'l' => Direction::Left,
                'r' => Direction::Right,
                other => panic!("invalid solution letter '{}'", other),
            };
            let next = board
                .move_position(board.player(), direction)
                .expect("move in bounds");
            if letter.is_ascii_uppercase() {
                let box_index = board.box_index(next).expect("push letter without box");
                board.push(Push::new(box_index, direction));
            } else {
                assert!(!board.is_blocked(next), "move into blocked square");
                board.set_player(next);
            }
        }
        assert!(board.is_solved(), "solution does not solve the board");
    }

    #[test]
    fn test_trivial_one_push() {
        let text = "#####\n#@$.#\n#####";
        for variant in [
            Variant::Any,
            Variant::Pushes,
            Variant::PushesMoves,
            Variant::MovesPushes,
        ] {
            let status = solve_variant(text, variant);
            let Status::Solved(solution) = &status else {
                panic!("{:?} did not solve: {:?}", variant, status);
            };
            assert_eq!(solution, "R");
        }
    }

    #[test]
    fn test_micro_walk_then_push() {
        let text = "#######\n#.$  @#\n#######";
        let status = solve_variant(text, Variant::Pushes);
        let Status::Solved(solution) = &status else {
            panic!("not solved: {:?}", status);
        };
        // One push, three moves: walk up to the box, then push it home
        assert_eq!(solution, "llL");
        verify_solution(text, solution);
    }

    #[test]
    fn test_already_solved() {
        let text = "####\n#@*#\n####";
        for variant in [
            Variant::Any,
            Variant::Pushes,
            Variant::PushesMoves,
            Variant::MovesPushes,
        ] {
            assert_eq!(solve_variant(text, variant), Status::Solved(String::new()));
        }
    }

    #[test]
    fn test_unsolvable_immediately() {
        // The box can only be cornered; the lower bound is already infinite
        let text = "#####\n#@$ #\n#  .#\n#####";
        assert_eq!(solve_variant(text, Variant::Pushes), Status::Unsolvable);
    }

    #[test]
    fn test_two_pushes() {
        let text = "######\n#@$ .#\n######";
        let status = solve_variant(text, Variant::Pushes);
        let Status::Solved(solution) = &status else {
            panic!("not solved: {:?}", status);
        };
        assert_eq!(solution, "RR");
    }

    #[test]
    fn test_cancellation_liveness() {
        let text = r#"
##########
#@ $   ..#
#  $     #
#        #
##########
"#;
        let board = parse_board(text);
        let mut solver = Solver::new(board, SolverOptions::default());
        solver.cancel_flag().store(true, Ordering::Relaxed);
        assert_eq!(solver.solve().status, Status::Cancelled);
    }

    #[test]
    fn test_walk_path_shortest() {
        let board = parse_board(
            r#"
######
#@   #
## # #
#    #
######
"#,
        );
        let mut out = String::new();
        walk_path(&board, Position(1, 1), Position(4, 1), &mut out);
        assert_eq!(out, "rrr");
    }
}
