use crate::bits::{Bitboard, Position, RawBitboard};
use crate::board::{Board, MAX_BOXES, Push};
use crate::zobrist::Zobrist;
use arrayvec::ArrayVec;
use std::rc::Rc;

pub type RecordId = u32;
pub const NO_RECORD: RecordId = u32::MAX;

/// How a position's box layout is stored. Most records are relative: they
/// keep only the push that produced them and a parent pointer; walking the
/// chain to the pinned absolute root reproduces the full layout.
#[derive(Debug, Clone)]
pub enum Layout {
    Absolute {
        boxes: ArrayVec<Position, MAX_BOXES>,
        player: Position,
    },
    Relative {
        parent: RecordId,
        push: Push,
    },
}

/// A stored position plus its search metadata. The layout and key fields are
/// immutable after insertion; the metadata may be updated when the position
/// is re-reached via a better path.
#[derive(Debug, Clone)]
pub struct Record {
    layout: Layout,
    hash: u64,
    canonical_player: Position,
    /// Pushes on the best known path from the root.
    pub pushes: u16,
    /// Moves on the best known path from the root.
    pub moves: u16,
    /// Admissible pushes-to-solve estimate for this position.
    pub lower_bound: u16,
    /// Iteration tag for bounded re-expansion.
    pub iteration: u16,
    /// Packing-plan steps already consumed on this path.
    pub packing: u8,
    /// Whether the position was already expanded (at the current iteration).
    pub expanded: bool,
    next: RecordId,
}

impl Record {
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn canonical_player(&self) -> Position {
        self.canonical_player
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn last_push(&self) -> Option<Push> {
        match self.layout {
            Layout::Absolute { .. } => None,
            Layout::Relative { push, .. } => Some(push),
        }
    }
}

/// Transposition table: a fixed number of slots, each the head of a singly
/// linked chain through a record arena the table owns. Positions are equal
/// iff they have the same box squares and the same player reach region
/// (represented by the region's canonical square). The table never rehashes.
pub struct TranspositionTable {
    slots: Vec<RecordId>,
    arena: Vec<Record>,
    mask: usize,
    max_records: usize,
    zobrist: Rc<Zobrist>,
}

impl TranspositionTable {
    pub fn new(zobrist: Rc<Zobrist>, max_records: usize) -> Self {
        let slot_count = max_records.next_power_of_two();
        TranspositionTable {
            slots: vec![NO_RECORD; slot_count],
            arena: Vec::new(),
            mask: slot_count - 1,
            max_records,
            zobrist,
        }
    }

    /// Hash of a position given its boxes and canonical player square.
    pub fn position_hash(&self, board: &Board, canonical_player: Position) -> u64 {
        let boxes = board
            .active_boxes()
            .iter()
            .map(|idx| board.box_position(idx));
        self.zobrist.boxes_hash(boxes) ^ self.zobrist.player_hash(canonical_player)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// True when the record budget is exhausted; the driver reports
    /// out-of-memory rather than evicting.
    pub fn is_full(&self) -> bool {
        self.arena.len() >= self.max_records
    }

    pub fn clear(&mut self) {
        self.slots.fill(NO_RECORD);
        self.arena.clear();
    }

    pub fn record(&self, id: RecordId) -> &Record {
        &self.arena[id as usize]
    }

    pub fn record_mut(&mut self, id: RecordId) -> &mut Record {
        &mut self.arena[id as usize]
    }

    pub fn record_ids(&self) -> std::ops::Range<RecordId> {
        0..self.arena.len() as RecordId
    }

    /// Find the record equal to the probed position, if any. `box_board`
    /// must be the bitboard of the probed position's box squares.
    pub fn lookup(
        &self,
        hash: u64,
        canonical_player: Position,
        box_board: &RawBitboard,
    ) -> Option<RecordId> {
        let mut id = self.slots[(hash as usize) & self.mask];
        while id != NO_RECORD {
            let record = &self.arena[id as usize];
            if record.hash == hash
                && record.canonical_player == canonical_player
                && self.reconstruct_bitboard(id) == *box_board
            {
                return Some(id);
            }
            id = record.next;
        }
        None
    }

    /// Insert a position. If an equal record already exists, nothing is
    /// inserted and the existing record is returned so the caller can compare
    /// search metadata and keep the better path.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_or_replace(
        &mut self,
        layout: Layout,
        hash: u64,
        canonical_player: Position,
        box_board: &RawBitboard,
        pushes: u16,
        moves: u16,
        lower_bound: u16,
        packing: u8,
    ) -> InsertResult {
        if let Some(existing) = self.lookup(hash, canonical_player, box_board) {
            return InsertResult::Existing(existing);
        }

        let slot = (hash as usize) & self.mask;
        let id = self.arena.len() as RecordId;
        self.arena.push(Record {
            layout,
            hash,
            canonical_player,
            pushes,
            moves,
            lower_bound,
            iteration: 0,
            packing,
            expanded: false,
            next: self.slots[slot],
        });
        self.slots[slot] = id;
        InsertResult::Inserted(id)
    }

    /// Adopt a better path to an existing record. The new layout must
    /// reconstruct the same absolute position; strict metadata improvement
    /// by the caller rules out parent cycles.
    pub fn update_layout(&mut self, id: RecordId, layout: Layout) {
        self.arena[id as usize].layout = layout;
    }

    /// Reconstruct the absolute box layout and player square of a record by
    /// walking its parent chain to the absolute root.
    pub fn reconstruct(&self, id: RecordId) -> (ArrayVec<Position, MAX_BOXES>, Position) {
        let mut chain: Vec<RecordId> = Vec::new();
        let mut current = id;
        let (mut boxes, root_player) = loop {
            match &self.arena[current as usize].layout {
                Layout::Absolute { boxes, player } => break (boxes.clone(), *player),
                Layout::Relative { parent, .. } => {
                    chain.push(current);
                    current = *parent;
                }
            }
        };

        let mut player = root_player;
        for &link in chain.iter().rev() {
            let Layout::Relative { push, .. } = &self.arena[link as usize].layout else {
                unreachable!()
            };
            let from = boxes[push.box_index.0 as usize];
            let to = step(from, *push);
            boxes[push.box_index.0 as usize] = to;
            player = from;
        }

        (boxes, player)
    }

    fn reconstruct_bitboard(&self, id: RecordId) -> RawBitboard {
        let (boxes, _) = self.reconstruct(id);
        let mut bb = RawBitboard::new();
        for &pos in &boxes {
            bb.set(pos);
        }
        bb
    }

    /// The pushes leading from the root to this record, in play order.
    pub fn pushes_from_root(&self, id: RecordId) -> Vec<Push> {
        let mut pushes = Vec::new();
        let mut current = id;
        loop {
            match &self.arena[current as usize].layout {
                Layout::Absolute { .. } => break,
                Layout::Relative { parent, push } => {
                    pushes.push(*push);
                    current = *parent;
                }
            }
        }
        pushes.reverse();
        pushes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted(RecordId),
    Existing(RecordId),
}

fn step(from: Position, push: Push) -> Position {
    use crate::board::Direction;
    match push.direction {
        Direction::Up => Position(from.0, from.1 - 1),
        Direction::Down => Position(from.0, from.1 + 1),
        Direction::Left => Position(from.0 - 1, from.1),
        Direction::Right => Position(from.0 + 1, from.1),
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

    fn new_table() -> TranspositionTable {
        TranspositionTable::new(Rc::new(Zobrist::new()), 1024)
    }

    fn insert_board(table: &mut TranspositionTable, board: &Board) -> InsertResult {
        let canonical = board.compute_reach().canonical();
        let hash = table.position_hash(board, canonical);
        let layout = Layout::Absolute {
            boxes: board.box_positions().iter().copied().collect(),
            player: board.player(),
        };
        table.insert_or_replace(layout, hash, canonical, &board.box_bitboard(), 0, 0, 0, 0)
    }

    #[test]
    fn test_equal_within_reach_region() {
        // Two positions with identical boxes and player squares in the same
        // reach region are the same table entry.
        let a = parse_board(
            r#"
######
#@   #
# $. #
#    #
######
"#,
        );
        let mut b = a.clone();
        b.set_player(Position(1, 3));

        let mut table = new_table();
        assert!(matches!(insert_board(&mut table, &a), InsertResult::Inserted(_)));
        assert!(matches!(insert_board(&mut table, &b), InsertResult::Existing(_)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_distinct_reach_regions() {
        // Same boxes, player on opposite sides of the box: distinct entries.
        let a = parse_board(
            r#"
#######
#@ $ .#
#######
"#,
        );
        let mut b = a.clone();
        b.set_player(Position(4, 1));

        let canonical_a = a.compute_reach().canonical();
        let canonical_b = b.compute_reach().canonical();
        assert_ne!(canonical_a, canonical_b);

        let mut table = new_table();
        assert!(matches!(insert_board(&mut table, &a), InsertResult::Inserted(_)));
        assert!(matches!(insert_board(&mut table, &b), InsertResult::Inserted(_)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_relative_reconstruction() {
        let mut board = parse_board(
            r#"
########
#@$   .#
########
"#,
        );
        let mut table = new_table();
        let InsertResult::Inserted(root) = insert_board(&mut table, &board) else {
            panic!("root insert failed");
        };

        // Push the box right twice, inserting relative records.
        let mut parent = root;
        for _ in 0..2 {
            let push = Push::new(Index(0), Direction::Right);
            board.push(push);
            let canonical = board.compute_reach().canonical();
            let hash = table.position_hash(&board, canonical);
            let result = table.insert_or_replace(
                Layout::Relative { parent, push },
                hash,
                canonical,
                &board.box_bitboard(),
                0,
                0,
                0,
                0,
            );
            let InsertResult::Inserted(id) = result else {
                panic!("expected fresh insert");
            };
            parent = id;
        }

        let (boxes, player) = table.reconstruct(parent);
        assert_eq!(boxes.as_slice(), &[Position(4, 1)]);
        assert_eq!(player, Position(3, 1));

        let pushes = table.pushes_from_root(parent);
        assert_eq!(pushes.len(), 2);
        assert!(pushes.iter().all(|p| p.direction == Direction::Right));
    }

    #[test]
    fn test_clear_and_budget() {
        let board = parse_board(
            r#"
#####
#@$.#
#####
"#,
        );
        let mut table = TranspositionTable::new(Rc::new(Zobrist::new()), 1);
        insert_board(&mut table, &board);
        assert!(table.is_full());

        table.clear();
        assert!(table.is_empty());
        assert!(!table.is_full());
        assert!(matches!(insert_board(&mut table, &board), InsertResult::Inserted(_)));
    }
}
