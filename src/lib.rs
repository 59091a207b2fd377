pub mod bits;
pub mod board;
pub mod corral;
pub mod deadlock;
pub mod distances;
pub mod goal_room;
pub mod levels;
pub mod lower_bound;
pub mod pqueue;
pub mod solver;
pub mod table;
pub mod tunnel;
pub mod zobrist;

pub use board::{Board, BoardError};
pub use levels::{LevelError, Levels};
pub use lower_bound::MatchingKind;
pub use solver::{Outcome, Solver, SolverOptions, Stats, Status, Variant};
