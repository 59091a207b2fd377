use clap::{Parser, ValueEnum};
use log::error;
use pushover::{Levels, MatchingKind, Solver, SolverOptions, Status, Variant};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SearchVariant {
    /// Any solution, best-first on relevance
    Any,
    /// Minimal pushes
    Pushes,
    /// Minimal pushes, then minimal moves
    PushMoves,
    /// Minimal moves, then minimal pushes
    MovesPushes,
}

impl From<SearchVariant> for Variant {
    fn from(variant: SearchVariant) -> Self {
        match variant {
            SearchVariant::Any => Variant::Any,
            SearchVariant::Pushes => Variant::Pushes,
            SearchVariant::PushMoves => Variant::PushesMoves,
            SearchVariant::MovesPushes => Variant::MovesPushes,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BoundKind {
    Simple,
    Matching,
}

impl From<BoundKind> for MatchingKind {
    fn from(kind: BoundKind) -> Self {
        match kind {
            BoundKind::Simple => MatchingKind::Simple,
            BoundKind::Matching => MatchingKind::Matching,
        }
    }
}

#[derive(Parser)]
#[command(name = "pushover")]
#[command(about = "A Sokoban solver", long_about = None)]
struct Args {
    /// Path to the levels file (XSB format)
    #[arg(value_name = "FILE")]
    levels_file: String,

    /// Level number to solve (1-indexed), or start of range
    #[arg(value_name = "LEVEL")]
    level_start: usize,

    /// Optional end of level range (inclusive, 1-indexed)
    #[arg(value_name = "LEVEL_END")]
    level_end: Option<usize>,

    /// Search variant
    #[arg(short = 'v', long, value_enum, default_value = "pushes")]
    variant: SearchVariant,

    /// Lower bound flavour
    #[arg(short = 'b', long, value_enum, default_value = "matching")]
    lower_bound: BoundKind,

    /// Print the solution string for each solved level
    #[arg(short, long)]
    print_solution: bool,

    /// Transposition table record budget
    #[arg(short = 'n', long, default_value = "1000000")]
    max_records: usize,

    /// Time limit per level in seconds
    #[arg(short = 't', long)]
    time_limit: Option<u64>,

    /// Node budget for a single corral deadlock proof
    #[arg(long, default_value = "2000")]
    corral_max_nodes: usize,

    /// Disable the goal-room packing sub-solver
    #[arg(long, default_value = "false")]
    no_goal_room: bool,
}

struct LevelStats {
    solved: bool,
    pushes: usize,
    moves: usize,
    expanded: usize,
    elapsed_ms: u128,
}

fn solve_level(board: &pushover::Board, level_num: usize, args: &Args) -> LevelStats {
    let options = SolverOptions {
        variant: args.variant.into(),
        lower_bound: args.lower_bound.into(),
        max_records: args.max_records,
        time_limit: args.time_limit.map(Duration::from_secs),
        corral_max_nodes: args.corral_max_nodes,
        goal_room_packing: !args.no_goal_room,
        ..SolverOptions::default()
    };

    let mut solver = Solver::new(board.clone(), options);
    let start = Instant::now();
    let outcome = solver.solve();
    let elapsed_ms = start.elapsed().as_millis();

    let (status_char, pushes, moves) = match &outcome.status {
        Status::Solved(solution) => (
            'Y',
            solution.chars().filter(|c| c.is_ascii_uppercase()).count(),
            solution.len(),
        ),
        Status::Unsolvable => ('X', 0, 0),
        Status::Cancelled => ('C', 0, 0),
        Status::Timeout => ('T', 0, 0),
        Status::OutOfMemory => ('M', 0, 0),
    };

    println!(
        "level: {:<3}  solved: {}  pushes: {:<4}  moves: {:<5}  expanded: {:<10}  elapsed: {} ms",
        level_num, status_char, pushes, moves, outcome.stats.expanded, elapsed_ms
    );

    if args.print_solution {
        if let Status::Solved(solution) = &outcome.status {
            println!("  {}", solution);
        }
    }

    LevelStats {
        solved: matches!(outcome.status, Status::Solved(_)),
        pushes,
        moves,
        expanded: outcome.stats.expanded,
        elapsed_ms,
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let levels = match Levels::from_file(&args.levels_file) {
        Ok(levels) => levels,
        Err(e) => {
            error!("loading levels failed: {}", e);
            eprintln!("Error loading levels: {}", e);
            std::process::exit(1);
        }
    };

    let level_end = args.level_end.unwrap_or(args.level_start);
    let num_levels = level_end.saturating_sub(args.level_start) + 1;

    if args.level_start == 0 {
        eprintln!("Error: level numbers must be at least 1");
        std::process::exit(1);
    }

    if level_end < args.level_start {
        eprintln!("Error: level end must be >= level start");
        std::process::exit(1);
    }

    if level_end > levels.len() {
        eprintln!(
            "Error: level {} not found (file contains {} levels)",
            level_end,
            levels.len()
        );
        std::process::exit(1);
    }

    let mut total_solved = 0;
    let mut total_pushes = 0;
    let mut total_moves = 0;
    let mut total_expanded = 0;
    let mut total_time_ms = 0;

    for level_num in args.level_start..=level_end {
        let board = levels.get(level_num - 1).unwrap();
        let stats = solve_level(board, level_num, &args);

        if stats.solved {
            total_solved += 1;
        }
        total_pushes += stats.pushes;
        total_moves += stats.moves;
        total_expanded += stats.expanded;
        total_time_ms += stats.elapsed_ms;
    }

    if num_levels > 1 {
        println!("---");
        println!(
            "solved: {:>3}/{:<3}  pushes: {:<4}  moves: {:<5}  expanded: {:<10}  elapsed: {} ms",
            total_solved, num_levels, total_pushes, total_moves, total_expanded, total_time_ms
        );
    }
}
