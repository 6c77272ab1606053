//! Perft: exhaustive legal-move counting, the primary movegen correctness
//! probe. The divide variant reports per-root-move subtotals for debugging
//! against a known-good engine.

use tracing::debug;

use crate::board::Board;
use crate::moves::movegen::MoveList;
use crate::moves::types::Move;

const MAX_LOG_DEPTH: u32 = 2;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PerftCounters {
    pub nodes: u64,
    pub captures: u64,
    pub ep_captures: u64,
    pub castles: u64,
    pub promotions: u64,
    pub checks: u64,
    pub checkmates: u64,
}

impl PerftCounters {
    pub fn add(&mut self, other: &PerftCounters) {
        self.nodes += other.nodes;
        self.captures += other.captures;
        self.ep_captures += other.ep_captures;
        self.castles += other.castles;
        self.promotions += other.promotions;
        self.checks += other.checks;
        self.checkmates += other.checkmates;
    }
}

fn perft_recursive(board: &mut Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = board.legal_moves();

    // Leaf shortcut: the move count is the node count.
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0;
    for &mv in moves.iter() {
        board.make_move(mv);
        nodes += perft_recursive(board, depth - 1);
        board.undo_move();
    }
    nodes
}

/// Total legal leaf count to `depth`.
pub fn perft(board: &mut Board, depth: u32) -> u64 {
    let nodes = perft_recursive(board, depth);
    if depth <= MAX_LOG_DEPTH {
        debug!(depth, nodes, fen = %board.to_fen(), "perft");
    }
    nodes
}

/// Per-root-move subtotals, sorted by move string.
pub fn perft_divide(board: &mut Board, depth: u32) -> Vec<(Move, u64)> {
    let mut results = Vec::new();
    if depth == 0 {
        return results;
    }

    let moves: MoveList = board.legal_moves();
    for &mv in moves.iter() {
        board.make_move(mv);
        let nodes = perft_recursive(board, depth - 1);
        board.undo_move();
        results.push((mv, nodes));
    }

    results.sort_by_key(|(mv, _)| mv.to_uci());
    results
}

/// Full breakdown by move kind, including checks and mates. Slower than
/// plain perft; meant for validating generator details.
pub fn perft_with_breakdown(board: &mut Board, depth: u32) -> PerftCounters {
    let mut counters = PerftCounters::default();
    if depth == 0 {
        counters.nodes = 1;
        return counters;
    }

    let moves = board.legal_moves();
    for &mv in moves.iter() {
        board.make_move(mv);

        if depth == 1 {
            counters.nodes += 1;
            if mv.is_capture() {
                counters.captures += 1;
            }
            if mv.is_en_passant() {
                counters.ep_captures += 1;
            }
            if mv.is_castling() {
                counters.castles += 1;
            }
            if mv.is_promotion() {
                counters.promotions += 1;
            }
            if board.is_check() {
                counters.checks += 1;
                if board.legal_moves().is_empty() {
                    counters.checkmates += 1;
                }
            }
        } else {
            let below = perft_with_breakdown(board, depth - 1);
            counters.add(&below);
        }

        board.undo_move();
    }

    counters
}
