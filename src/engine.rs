//! Engine control surface: position setup, timed search with cooperative
//! cancellation, transposition-table management and result accessors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::board::{Board, PieceKind};
use crate::error::EngineError;
use crate::eval::{Evaluator, HandcraftedEval};
use crate::moves::types::Move;
use crate::search::params::MAX_PLY;
use crate::search::search::{SearchWorker, Variation};
use crate::search::tt::TranspositionTable;
use crate::square::Square;

pub const DEFAULT_HASH_MB: usize = 64;

/// Cancellation handle usable from another thread while `search` blocks.
#[derive(Clone)]
pub struct SearchHandle {
    stop: Arc<AtomicBool>,
}

impl SearchHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

pub struct Engine<E: Evaluator = HandcraftedEval> {
    board: Board,
    evaluator: E,
    tt: Arc<TranspositionTable>,
    stop: Arc<AtomicBool>,
    num_variations: usize,
    variations: Vec<Variation>,
    last_nodes: u64,
}

impl Engine<HandcraftedEval> {
    pub fn new() -> Result<Self, EngineError> {
        Engine::with_evaluator(HandcraftedEval::new(), DEFAULT_HASH_MB)
    }
}

impl<E: Evaluator> Engine<E> {
    pub fn with_evaluator(evaluator: E, hash_mb: usize) -> Result<Self, EngineError> {
        Ok(Engine {
            board: Board::new(),
            evaluator,
            tt: Arc::new(TranspositionTable::new(hash_mb)?),
            stop: Arc::new(AtomicBool::new(false)),
            num_variations: 1,
            variations: Vec::new(),
            last_nodes: 0,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Load a FEN and apply a sequence of UCI-style move strings. The
    /// engine's position only changes if every step succeeds.
    pub fn set_position(&mut self, fen: &str, moves: &[&str]) -> Result<(), EngineError> {
        let mut board = Board::from_fen(fen)?;
        for text in moves {
            let mv = parse_uci_move(&board, text)?;
            board.make_move(mv);
        }
        self.board = board;
        self.variations.clear();
        Ok(())
    }

    /// Run a timed search and return the best move. With
    /// `treat_as_time_control` the argument is a remaining clock and only a
    /// slice of it is spent; otherwise the budget is used as given.
    pub fn search(&mut self, time_ms: u64, treat_as_time_control: bool) -> Option<Move> {
        let budget_ms = if treat_as_time_control {
            (time_ms / 30).max(1)
        } else {
            time_ms
        };
        let deadline = Instant::now() + Duration::from_millis(budget_ms);

        self.stop.store(false, Ordering::SeqCst);

        // The timer thread enforces the budget by flipping the shared stop
        // flag; short sleep slices let it exit promptly once the search
        // returns on its own.
        let timer_stop = Arc::clone(&self.stop);
        let timer = thread::spawn(move || loop {
            if timer_stop.load(Ordering::Relaxed) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                timer_stop.store(true, Ordering::SeqCst);
                return;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(5)));
        });

        let mut worker = SearchWorker::new(
            self.board.clone(),
            &mut self.evaluator,
            &self.tt,
            &self.stop,
            Some(deadline),
            self.num_variations,
        );
        let variations = worker.iterate(MAX_PLY as i32);
        self.last_nodes = worker.nodes();

        self.stop.store(true, Ordering::SeqCst);
        let _ = timer.join();

        self.variations = variations;
        self.best_move()
    }

    /// Request cooperative cancellation of a running search.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_handle(&self) -> SearchHandle {
        SearchHandle {
            stop: Arc::clone(&self.stop),
        }
    }

    /// Reallocate the transposition table. On failure the old table stays
    /// in use.
    pub fn set_hash_size_mb(&mut self, size_mb: usize) -> Result<(), EngineError> {
        let tt = TranspositionTable::new(size_mb)?;
        self.tt = Arc::new(tt);
        Ok(())
    }

    pub fn clear_hash(&self) {
        self.tt.clear();
    }

    pub fn set_num_variations(&mut self, count: usize) {
        self.num_variations = count.max(1);
    }

    pub fn best_move(&self) -> Option<Move> {
        self.variations
            .first()
            .and_then(|v| v.moves.first())
            .copied()
    }

    pub fn best_move_score(&self) -> Option<i32> {
        self.variations.first().map(|v| v.score)
    }

    pub fn principal_variation(&self) -> &[Move] {
        self.variations
            .first()
            .map(|v| v.moves.as_slice())
            .unwrap_or(&[])
    }

    pub fn variations(&self) -> &[Variation] {
        &self.variations
    }

    pub fn nodes_searched(&self) -> u64 {
        self.last_nodes
    }
}

/// Resolve a UCI-style move string against the legal moves of `board`.
/// A malformed string and a well-formed but illegal move fail differently.
pub fn parse_uci_move(board: &Board, text: &str) -> Result<Move, EngineError> {
    let malformed = || EngineError::InvalidMoveString(text.to_string());

    if !(text.len() == 4 || text.len() == 5) || !text.is_ascii() {
        return Err(malformed());
    }

    let origin: Square = text[0..2].parse().map_err(|_| malformed())?;
    let destination: Square = text[2..4].parse().map_err(|_| malformed())?;
    let promotion = if text.len() == 5 {
        Some(match text.as_bytes()[4] {
            b'n' => PieceKind::Knight,
            b'b' => PieceKind::Bishop,
            b'r' => PieceKind::Rook,
            b'q' => PieceKind::Queen,
            _ => return Err(malformed()),
        })
    } else {
        None
    };

    board
        .legal_moves()
        .iter()
        .find(|m| {
            m.origin() == origin
                && m.destination() == destination
                && m.promotion_kind() == promotion
        })
        .copied()
        .ok_or_else(|| EngineError::IllegalMove(text.to_string()))
}
