use thiserror::Error;

/// Failure kinds surfaced at the crate boundary. The search hot path never
/// produces these; preconditions there are enforced by the move generator
/// and the board invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    #[error("invalid move string: {0}")]
    InvalidMoveString(String),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("transposition table allocation failed ({0} MB requested)")]
    AllocationFailed(usize),
}
