mod fen;

pub mod castle_bits;
mod fen_tables;

pub use castle_bits::*;

use std::fmt;
use std::str::FromStr;

use crate::bitboard::BitboardExt;
use crate::error::EngineError;
use crate::hash::zobrist::zobrist_keys;
use crate::moves::execute::Undo;
use crate::moves::magic;
use crate::moves::tables;
use crate::moves::types::Move;
use crate::square::Square;
use crate::utils::pop_lsb;

/// Starting-position piece masks.
const WHITE_PAWN_MASK: u64 = 0x0000_0000_0000_FF00;
const WHITE_ROOK_MASK: u64 = (1 << 0) | (1 << 7);
const WHITE_KNIGHT_MASK: u64 = (1 << 1) | (1 << 6);
const WHITE_BISHOP_MASK: u64 = (1 << 2) | (1 << 5);
const WHITE_QUEEN_MASK: u64 = 1 << 3;
const WHITE_KING_MASK: u64 = 1 << 4;

const BLACK_PAWN_MASK: u64 = 0x00FF_0000_0000_0000;
const BLACK_ROOK_MASK: u64 = (1 << 56) | (1 << 63);
const BLACK_KNIGHT_MASK: u64 = (1 << 57) | (1 << 62);
const BLACK_BISHOP_MASK: u64 = (1 << 58) | (1 << 61);
const BLACK_QUEEN_MASK: u64 = 1 << 59;
const BLACK_KING_MASK: u64 = 1 << 60;

// Square-table sentinel; piece codes 0..11 never collide with it.
pub(crate) const EMPTY_SQ: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Color {
    White,
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

pub const ALL_KINDS: [PieceKind; 6] = [
    PieceKind::Pawn,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Rook,
    PieceKind::Queen,
    PieceKind::King,
];

impl Color {
    #[inline(always)]
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    #[inline(always)]
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => Color::White,
            1 => Color::Black,
            _ => unreachable!("invalid color encoding: {}", v),
        }
    }
}

impl std::ops::Not for Color {
    type Output = Self;

    fn not(self) -> Self::Output {
        self.opposite()
    }
}

impl PieceKind {
    #[inline(always)]
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => PieceKind::Pawn,
            1 => PieceKind::Knight,
            2 => PieceKind::Bishop,
            3 => PieceKind::Rook,
            4 => PieceKind::Queen,
            5 => PieceKind::King,
            _ => unreachable!("invalid piece encoding: {}", v),
        }
    }

    /// Exchange value in centipawns, used by SEE and MVV-LVA.
    #[inline(always)]
    pub fn value(self) -> i32 {
        match self {
            PieceKind::Pawn => 100,
            PieceKind::Knight => 320,
            PieceKind::Bishop => 330,
            PieceKind::Rook => 500,
            PieceKind::Queen => 900,
            PieceKind::King => 20000,
        }
    }

    /// Rank 1..6 from least to most valuable aggressor.
    #[inline(always)]
    pub fn attacker_rank(self) -> i32 {
        self as i32 + 1
    }
}

/// Full chess position: piece placement, cached attack sets, rolling zobrist
/// hash, repetition window and the undo stack. Mutated only through
/// `make_move`/`undo_move` (and the null-move pair) in strict stack order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub piece_bb: [[u64; 6]; 2],
    pub occ_white: u64,
    pub occ_black: u64,
    pub occ_all: u64,
    /// 0xFF = empty, otherwise (color << 3) | kind.
    pub piece_on_sq: [u8; 64],
    pub side_to_move: Color,
    /// Bits K, Q, k, q.
    pub castling_rights: u8,
    pub en_passant: Option<Square>,
    /// Plies since the last capture or pawn move.
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
    /// Plies since the start of the game.
    pub ply: u32,
    pub zobrist: u64,
    /// Squares attacked by each side, refreshed after every make/undo.
    pub attacks_by_side: [u64; 2],
    /// Squares attacked by each piece family, same refresh discipline.
    pub attacks_by_piece: [[u64; 6]; 2],
    /// Hashes of positions since the last irreversible move, oldest first.
    pub(crate) repetition_stack: Vec<u64>,
    pub(crate) undo_stack: Vec<Undo>,
}

impl Board {
    /// All-empty board, White to move.
    pub fn new_empty() -> Self {
        let mut b = Board {
            piece_bb: [[0u64; 6]; 2],
            occ_white: 0,
            occ_black: 0,
            occ_all: 0,
            piece_on_sq: [EMPTY_SQ; 64],
            side_to_move: Color::White,
            castling_rights: 0,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            ply: 0,
            zobrist: 0,
            attacks_by_side: [0; 2],
            attacks_by_piece: [[0u64; 6]; 2],
            repetition_stack: Vec::with_capacity(64),
            undo_stack: Vec::with_capacity(64),
        };
        b.refresh_zobrist();
        b
    }

    /// Standard starting position.
    pub fn new() -> Self {
        let mut b = Board::new_empty();

        b.set_bb(Color::White, PieceKind::Pawn, WHITE_PAWN_MASK);
        b.set_bb(Color::White, PieceKind::Knight, WHITE_KNIGHT_MASK);
        b.set_bb(Color::White, PieceKind::Bishop, WHITE_BISHOP_MASK);
        b.set_bb(Color::White, PieceKind::Rook, WHITE_ROOK_MASK);
        b.set_bb(Color::White, PieceKind::Queen, WHITE_QUEEN_MASK);
        b.set_bb(Color::White, PieceKind::King, WHITE_KING_MASK);

        b.set_bb(Color::Black, PieceKind::Pawn, BLACK_PAWN_MASK);
        b.set_bb(Color::Black, PieceKind::Knight, BLACK_KNIGHT_MASK);
        b.set_bb(Color::Black, PieceKind::Bishop, BLACK_BISHOP_MASK);
        b.set_bb(Color::Black, PieceKind::Rook, BLACK_ROOK_MASK);
        b.set_bb(Color::Black, PieceKind::Queen, BLACK_QUEEN_MASK);
        b.set_bb(Color::Black, PieceKind::King, BLACK_KING_MASK);

        b.castling_rights = CASTLE_ALL;
        b.refresh_zobrist();
        b.rebuild_attacks();
        b
    }

    pub fn from_fen(fen: &str) -> Result<Self, EngineError> {
        let mut b = Board::new_empty();
        b.set_fen(fen)?;
        Ok(b)
    }

    #[inline(always)]
    pub(crate) fn bb(&self, color: Color, kind: PieceKind) -> u64 {
        self.piece_bb[color as usize][kind as usize]
    }

    /// Replace one piece bitboard, keeping the square table, occupancies and
    /// the zobrist hash in sync bit by bit.
    pub(crate) fn set_bb(&mut self, color: Color, kind: PieceKind, new_bb: u64) {
        let ci = color as usize;
        let pi = kind as usize;

        let old_bb = self.piece_bb[ci][pi];
        let delta = old_bb ^ new_bb;
        if delta == 0 {
            return;
        }

        self.piece_bb[ci][pi] = new_bb;

        if color == Color::White {
            self.occ_white ^= delta;
        } else {
            self.occ_black ^= delta;
        }
        self.occ_all = self.occ_white | self.occ_black;

        let keys = zobrist_keys();
        let mut bits = delta;
        while bits != 0 {
            let sq = pop_lsb(&mut bits);
            if new_bb.has(sq) {
                self.piece_on_sq[sq as usize] = (ci as u8) << 3 | pi as u8;
            } else {
                self.piece_on_sq[sq as usize] = EMPTY_SQ;
            }
            // The piece key toggles the same way for add and remove.
            self.zobrist ^= keys.piece[ci][pi][sq as usize];
        }
    }

    #[inline(always)]
    pub fn occupied(&self) -> u64 {
        self.occ_all
    }

    #[inline(always)]
    pub fn occupancy(&self, color: Color) -> u64 {
        match color {
            Color::White => self.occ_white,
            Color::Black => self.occ_black,
        }
    }

    #[inline(always)]
    pub fn opponent_occupancy(&self, color: Color) -> u64 {
        self.occupancy(color.opposite())
    }

    #[inline(always)]
    pub fn pieces(&self, kind: PieceKind, color: Color) -> u64 {
        self.bb(color, kind)
    }

    #[inline(always)]
    pub fn piece_at(&self, sq: Square) -> Option<(Color, PieceKind)> {
        let val = self.piece_on_sq[sq.index() as usize];
        if val == EMPTY_SQ {
            None
        } else {
            Some((Color::from_u8((val >> 3) & 1), PieceKind::from_u8(val & 0b111)))
        }
    }

    #[inline(always)]
    pub fn piece_kind_at(&self, sq: Square) -> Option<PieceKind> {
        self.piece_at(sq).map(|(_, kind)| kind)
    }

    #[inline(always)]
    pub fn color_at(&self, sq: Square) -> Option<Color> {
        self.piece_at(sq).map(|(color, _)| color)
    }

    #[inline(always)]
    pub fn en_passant_target(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline(always)]
    pub fn has_castling(&self, flag: u8) -> bool {
        self.castling_rights & flag != 0
    }

    #[inline(always)]
    pub fn has_kingside_castle(&self, color: Color) -> bool {
        match color {
            Color::White => self.has_castling(CASTLE_WK),
            Color::Black => self.has_castling(CASTLE_BK),
        }
    }

    #[inline(always)]
    pub fn has_queenside_castle(&self, color: Color) -> bool {
        match color {
            Color::White => self.has_castling(CASTLE_WQ),
            Color::Black => self.has_castling(CASTLE_BQ),
        }
    }

    /// Any knight, bishop, rook or queen left. Gates null-move pruning.
    #[inline(always)]
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        let minors_majors = self.bb(color, PieceKind::Knight)
            | self.bb(color, PieceKind::Bishop)
            | self.bb(color, PieceKind::Rook)
            | self.bb(color, PieceKind::Queen);
        minors_majors != 0
    }

    /// Count of minor and major pieces. Gates null-move verification.
    #[inline(always)]
    pub fn minor_major_count(&self, color: Color) -> u32 {
        (self.bb(color, PieceKind::Knight)
            | self.bb(color, PieceKind::Bishop)
            | self.bb(color, PieceKind::Rook)
            | self.bb(color, PieceKind::Queen))
        .popcount()
    }

    #[inline(always)]
    pub fn king_square(&self, color: Color) -> Square {
        let king_bb = self.bb(color, PieceKind::King);
        debug_assert!(king_bb != 0, "king missing for {:?}: {}", color, self.to_fen());
        Square::from_index(king_bb.lsb())
    }

    /// The move that produced the current position; the null move when the
    /// undo stack is empty.
    #[inline(always)]
    pub fn last_move(&self) -> Move {
        self.undo_stack.last().map_or(Move::NULL, |u| u.mv)
    }

    /// True iff any piece of `by` attacks `sq` on the given occupancy. The
    /// occupancy parameter lets king-safety checks drop the moving king.
    pub fn square_attacked_by(&self, sq: Square, by: Color, occupancy: u64) -> bool {
        let idx = sq.index();

        if tables::pawn_attacks(idx, by.opposite()) & self.pieces(PieceKind::Pawn, by) != 0 {
            return true;
        }
        if tables::knight_attacks(idx) & self.pieces(PieceKind::Knight, by) != 0 {
            return true;
        }
        if tables::king_attacks(idx) & self.pieces(PieceKind::King, by) != 0 {
            return true;
        }

        let rook_reach = magic::rook_attacks(idx, occupancy);
        if rook_reach & (self.pieces(PieceKind::Rook, by) | self.pieces(PieceKind::Queen, by)) != 0
        {
            return true;
        }

        let bishop_reach = magic::bishop_attacks(idx, occupancy);
        bishop_reach & (self.pieces(PieceKind::Bishop, by) | self.pieces(PieceKind::Queen, by)) != 0
    }

    /// Every attacker of `sq`, both colors, on the given occupancy.
    pub fn attackers_to(&self, sq: Square, occupancy: u64) -> u64 {
        let idx = sq.index();

        let pawns = (tables::pawn_attacks(idx, Color::Black)
            & self.pieces(PieceKind::Pawn, Color::White))
            | (tables::pawn_attacks(idx, Color::White)
                & self.pieces(PieceKind::Pawn, Color::Black));

        let knights = tables::knight_attacks(idx)
            & (self.pieces(PieceKind::Knight, Color::White)
                | self.pieces(PieceKind::Knight, Color::Black));

        let kings = tables::king_attacks(idx)
            & (self.pieces(PieceKind::King, Color::White)
                | self.pieces(PieceKind::King, Color::Black));

        let orth = self.pieces(PieceKind::Rook, Color::White)
            | self.pieces(PieceKind::Rook, Color::Black)
            | self.pieces(PieceKind::Queen, Color::White)
            | self.pieces(PieceKind::Queen, Color::Black);
        let diag = self.pieces(PieceKind::Bishop, Color::White)
            | self.pieces(PieceKind::Bishop, Color::Black)
            | self.pieces(PieceKind::Queen, Color::White)
            | self.pieces(PieceKind::Queen, Color::Black);

        let sliders = (magic::rook_attacks(idx, occupancy) & orth)
            | (magic::bishop_attacks(idx, occupancy) & diag);

        (pawns | knights | kings | sliders) & occupancy
    }

    /// Opposing pieces currently giving check.
    #[inline]
    pub fn checkers(&self) -> u64 {
        let king = self.king_square(self.side_to_move);
        self.attackers_to(king, self.occ_all) & self.opponent_occupancy(self.side_to_move)
    }

    #[inline]
    pub fn is_check(&self) -> bool {
        let king = self.king_square(self.side_to_move);
        self.square_attacked_by(king, self.side_to_move.opposite(), self.occ_all)
    }

    /// Recompute the cached per-piece and per-side attack sets from the
    /// current occupancy.
    pub fn rebuild_attacks(&mut self) {
        let occ = self.occ_all;
        for color in [Color::White, Color::Black] {
            let ci = color as usize;
            let mut side_attacks = 0u64;
            for kind in ALL_KINDS {
                let mut pieces = self.bb(color, kind);
                let mut attacks = 0u64;
                while pieces != 0 {
                    let sq = pop_lsb(&mut pieces);
                    attacks |= match kind {
                        PieceKind::Pawn => tables::pawn_attacks(sq, color),
                        PieceKind::Knight => tables::knight_attacks(sq),
                        PieceKind::Bishop => magic::bishop_attacks(sq, occ),
                        PieceKind::Rook => magic::rook_attacks(sq, occ),
                        PieceKind::Queen => magic::queen_attacks(sq, occ),
                        PieceKind::King => tables::king_attacks(sq),
                    };
                }
                self.attacks_by_piece[ci][kind as usize] = attacks;
                side_attacks |= attacks;
            }
            self.attacks_by_side[ci] = side_attacks;
        }
    }

    #[inline]
    pub fn refresh_zobrist(&mut self) {
        self.zobrist = self.compute_zobrist_full();
    }

    /// Full recompute from scratch; must match the rolling hash at all times.
    pub fn compute_zobrist_full(&self) -> u64 {
        let keys = zobrist_keys();
        let mut hash: u64 = 0;

        for color in [Color::White, Color::Black] {
            for kind in ALL_KINDS {
                let mut bb = self.bb(color, kind);
                while bb != 0 {
                    let sq = pop_lsb(&mut bb);
                    hash ^= keys.piece[color as usize][kind as usize][sq as usize];
                }
            }
        }

        if self.side_to_move == Color::Black {
            hash ^= keys.side_to_move;
        }

        let rights = self.castling_rights;
        if rights & CASTLE_WK != 0 {
            hash ^= keys.castling[0];
        }
        if rights & CASTLE_WQ != 0 {
            hash ^= keys.castling[1];
        }
        if rights & CASTLE_BK != 0 {
            hash ^= keys.castling[2];
        }
        if rights & CASTLE_BQ != 0 {
            hash ^= keys.castling[3];
        }

        if let Some(file) = crate::hash::zobrist::ep_file_to_hash(self) {
            hash ^= keys.ep_file[file as usize];
        }

        hash
    }

    /// Occurrences of the current position, including this one. Only hashes
    /// since the last irreversible move are retained, which is sufficient:
    /// an earlier repetition would need the irreversible move undone.
    pub fn repetition_count(&self) -> u32 {
        let current = self.zobrist;
        let prior = self
            .repetition_stack
            .iter()
            .filter(|&&k| k == current)
            .count() as u32;
        prior + 1
    }

    #[inline]
    pub fn is_repetition(&self) -> bool {
        let current = self.zobrist;
        self.repetition_stack.iter().rev().any(|&k| k == current)
    }

    #[inline]
    pub fn is_threefold(&self) -> bool {
        self.repetition_count() >= 3
    }

    /// Overlap check across the twelve piece bitboards.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen: u64 = 0;
        for color in [Color::White, Color::Black] {
            for kind in ALL_KINDS {
                let bb = self.bb(color, kind);
                if seen & bb != 0 {
                    return Err(EngineError::InvalidFen(format!(
                        "{:?} {:?} bitboard overlaps another piece",
                        color, kind
                    )));
                }
                seen |= bb;
            }
        }
        Ok(())
    }

    #[cfg(debug_assertions)]
    #[inline]
    pub fn assert_hash(&self) {
        let full = self.compute_zobrist_full();
        debug_assert_eq!(
            self.zobrist, full,
            "zobrist parity mismatch: stored={:#018x}, full={:#018x}",
            self.zobrist, full
        );
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new_empty()
    }
}

impl FromStr for Board {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Board::from_fen(s)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}
