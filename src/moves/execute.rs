//! Move execution. `make_move` assumes its input is pseudo-legal (produced by
//! the generator or vetted by `is_move_legal`); `undo_move` is its exact
//! inverse, restoring every field from the popped undo record.

use crate::board::castle_bits::*;
use crate::board::{Board, Color, PieceKind, EMPTY_SQ};
use crate::hash::zobrist::{ep_file_to_hash, xor_castling_rights_delta, zobrist_keys};
use crate::moves::types::Move;
use crate::square::Square;

/// Snapshot pushed on every make and popped on the matching undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undo {
    /// The move made; the null move for `make_null_move`.
    pub mv: Move,
    /// Kind that moved (the pawn for promotions).
    pub moved: PieceKind,
    /// Captured kind and the square it stood on (differs from the move
    /// destination for en passant).
    pub captured: Option<(PieceKind, Square)>,
    pub prev_castling_rights: u8,
    pub prev_en_passant: Option<Square>,
    pub prev_halfmove_clock: u32,
    pub prev_zobrist: u64,
    pub prev_attacks_by_side: [u64; 2],
    pub prev_attacks_by_piece: [[u64; 6]; 2],
    /// Pre-move repetition window, saved when the move was irreversible.
    pub prev_repetition: Option<Vec<u64>>,
}

/// Rook relocation for a castle, keyed by the king's destination.
#[inline(always)]
fn rook_castle_squares(king_to: u8) -> (Square, Square) {
    match king_to {
        6 => (Square::from_index(7), Square::from_index(5)),    // White O-O
        2 => (Square::from_index(0), Square::from_index(3)),    // White O-O-O
        62 => (Square::from_index(63), Square::from_index(61)), // Black O-O
        58 => (Square::from_index(56), Square::from_index(59)), // Black O-O-O
        _ => unreachable!("castle destination {} is not a castle square", king_to),
    }
}

#[inline(always)]
fn rights_cleared_by_rook_square(color: Color, rook_sq: u8) -> u8 {
    match (color, rook_sq) {
        (Color::White, 0) => CASTLE_WQ,
        (Color::White, 7) => CASTLE_WK,
        (Color::Black, 56) => CASTLE_BQ,
        (Color::Black, 63) => CASTLE_BK,
        _ => 0,
    }
}

#[inline(always)]
fn remove_piece(board: &mut Board, color: Color, kind: PieceKind, sq: Square) {
    let new_bb = board.piece_bb[color as usize][kind as usize] & !sq.bb();
    board.set_bb(color, kind, new_bb);
}

#[inline(always)]
fn place_piece(board: &mut Board, color: Color, kind: PieceKind, sq: Square) {
    let new_bb = board.piece_bb[color as usize][kind as usize] | sq.bb();
    board.set_bb(color, kind, new_bb);
}

impl Board {
    /// Apply a pseudo-legal move and push the matching undo record.
    pub fn make_move(&mut self, mv: Move) {
        debug_assert!(mv.exists());

        let color = self.side_to_move;
        let from = mv.origin();
        let to = mv.destination();

        let code = self.piece_on_sq[from.index() as usize];
        debug_assert!(code != EMPTY_SQ, "no piece on {} for {}", from, mv);
        let moved = PieceKind::from_u8(code & 0b111);

        let mut undo = Undo {
            mv,
            moved,
            captured: None,
            prev_castling_rights: self.castling_rights,
            prev_en_passant: self.en_passant,
            prev_halfmove_clock: self.halfmove_clock,
            prev_zobrist: self.zobrist,
            prev_attacks_by_side: self.attacks_by_side,
            prev_attacks_by_piece: self.attacks_by_piece,
            prev_repetition: None,
        };

        let keys = zobrist_keys();

        // Old en-passant file leaves the hash before any state changes.
        if let Some(f) = ep_file_to_hash(self) {
            self.zobrist ^= keys.ep_file[f as usize];
        }
        self.en_passant = None;

        // Capture, including the en-passant pawn one rank behind the target.
        if mv.is_en_passant() {
            let cap_sq = if color == Color::White {
                Square::from_index(to.index() - 8)
            } else {
                Square::from_index(to.index() + 8)
            };
            undo.captured = Some((PieceKind::Pawn, cap_sq));
            remove_piece(self, color.opposite(), PieceKind::Pawn, cap_sq);
        } else if mv.is_capture() {
            let occupant = self.piece_on_sq[to.index() as usize];
            debug_assert!(occupant != EMPTY_SQ, "capture onto empty {} for {}", to, mv);
            let cap_kind = PieceKind::from_u8(occupant & 0b111);
            undo.captured = Some((cap_kind, to));
            remove_piece(self, color.opposite(), cap_kind, to);
        }

        // Fresh en-passant target behind a double push.
        if mv.is_double_pawn_push() {
            let ep_sq = if color == Color::White {
                Square::from_index(from.index() + 8)
            } else {
                Square::from_index(from.index() - 8)
            };
            self.en_passant = Some(ep_sq);
        }

        // Castling rights: king move clears both, a rook leaving or being
        // captured on its corner clears that flank.
        let mut mask_to_clear: u8 = 0;
        if moved == PieceKind::King {
            mask_to_clear |= match color {
                Color::White => CASTLE_WK | CASTLE_WQ,
                Color::Black => CASTLE_BK | CASTLE_BQ,
            };
        }
        if moved == PieceKind::Rook {
            mask_to_clear |= rights_cleared_by_rook_square(color, from.index());
        }
        if let Some((cap_kind, cap_sq)) = undo.captured {
            if cap_kind == PieceKind::Rook {
                mask_to_clear |= rights_cleared_by_rook_square(color.opposite(), cap_sq.index());
            }
        }
        let old_rights = self.castling_rights;
        let new_rights = old_rights & !mask_to_clear;
        if new_rights != old_rights {
            self.castling_rights = new_rights;
            xor_castling_rights_delta(&mut self.zobrist, keys, old_rights, new_rights);
        }

        // Relocate the moving piece, swapping in the promotion piece if any.
        remove_piece(self, color, moved, from);
        if let Some(promo) = mv.promotion_kind() {
            debug_assert!(moved == PieceKind::Pawn);
            place_piece(self, color, promo, to);
        } else {
            place_piece(self, color, moved, to);
        }

        if mv.is_castling() {
            let (rook_from, rook_to) = rook_castle_squares(to.index());
            remove_piece(self, color, PieceKind::Rook, rook_from);
            place_piece(self, color, PieceKind::Rook, rook_to);
        }

        if undo.captured.is_some() || moved == PieceKind::Pawn {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = undo.prev_halfmove_clock + 1;
        }
        if color == Color::Black {
            self.fullmove_number += 1;
        }
        self.ply += 1;

        self.side_to_move = color.opposite();
        self.zobrist ^= keys.side_to_move;

        if let Some(f) = ep_file_to_hash(self) {
            self.zobrist ^= keys.ep_file[f as usize];
        }

        // Repetition window: the pre-move hash joins it; an irreversible move
        // makes every earlier entry unreachable, so the window restarts.
        let irreversible = undo.captured.is_some() || moved == PieceKind::Pawn;
        if irreversible {
            undo.prev_repetition = Some(std::mem::take(&mut self.repetition_stack));
        }
        self.repetition_stack.push(undo.prev_zobrist);

        self.rebuild_attacks();

        #[cfg(debug_assertions)]
        self.assert_hash();

        self.undo_stack.push(undo);
    }

    /// Pop the top undo record and restore every field to its pre-make value.
    pub fn undo_move(&mut self) {
        let undo = self
            .undo_stack
            .pop()
            .expect("undo_move without a matching make_move");
        debug_assert!(undo.mv.exists(), "undo_move crossing a null move");

        let mv = undo.mv;
        let mover = self.side_to_move.opposite();
        let from = mv.origin();
        let to = mv.destination();

        // Put the pieces back; the hash noise from set_bb is irrelevant
        // because the stored pre-move hash is restored wholesale below.
        if let Some(promo) = mv.promotion_kind() {
            remove_piece(self, mover, promo, to);
            place_piece(self, mover, PieceKind::Pawn, from);
        } else {
            remove_piece(self, mover, undo.moved, to);
            place_piece(self, mover, undo.moved, from);
        }

        if let Some((cap_kind, cap_sq)) = undo.captured {
            place_piece(self, mover.opposite(), cap_kind, cap_sq);
        }

        if mv.is_castling() {
            let (rook_from, rook_to) = rook_castle_squares(to.index());
            remove_piece(self, mover, PieceKind::Rook, rook_to);
            place_piece(self, mover, PieceKind::Rook, rook_from);
        }

        self.side_to_move = mover;
        self.castling_rights = undo.prev_castling_rights;
        self.en_passant = undo.prev_en_passant;
        self.halfmove_clock = undo.prev_halfmove_clock;
        if mover == Color::Black {
            self.fullmove_number -= 1;
        }
        self.ply -= 1;
        self.zobrist = undo.prev_zobrist;

        self.repetition_stack.pop();
        if let Some(prev) = undo.prev_repetition {
            self.repetition_stack = prev;
        }

        self.attacks_by_side = undo.prev_attacks_by_side;
        self.attacks_by_piece = undo.prev_attacks_by_piece;

        #[cfg(debug_assertions)]
        self.assert_hash();
    }

    /// Swap the side to move without touching pieces or clocks. A search
    /// device only; never a legal chess move.
    pub fn make_null_move(&mut self) {
        let undo = Undo {
            mv: Move::NULL,
            moved: PieceKind::King,
            captured: None,
            prev_castling_rights: self.castling_rights,
            prev_en_passant: self.en_passant,
            prev_halfmove_clock: self.halfmove_clock,
            prev_zobrist: self.zobrist,
            prev_attacks_by_side: self.attacks_by_side,
            prev_attacks_by_piece: self.attacks_by_piece,
            prev_repetition: None,
        };

        let keys = zobrist_keys();
        if let Some(f) = ep_file_to_hash(self) {
            self.zobrist ^= keys.ep_file[f as usize];
        }
        self.en_passant = None;

        self.side_to_move = self.side_to_move.opposite();
        self.zobrist ^= keys.side_to_move;
        self.ply += 1;

        self.repetition_stack.push(undo.prev_zobrist);
        self.undo_stack.push(undo);
    }

    pub fn undo_null_move(&mut self) {
        let undo = self
            .undo_stack
            .pop()
            .expect("undo_null_move without a matching make_null_move");
        debug_assert!(!undo.mv.exists(), "undo_null_move over a real move");

        self.side_to_move = self.side_to_move.opposite();
        self.en_passant = undo.prev_en_passant;
        self.zobrist = undo.prev_zobrist;
        self.ply -= 1;
        self.repetition_stack.pop();

        #[cfg(debug_assertions)]
        self.assert_hash();
    }

    /// Legality check for externally supplied moves: the move must be one
    /// the generator would produce here. Rare path, not used by the search.
    pub fn is_move_legal(&mut self, mv: Move) -> bool {
        let mut legal = crate::moves::movegen::MoveList::new();
        crate::moves::movegen::generate_legal_moves(self, &mut legal);
        legal.iter().any(|&m| m == mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::types::{FLAG_CAPTURE, FLAG_DOUBLE_PAWN, FLAG_QUIET};
    use std::str::FromStr;

    fn sq(name: &str) -> Square {
        Square::from_str(name).unwrap()
    }

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn make_undo_restores_start_position() {
        let mut board = Board::from_fen(START_FEN).unwrap();
        let reference = board.clone();

        board.make_move(Move::new(sq("e2"), sq("e4"), FLAG_DOUBLE_PAWN));
        assert_eq!(board.en_passant, Some(sq("e3")));
        assert_eq!(board.side_to_move, Color::Black);
        board.undo_move();

        assert_eq!(board, reference);
    }

    #[test]
    fn capture_restores_victim() {
        let mut board =
            Board::from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
                .unwrap();
        let reference = board.clone();

        board.make_move(Move::new(sq("e4"), sq("d5"), FLAG_CAPTURE));
        assert_eq!(board.piece_kind_at(sq("d5")), Some(PieceKind::Pawn));
        assert_eq!(board.color_at(sq("d5")), Some(Color::White));
        assert_eq!(board.halfmove_clock, 0);
        board.undo_move();

        assert_eq!(board, reference);
    }

    #[test]
    fn en_passant_removes_the_passed_pawn() {
        let mut board =
            Board::from_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3")
                .unwrap();
        let reference = board.clone();

        board.make_move(Move::new(sq("d4"), sq("e3"), crate::moves::types::FLAG_EN_PASSANT));
        assert_eq!(board.piece_at(sq("e4")), None);
        assert_eq!(board.piece_kind_at(sq("e3")), Some(PieceKind::Pawn));
        board.undo_move();

        assert_eq!(board, reference);
    }

    #[test]
    fn castling_moves_the_rook_and_clears_rights() {
        let mut board =
            Board::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let reference = board.clone();

        board.make_move(Move::new(
            sq("e1"),
            sq("g1"),
            crate::moves::types::FLAG_CASTLE_KINGSIDE,
        ));
        assert_eq!(board.piece_kind_at(sq("g1")), Some(PieceKind::King));
        assert_eq!(board.piece_kind_at(sq("f1")), Some(PieceKind::Rook));
        assert!(!board.has_kingside_castle(Color::White));
        assert!(!board.has_queenside_castle(Color::White));
        assert!(board.has_kingside_castle(Color::Black));
        board.undo_move();

        assert_eq!(board, reference);
    }

    #[test]
    fn promotion_swaps_in_the_new_piece() {
        let mut board = Board::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let reference = board.clone();

        board.make_move(Move::promotion(sq("a7"), sq("a8"), PieceKind::Queen, false));
        assert_eq!(board.piece_kind_at(sq("a8")), Some(PieceKind::Queen));
        assert_eq!(board.pieces(PieceKind::Pawn, Color::White), 0);
        board.undo_move();

        assert_eq!(board, reference);
    }

    #[test]
    fn rook_capture_clears_opponent_rights() {
        let mut board =
            Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        board.make_move(Move::new(sq("a1"), sq("a8"), FLAG_CAPTURE));
        assert!(!board.has_queenside_castle(Color::Black));
        assert!(board.has_kingside_castle(Color::Black));
        // White's own queenside right went with the rook leaving a1.
        assert!(!board.has_queenside_castle(Color::White));
    }

    #[test]
    fn null_move_round_trip() {
        let mut board =
            Board::from_fen("rnbqkbnr/pppp1ppp/8/4p3/8/8/PPPPPPPP/RNBQKBNR w KQkq e6 0 2")
                .unwrap();
        let reference = board.clone();

        board.make_null_move();
        assert_eq!(board.side_to_move, Color::Black);
        assert_eq!(board.en_passant, None);
        assert_eq!(board.halfmove_clock, reference.halfmove_clock);
        board.undo_null_move();

        assert_eq!(board, reference);
    }

    #[test]
    fn quiet_moves_advance_the_halfmove_clock() {
        let mut board = Board::from_fen(START_FEN).unwrap();
        board.make_move(Move::new(sq("g1"), sq("f3"), FLAG_QUIET));
        assert_eq!(board.halfmove_clock, 1);
        board.make_move(Move::new(sq("g8"), sq("f6"), FLAG_QUIET));
        assert_eq!(board.halfmove_clock, 2);
        assert_eq!(board.fullmove_number, 2);
    }
}
