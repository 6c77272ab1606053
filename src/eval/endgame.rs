//! Endgame-specific rescoring: mop-up of a bare king, the knight-and-bishop
//! mate corner drive, and the rule of the square for unstoppable passers.

use crate::bitboard::BitboardExt;
use crate::board::{Board, Color, PieceKind};
use crate::eval::masks;
use crate::square::Square;
use crate::utils::BitIter;

pub const UNSTOPPABLE_PAWN_BONUS: i32 = 1000;

#[inline(always)]
pub fn chebyshev(a: Square, b: Square) -> i32 {
    let dr = (a.rank() as i32 - b.rank() as i32).abs();
    let df = (a.file() as i32 - b.file() as i32).abs();
    dr.max(df)
}

#[inline(always)]
pub fn manhattan(a: Square, b: Square) -> i32 {
    let dr = (a.rank() as i32 - b.rank() as i32).abs();
    let df = (a.file() as i32 - b.file() as i32).abs();
    dr + df
}

/// Distance of a square from the board center, doubled to stay integral.
#[inline(always)]
fn center_distance_x2(sq: Square) -> i32 {
    (2 * sq.rank() as i32 - 7).abs() + (2 * sq.file() as i32 - 7).abs()
}

#[inline]
pub fn is_bare_king(board: &Board, color: Color) -> bool {
    board.occupancy(color) == board.pieces(PieceKind::King, color)
}

/// KX-vs-K drive: push the bare king toward the edge and bring the strong
/// king along. Score from the strong side's view.
pub fn mop_up(board: &Board, strong: Color) -> i32 {
    let strong_king = board.king_square(strong);
    let weak_king = board.king_square(strong.opposite());

    let edge_drive = center_distance_x2(weak_king);
    let king_pull = 14 - manhattan(strong_king, weak_king);

    10 * edge_drive + 4 * king_pull
}

/// True iff `strong` has exactly king, one knight and one bishop and the
/// opponent has a bare king.
pub fn is_knb_vs_k(board: &Board, strong: Color) -> bool {
    if !is_bare_king(board, strong.opposite()) {
        return false;
    }
    board.pieces(PieceKind::Knight, strong).popcount() == 1
        && board.pieces(PieceKind::Bishop, strong).popcount() == 1
        && board.pieces(PieceKind::Pawn, strong) == 0
        && board.pieces(PieceKind::Rook, strong) == 0
        && board.pieces(PieceKind::Queen, strong) == 0
}

/// KNB-vs-K: mate only works in a corner of the bishop's color, so reward
/// shrinking the weak king's distance to the nearest such corner.
pub fn knb_corner_drive(board: &Board, strong: Color) -> i32 {
    let bishop = board.pieces(PieceKind::Bishop, strong);
    let on_light = bishop & masks::LIGHT_SQUARES != 0;
    let corners: [Square; 2] = if on_light {
        [Square::from_index(56), Square::from_index(7)] // a8, h1
    } else {
        [Square::from_index(0), Square::from_index(63)] // a1, h8
    };

    let weak_king = board.king_square(strong.opposite());
    let strong_king = board.king_square(strong);

    let corner_dist = corners
        .iter()
        .map(|&c| chebyshev(weak_king, c))
        .min()
        .unwrap_or(7);

    let king_pull = 14 - manhattan(strong_king, weak_king);

    50 * (7 - corner_dist) + 10 * king_pull
}

/// Rule of the square: a passer the defending king can no longer reach.
/// Only trustworthy when the defender has nothing but king and pawns.
pub fn unstoppable_passers(
    board: &Board,
    side: Color,
    passers: u64,
    side_moves_next: bool,
) -> i32 {
    if board.has_non_pawn_material(side.opposite()) {
        return 0;
    }

    let enemy_king = board.king_square(side.opposite());
    let mut bonus = 0;

    for sq in BitIter(passers) {
        let square = Square::from_index(sq);
        let (promo_rank, steps) = match side {
            Color::White => (7u8, 7 - square.rank()),
            Color::Black => (0u8, square.rank()),
        };
        let mut pawn_steps = steps as i32;
        // The first move may cover two ranks.
        if (side == Color::White && square.rank() == 1)
            || (side == Color::Black && square.rank() == 6)
        {
            pawn_steps -= 1;
        }

        let promo_sq = Square::from_file_rank(square.file(), promo_rank);
        let king_steps = chebyshev(enemy_king, promo_sq) - i32::from(!side_moves_next);

        if pawn_steps < king_steps {
            bonus += UNSTOPPABLE_PAWN_BONUS;
        }
    }

    bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mop_up_prefers_cornered_defender() {
        // Same attacker setup, defender on a8 vs defender on e5.
        let cornered =
            Board::from_fen("k7/8/1Q6/8/3K4/8/8/8 b - - 0 1").unwrap();
        let centered =
            Board::from_fen("8/8/1Q6/4k3/8/3K4/8/8 b - - 0 1").unwrap();
        assert!(mop_up(&cornered, Color::White) > mop_up(&centered, Color::White));
    }

    #[test]
    fn knb_recognition() {
        let board = Board::from_fen("8/8/8/8/8/8/8/KBN4k w - - 0 1").unwrap();
        assert!(is_knb_vs_k(&board, Color::White));
        assert!(!is_knb_vs_k(&board, Color::Black));

        let with_pawn = Board::from_fen("8/P7/8/8/8/8/8/KBN4k w - - 0 1").unwrap();
        assert!(!is_knb_vs_k(&with_pawn, Color::White));
    }

    #[test]
    fn knb_drive_rewards_the_right_corner() {
        // Dark-squared bishop on c1: a1/h8 are the mating corners. The
        // defender on h8 scores far higher for the attacker than one on the
        // wrong-colored a8 corner.
        let right_corner =
            Board::from_fen("7k/8/8/8/8/8/8/K1B3N1 w - - 0 1").unwrap();
        let wrong_corner =
            Board::from_fen("k7/8/8/8/8/8/8/K1B3N1 w - - 0 1").unwrap();
        assert!(
            knb_corner_drive(&right_corner, Color::White)
                > knb_corner_drive(&wrong_corner, Color::White)
        );
    }

    #[test]
    fn runaway_pawn_is_unstoppable() {
        // White pawn a6, black king h8 hopelessly far.
        let board = Board::from_fen("7k/8/P7/8/8/8/8/K7 w - - 0 1").unwrap();
        let passers = board.pieces(PieceKind::Pawn, Color::White);
        assert_eq!(
            unstoppable_passers(&board, Color::White, passers, true),
            UNSTOPPABLE_PAWN_BONUS
        );
    }

    #[test]
    fn close_king_catches_the_pawn() {
        // Black king c7 is inside the square of the a6 pawn.
        let board = Board::from_fen("8/2k5/P7/8/8/8/8/K7 w - - 0 1").unwrap();
        let passers = board.pieces(PieceKind::Pawn, Color::White);
        assert_eq!(unstoppable_passers(&board, Color::White, passers, false), 0);
    }
}
