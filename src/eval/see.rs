//! Static exchange evaluation: play out every capture on the destination
//! square in least-valuable-attacker order and back-propagate with the
//! stand-away option, so neither side is forced into a losing recapture.

use crate::bitboard::BitboardExt;
use crate::board::{Board, Color, PieceKind};
use crate::moves::types::Move;
use crate::square::Square;

const MAX_EXCHANGE_DEPTH: usize = 32;

/// Least valuable attacker of `side` among `attackers`; 64 when none.
fn lva_square(board: &Board, attackers: u64, side: Color) -> (u8, PieceKind) {
    let side_attackers = attackers & board.occupancy(side);
    if side_attackers != 0 {
        for kind in [
            PieceKind::Pawn,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
            PieceKind::King,
        ] {
            let subset = side_attackers & board.pieces(kind, side);
            if subset != 0 {
                return (subset.lsb(), kind);
            }
        }
    }
    (64, PieceKind::Pawn)
}

/// Net material in centipawns for the side playing `mv`, assuming both sides
/// capture with their least valuable attacker and may stop at any point.
pub fn see_score(board: &Board, mv: Move) -> i16 {
    let to = mv.destination();
    let from = mv.origin();
    let us = board.side_to_move;

    let first_victim_value = if mv.is_en_passant() {
        PieceKind::Pawn.value()
    } else {
        match board.piece_kind_at(to) {
            Some(kind) => kind.value(),
            // Quiet promotions enter the exchange with no victim.
            None => 0,
        }
    };

    let mut gain = [0i32; MAX_EXCHANGE_DEPTH];
    let mut d = 0usize;
    gain[0] = first_victim_value;

    // The piece now standing on the target; a promotion swaps in the new
    // piece both as occupant and as material delta.
    let mut occupant = match mv.promotion_kind() {
        Some(promo) => {
            gain[0] += promo.value() - PieceKind::Pawn.value();
            promo
        }
        None => match board.piece_kind_at(from) {
            Some(kind) => kind,
            None => return 0,
        },
    };

    let mut occupancy = board.occupied() & !from.bb();
    if mv.is_en_passant() {
        let cap_sq = match us {
            Color::White => Square::from_index(to.index() - 8),
            Color::Black => Square::from_index(to.index() + 8),
        };
        occupancy &= !cap_sq.bb();
    }

    let mut attackers = board.attackers_to(to, occupancy);
    let mut side = us.opposite();

    loop {
        let (attacker_sq, attacker_kind) = lva_square(board, attackers, side);
        if attacker_sq == 64 || d + 1 >= MAX_EXCHANGE_DEPTH {
            break;
        }

        d += 1;
        gain[d] = occupant.value() - gain[d - 1];

        attackers &= !(1u64 << attacker_sq);
        occupancy &= !(1u64 << attacker_sq);

        // A leaving pawn, bishop, rook or queen can uncover an x-ray
        // attacker behind it.
        if matches!(
            attacker_kind,
            PieceKind::Pawn | PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen
        ) {
            attackers = board.attackers_to(to, occupancy);
        }

        occupant = attacker_kind;
        side = side.opposite();
    }

    // Back-propagate: at each level the side to move takes the better of
    // standing away (0 relative) or continuing the exchange.
    while d > 0 {
        gain[d - 1] = -std::cmp::max(-gain[d - 1], gain[d]);
        d -= 1;
    }

    gain[0].clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::types::{Move, FLAG_CAPTURE};
    use std::str::FromStr;

    fn sq(name: &str) -> Square {
        Square::from_str(name).unwrap()
    }

    fn capture(from: &str, to: &str) -> Move {
        Move::new(sq(from), sq(to), FLAG_CAPTURE)
    }

    #[test]
    fn free_pawn_is_worth_a_pawn() {
        let board =
            Board::from_fen("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(see_score(&board, capture("e4", "d5")), 100);
    }

    #[test]
    fn defended_pawn_costs_the_capturing_knight() {
        // Nxd5 wins a pawn but loses the knight to exd5... actually the
        // recapturing pawn stands on c6.
        let board =
            Board::from_fen("4k3/8/2p5/3p4/8/4N3/8/4K3 w - - 0 1").unwrap();
        let score = see_score(&board, capture("e3", "d5"));
        assert_eq!(score, 100 - 320);
    }

    #[test]
    fn queen_takes_defended_pawn_is_losing() {
        let board =
            Board::from_fen("4k3/8/2p5/3p4/8/8/3Q4/4K3 w - - 0 1").unwrap();
        let score = see_score(&board, capture("d2", "d5"));
        assert!(score < 0, "expected losing SEE, got {}", score);
    }

    #[test]
    fn rook_exchange_on_open_file_is_even() {
        let board =
            Board::from_fen("3rk3/8/8/8/8/8/8/3RK3 w - - 0 1").unwrap();
        assert_eq!(see_score(&board, capture("d1", "d8")), 0);
    }

    #[test]
    fn defended_pawn_on_file_costs_the_rook() {
        // Rxd5 wins a pawn, the d8 rook recaptures and nothing follows up:
        // net 100 - 500.
        let board =
            Board::from_fen("3rk3/8/8/3p4/8/8/8/3RK3 w - - 0 1").unwrap();
        assert_eq!(see_score(&board, capture("d1", "d5")), -400);
    }

    #[test]
    fn en_passant_counts_the_passed_pawn() {
        let board =
            Board::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let mv = Move::new(sq("e5"), sq("d6"), crate::moves::types::FLAG_EN_PASSANT);
        assert_eq!(see_score(&board, mv), 100);
    }

    #[test]
    fn quiet_promotion_gains_the_queen_upgrade() {
        let board = Board::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mv = Move::promotion(sq("a7"), sq("a8"), PieceKind::Queen, false);
        assert_eq!(see_score(&board, mv), 900 - 100);
    }

    #[test]
    fn guarded_promotion_square_is_losing() {
        // Black rook on a8's file guard: promoting loses the new queen.
        let board = Board::from_fen("r3k3/1P6/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mv = Move::promotion(sq("b7"), sq("b8"), PieceKind::Queen, false);
        assert!(see_score(&board, mv) < 0);
    }
}
