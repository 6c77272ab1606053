//! Generator properties over curated and randomized positions: every legal
//! move leaves its own king safe, double check restricts play to the king,
//! and the en-passant discovery trap is refused.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use meridian::board::Board;

fn uci_list(board: &Board) -> Vec<String> {
    board.legal_moves().iter().map(|m| m.to_uci()).collect()
}

#[test]
fn every_generated_move_leaves_the_king_safe() {
    let mut rng = StdRng::seed_from_u64(0x7E57);
    let mut board = Board::new();

    for _ in 0..60 {
        let moves = board.legal_moves();
        if moves.is_empty() {
            break;
        }

        let mover = board.side_to_move;
        for &mv in moves.iter() {
            board.make_move(mv);
            let king = board.king_square(mover);
            assert!(
                !board.square_attacked_by(king, mover.opposite(), board.occupied()),
                "{} leaves the king attacked in {}",
                mv,
                board.to_fen()
            );
            board.undo_move();
        }

        let mv = moves[rng.gen_range(0..moves.len())];
        board.make_move(mv);
    }
}

#[test]
fn en_passant_discovery_on_the_rank_is_refused() {
    let board = Board::from_fen("8/8/8/KPp4r/8/8/8/6k1 w - c6 0 1").unwrap();
    let moves = uci_list(&board);
    assert!(
        !moves.contains(&"b5c6".to_string()),
        "generated the illegal discovery capture; moves: {:?}",
        moves
    );
}

#[test]
fn double_check_forces_the_king_to_move() {
    // Knight d3 and rook e8 both check the e1 king; the h1 rook and the
    // castling right are useless.
    let board = Board::from_fen("4r2k/8/8/8/8/3n4/8/4K2R w K - 0 1").unwrap();
    let moves = board.legal_moves();
    assert!(!moves.is_empty());
    for mv in moves.iter() {
        assert_eq!(mv.origin().to_string(), "e1", "{} played in double check", mv);
    }
}

#[test]
fn check_evasions_all_resolve_the_check() {
    // Queen h4 checks along h4-e1; g3 can block, the king can sidestep.
    let board =
        Board::from_fen("rnb1kbnr/pppp1ppp/4p3/8/5P1q/7P/PPPPP1P1/RNBQKBNR w KQkq - 1 3")
            .unwrap();
    assert!(board.is_check());

    let moves = uci_list(&board);
    assert!(moves.contains(&"g2g3".to_string()));
    assert!(!moves.contains(&"e1f2".to_string()));

    let mover = board.side_to_move;
    for mv in board.legal_moves().iter().copied() {
        let mut probe = board.clone();
        probe.make_move(mv);
        let king = probe.king_square(mover);
        assert!(
            !probe.square_attacked_by(king, mover.opposite(), probe.occupied()),
            "{} does not resolve the check",
            mv
        );
    }
}

#[test]
fn stalemate_position_has_no_moves() {
    let board = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
    assert!(board.legal_moves().is_empty());
    assert!(!board.is_check());
}

#[test]
fn checkmate_position_has_no_moves() {
    let board = Board::from_fen(
        "r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4",
    )
    .unwrap();
    assert!(board.legal_moves().is_empty());
    assert!(board.is_check());
}

#[test]
fn capturing_a_rook_removes_that_castle() {
    // Bxa8 takes the queenside rook: Black may still castle short, no
    // longer long.
    let mut board =
        Board::from_fen("r3k2r/8/8/8/8/8/6B1/R3K2R w KQkq - 0 1").unwrap();
    let mv = board
        .legal_moves()
        .iter()
        .copied()
        .find(|m| m.to_uci() == "g2a8")
        .expect("bishop takes a8");
    board.make_move(mv);

    let black_moves = uci_list(&board);
    assert!(black_moves.contains(&"e8g8".to_string()));
    assert!(!black_moves.contains(&"e8c8".to_string()));
}

#[test]
fn promotion_capture_expands_all_pieces() {
    let board = Board::from_fen("r3k3/1P6/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    let moves = uci_list(&board);
    for suffix in ["q", "r", "b", "n"] {
        assert!(moves.contains(&format!("b7a8{}", suffix)), "missing b7a8{}", suffix);
        assert!(moves.contains(&format!("b7b8{}", suffix)), "missing b7b8{}", suffix);
    }
    // c8 is empty and holds nothing to capture.
    assert!(!moves.iter().any(|m| m.starts_with("b7c8")));
}
