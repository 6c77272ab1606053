//! Hash consistency: the rolling zobrist must equal a full recomputation on
//! every reachable position, and transpositions must collide.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use meridian::board::Board;
use meridian::engine::parse_uci_move;

fn play(board: &mut Board, moves: &[&str]) {
    for text in moves {
        let mv = parse_uci_move(board, text).expect("legal move");
        board.make_move(mv);
    }
}

#[test]
fn rolling_hash_matches_recomputation_along_random_games() {
    let mut rng = StdRng::seed_from_u64(0x5EED_CAFE);

    for game in 0..20 {
        let mut board = Board::new();
        for _ in 0..120 {
            let moves = board.legal_moves();
            if moves.is_empty() {
                break;
            }
            let mv = moves[rng.gen_range(0..moves.len())];
            board.make_move(mv);
            assert_eq!(
                board.zobrist,
                board.compute_zobrist_full(),
                "hash drift in game {} after {}",
                game,
                mv
            );
        }
    }
}

#[test]
fn hash_survives_undo() {
    let mut rng = StdRng::seed_from_u64(0xBEEF);
    let mut board = Board::new();
    let mut stack = Vec::new();

    for _ in 0..60 {
        let moves = board.legal_moves();
        if moves.is_empty() {
            break;
        }
        let mv = moves[rng.gen_range(0..moves.len())];
        stack.push(board.zobrist);
        board.make_move(mv);
    }
    while let Some(expected) = stack.pop() {
        board.undo_move();
        assert_eq!(board.zobrist, expected);
    }
}

#[test]
fn transpositions_collide() {
    // Nf3/Nc3 and Nc3/Nf3 reach the same position by different orders.
    let mut a = Board::new();
    play(&mut a, &["g1f3", "g8f6", "b1c3", "b8c6"]);

    let mut b = Board::new();
    play(&mut b, &["b1c3", "b8c6", "g1f3", "g8f6"]);

    assert_eq!(a.zobrist, b.zobrist);
    assert_eq!(a.to_fen(), b.to_fen());
}

#[test]
fn side_to_move_changes_the_hash() {
    let white = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    let black = Board::from_fen("4k3/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
    assert_ne!(white.zobrist, black.zobrist);
}

#[test]
fn castling_rights_change_the_hash() {
    let all = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let none = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w - - 0 1").unwrap();
    let partial = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w Kq - 0 1").unwrap();
    assert_ne!(all.zobrist, none.zobrist);
    assert_ne!(all.zobrist, partial.zobrist);
    assert_ne!(none.zobrist, partial.zobrist);
}

#[test]
fn dead_en_passant_square_does_not_hash() {
    // The ep square exists in both records, but no enemy pawn can use it,
    // so both positions must hash identically with and without it.
    let with_ep =
        Board::from_fen("rnbqkbnr/pppppppp/8/8/7P/8/PPPPPPP1/RNBQKBNR b KQkq h3 0 1").unwrap();
    let without_ep =
        Board::from_fen("rnbqkbnr/pppppppp/8/8/7P/8/PPPPPPP1/RNBQKBNR b KQkq - 0 1").unwrap();
    assert_eq!(with_ep.zobrist, without_ep.zobrist);
}

#[test]
fn live_en_passant_square_hashes() {
    // A black pawn on g4 really can capture on h3.
    let with_ep =
        Board::from_fen("rnbqkbnr/pppppp1p/8/8/6pP/8/PPPPPPP1/RNBQKBNR b KQkq h3 0 2").unwrap();
    let without_ep =
        Board::from_fen("rnbqkbnr/pppppp1p/8/8/6pP/8/PPPPPPP1/RNBQKBNR b KQkq - 0 2").unwrap();
    assert_ne!(with_ep.zobrist, without_ep.zobrist);
}

#[test]
fn null_move_round_trips_the_hash() {
    let mut board =
        Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();
    let before = board.zobrist;

    board.make_null_move();
    assert_ne!(board.zobrist, before);
    assert_eq!(board.zobrist, board.compute_zobrist_full());
    board.undo_null_move();
    assert_eq!(board.zobrist, before);
}
