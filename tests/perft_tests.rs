use meridian::board::Board;
use meridian::moves::perft::{perft, perft_divide, perft_with_breakdown};

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const KIWIPETE_FEN: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn run_perft(fen: &str, depth: u32, expected: u64) {
    let mut board = Board::from_fen(fen).expect("valid FEN");
    let nodes = perft(&mut board, depth);
    assert_eq!(
        nodes, expected,
        "perft mismatch at depth {} for {}: got {}, expected {}",
        depth, fen, nodes, expected
    );
}

#[test]
fn perft_startpos_d1() {
    run_perft(START_FEN, 1, 20);
}

#[test]
fn perft_startpos_d2() {
    run_perft(START_FEN, 2, 400);
}

#[test]
fn perft_startpos_d3() {
    run_perft(START_FEN, 3, 8_902);
}

#[test]
fn perft_startpos_d4() {
    run_perft(START_FEN, 4, 197_281);
}

#[test]
#[ignore = "slow; run with --ignored"]
fn perft_startpos_d5() {
    run_perft(START_FEN, 5, 4_865_609);
}

#[test]
#[ignore = "slow; run with --ignored"]
fn perft_startpos_d6() {
    run_perft(START_FEN, 6, 119_060_324);
}

#[test]
fn perft_kiwipete_d1() {
    run_perft(KIWIPETE_FEN, 1, 48);
}

#[test]
fn perft_kiwipete_d2() {
    run_perft(KIWIPETE_FEN, 2, 2_039);
}

#[test]
fn perft_kiwipete_d3() {
    run_perft(KIWIPETE_FEN, 3, 97_862);
}

#[test]
#[ignore = "slow; run with --ignored"]
fn perft_kiwipete_d4() {
    run_perft(KIWIPETE_FEN, 4, 4_085_603);
}

// Standard tricky positions: en passant discoveries, promotion storms,
// castling through attacks.

#[test]
fn perft_position_3() {
    // Fine's position: heavy en passant and pin interaction.
    run_perft("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", 1, 14);
    run_perft("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", 2, 191);
    run_perft("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", 3, 2_812);
    run_perft("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1", 4, 43_238);
}

#[test]
fn perft_position_4() {
    // Promotion-heavy middlegame.
    let fen = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    run_perft(fen, 1, 6);
    run_perft(fen, 2, 264);
    run_perft(fen, 3, 9_467);
}

#[test]
fn perft_position_5() {
    let fen = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
    run_perft(fen, 1, 44);
    run_perft(fen, 2, 1_486);
    run_perft(fen, 3, 62_379);
}

#[test]
fn perft_position_6() {
    let fen = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";
    run_perft(fen, 1, 46);
    run_perft(fen, 2, 2_079);
    run_perft(fen, 3, 89_890);
}

#[test]
fn divide_matches_total_on_kiwipete() {
    let mut board = Board::from_fen(KIWIPETE_FEN).unwrap();
    let divide = perft_divide(&mut board, 2);
    assert_eq!(divide.len(), 48);
    let total: u64 = divide.iter().map(|(_, n)| n).sum();
    assert_eq!(total, 2_039);
}

#[test]
fn kiwipete_breakdown_counts() {
    // Known depth-1 breakdown: 8 captures, 0 ep, 2 castles, 0 promotions.
    let mut board = Board::from_fen(KIWIPETE_FEN).unwrap();
    let counters = perft_with_breakdown(&mut board, 1);
    assert_eq!(counters.nodes, 48);
    assert_eq!(counters.captures, 8);
    assert_eq!(counters.ep_captures, 0);
    assert_eq!(counters.castles, 2);
    assert_eq!(counters.promotions, 0);
}

#[test]
fn board_is_unchanged_after_perft() {
    let mut board = Board::from_fen(KIWIPETE_FEN).unwrap();
    let before = board.clone();
    perft(&mut board, 3);
    assert_eq!(board, before);
}
