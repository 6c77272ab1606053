use once_cell::sync::OnceCell;
use rand::{rngs::StdRng, RngCore, SeedableRng};

use crate::bitboard::{FILE_A, FILE_H};
use crate::board::castle_bits::*;
use crate::board::{Board, Color, PieceKind};

#[cfg(feature = "deterministic_zobrist")]
const ZOBRIST_SEED: u64 = 0x9E37_79B9_AAAC_5C87;

fn make_zobrist_rng() -> StdRng {
    #[cfg(feature = "deterministic_zobrist")]
    {
        StdRng::seed_from_u64(ZOBRIST_SEED)
    }
    #[cfg(not(feature = "deterministic_zobrist"))]
    {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        StdRng::from_seed(seed)
    }
}

pub struct ZobristKeys {
    /// [color][kind][square] with White=0, Black=1 and P..K = 0..5.
    pub piece: [[[u64; 64]; 6]; 2],
    pub side_to_move: u64,
    /// Bit order K, Q, k, q.
    pub castling: [u64; 4],
    /// Files a..h.
    pub ep_file: [u64; 8],
}

/// Global keys, initialized on first use.
pub fn zobrist_keys() -> &'static ZobristKeys {
    static KEYS: OnceCell<ZobristKeys> = OnceCell::new();
    KEYS.get_or_init(|| generate_keys(make_zobrist_rng()))
}

fn generate_keys(mut rng: StdRng) -> ZobristKeys {
    // Zero keys would make distinct states collide trivially.
    fn non_zero(r: &mut StdRng) -> u64 {
        let mut v = r.next_u64();
        while v == 0 {
            v = r.next_u64();
        }
        v
    }

    let mut keys = ZobristKeys {
        piece: [[[0u64; 64]; 6]; 2],
        side_to_move: 0,
        castling: [0u64; 4],
        ep_file: [0u64; 8],
    };

    for color in &mut keys.piece {
        for kind in color.iter_mut() {
            for key in kind.iter_mut() {
                *key = non_zero(&mut rng);
            }
        }
    }
    for key in &mut keys.castling {
        *key = non_zero(&mut rng);
    }
    for key in &mut keys.ep_file {
        *key = non_zero(&mut rng);
    }
    keys.side_to_move = non_zero(&mut rng);

    keys
}

/// XOR the castling keys whose bits differ between `old` and `new`.
#[inline]
pub fn xor_castling_rights_delta(hash: &mut u64, keys: &ZobristKeys, old: u8, new: u8) {
    let d = old ^ new;
    if d & CASTLE_WK != 0 {
        *hash ^= keys.castling[0];
    }
    if d & CASTLE_WQ != 0 {
        *hash ^= keys.castling[1];
    }
    if d & CASTLE_BK != 0 {
        *hash ^= keys.castling[2];
    }
    if d & CASTLE_BQ != 0 {
        *hash ^= keys.castling[3];
    }
}

/// File (0..7) of the en-passant target if it contributes to the hash this
/// ply. The target only counts when the side to move has a pawn that could
/// pseudo-legally capture onto it; otherwise transpositions that differ only
/// in a dead ep square would hash apart.
pub fn ep_file_to_hash(board: &Board) -> Option<u8> {
    let ep = board.en_passant?;
    let s = ep.index();

    let r = s / 8;
    if r != 2 && r != 5 {
        return None;
    }

    let bb_s: u64 = 1u64 << s;

    let has_capturing_pawn = match board.side_to_move {
        Color::White => {
            let src_east = (bb_s >> 7) & !FILE_A;
            let src_west = (bb_s >> 9) & !FILE_H;
            ((src_east | src_west) & board.pieces(PieceKind::Pawn, Color::White)) != 0
        }
        Color::Black => {
            let src_east = (bb_s << 9) & !FILE_A;
            let src_west = (bb_s << 7) & !FILE_H;
            ((src_east | src_west) & board.pieces(PieceKind::Pawn, Color::Black)) != 0
        }
    };

    if has_capturing_pawn {
        Some(s % 8)
    } else {
        None
    }
}
