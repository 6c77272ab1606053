//! Pawn-structure and king-safety masks, computed once from first
//! principles rather than transcribed, and shared read-only afterwards.

use once_cell::sync::Lazy;

use crate::board::Color;
use crate::utils::square_index;

pub const LIGHT_SQUARES: u64 = 0x55AA_55AA_55AA_55AA;
pub const DARK_SQUARES: u64 = 0xAA55_AA55_AA55_AA55;
pub const CENTER: u64 = 0x0000_0018_1800_0000;
pub const EXTENDED_CENTER: u64 = 0x0000_3C3C_3C3C_0000;

pub static FILE_MASKS: Lazy<[u64; 8]> = Lazy::new(|| {
    let mut masks = [0u64; 8];
    for (file, mask) in masks.iter_mut().enumerate() {
        *mask = 0x0101_0101_0101_0101 << file;
    }
    masks
});

/// Files adjacent to each file (the file itself excluded).
pub static NEIGHBOR_FILES: Lazy<[u64; 8]> = Lazy::new(|| {
    let mut masks = [0u64; 8];
    for (file, mask) in masks.iter_mut().enumerate() {
        if file > 0 {
            *mask |= FILE_MASKS[file - 1];
        }
        if file < 7 {
            *mask |= FILE_MASKS[file + 1];
        }
    }
    masks
});

struct PawnMasks {
    /// Squares strictly ahead on the same file.
    front_span: [[u64; 64]; 2],
    /// Front span of the file and both neighbor files: any enemy pawn here
    /// can stop the pawn from promoting.
    sentry: [[u64; 64]; 2],
    /// Same-rank east/west neighbors.
    connected: [u64; 64],
    /// The two squares an own pawn defends this square from.
    chain: [[u64; 64]; 2],
    /// Shelter squares one and two ranks in front of a king.
    shield: [[u64; 64]; 2],
    /// 3-file-wide attack zone around a king, stretched one rank toward
    /// the opponent.
    king_zone: [[u64; 64]; 2],
}

static PAWN_MASKS: Lazy<PawnMasks> = Lazy::new(|| {
    let mut m = PawnMasks {
        front_span: [[0; 64]; 2],
        sentry: [[0; 64]; 2],
        connected: [0; 64],
        chain: [[0; 64]; 2],
        shield: [[0; 64]; 2],
        king_zone: [[0; 64]; 2],
    };

    for sq in 0..64usize {
        let rank = (sq / 8) as isize;
        let file = (sq % 8) as isize;

        for (ci, dir) in [(0usize, 1isize), (1, -1)] {
            let mut r = rank + dir;
            while (0..8).contains(&r) {
                m.front_span[ci][sq] |= 1u64 << square_index(r as usize, file as usize);
                for df in [-1isize, 1] {
                    let f = file + df;
                    if (0..8).contains(&f) {
                        m.sentry[ci][sq] |= 1u64 << square_index(r as usize, f as usize);
                    }
                }
                r += dir;
            }
            m.sentry[ci][sq] |= m.front_span[ci][sq];

            for df in [-1isize, 1] {
                let f = file + df;
                let r = rank - dir;
                if (0..8).contains(&f) && (0..8).contains(&r) {
                    m.chain[ci][sq] |= 1u64 << square_index(r as usize, f as usize);
                }
            }

            for dr in [1isize, 2] {
                let r = rank + dir * dr;
                if !(0..8).contains(&r) {
                    continue;
                }
                for df in -1isize..=1 {
                    let f = file + df;
                    if (0..8).contains(&f) {
                        m.shield[ci][sq] |= 1u64 << square_index(r as usize, f as usize);
                    }
                }
            }

            for dr in -1isize..=2 {
                let r = rank + dir * dr;
                if !(0..8).contains(&r) {
                    continue;
                }
                for df in -1isize..=1 {
                    let f = file + df;
                    if (0..8).contains(&f) && !(dr == 0 && df == 0) {
                        m.king_zone[ci][sq] |= 1u64 << square_index(r as usize, f as usize);
                    }
                }
            }
        }

        for df in [-1isize, 1] {
            let f = file + df;
            if (0..8).contains(&f) {
                m.connected[sq] |= 1u64 << square_index(rank as usize, f as usize);
            }
        }
    }

    m
});

#[inline(always)]
pub fn front_span(color: Color, sq: u8) -> u64 {
    PAWN_MASKS.front_span[color as usize][sq as usize]
}

#[inline(always)]
pub fn sentry_mask(color: Color, sq: u8) -> u64 {
    PAWN_MASKS.sentry[color as usize][sq as usize]
}

#[inline(always)]
pub fn connected_mask(sq: u8) -> u64 {
    PAWN_MASKS.connected[sq as usize]
}

#[inline(always)]
pub fn chain_mask(color: Color, sq: u8) -> u64 {
    PAWN_MASKS.chain[color as usize][sq as usize]
}

#[inline(always)]
pub fn shield_mask(color: Color, king_sq: u8) -> u64 {
    PAWN_MASKS.shield[color as usize][king_sq as usize]
}

#[inline(always)]
pub fn king_zone(color: Color, king_sq: u8) -> u64 {
    PAWN_MASKS.king_zone[color as usize][king_sq as usize]
}

#[inline(always)]
pub fn file_mask(file: u8) -> u64 {
    FILE_MASKS[file as usize]
}

#[inline(always)]
pub fn neighbor_files(file: u8) -> u64 {
    NEIGHBOR_FILES[file as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_span_runs_to_the_edge() {
        // White pawn on e2: e3..e8.
        assert_eq!(front_span(Color::White, 12), 0x1010_1010_1010_0000);
        // Black pawn on e7: e6..e1.
        assert_eq!(front_span(Color::Black, 52), 0x0000_1010_1010_1010);
    }

    #[test]
    fn sentry_covers_three_files_ahead() {
        // White pawn on b5 is stopped by enemy pawns on a/b/c files ranks 6+.
        let mask = sentry_mask(Color::White, 33);
        assert_eq!(mask & 0xFFu64, 0); // nothing on rank 1
        assert!(mask & (1u64 << 40) != 0); // a6
        assert!(mask & (1u64 << 41) != 0); // b6
        assert!(mask & (1u64 << 42) != 0); // c6
        assert!(mask & (1u64 << 43) == 0); // d6 out of reach
    }

    #[test]
    fn chain_points_backwards() {
        // White pawn on d4 is defended from c3 and e3.
        let mask = chain_mask(Color::White, 27);
        assert_eq!(mask, (1u64 << 18) | (1u64 << 20));
    }

    #[test]
    fn shield_sits_in_front_of_the_king() {
        // White king on g1: f2,g2,h2,f3,g3,h3.
        let mask = shield_mask(Color::White, 6);
        assert_eq!(mask.count_ones(), 6);
        assert!(mask & (1u64 << 14) != 0); // g2
        assert!(mask & (1u64 << 22) != 0); // g3
    }

    #[test]
    fn king_zone_stretches_toward_the_enemy() {
        let zone = king_zone(Color::White, 6); // g1
        assert!(zone & (1u64 << 22) != 0); // g3, two ranks up
        assert!(zone & (1u64 << 5) != 0); // f1
        assert!(zone & (1u64 << 6) == 0); // not the king square itself
    }
}
