pub mod attacks;
pub mod search;
pub mod structs;

use once_cell::sync::Lazy;
use rand::{rngs::StdRng, SeedableRng};
use tracing::debug;

pub use structs::{MagicEntry, MagicTables, SliderTables};

use attacks::{
    bishop_attacks_slow, bishop_relevant_mask, rook_attacks_slow, rook_relevant_mask, subsets_of,
};
use search::find_magic_for_square;

// Fixed seed: table construction is deterministic across runs.
const MAGIC_SEARCH_SEED: u64 = 0xD6E8_FEB8_6659_FD93;

fn build_slider_tables(rook: bool, rng: &mut StdRng) -> SliderTables {
    let mut entries = Vec::with_capacity(64);

    for square in 0..64usize {
        let mask = if rook {
            rook_relevant_mask(square)
        } else {
            bishop_relevant_mask(square)
        };
        let shift = 64 - mask.count_ones();

        let blockers = subsets_of(mask);
        let attack_sets: Vec<u64> = blockers
            .iter()
            .map(|&b| {
                if rook {
                    rook_attacks_slow(square, b)
                } else {
                    bishop_attacks_slow(square, b)
                }
            })
            .collect();

        let (magic, table) = find_magic_for_square(&blockers, &attack_sets, shift, rng);
        entries.push(MagicEntry {
            magic,
            shift,
            mask,
            table,
        });
    }

    SliderTables { entries }
}

/// Global slider tables, built on first use.
pub fn magic_tables() -> &'static MagicTables {
    static TABLES: Lazy<MagicTables> = Lazy::new(|| {
        let mut rng = StdRng::seed_from_u64(MAGIC_SEARCH_SEED);
        let rook = build_slider_tables(true, &mut rng);
        let bishop = build_slider_tables(false, &mut rng);
        debug!("magic slider tables constructed");
        MagicTables { rook, bishop }
    });
    &TABLES
}

#[inline(always)]
pub fn rook_attacks(sq: u8, occupancy: u64) -> u64 {
    magic_tables().rook_attacks(sq as usize, occupancy)
}

#[inline(always)]
pub fn bishop_attacks(sq: u8, occupancy: u64) -> u64 {
    magic_tables().bishop_attacks(sq as usize, occupancy)
}

#[inline(always)]
pub fn queen_attacks(sq: u8, occupancy: u64) -> u64 {
    magic_tables().queen_attacks(sq as usize, occupancy)
}

/// Rook attacks through the first blocker in each direction: remove the
/// blockers a normal query sees and look again. Used for pin detection.
#[inline]
pub fn xray_rook_attacks(sq: u8, blockers: u64, occupancy: u64) -> u64 {
    let direct = rook_attacks(sq, occupancy);
    let hits = blockers & direct;
    if hits == 0 {
        return 0;
    }
    direct ^ rook_attacks(sq, occupancy ^ hits)
}

#[inline]
pub fn xray_bishop_attacks(sq: u8, blockers: u64, occupancy: u64) -> u64 {
    let direct = bishop_attacks(sq, occupancy);
    let hits = blockers & direct;
    if hits == 0 {
        return 0;
    }
    direct ^ bishop_attacks(sq, occupancy ^ hits)
}
