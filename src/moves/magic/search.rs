//! Magic-number search. Candidates are sparse random multipliers; a candidate
//! is accepted only if it hashes every blocker subset to a slot holding the
//! right attack set, so a found table is correct by construction.

use rand::RngCore;

/// AND-ing three random words keeps the candidate sparse, which empirically
/// needs far fewer attempts.
#[inline(always)]
pub fn random_sparse_u64<R: RngCore>(rng: &mut R) -> u64 {
    rng.next_u64() & rng.next_u64() & rng.next_u64()
}

/// Try to fill the table for one square with the given magic. Returns the
/// filled table on success; a collision between differing attack sets
/// rejects the candidate.
pub fn try_fill_table(
    blockers: &[u64],
    attacks: &[u64],
    magic: u64,
    shift: u32,
) -> Option<Box<[u64]>> {
    let size = 1usize << (64 - shift);
    let mut table = vec![0u64; size];
    let mut used = vec![false; size];

    for (&blocker, &attack) in blockers.iter().zip(attacks) {
        let index = (blocker.wrapping_mul(magic) >> shift) as usize;
        if used[index] {
            if table[index] != attack {
                return None;
            }
        } else {
            used[index] = true;
            table[index] = attack;
        }
    }

    Some(table.into_boxed_slice())
}

pub fn find_magic_for_square<R: RngCore>(
    blockers: &[u64],
    attacks: &[u64],
    shift: u32,
    rng: &mut R,
) -> (u64, Box<[u64]>) {
    for _ in 0..100_000_000u64 {
        let magic = random_sparse_u64(rng);
        if let Some(table) = try_fill_table(blockers, attacks, magic, shift) {
            return (magic, table);
        }
    }
    // With the standard mask sizes a magic turns up within a few thousand
    // attempts; running dry means the inputs are malformed.
    unreachable!("magic search exhausted its attempt budget");
}
