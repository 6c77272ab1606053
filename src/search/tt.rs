//! Shared transposition table: buckets of four entries, open addressing by
//! hash modulus. Each slot is a (key ^ data, data) atomic pair, so a racing
//! reader either sees a consistent entry or fails the key comparison; no
//! locking, and torn writes are rejected rather than observed.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EngineError;
use crate::moves::types::Move;

pub const BUCKET_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    Exact = 0,
    Lower = 1,
    Upper = 2,
}

impl Bound {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Bound::Exact,
            1 => Bound::Lower,
            _ => Bound::Upper,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TtEntry {
    /// Best move suggestion; the null move when none is known.
    pub best_move: Move,
    pub score: i16,
    /// Search depth in plies.
    pub depth: u8,
    pub bound: Bound,
    /// Root ply at which the entry was written.
    pub age: u16,
}

impl TtEntry {
    fn pack(&self) -> u64 {
        (self.best_move.raw() as u64)
            | ((self.score as u16 as u64) << 16)
            | ((self.depth as u64) << 32)
            | ((self.bound as u64) << 40)
            | ((self.age as u64) << 48)
    }

    fn unpack(data: u64) -> Self {
        TtEntry {
            best_move: Move::from_raw(data as u16),
            score: (data >> 16) as u16 as i16,
            depth: (data >> 32) as u8,
            bound: Bound::from_u8((data >> 40) as u8),
            age: (data >> 48) as u16,
        }
    }
}

struct Slot {
    key: AtomicU64,
    data: AtomicU64,
}

pub struct TranspositionTable {
    slots: Vec<Slot>,
    bucket_count: usize,
}

impl TranspositionTable {
    /// Allocate with the requested size in megabytes. The allocation happens
    /// once; `clear` never reallocates.
    pub fn new(size_mb: usize) -> Result<Self, EngineError> {
        let slot_bytes = std::mem::size_of::<Slot>();
        let total_slots = size_mb * 1024 * 1024 / slot_bytes;
        let bucket_count = total_slots / BUCKET_SIZE;
        if bucket_count == 0 {
            return Err(EngineError::AllocationFailed(size_mb));
        }

        let mut slots = Vec::new();
        if slots.try_reserve_exact(bucket_count * BUCKET_SIZE).is_err() {
            return Err(EngineError::AllocationFailed(size_mb));
        }
        slots.resize_with(bucket_count * BUCKET_SIZE, || Slot {
            key: AtomicU64::new(0),
            data: AtomicU64::new(0),
        });

        Ok(TranspositionTable {
            slots,
            bucket_count,
        })
    }

    pub fn clear(&self) {
        for slot in &self.slots {
            slot.key.store(0, Ordering::Relaxed);
            slot.data.store(0, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    fn bucket_range(&self, hash: u64) -> std::ops::Range<usize> {
        let bucket = (hash % self.bucket_count as u64) as usize;
        bucket * BUCKET_SIZE..(bucket + 1) * BUCKET_SIZE
    }

    pub fn probe(&self, hash: u64) -> Option<TtEntry> {
        for slot in &self.slots[self.bucket_range(hash)] {
            let data = slot.data.load(Ordering::Relaxed);
            let key = slot.key.load(Ordering::Relaxed);
            if key ^ data == hash && data != 0 {
                return Some(TtEntry::unpack(data));
            }
        }
        None
    }

    pub fn put(&self, hash: u64, entry: TtEntry) {
        let range = self.bucket_range(hash);
        let data = entry.pack();

        // Same position: overwrite in place.
        for slot in &self.slots[range.clone()] {
            let old_data = slot.data.load(Ordering::Relaxed);
            let old_key = slot.key.load(Ordering::Relaxed);
            if old_data != 0 && old_key ^ old_data == hash {
                slot.data.store(data, Ordering::Relaxed);
                slot.key.store(hash ^ data, Ordering::Relaxed);
                return;
            }
        }

        // Otherwise pick a victim: an empty slot first, then the entry from
        // the oldest age, shallowest depth. An exact entry written this age
        // is never displaced by a shallower bound-only entry.
        let mut victim: Option<usize> = None;
        let mut victim_entry: Option<TtEntry> = None;

        for idx in range {
            let old_data = self.slots[idx].data.load(Ordering::Relaxed);
            if old_data == 0 {
                victim = Some(idx);
                victim_entry = None;
                break;
            }
            let old = TtEntry::unpack(old_data);
            match victim_entry {
                None => {
                    victim = Some(idx);
                    victim_entry = Some(old);
                }
                Some(best) => {
                    let older = old.age < best.age
                        || (old.age == best.age && old.depth < best.depth);
                    if older {
                        victim = Some(idx);
                        victim_entry = Some(old);
                    }
                }
            }
        }

        if let (Some(idx), Some(old)) = (victim, victim_entry) {
            let protected = old.bound == Bound::Exact
                && old.age == entry.age
                && entry.bound != Bound::Exact
                && entry.depth < old.depth;
            if protected {
                return;
            }
        }

        if let Some(idx) = victim {
            self.slots[idx].data.store(data, Ordering::Relaxed);
            self.slots[idx].key.store(hash ^ data, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::types::FLAG_QUIET;
    use crate::square::Square;

    fn entry(score: i16, depth: u8, bound: Bound, age: u16) -> TtEntry {
        TtEntry {
            best_move: Move::new(
                Square::from_index(12),
                Square::from_index(28),
                FLAG_QUIET,
            ),
            score,
            depth,
            bound,
            age,
        }
    }

    #[test]
    fn round_trips_an_entry() {
        let tt = TranspositionTable::new(1).unwrap();
        let e = entry(123, 7, Bound::Exact, 42);
        tt.put(0xDEAD_BEEF, e);

        let found = tt.probe(0xDEAD_BEEF).unwrap();
        assert_eq!(found.score, 123);
        assert_eq!(found.depth, 7);
        assert_eq!(found.bound, Bound::Exact);
        assert_eq!(found.age, 42);
        assert_eq!(found.best_move, e.best_move);
    }

    #[test]
    fn probe_misses_on_unknown_hash() {
        let tt = TranspositionTable::new(1).unwrap();
        tt.put(1, entry(0, 1, Bound::Lower, 0));
        assert!(tt.probe(2).is_none());
    }

    #[test]
    fn same_hash_overwrites_in_place() {
        let tt = TranspositionTable::new(1).unwrap();
        tt.put(99, entry(10, 3, Bound::Upper, 1));
        tt.put(99, entry(20, 5, Bound::Exact, 1));
        let found = tt.probe(99).unwrap();
        assert_eq!(found.score, 20);
        assert_eq!(found.depth, 5);
    }

    #[test]
    fn negative_scores_survive_packing() {
        let tt = TranspositionTable::new(1).unwrap();
        tt.put(7, entry(-20999, 3, Bound::Lower, 9));
        assert_eq!(tt.probe(7).unwrap().score, -20999);
    }

    #[test]
    fn old_age_is_evicted_first() {
        let tt = TranspositionTable::new(1).unwrap();
        let bucket_count = tt.bucket_count as u64;

        // Fill one bucket with four same-bucket hashes of age 1, then add a
        // fifth of age 2: the shallowest age-1 entry goes.
        let hashes: Vec<u64> = (0..5).map(|i| 3 + i * bucket_count).collect();
        for (i, &h) in hashes[..4].iter().enumerate() {
            tt.put(h, entry(0, (i + 3) as u8, Bound::Lower, 1));
        }
        tt.put(hashes[4], entry(0, 1, Bound::Lower, 2));

        assert!(tt.probe(hashes[4]).is_some());
        // The depth-3 entry was the shallowest of the old generation.
        assert!(tt.probe(hashes[0]).is_none());
        for &h in &hashes[1..4] {
            assert!(tt.probe(h).is_some(), "evicted the wrong entry");
        }
    }

    #[test]
    fn fresh_exact_entry_resists_shallow_cut_replacement() {
        let tt = TranspositionTable::new(1).unwrap();
        let bucket_count = tt.bucket_count as u64;
        let hashes: Vec<u64> = (0..5).map(|i| 5 + i * bucket_count).collect();

        // Bucket full of current-age entries; the weakest is an Exact entry.
        tt.put(hashes[0], entry(0, 4, Bound::Exact, 3));
        for &h in &hashes[1..4] {
            tt.put(h, entry(0, 9, Bound::Lower, 3));
        }
        // A shallower same-age cut entry must not displace the PV entry.
        tt.put(hashes[4], entry(0, 2, Bound::Lower, 3));
        assert!(tt.probe(hashes[0]).is_some());
        assert!(tt.probe(hashes[4]).is_none());
    }

    #[test]
    fn clear_empties_without_reallocating(){
        let tt = TranspositionTable::new(1).unwrap();
        tt.put(11, entry(5, 2, Bound::Exact, 0));
        tt.clear();
        assert!(tt.probe(11).is_none());
    }

    #[test]
    fn zero_megabytes_fails() {
        assert!(matches!(
            TranspositionTable::new(0),
            Err(EngineError::AllocationFailed(0))
        ));
    }
}
