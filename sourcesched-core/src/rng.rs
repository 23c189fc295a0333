//! Deterministic random streams
//!
//! Nothing in the generation path uses a platform RNG. Every stream is derived
//! from the master seed: first per thread, then per source inside a thread.
//! A stream therefore depends only on `(master seed, thread index, source
//! index)` and never on the order in which threads get scheduled.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// Random stream type owned by source instances and thread managers
pub type Stream = Pcg64Mcg;

/// Stream slot reserved for the thread manager's own draws (activity-weighted
/// source selection). Source slots are `source_index + 1`.
const MANAGER_SLOT: u64 = 0;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Mix a parent seed with a stable child index
pub fn derive_seed(parent: u64, index: u64) -> u64 {
    splitmix64(parent ^ splitmix64(index))
}

/// Seed of the thread manager with the given index
pub fn thread_seed(master_seed: u64, thread_index: usize) -> u64 {
    derive_seed(master_seed, thread_index as u64)
}

/// Stream of one source inside a thread
pub fn source_stream(thread_seed: u64, source_index: usize) -> Stream {
    Stream::seed_from_u64(derive_seed(thread_seed, source_index as u64 + 1))
}

/// Stream used by the thread manager itself
pub fn manager_stream(thread_seed: u64) -> Stream {
    Stream::seed_from_u64(derive_seed(thread_seed, MANAGER_SLOT))
}
