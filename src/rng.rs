//! Per-thread destination-network selection.
//!
//! Grounded in `sendPdv`'s `thread_local std::mt19937_64 gen(rd())` (spec
//! §4.3 step 2, §9 "Random destination selection"): a 64-bit Mersenne
//! Twister, seeded once per thread from a non-deterministic source, chosen
//! for speed and a long period rather than cryptographic strength.

use rand::RngCore;
use rand_mt::Mt19937GenRand64;
use std::cell::RefCell;

thread_local! {
    static DEST_RNG: RefCell<Mt19937GenRand64> = RefCell::new(seed_from_os_rng());
}

fn seed_from_os_rng() -> Mt19937GenRand64 {
    let mut seed_bytes = [0_u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut seed_bytes);
    Mt19937GenRand64::new(u64::from_ne_bytes(seed_bytes))
}

/// Draw a destination network index uniformly from `[0, num_dest_nets)`.
/// `num_dest_nets` must be `>= 1`; callers with `num_dest_nets == 1` should
/// skip calling this entirely (spec §4.3 step 2: "else k = 0").
pub fn choose_dest_net(num_dest_nets: u16) -> u16 {
    debug_assert!(num_dest_nets >= 1);
    if num_dest_nets == 1 {
        return 0;
    }
    DEST_RNG.with(|rng| {
        let span = num_dest_nets as u64;
        // Rejection sampling against the nearest multiple of `span` keeps
        // the distribution exactly uniform instead of introducing modulo bias.
        let mut rng = rng.borrow_mut();
        let limit = u64::MAX - (u64::MAX % span);
        loop {
            let v = rng.next_u64();
            if v < limit {
                return (v % span) as u16;
            }
        }
    })
}
