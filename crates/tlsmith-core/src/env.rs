//! Environment abstraction for time and randomness.
//!
//! Preparators read the clock (hello timestamps) and draw random bytes
//! (hello randoms). Routing both through [`Environment`] lets the harness
//! substitute a fixed clock and a seeded RNG so that reset-and-replay
//! produces identical bytes.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

/// Source of time and randomness.
pub trait Environment: Send {
    /// Seconds since the Unix epoch, truncated to 32 bits.
    fn unix_time(&self) -> u32;

    /// Fill `dest` with random bytes.
    fn fill_random(&mut self, dest: &mut [u8]);
}

/// Production environment: system clock and thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn unix_time(&self) -> u32 {
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs() as u32)
    }

    fn fill_random(&mut self, dest: &mut [u8]) {
        rand::thread_rng().fill_bytes(dest);
    }
}
