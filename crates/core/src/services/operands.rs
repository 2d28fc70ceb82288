//! Synthetic install-name style paths used as operation arguments.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Prefixes dyld understands, relative and absolute.
pub const PATH_PREFIXES: [&str; 6] = [
    "@rpath",
    "@executable_path",
    "@loader_path",
    "/usr/lib",
    "/usr/local/lib",
    "/opt/homebrew/lib",
];

pub const SEGMENT_LEN: usize = 8;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates fresh library paths from an explicitly owned random source.
pub struct PathGenerator<R: Rng = StdRng> {
    rng: R,
}

impl PathGenerator<StdRng> {
    /// Deterministic generator for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> PathGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// `<prefix>/<1..=3 segments>/lib<8 chars>.dylib`
    pub fn new_path(&mut self) -> String {
        let prefix = PATH_PREFIXES.choose(&mut self.rng).copied().unwrap_or("@rpath");
        let depth = self.rng.gen_range(1..=3);
        let segments: Vec<String> = (0..depth).map(|_| self.segment()).collect();
        let name = self.segment();
        format!("{prefix}/{}/lib{name}.dylib", segments.join("/"))
    }

    /// One lowercase-alphanumeric path component of `SEGMENT_LEN` characters.
    pub fn segment(&mut self) -> String {
        (0..SEGMENT_LEN).map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())] as char).collect()
    }
}
