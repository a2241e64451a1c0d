//! Short-identifier minting for new files.

use rand::Rng;
use std::collections::HashSet;
use std::sync::Mutex;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const MAX_ATTEMPTS: u32 = 1000;

/// Mints short random identifiers and remembers every one it has
/// handed out, so no two uploads in one process lifetime share a
/// locator. Lengths vary per call to widen the practical keyspace.
///
/// The used-set lives in process memory only: identifiers already on
/// disk from a previous run are invisible to it. At the expected scale
/// (thousands of live files against a keyspace of 52^5 and up) the
/// residual collision odds are accepted rather than engineered away.
#[derive(Debug)]
pub struct IdAllocator {
    used: Mutex<HashSet<String>>,
    min_len: usize,
    max_len: usize,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(5, 12)
    }
}

impl IdAllocator {
    pub fn new(min_len: usize, max_len: usize) -> Self {
        Self {
            used: Mutex::new(HashSet::new()),
            min_len,
            max_len,
        }
    }

    /// Mint a fresh identifier.
    ///
    /// Always returns: after `MAX_ATTEMPTS` collisions against the
    /// used-set, a time-derived 4-digit suffix is appended to force
    /// termination. The suffixed value is not re-checked against the
    /// used-set — a known gap under pathological load.
    pub fn allocate(&self) -> String {
        let mut used = self.used.lock().expect("identifier set mutex poisoned");
        let mut rng = rand::thread_rng();

        let mut attempts = 0;
        let candidate = loop {
            let len = rng.gen_range(self.min_len..=self.max_len);
            let mut candidate = String::with_capacity(len + 4);
            for _ in 0..len {
                candidate.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
            }

            if !used.contains(&candidate) {
                break candidate;
            }

            attempts += 1;
            if attempts > MAX_ATTEMPTS {
                let millis = chrono::Utc::now().timestamp_millis();
                candidate.push_str(&format!("{:04}", millis.rem_euclid(10_000)));
                break candidate;
            }
        };

        used.insert(candidate.clone());
        candidate
    }
}
