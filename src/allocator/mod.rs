// src/allocator/mod.rs

pub mod base62;

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out compact codes from a process-wide counter.
///
/// The counter starts at 1 and only moves forward, so every code returned by
/// [`CodeAllocator::allocate`] is distinct for the lifetime of the allocator.
#[derive(Debug)]
pub struct CodeAllocator {
    next: AtomicU64,
}

impl CodeAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn allocate(&self) -> String {
        // fetch_add is a single read-modify-write, so concurrent callers never see the same value
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        base62::encode(id)
    }

    /// Counter value the next call to `allocate` will encode
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for CodeAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn codes_decode_to_consecutive_integers_from_one() {
        let allocator = CodeAllocator::new();

        for expected in 1..=500u64 {
            let code = allocator.allocate();
            assert_eq!(base62::decode(&code), Some(expected));
        }
        assert_eq!(allocator.peek_next(), 501);
    }

    #[test]
    fn concurrent_allocation_is_unique() {
        let allocator = Arc::new(CodeAllocator::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                std::thread::spawn(move || (0..1_000).map(|_| allocator.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in threads {
            for code in handle.join().unwrap() {
                assert!(seen.insert(code.clone()), "duplicate code {}", code);
            }
        }

        assert_eq!(seen.len(), 8_000);
        let mut ids: Vec<u64> = seen.iter().filter_map(|code| base62::decode(code)).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=8_000).collect::<Vec<_>>());
    }
}
