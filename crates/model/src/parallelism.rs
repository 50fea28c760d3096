//! Compute thread configuration, resolved once before the model loads.

use std::num::NonZeroUsize;

/// Thread count assumed when the hardware concurrency cannot be detected.
const FALLBACK_THREADS: usize = 4;

/// Thread counts handed to the pipeline at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parallelism {
    /// Threads used inside a single operation.
    pub threads: usize,
    /// Threads used to run independent operations side by side.
    pub interop_threads: usize,
}

impl Parallelism {
    /// Resolve the configured thread count. `0` means "all cores".
    pub fn resolve(configured: usize) -> Self {
        let threads = if configured > 0 {
            configured
        } else {
            detect_threads()
        };
        Self {
            threads,
            interop_threads: (threads / 2).max(1),
        }
    }
}

fn detect_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(FALLBACK_THREADS)
}
