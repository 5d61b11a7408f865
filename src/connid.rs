use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing connection-id allocator (spec.md §3, invariant 5).
///
/// Ids are never recycled for the process lifetime; `Directory` owns one of
/// these and hands out ids to CONNECT sessions.
#[derive(Debug, Default)]
pub struct ConnIdAllocator {
    next: AtomicU64,
}

impl ConnIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns the next id, strictly greater than every id returned before it.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
