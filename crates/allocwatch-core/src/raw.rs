//! Raw allocation primitives and chunk header arithmetic.
//!
//! Every tracked allocation asks the raw allocator for `CHUNK_HEADER + size`
//! bytes and hands the caller the address just past the header:
//!
//! ```text
//! base                 user
//! |<-- CHUNK_HEADER -->|<-- size bytes -->|
//! ```
//!
//! Addresses are plain `usize` values with `0` standing in for null, the same
//! logical-address model the C boundary converts to and from pointers.

use std::collections::HashMap;

/// Width of the hidden prefix in front of every user pointer.
///
/// Sixteen bytes keeps user pointers aligned for any fundamental C type.
pub const CHUNK_HEADER: usize = 16;

/// User-visible address for a raw chunk starting at `base`.
#[must_use]
pub const fn user_address(base: usize) -> usize {
    base + CHUNK_HEADER
}

/// Raw chunk base for a user-visible address.
#[must_use]
pub const fn chunk_base(user: usize) -> usize {
    user - CHUNK_HEADER
}

/// Raw size requested for a user size, `None` on overflow.
#[must_use]
pub const fn chunk_size(size: usize) -> Option<usize> {
    size.checked_add(CHUNK_HEADER)
}

/// The allocator tracked allocations are carved from.
///
/// Implementations only ever receive bases they returned themselves; the
/// tracker guarantees that through its address-keyed registry.
pub trait RawAllocator {
    /// Allocate `size` uninitialized bytes.
    fn allocate(&mut self, size: usize) -> Option<usize>;

    /// Allocate `size` zeroed bytes.
    fn allocate_zeroed(&mut self, size: usize) -> Option<usize>;

    /// Resize the chunk at `base`. On `None` the chunk is left untouched.
    fn resize(&mut self, base: usize, size: usize) -> Option<usize>;

    /// Release the chunk at `base`.
    fn release(&mut self, base: usize);
}

/// In-memory allocator handing out synthetic addresses.
///
/// Used by tests and benchmarks. A byte budget can be set to simulate
/// exhaustion; resizing always moves the chunk so address updates are visible.
#[derive(Debug, Clone)]
pub struct LogicalHeap {
    next_base: usize,
    live: HashMap<usize, usize>,
    in_use: usize,
    budget: Option<usize>,
}

impl LogicalHeap {
    /// First base handed out (above the zero page).
    const START: usize = 0x1000;

    #[must_use]
    pub fn new() -> Self {
        Self {
            next_base: Self::START,
            live: HashMap::new(),
            in_use: 0,
            budget: None,
        }
    }

    /// Heap refusing any request that would push live bytes above `bytes`.
    #[must_use]
    pub fn with_budget(bytes: usize) -> Self {
        Self {
            budget: Some(bytes),
            ..Self::new()
        }
    }

    /// Raw bytes currently live.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Number of live raw chunks.
    #[must_use]
    pub fn live_chunks(&self) -> usize {
        self.live.len()
    }

    /// Size of the live chunk at `base`.
    #[must_use]
    pub fn chunk_len(&self, base: usize) -> Option<usize> {
        self.live.get(&base).copied()
    }

    fn fits(&self, extra: usize) -> bool {
        match self.budget {
            Some(budget) => self
                .in_use
                .checked_add(extra)
                .is_some_and(|total| total <= budget),
            None => true,
        }
    }

    fn carve(&mut self, size: usize) -> Option<usize> {
        let base = self.next_base;
        // Keep bases 16-aligned and distinct even for zero-sized requests.
        let stride = size.max(1).checked_add(15)? & !15;
        self.next_base = self.next_base.checked_add(stride)?;
        self.live.insert(base, size);
        self.in_use += size;
        Some(base)
    }
}

impl Default for LogicalHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl RawAllocator for LogicalHeap {
    fn allocate(&mut self, size: usize) -> Option<usize> {
        if !self.fits(size) {
            return None;
        }
        self.carve(size)
    }

    fn allocate_zeroed(&mut self, size: usize) -> Option<usize> {
        // Synthetic memory has no contents to clear.
        self.allocate(size)
    }

    fn resize(&mut self, base: usize, size: usize) -> Option<usize> {
        let old = self.live.get(&base).copied()?;
        if !self.fits(size.saturating_sub(old)) {
            return None;
        }
        let new_base = self.carve(size)?;
        self.release(base);
        Some(new_base)
    }

    fn release(&mut self, base: usize) {
        if let Some(size) = self.live.remove(&base) {
            self.in_use -= size;
        }
    }
}
