//! Allocation registry.
//!
//! Holds one [`AllocationInfo`] for every allocation ever made, in creation
//! order, plus the aggregate byte and call counters. Infos stay registered
//! after their chunk is freed so the exit report can show full histories.
//!
//! Live user addresses are indexed by an address-keyed map, so recovering the
//! info for a pointer never reads memory in front of it.

use std::collections::HashMap;

use serde::Serialize;

use crate::chain::{Chain, ChainBound, ChainCursor};
use crate::trace::{Trace, TraceLog};

/// Metadata for one tracked allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationInfo {
    traces: TraceLog,
    /// Current user-visible address; changes across reallocation.
    pub address: usize,
    /// True until the allocation is freed.
    pub allocated: bool,
}

impl AllocationInfo {
    /// Info for a fresh allocation whose history starts with `first`.
    #[must_use]
    pub fn new(address: usize, first: Trace) -> Self {
        let mut traces = TraceLog::new();
        traces.push(first);
        Self {
            traces,
            address,
            allocated: true,
        }
    }

    #[must_use]
    pub fn traces(&self) -> &TraceLog {
        &self.traces
    }

    /// Most recent operation. Every info holds at least one trace.
    #[must_use]
    pub fn last_trace(&self) -> Option<&Trace> {
        self.traces.back()
    }

    /// Size recorded by the most recent operation.
    #[must_use]
    pub fn current_size(&self) -> usize {
        self.last_trace().map_or(0, |trace| trace.size)
    }

    pub fn record(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    /// Drain and destroy the trace log, returning how many traces it held.
    pub fn drain_traces(&mut self) -> usize {
        let mut drained = 0;
        while self.traces.pop().is_some() {
            drained += 1;
        }
        drained
    }
}

/// Aggregate counters. All fields only ever grow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocationStats {
    pub allocations: usize,
    pub frees: usize,
    pub bytes_allocated: usize,
    pub bytes_freed: usize,
    /// Portion of `bytes_freed` released by the exit-time collector.
    pub bytes_collected: usize,
}

impl AllocationStats {
    /// Bytes allocated and not yet freed.
    #[must_use]
    pub fn bytes_in_use(&self) -> usize {
        self.bytes_allocated.saturating_sub(self.bytes_freed)
    }
}

/// Registry of every allocation made through the tracker.
#[derive(Debug, Default)]
pub struct AllocationRegistry {
    infos: Chain<AllocationInfo>,
    /// Live user address -> position in `infos`.
    live: HashMap<usize, usize>,
    stats: AllocationStats,
}

impl AllocationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new allocation and count it. Returns its position.
    pub fn register(&mut self, info: AllocationInfo) -> usize {
        let index = self.infos.len();
        self.stats.allocations += 1;
        self.stats.bytes_allocated += info.current_size();
        self.live.insert(info.address, index);
        self.infos.push(info);
        index
    }

    /// Position of the live allocation at `address`.
    #[must_use]
    pub fn lookup(&self, address: usize) -> Option<usize> {
        self.live.get(&address).copied()
    }

    #[must_use]
    pub fn info(&self, index: usize) -> Option<&AllocationInfo> {
        self.infos.get(index)
    }

    /// Info of the live allocation at `address`.
    #[must_use]
    pub fn live_info(&self, address: usize) -> Option<&AllocationInfo> {
        self.lookup(address).and_then(|index| self.infos.get(index))
    }

    /// Record a successful resize of the allocation at `index`.
    ///
    /// Counts the previous size as freed and `resized.size` as allocated.
    /// Returns the previous size.
    pub fn record_resize(&mut self, index: usize, new_address: usize, resized: Trace) -> usize {
        let Some(info) = self.infos.get_mut(index) else {
            return 0;
        };
        let previous = info.current_size();
        self.live.remove(&info.address);
        info.address = new_address;
        info.allocated = true;
        info.record(resized);
        self.live.insert(new_address, index);
        self.stats.bytes_allocated += resized.size;
        self.stats.bytes_freed += previous;
        previous
    }

    /// Record the release of the allocation at `index`.
    ///
    /// Returns the size that was freed, taken from the last trace before the
    /// free record is appended.
    pub fn record_free(&mut self, index: usize, freed: Trace) -> usize {
        let Some(info) = self.infos.get_mut(index) else {
            return 0;
        };
        let size = info.current_size();
        info.record(freed);
        info.allocated = false;
        self.live.remove(&info.address);
        self.stats.frees += 1;
        self.stats.bytes_freed += size;
        size
    }

    /// Attribute `bytes` of the frees to the exit-time collector.
    pub fn record_collected(&mut self, bytes: usize) {
        self.stats.bytes_collected += bytes;
    }

    #[must_use]
    pub fn stats(&self) -> AllocationStats {
        self.stats
    }

    /// Number of infos ever registered and not yet drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Number of allocations not yet freed.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Sum of the current sizes of all live allocations.
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.infos
            .iter()
            .filter(|info| info.allocated)
            .map(AllocationInfo::current_size)
            .sum()
    }

    /// Infos in creation order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &AllocationInfo> {
        self.infos.iter()
    }

    /// Cursor over the infos in creation order.
    #[must_use]
    pub fn cursor(&self, bound: ChainBound) -> ChainCursor<'_, AllocationInfo> {
        self.infos.cursor(bound)
    }

    /// Pop the oldest info. Once draining starts, address lookups are void.
    pub fn pop(&mut self) -> Option<AllocationInfo> {
        self.live.clear();
        self.infos.pop()
    }

    /// Destroy the registry structure after it has been drained.
    pub fn delete(self) {
        self.infos.delete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{CallKind, SourceSite};

    const SITE: SourceSite = SourceSite::new("registry.c", 1);

    fn alloc_trace(size: usize) -> Trace {
        Trace::new(CallKind::Malloc, SITE, size)
    }

    #[test]
    fn register_counts_allocation() {
        let mut registry = AllocationRegistry::new();
        let index = registry.register(AllocationInfo::new(0x1010, alloc_trace(40)));
        assert_eq!(index, 0);
        assert_eq!(registry.lookup(0x1010), Some(0));
        let stats = registry.stats();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.bytes_allocated, 40);
        assert_eq!(registry.live_bytes(), 40);
    }

    #[test]
    fn resize_rebinds_address() {
        let mut registry = AllocationRegistry::new();
        let index = registry.register(AllocationInfo::new(0x1010, alloc_trace(40)));
        let previous =
            registry.record_resize(index, 0x2010, Trace::new(CallKind::Realloc, SITE, 90));
        assert_eq!(previous, 40);
        assert_eq!(registry.lookup(0x1010), None);
        assert_eq!(registry.lookup(0x2010), Some(index));
        let stats = registry.stats();
        assert_eq!(stats.bytes_allocated, 130);
        assert_eq!(stats.bytes_freed, 40);
        assert_eq!(registry.info(index).unwrap().traces().len(), 2);
    }

    #[test]
    fn free_keeps_info_but_drops_live_entry() {
        let mut registry = AllocationRegistry::new();
        let index = registry.register(AllocationInfo::new(0x1010, alloc_trace(40)));
        let freed = registry.record_free(index, Trace::new(CallKind::Free, SITE, 0));
        assert_eq!(freed, 40);
        assert_eq!(registry.lookup(0x1010), None);
        assert_eq!(registry.len(), 1);
        let info = registry.info(index).unwrap();
        assert!(!info.allocated);
        assert_eq!(info.current_size(), 0);
        assert_eq!(registry.stats().frees, 1);
        assert_eq!(registry.stats().bytes_in_use(), 0);
    }

    #[test]
    fn reused_address_maps_to_newest_info() {
        let mut registry = AllocationRegistry::new();
        let first = registry.register(AllocationInfo::new(0x1010, alloc_trace(8)));
        registry.record_free(first, Trace::new(CallKind::Free, SITE, 0));
        let second = registry.register(AllocationInfo::new(0x1010, alloc_trace(16)));
        assert_ne!(first, second);
        assert_eq!(registry.lookup(0x1010), Some(second));
    }

    #[test]
    fn drain_pops_in_creation_order() {
        let mut registry = AllocationRegistry::new();
        registry.register(AllocationInfo::new(0x10, alloc_trace(1)));
        registry.register(AllocationInfo::new(0x20, alloc_trace(2)));
        let mut addresses = Vec::new();
        while let Some(mut info) = registry.pop() {
            assert_eq!(info.drain_traces(), 1);
            addresses.push(info.address);
        }
        assert_eq!(addresses, vec![0x10, 0x20]);
        assert!(registry.is_empty());
        registry.delete();
    }
}
