//! Instrumented allocation primitives and the exit-time lifecycle.
//!
//! A [`Tracker`] owns the registry, the output sink and the raw allocator.
//! Allocation entry points prepend a [`CHUNK_HEADER`] to every raw request and
//! return the address just past it; frees and resizes recover the raw base by
//! subtracting the header width and find their metadata through the registry.
//!
//! At process exit the host calls [`Tracker::shutdown`], which always runs
//! report, then collect, then terminate: the report must see every history
//! before the collector frees leaked chunks, and both must run before the
//! registry is torn down.

use serde::Serialize;

use crate::chain::ChainBound;
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::event::{CallEvent, Severity};
use crate::raw::{CHUNK_HEADER, RawAllocator, chunk_base, chunk_size, user_address};
use crate::registry::{AllocationInfo, AllocationRegistry, AllocationStats};
use crate::sink::ReportSink;
use crate::trace::{CallKind, SourceSite, Trace};

/// Serializable view of the tracker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackerSnapshot {
    #[serde(flatten)]
    pub stats: AllocationStats,
    pub live_allocations: usize,
    pub live_bytes: usize,
    pub header_width: usize,
}

/// What the terminate step tore down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationSummary {
    pub stats: AllocationStats,
    pub infos_drained: usize,
    pub traces_drained: usize,
    pub write_errors: u64,
}

pub struct Tracker<A: RawAllocator> {
    config: TrackerConfig,
    allocator: A,
    registry: AllocationRegistry,
    sink: ReportSink,
}

impl<A: RawAllocator> Tracker<A> {
    /// Open the configured output and start with an empty registry.
    pub fn initialize(config: TrackerConfig, allocator: A) -> Result<Self, TrackerError> {
        let sink = ReportSink::open(&config.output)?;
        Ok(Self::with_sink(config, allocator, sink))
    }

    /// Start with an already opened sink; the configured output is ignored.
    #[must_use]
    pub fn with_sink(config: TrackerConfig, allocator: A, mut sink: ReportSink) -> Self {
        sink.headline(Severity::Info, "Tracker initialized");
        Self {
            config,
            allocator,
            registry: AllocationRegistry::new(),
            sink,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &AllocationRegistry {
        &self.registry
    }

    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    #[must_use]
    pub fn stats(&self) -> AllocationStats {
        self.registry.stats()
    }

    #[must_use]
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            stats: self.registry.stats(),
            live_allocations: self.registry.live_count(),
            live_bytes: self.registry.live_bytes(),
            header_width: CHUNK_HEADER,
        }
    }

    /// Tracked `malloc`. `None` when the raw allocator is exhausted; nothing
    /// is registered in that case.
    pub fn allocate(&mut self, size: usize, site: SourceSite) -> Option<usize> {
        let result = self.allocate_chunk(size, CallKind::Malloc, site);
        self.emit(CallEvent::Malloc { site, size, result });
        result
    }

    /// Tracked `calloc`. The requested size is `count * size`; an overflowing
    /// product fails like an exhausted allocator.
    pub fn zero_allocate(&mut self, count: usize, size: usize, site: SourceSite) -> Option<usize> {
        let result = count
            .checked_mul(size)
            .and_then(|total| self.allocate_chunk(total, CallKind::Calloc, site));
        self.emit(CallEvent::Calloc {
            site,
            size: count.saturating_mul(size),
            result,
        });
        result
    }

    /// Tracked `realloc`.
    ///
    /// A null `address` allocates. On `Ok(None)` the original allocation is
    /// untouched and still tracked.
    pub fn reallocate(
        &mut self,
        address: usize,
        size: usize,
        site: SourceSite,
    ) -> Result<Option<usize>, TrackerError> {
        if address == 0 {
            let result = self.allocate_chunk(size, CallKind::Realloc, site);
            self.emit(CallEvent::Realloc {
                site,
                size,
                from: 0,
                result,
            });
            return Ok(result);
        }

        let Some(index) = self.registry.lookup(address) else {
            return Err(self.reject(CallKind::Realloc, site, address));
        };

        let allocator = &mut self.allocator;
        let result = chunk_size(size)
            .and_then(|raw| allocator.resize(chunk_base(address), raw))
            .map(user_address);
        if let Some(new_address) = result {
            self.registry
                .record_resize(index, new_address, Trace::new(CallKind::Realloc, site, size));
        }
        self.emit(CallEvent::Realloc {
            site,
            size,
            from: address,
            result,
        });
        Ok(result)
    }

    /// Tracked `free`. Returns the number of bytes freed; null is a no-op.
    pub fn release(&mut self, address: usize, site: SourceSite) -> Result<usize, TrackerError> {
        if address == 0 {
            return Ok(0);
        }
        let Some(index) = self.registry.lookup(address) else {
            return Err(self.reject(CallKind::Free, site, address));
        };
        let size = self.free_chunk(index, address, site);
        self.emit(CallEvent::Free {
            site,
            size,
            address,
        });
        Ok(size)
    }

    /// Record an `exit` call. The caller terminates the process afterwards.
    pub fn log_exit(&mut self, status: i32, site: SourceSite) {
        self.emit(CallEvent::Exit { site, status });
        self.sink.flush();
    }

    /// Record an `abort` call. The caller aborts the process afterwards.
    pub fn log_abort(&mut self, site: SourceSite) {
        self.emit(CallEvent::Abort { site });
        self.sink.flush();
    }

    /// Print every allocation history followed by the aggregate counters.
    pub fn report(&mut self) {
        self.sink.headline(Severity::Info, "Report");
        let mut infos = self.registry.cursor(ChainBound::Begin);
        while let Some(info) = infos.next() {
            self.sink.line(format_args!("{:<8} address {:#x}:", "", info.address));
            let mut traces = info.traces().cursor(ChainBound::Begin);
            while let Some(trace) = traces.next() {
                self.sink.line(format_args!(
                    "{:<16} {:<7} at {:>65}:{:04} | {:2} bytes were in use",
                    "", trace.kind, trace.site.file, trace.site.line, trace.size
                ));
            }
        }
        let stats = self.registry.stats();
        self.sink.line(format_args!(
            "{:<5} {} allocations, {} frees",
            "", stats.allocations, stats.frees
        ));
        self.sink.line(format_args!(
            "{:<5} {} bytes allocated, {} bytes freed (whereof {} bytes collected on exit)",
            "", stats.bytes_allocated, stats.bytes_freed, stats.bytes_collected
        ));
    }

    /// Free every chunk still allocated, reporting each as a leak.
    ///
    /// Returns the bytes collected by this pass.
    pub fn collect(&mut self) -> usize {
        self.sink.headline(Severity::Warn, "Garbage collector");
        let leaked: Vec<(usize, usize, Trace)> = self
            .registry
            .iter()
            .enumerate()
            .filter(|(_, info)| info.allocated)
            .filter_map(|(index, info)| Some((index, info.address, *info.last_trace()?)))
            .collect();

        let mut collected = 0;
        for (index, address, last) in leaked {
            self.sink.line(format_args!("{:<8} address {:#x}:", "", address));
            self.sink.line(format_args!(
                "{:<16} {:<7} at {:>65}:{:04} | {:2} bytes still allocated",
                "", last.kind, last.site.file, last.site.line, last.size
            ));
            let size = self.free_chunk(index, address, SourceSite::COLLECTOR);
            self.registry.record_collected(size);
            collected += size;
        }
        self.sink.line(format_args!(
            "{:<5} {} bytes collected",
            "",
            self.registry.stats().bytes_collected
        ));
        collected
    }

    /// Drain the registry and every trace log, then close the output.
    pub fn terminate(self) -> TerminationSummary {
        let snapshot = self.snapshot();
        let Self {
            config,
            mut registry,
            mut sink,
            ..
        } = self;

        let mut infos_drained = 0;
        let mut traces_drained = 0;
        while let Some(mut info) = registry.pop() {
            traces_drained += info.drain_traces();
            infos_drained += 1;
        }
        registry.delete();

        sink.headline(Severity::Info, "Tracker terminated");
        if config.json_summary {
            sink.json(&snapshot);
        }
        let write_errors = sink.close();

        TerminationSummary {
            stats: snapshot.stats,
            infos_drained,
            traces_drained,
            write_errors,
        }
    }

    /// Run the configured exit steps: report, collect, terminate.
    pub fn shutdown(mut self) -> TerminationSummary {
        if self.config.report {
            self.report();
        }
        if self.config.collect {
            self.collect();
        }
        self.terminate()
    }

    fn allocate_chunk(&mut self, size: usize, kind: CallKind, site: SourceSite) -> Option<usize> {
        let raw = chunk_size(size)?;
        let base = if kind == CallKind::Calloc {
            self.allocator.allocate_zeroed(raw)?
        } else {
            self.allocator.allocate(raw)?
        };
        let address = user_address(base);
        self.registry
            .register(AllocationInfo::new(address, Trace::new(kind, site, size)));
        Some(address)
    }

    /// Record the free, then hand the raw chunk back. No per-call logging.
    fn free_chunk(&mut self, index: usize, address: usize, site: SourceSite) -> usize {
        let size = self
            .registry
            .record_free(index, Trace::new(CallKind::Free, site, 0));
        self.allocator.release(chunk_base(address));
        size
    }

    fn reject(&mut self, kind: CallKind, site: SourceSite, address: usize) -> TrackerError {
        if self.config.validate {
            self.sink.event(&CallEvent::Rejected {
                kind,
                site,
                address,
            });
        }
        TrackerError::UnknownAddress { address }
    }

    fn emit(&mut self, event: CallEvent) {
        if self.config.verbose {
            self.sink.event(&event);
        }
    }
}
