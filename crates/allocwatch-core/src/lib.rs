//! # allocwatch-core
//!
//! Allocation-tracking bookkeeping behind the allocwatch debugging allocator.
//!
//! Every allocation made through a [`Tracker`] gets an [`AllocationInfo`] in the
//! [`AllocationRegistry`] holding its current address, whether it is still
//! allocated, and a [`TraceLog`] of every operation performed on it (kind, call
//! site, size). At process exit the tracker prints each history and the
//! aggregate byte counters, frees whatever is still allocated, and tears the
//! bookkeeping down.
//!
//! # Architecture
//!
//! ```text
//! C caller -> allocwatch-abi entry -> Tracker -> RawAllocator (libc)
//!                                        |
//!                                        +-> AllocationRegistry -> Chain<AllocationInfo>
//!                                                                     +-> Chain<Trace>
//! ```
//!
//! This crate contains no unsafe code; addresses are plain `usize` values and
//! the C boundary owns all pointer conversions.

pub mod chain;
pub mod config;
pub mod error;
pub mod event;
pub mod raw;
pub mod registry;
pub mod sink;
pub mod trace;
pub mod tracker;

pub use chain::{Chain, ChainBound, ChainCursor};
pub use config::{OutputTarget, TrackerConfig};
pub use error::TrackerError;
pub use event::{CallEvent, Severity};
pub use raw::{CHUNK_HEADER, LogicalHeap, RawAllocator};
pub use registry::{AllocationInfo, AllocationRegistry, AllocationStats};
pub use sink::ReportSink;
pub use trace::{CallKind, SourceSite, Trace, TraceLog};
pub use tracker::{TerminationSummary, Tracker, TrackerSnapshot};
