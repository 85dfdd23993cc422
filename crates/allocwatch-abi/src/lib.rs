// Every extern "C" export takes raw pointers from C callers; the contract is
// the one documented in include/allocwatch.h.
#![allow(clippy::missing_safety_doc)]
//! # allocwatch-abi
//!
//! C boundary for the allocwatch debugging allocator.
//!
//! This crate produces a `cdylib` exposing `allocwatch_*` symbols. C sources
//! include `allocwatch.h`, which routes `malloc`, `calloc`, `realloc`, `free`,
//! `exit` and `abort` to those symbols together with `__FILE__` and
//! `__LINE__`.
//!
//! # Architecture
//!
//! ```text
//! C caller -> tracked entry (this crate) -> global Tracker -> libc allocator
//!                                               |
//!                                               +-> report / collect / terminate at exit
//! ```
//!
//! The pass-through entries skip tracking entirely and abort on allocation
//! failure.

mod system;
mod tracker_state;
mod util;

pub mod passthrough_abi;
pub mod tracked_abi;

pub use system::SystemAllocator;
pub use tracked_abi::AllocwatchStats;
