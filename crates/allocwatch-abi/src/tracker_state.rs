//! Global tracker for the C boundary.
//!
//! The tracker is created on the first instrumented call: configuration is
//! read from the environment, the output stream is opened and one `atexit`
//! hook is registered. That hook runs report, collect and terminate in that
//! order, so no reliance on the reverse order of several hooks is needed.
//!
//! Every access goes through a single `parking_lot` mutex. Calls arriving
//! after termination (from exit handlers registered before ours, which run
//! after it) are served untracked.

use std::collections::HashSet;

use allocwatch_core::{TerminationSummary, Tracker, TrackerConfig};
use parking_lot::Mutex;

use crate::system::SystemAllocator;

enum Slot {
    Uninit,
    Live(Tracker<SystemAllocator>),
    /// Terminated. Holds the addresses the collector released and libc has
    /// not handed out again; late frees of them are ignored.
    Finished(HashSet<usize>),
}

static TRACKER: Mutex<Slot> = parking_lot::const_mutex(Slot::Uninit);

/// Run `f` against the live tracker, initializing it on first use.
///
/// Once the tracker has terminated `f` receives `Err` with the set of
/// addresses the collector released.
pub(crate) fn with_tracker<R>(
    f: impl FnOnce(Result<&mut Tracker<SystemAllocator>, &mut HashSet<usize>>) -> R,
) -> R {
    let mut slot = TRACKER.lock();
    if matches!(*slot, Slot::Uninit) {
        *slot = Slot::Live(start_tracker());
    }
    match &mut *slot {
        Slot::Live(tracker) => f(Ok(tracker)),
        Slot::Finished(collected) => f(Err(collected)),
        Slot::Uninit => unreachable!("tracker slot initialized above"),
    }
}

fn start_tracker() -> Tracker<SystemAllocator> {
    let config = TrackerConfig::from_env();
    let tracker = match Tracker::initialize(config, SystemAllocator) {
        Ok(tracker) => tracker,
        Err(err) => {
            // No observability channel is available; nothing to fall back to.
            eprintln!("allocwatch: {err}");
            std::process::abort();
        }
    };
    // SAFETY: registers a plain `extern "C" fn()` with the host libc.
    if unsafe { libc::atexit(shutdown_hook) } != 0 {
        eprintln!("allocwatch: cannot register exit hook, no report will be written");
    }
    tracker
}

extern "C" fn shutdown_hook() {
    shutdown();
}

/// Shut the tracker down now. Returns `None` if it never started or has
/// already terminated.
pub(crate) fn shutdown() -> Option<TerminationSummary> {
    let mut slot = TRACKER.lock();
    match std::mem::replace(&mut *slot, Slot::Finished(HashSet::new())) {
        Slot::Live(tracker) => {
            let collected = if tracker.config().collect {
                tracker
                    .registry()
                    .iter()
                    .filter(|info| info.allocated)
                    .map(|info| info.address)
                    .collect()
            } else {
                HashSet::new()
            };
            let summary = tracker.shutdown();
            *slot = Slot::Finished(collected);
            Some(summary)
        }
        Slot::Finished(collected) => {
            *slot = Slot::Finished(collected);
            None
        }
        Slot::Uninit => None,
    }
}
