//! Best-effort OS thread priority: the real-time context should run
//! above database and network priority, which should in turn run above
//! background work.
//!
//! Raising scheduling priority on a general-purpose OS requires
//! privileges this process may not have; every call here is advisory and
//! logs rather than fails when the platform refuses it.

use tracing::warn;

/// Niceness delta applied to the real-time thread. Negative values raise
/// priority; the valid range is roughly -20 (highest) to 19 (lowest).
const REAL_TIME_NICE_DELTA: i32 = -10;

/// Lowers this thread's niceness so the scheduler favors it over the
/// database/network contexts. Call once, from inside the real-time
/// thread itself, before entering its loop.
pub fn raise_current_thread_priority() {
    // SAFETY: `getpriority`/`setpriority` operate on the calling thread's
    // own priority when `which` is `PRIO_PROCESS` and `who` is 0; no
    // pointers are passed. `getpriority` can legitimately return -1 as a
    // priority value, but treating that rare case as "unknown baseline 0"
    // only costs a few steps of niceness, not correctness.
    let current = unsafe { libc::getpriority(libc::PRIO_PROCESS, 0) };
    let target = (current + REAL_TIME_NICE_DELTA).clamp(-20, 19);
    let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, target) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        warn!(error = %err, "failed to raise real-time thread priority; continuing at default priority");
    }
}
