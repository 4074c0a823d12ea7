//! Allocator hook run before a tunnel starts.

/// Return free heap pages to the OS.
///
/// Uses `malloc_trim(0)` on glibc targets and does nothing elsewhere.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[allow(unsafe_code)]
pub fn release_unused_memory() {
    // SAFETY: malloc_trim only walks allocator-internal free lists and has
    // no preconditions on the caller.
    let released = unsafe { libc::malloc_trim(0) };
    tracing::trace!(released = released != 0, "malloc_trim");
}

/// Return free heap pages to the OS.
///
/// Uses `malloc_trim(0)` on glibc targets and does nothing elsewhere.
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
pub fn release_unused_memory() {}
