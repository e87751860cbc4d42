//! Process hardening applied before the server accepts requests.
//!
//! The server briefly holds two kinds of sensitive bytes in memory: stored
//! secrets loaded for a reveal, and the caller's session key from the
//! `x-reveal-key` header. On Unix this module keeps both off disk:
//!
//! - [`disable_core_dumps`] sets `RLIMIT_CORE` to 0.
//! - [`lock_memory`] pins pages with `mlockall` so they are never swapped.
//!
//! Both are no-ops elsewhere.

/// A hardening syscall failed.
#[derive(Debug, thiserror::Error)]
#[error("{call} failed: {source}")]
pub struct HardeningError {
    call: &'static str,
    #[source]
    source: std::io::Error,
}

/// Disable core dumps for this process.
///
/// # Errors
///
/// Returns [`HardeningError`] if `setrlimit` fails.
#[cfg(unix)]
pub fn disable_core_dumps() -> Result<(), HardeningError> {
    let rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `setrlimit` only reads the `rlimit` struct passed by
    // reference, which lives for the duration of the call.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &rlim) };
    check(rc, "setrlimit(RLIMIT_CORE, 0)")
}

#[cfg(not(unix))]
pub fn disable_core_dumps() -> Result<(), HardeningError> {
    Ok(())
}

/// Lock all current and future pages into RAM.
///
/// Needs `CAP_IPC_LOCK` or root on Linux. Set `INFRAVAULT_DISABLE_MLOCK=true`
/// to skip it in development.
///
/// # Errors
///
/// Returns [`HardeningError`] if `mlockall` fails.
#[cfg(unix)]
pub fn lock_memory() -> Result<(), HardeningError> {
    // SAFETY: `mlockall` takes only flag bits and touches no Rust-visible
    // memory.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    check(rc, "mlockall(MCL_CURRENT | MCL_FUTURE)")
}

#[cfg(not(unix))]
pub fn lock_memory() -> Result<(), HardeningError> {
    Ok(())
}

#[cfg(unix)]
fn check(rc: libc::c_int, call: &'static str) -> Result<(), HardeningError> {
    if rc == 0 {
        Ok(())
    } else {
        Err(HardeningError {
            call,
            source: std::io::Error::last_os_error(),
        })
    }
}
