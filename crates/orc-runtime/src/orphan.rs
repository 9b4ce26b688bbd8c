//! Parent-process liveness check used for orphan detection (section 4.2).
//!
//! Every `orphan_check_every_polls` polls the worker checks that its recorded
//! parent is still alive. Reading `/proc/self/stat` avoids any `unsafe` FFI:
//! the kernel reparents an orphan to pid 1 (or the nearest subreaper), so a
//! parent pid that moved since startup means the original parent is gone.

/// The parent pid recorded at worker startup, used as the orphan baseline.
pub(crate) fn recorded_parent_pid() -> Option<i32> {
    current_parent_pid()
}

/// True once the process's current parent differs from the one recorded at
/// startup (the kernel always reparents orphans, so this is equivalent to
/// "the original parent has exited").
pub(crate) fn is_orphaned(recorded: Option<i32>) -> bool {
    match (recorded, current_parent_pid()) {
        (Some(recorded), Some(current)) => recorded != current,
        // Platforms without /proc (non-Linux) cannot observe this; never
        // report an orphan rather than exiting workers spuriously.
        _ => false,
    }
}

#[cfg(target_os = "linux")]
fn current_parent_pid() -> Option<i32> {
    let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
    // Fields after the process name (in parens, which may itself contain
    // spaces/parens) are space separated; ppid is the 4th field overall.
    let after_comm = stat.rsplit_once(')')?.1;
    let ppid_str = after_comm.split_whitespace().nth(1)?;
    ppid_str.parse().ok()
}

#[cfg(not(target_os = "linux"))]
fn current_parent_pid() -> Option<i32> {
    None
}
