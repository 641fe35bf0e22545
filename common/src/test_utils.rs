//! Helpers shared by tests across the workspace.

use std::path::{Path, PathBuf};

use parking_lot::{const_mutex, Mutex, MutexGuard};

static PROCESS_LOCK: Mutex<()> = const_mutex(());

/// Serializes tests that write scripts and spawn child processes, so a freshly
/// written script is never held open by a concurrently forked child.
pub fn process_lock() -> MutexGuard<'static, ()> {
    PROCESS_LOCK.lock()
}

/// Writes a `/bin/sh` script into `dir` and marks it executable.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write test script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make test script executable");
    path
}
