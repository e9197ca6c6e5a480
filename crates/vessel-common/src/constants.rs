//! System-wide constants and kernel interface paths.

/// Mount root of the cgroup hierarchy (both flavors mount here).
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// File whose presence at [`CGROUP_ROOT`] marks a unified (v2) hierarchy.
pub const CGROUP_CONTROLLERS_FILE: &str = "cgroup.controllers";

/// Per-cgroup membership file; writing a PID moves the process in.
pub const CGROUP_PROCS_FILE: &str = "cgroup.procs";

/// Directory the kernel populates with one entry per supported huge page
/// size (`hugepages-2048kB` and friends).
pub const HUGEPAGES_DIR: &str = "/sys/kernel/mm/hugepages";

/// setuid helper for multi-entry UID mappings in rootless mode.
pub const NEWUIDMAP: &str = "newuidmap";

/// setuid helper for multi-entry GID mappings in rootless mode.
pub const NEWGIDMAP: &str = "newgidmap";

/// Size in bytes of one bootstrap synchronization frame.
pub const SYNC_FRAME_SIZE: usize = 4;

/// Returns the `/proc/<pid>` entry for a process, using `self` for pid 0.
#[must_use]
pub fn proc_path(pid: u32, entry: &str) -> std::path::PathBuf {
    if pid == 0 {
        std::path::PathBuf::from(format!("/proc/self/{entry}"))
    } else {
        std::path::PathBuf::from(format!("/proc/{pid}/{entry}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proc_path_uses_self_for_zero() {
        assert_eq!(
            proc_path(0, "uid_map"),
            std::path::PathBuf::from("/proc/self/uid_map")
        );
    }

    #[test]
    fn proc_path_uses_pid() {
        assert_eq!(
            proc_path(42, "setgroups"),
            std::path::PathBuf::from("/proc/42/setgroups")
        );
    }
}
