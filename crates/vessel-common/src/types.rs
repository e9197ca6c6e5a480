//! Domain types for container bootstrap and resource control.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VesselError};

/// A single UID or GID range mapping between a user namespace and the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMap {
    /// First ID inside the container's user namespace.
    pub inner: u32,
    /// First ID on the host side of the mapping.
    pub outer: u32,
    /// Number of consecutive IDs covered by this entry.
    pub count: u32,
}

impl IdMap {
    /// Formats the entry in the `/proc/<pid>/{uid,gid}_map` line layout.
    #[must_use]
    pub fn to_map_line(&self) -> String {
        format!("{} {} {}", self.inner, self.outer, self.count)
    }
}

/// Validates a set of ID mappings.
///
/// An empty set means "no mapping requested" and is valid. A non-empty set
/// is valid only if the container-side ranges do not overlap.
///
/// # Errors
///
/// Returns [`VesselError::InvalidConfig`] on overlapping ranges or a
/// zero-length entry.
pub fn validate_id_maps(maps: &[IdMap]) -> Result<()> {
    let mut sorted: Vec<&IdMap> = maps.iter().collect();
    sorted.sort_by_key(|m| m.inner);
    for w in sorted.windows(2) {
        let (a, b) = (w[0], w[1]);
        if u64::from(a.inner) + u64::from(a.count) > u64::from(b.inner) {
            return Err(VesselError::InvalidConfig {
                message: format!(
                    "overlapping ID mappings: {} and {}",
                    a.to_map_line(),
                    b.to_map_line()
                ),
            });
        }
    }
    if let Some(m) = maps.iter().find(|m| m.count == 0) {
        return Err(VesselError::InvalidConfig {
            message: format!("ID mapping {} has zero length", m.to_map_line()),
        });
    }
    Ok(())
}

/// Offset applied to one time-namespace clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOffset {
    /// Whole seconds, may be negative.
    pub secs: i64,
    /// Nanosecond remainder.
    pub nanos: u32,
}

/// Per-clock offsets for a time namespace.
///
/// `None` for a clock means the kernel default (no offset) is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOffsets {
    /// Offset for `CLOCK_MONOTONIC`.
    pub monotonic: Option<TimeOffset>,
    /// Offset for `CLOCK_BOOTTIME`.
    pub boottime: Option<TimeOffset>,
}

impl TimeOffsets {
    /// Returns true when no clock has a configured offset.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.monotonic.is_none() && self.boottime.is_none()
    }
}

/// The five POSIX capability vectors, as symbolic `CAP_*` names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitiesSpec {
    /// Privilege ceiling; capabilities outside it can never be acquired.
    pub bounding: Vec<String>,
    /// Capabilities in effect after exec.
    pub effective: Vec<String>,
    /// Capabilities preserved across exec into the inheritable set.
    pub inheritable: Vec<String>,
    /// Capabilities the process may enable.
    pub permitted: Vec<String>,
    /// Capabilities kept across exec for unprivileged programs; must be a
    /// subset of the inheritable set.
    pub ambient: Vec<String>,
}

/// Kind of Linux namespace referenced by a bootstrap configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// Mount namespace.
    Mount,
    /// UTS (hostname) namespace.
    Uts,
    /// System V IPC namespace.
    Ipc,
    /// User namespace.
    User,
    /// PID namespace.
    Pid,
    /// Network namespace.
    Net,
    /// Cgroup namespace.
    Cgroup,
    /// Time namespace.
    Time,
}

/// A namespace the child should create or join.
///
/// A populated `path` means "join the namespace behind this file" instead
/// of creating a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRef {
    /// Which namespace this entry configures.
    pub kind: NamespaceKind,
    /// Path to an existing namespace file, or `None` to create one.
    pub path: Option<PathBuf>,
}

/// Everything the bootstrap supervisor needs to answer child requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Namespaces to create or join.
    pub namespaces: Vec<NamespaceRef>,
    /// UID mappings for a fresh user namespace.
    pub uid_mappings: Vec<IdMap>,
    /// GID mappings for a fresh user namespace.
    pub gid_mappings: Vec<IdMap>,
    /// Whether the controller runs without host root privilege.
    pub rootless_euid: bool,
    /// Time-namespace clock offsets.
    pub time_offsets: TimeOffsets,
}

impl BootstrapConfig {
    /// Returns the configured join-path for a namespace kind, if any.
    #[must_use]
    pub fn namespace_path(&self, kind: NamespaceKind) -> Option<&PathBuf> {
        self.namespaces
            .iter()
            .find(|ns| ns.kind == kind)
            .and_then(|ns| ns.path.as_ref())
    }
}

/// Per-device I/O rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleDevice {
    /// Device major number.
    pub major: u64,
    /// Device minor number.
    pub minor: u64,
    /// Rate in bytes or operations per second.
    pub rate: u64,
}

impl ThrottleDevice {
    /// Formats the limit for legacy `blkio.throttle.*_device` files.
    #[must_use]
    pub fn to_legacy_entry(&self) -> String {
        format!("{}:{} {}", self.major, self.minor, self.rate)
    }

    /// Formats the limit for the unified `io.max` file under the given key
    /// (`rbps`, `wbps`, `riops`, or `wiops`).
    #[must_use]
    pub fn to_unified_entry(&self, key: &str) -> String {
        format!("{}:{} {}={}", self.major, self.minor, key, self.rate)
    }
}

/// Limit for one huge page size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HugepageLimit {
    /// Page size in the kernel's file-name vocabulary, e.g. `2MB`.
    pub page_size: String,
    /// Limit in bytes.
    pub limit: u64,
}

/// Access rule for the legacy devices controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRule {
    /// Whether the rule allows (true) or denies (false) access.
    pub allow: bool,
    /// Device class: `c`, `b`, or `a` for all.
    pub dev_type: char,
    /// Major number, `None` for the kernel's `*` wildcard.
    pub major: Option<i64>,
    /// Minor number, `None` for the kernel's `*` wildcard.
    pub minor: Option<i64>,
    /// Access string composed of `r`, `w`, `m`.
    pub access: String,
}

impl DeviceRule {
    /// Formats the rule for `devices.allow` / `devices.deny`.
    #[must_use]
    pub fn to_cgroup_entry(&self) -> String {
        let fmt_num = |n: Option<i64>| n.map_or_else(|| "*".to_string(), |v| v.to_string());
        format!(
            "{} {}:{} {}",
            self.dev_type,
            fmt_num(self.major),
            fmt_num(self.minor),
            self.access
        )
    }
}

/// A structured bag of optional resource limits.
///
/// `None` means "leave the kernel default untouched", never "set to zero".
/// List fields are cumulative except hugepage limits, where the last entry
/// per page size wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// Memory limit in bytes.
    pub memory: Option<u64>,
    /// Memory soft limit (reservation) in bytes.
    pub memory_reservation: Option<u64>,
    /// Memory plus swap limit in bytes.
    pub memory_swap: Option<u64>,
    /// CPU shares (relative weight, 2..=262144).
    pub cpu_shares: Option<u64>,
    /// CPU hardcap quota in microseconds per period.
    pub cpu_quota: Option<i64>,
    /// CPU hardcap period in microseconds.
    pub cpu_period: Option<u64>,
    /// CPUs the container may run on, in kernel list syntax.
    pub cpuset_cpus: Option<String>,
    /// Memory nodes the container may allocate from.
    pub cpuset_mems: Option<String>,
    /// Block I/O weight (10..=1000 legacy, 1..=10000 unified bfq).
    pub blkio_weight: Option<u16>,
    /// Read bandwidth limits per device.
    pub blkio_throttle_read_bps: Vec<ThrottleDevice>,
    /// Write bandwidth limits per device.
    pub blkio_throttle_write_bps: Vec<ThrottleDevice>,
    /// Read IOPS limits per device.
    pub blkio_throttle_read_iops: Vec<ThrottleDevice>,
    /// Write IOPS limits per device.
    pub blkio_throttle_write_iops: Vec<ThrottleDevice>,
    /// Huge page limits; last entry per page size wins.
    pub hugepage_limits: Vec<HugepageLimit>,
    /// Device access rules, applied in order (legacy hierarchy only).
    pub devices: Vec<DeviceRule>,
}
