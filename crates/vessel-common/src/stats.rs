//! Normalized resource-usage statistics.
//!
//! Both control-group flavors report into this one shape so callers never
//! see hierarchy-specific vocabulary (the unified I/O controller's
//! `rbytes`/`wbytes` keys, for instance, surface as `read`/`write`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Memory usage and limit figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Current usage in bytes.
    pub usage: u64,
    /// High-water mark in bytes.
    pub max_usage: u64,
    /// Number of allocation failures against the limit.
    pub failcnt: u64,
    /// Configured limit in bytes; `u64::MAX` when unlimited.
    pub limit: u64,
}

/// CPU throttling counters from `cpu.stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlingData {
    /// Number of enforcement intervals that have elapsed.
    pub periods: u64,
    /// Number of intervals in which the group was throttled.
    pub throttled_periods: u64,
    /// Total time the group was throttled, in nanoseconds.
    pub throttled_time: u64,
}

/// CPU accounting figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStats {
    /// Total CPU time consumed, in microseconds.
    pub usage_usec: u64,
    /// Quota throttling counters.
    pub throttling: ThrottlingData,
}

/// One device/operation row of block-I/O accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlkioStatEntry {
    /// Device major number.
    pub major: u64,
    /// Device minor number.
    pub minor: u64,
    /// Operation name in the legacy vocabulary (`read`, `write`, ...).
    pub op: String,
    /// Byte or operation count.
    pub value: u64,
}

/// Block-I/O accounting rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlkioStats {
    /// Bytes transferred per device and operation, recursive over children.
    pub io_service_bytes_recursive: Vec<BlkioStatEntry>,
}

/// Usage figures for one huge page size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HugetlbStats {
    /// Current usage in bytes.
    pub usage: u64,
    /// High-water mark in bytes.
    pub max_usage: u64,
    /// Number of allocation failures against the limit.
    pub failcnt: u64,
}

/// Aggregated statistics record filled in by the subsystem registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Memory controller figures.
    pub memory: MemoryStats,
    /// CPU controller figures.
    pub cpu: CpuStats,
    /// Block-I/O controller figures.
    pub blkio: BlkioStats,
    /// Hugetlb figures keyed by page size (`2MB`, `1GB`, ...).
    pub hugetlb: HashMap<String, HugetlbStats>,
}
