//! Controllers for the legacy per-controller hierarchy layout.

pub mod blkio;
pub mod cpu;
pub mod cpuset;
pub mod devices;
pub mod hugetlb;
pub mod memory;
