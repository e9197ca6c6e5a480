//! Controllers for the unified single-hierarchy layout.

pub mod cpu;
pub mod cpuset;
pub mod hugetlb;
pub mod io;
pub mod memory;
