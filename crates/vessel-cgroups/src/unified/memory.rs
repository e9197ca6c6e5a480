//! Unified memory controller.

use std::path::Path;

use vessel_common::error::{Result, VesselError};
use vessel_common::stats::Stats;
use vessel_common::types::Resources;

use crate::fscommon::{read_u64, write_file};
use crate::registry::{CgroupContext, Subsystem};

/// `memory` controller over `memory.max` and friends.
pub struct MemoryGroup;

impl Subsystem for MemoryGroup {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn apply(&self, ctx: &CgroupContext) -> Result<()> {
        let _ = ctx.join(self.name())?;
        Ok(())
    }

    fn set(&self, path: &Path, resources: &Resources) -> Result<()> {
        if let Some(limit) = resources.memory {
            write_file(path, "memory.max", &limit.to_string())?;
        }
        if let Some(reservation) = resources.memory_reservation {
            write_file(path, "memory.low", &reservation.to_string())?;
        }
        if let Some(swap_total) = resources.memory_swap {
            // The legacy knob is memory+swap combined; the unified file
            // takes swap alone.
            let swap = swap_total
                .checked_sub(resources.memory.unwrap_or(0))
                .ok_or_else(|| VesselError::InvalidConfig {
                    message: format!(
                        "memory+swap limit {swap_total} is below the memory limit"
                    ),
                })?;
            write_file(path, "memory.swap.max", &swap.to_string())?;
        }
        Ok(())
    }

    fn stats(&self, path: &Path, stats: &mut Stats) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        stats.memory.usage = read_u64(path, "memory.current")?.unwrap_or(0);
        stats.memory.max_usage = read_u64(path, "memory.peak")?.unwrap_or(0);
        stats.memory.limit = read_u64(path, "memory.max")?.unwrap_or(0);
        // The unified hierarchy exposes no failure counter in bytes-file
        // form; callers see zero there on this flavor.
        Ok(())
    }
}
