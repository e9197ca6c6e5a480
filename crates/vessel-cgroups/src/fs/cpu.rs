//! Legacy cpu controller.

use std::path::Path;

use vessel_common::error::Result;
use vessel_common::stats::Stats;
use vessel_common::types::Resources;

use crate::fscommon::{read_flat_keyed, write_file};
use crate::registry::{CgroupContext, Subsystem};

/// `cpu` controller over `cpu.shares` and the CFS bandwidth knobs.
pub struct CpuGroup;

impl Subsystem for CpuGroup {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn apply(&self, ctx: &CgroupContext) -> Result<()> {
        let _ = ctx.join(self.name())?;
        Ok(())
    }

    fn set(&self, path: &Path, resources: &Resources) -> Result<()> {
        if let Some(shares) = resources.cpu_shares {
            write_file(path, "cpu.shares", &shares.to_string())?;
        }
        if let Some(period) = resources.cpu_period {
            write_file(path, "cpu.cfs_period_us", &period.to_string())?;
        }
        if let Some(quota) = resources.cpu_quota {
            write_file(path, "cpu.cfs_quota_us", &quota.to_string())?;
        }
        Ok(())
    }

    fn stats(&self, path: &Path, stats: &mut Stats) -> Result<()> {
        let values = read_flat_keyed(path, "cpu.stat")?;
        let throttling = &mut stats.cpu.throttling;
        throttling.periods = values.get("nr_periods").copied().unwrap_or(0);
        throttling.throttled_periods = values.get("nr_throttled").copied().unwrap_or(0);
        throttling.throttled_time = values.get("throttled_time").copied().unwrap_or(0);
        Ok(())
    }
}
