//! Unified cpu controller.

use std::path::Path;

use vessel_common::error::Result;
use vessel_common::stats::Stats;
use vessel_common::types::Resources;

use crate::fscommon::{read_flat_keyed, write_file};
use crate::registry::{CgroupContext, Subsystem};

const DEFAULT_PERIOD: u64 = 100_000;

/// Converts a legacy `cpu.shares` value to a unified `cpu.weight`.
///
/// Maps the shares range [2, 262144] linearly onto [1, 10000].
fn shares_to_weight(shares: u64) -> u64 {
    if shares == 0 {
        return 0;
    }
    1 + ((shares.saturating_sub(2)) * 9999) / 262_142
}

/// `cpu` controller over `cpu.weight` and `cpu.max`.
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
            let weight = shares_to_weight(shares);
            if weight != 0 {
                write_file(path, "cpu.weight", &weight.to_string())?;
            }
        }
        if resources.cpu_quota.is_some() || resources.cpu_period.is_some() {
            let period = resources.cpu_period.unwrap_or(DEFAULT_PERIOD);
            let quota = match resources.cpu_quota {
                Some(q) if q > 0 => q.to_string(),
                _ => "max".to_owned(),
            };
            write_file(path, "cpu.max", &format!("{quota} {period}"))?;
        }
        Ok(())
    }

    fn stats(&self, path: &Path, stats: &mut Stats) -> Result<()> {
        for (key, value) in read_flat_keyed(path, "cpu.stat")? {
            match key.as_str() {
                "usage_usec" => stats.cpu.usage_usec = value,
                "nr_periods" => stats.cpu.throttling.periods = value,
                "nr_throttled" => stats.cpu.throttling.throttled_periods = value,
                "throttled_usec" => {
                    stats.cpu.throttling.throttled_time = value.saturating_mul(1000);
                }
                _ => {}
            }
        }
        Ok(())
    }
}
