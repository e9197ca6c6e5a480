//! Legacy memory controller.

use std::path::Path;

use vessel_common::error::Result;
use vessel_common::stats::Stats;
use vessel_common::types::Resources;

use crate::fscommon::{read_u64, write_file};
use crate::registry::{CgroupContext, Subsystem};

/// `memory` controller over `memory.*_in_bytes` files.
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
            write_file(path, "memory.limit_in_bytes", &limit.to_string())?;
        }
        if let Some(reservation) = resources.memory_reservation {
            write_file(path, "memory.soft_limit_in_bytes", &reservation.to_string())?;
        }
        if let Some(swap) = resources.memory_swap {
            write_file(path, "memory.memsw.limit_in_bytes", &swap.to_string())?;
        }
        Ok(())
    }

    fn stats(&self, path: &Path, stats: &mut Stats) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        stats.memory.usage = read_u64(path, "memory.usage_in_bytes")?.unwrap_or(0);
        stats.memory.max_usage = read_u64(path, "memory.max_usage_in_bytes")?.unwrap_or(0);
        stats.memory.failcnt = read_u64(path, "memory.failcnt")?.unwrap_or(0);
        stats.memory.limit = read_u64(path, "memory.limit_in_bytes")?.unwrap_or(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        MemoryGroup.set(dir.path(), &Resources::default()).unwrap();
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn set_writes_only_present_fields() {
        let dir = tempfile::tempdir().unwrap();
        let resources = Resources {
            memory: Some(536_870_912),
            memory_reservation: Some(268_435_456),
            ..Resources::default()
        };
        MemoryGroup.set(dir.path(), &resources).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("memory.limit_in_bytes")).unwrap(),
            "536870912"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("memory.soft_limit_in_bytes")).unwrap(),
            "268435456"
        );
        assert!(!dir.path().join("memory.memsw.limit_in_bytes").exists());
    }

    #[test]
    fn stats_on_missing_path_report_zero() {
        let mut stats = Stats::default();
        MemoryGroup
            .stats(Path::new("/nonexistent/cgroup"), &mut stats)
            .unwrap();
        assert_eq!(stats.memory.usage, 0);
    }

    #[test]
    fn set_then_stats_round_trips_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let resources = Resources {
            memory: Some(1_048_576),
            ..Resources::default()
        };
        MemoryGroup.set(dir.path(), &resources).unwrap();
        let mut stats = Stats::default();
        MemoryGroup.stats(dir.path(), &mut stats).unwrap();
        assert_eq!(stats.memory.limit, 1_048_576);
    }
}
