//! Unified hugetlb controller.

use std::path::Path;

use vessel_common::error::Result;
use vessel_common::stats::{HugetlbStats, Stats};
use vessel_common::types::Resources;

use crate::fs::hugetlb::{effective_limits, page_sizes_in};
use crate::fscommon::{read_flat_keyed, read_u64, write_file};
use crate::registry::{CgroupContext, Subsystem};

/// `hugetlb` controller over `hugetlb.<pagesize>.max` files.
pub struct HugetlbGroup;

impl Subsystem for HugetlbGroup {
    fn name(&self) -> &'static str {
        "hugetlb"
    }

    fn apply(&self, ctx: &CgroupContext) -> Result<()> {
        let _ = ctx.join(self.name())?;
        Ok(())
    }

    fn set(&self, path: &Path, resources: &Resources) -> Result<()> {
        for limit in effective_limits(&resources.hugepage_limits) {
            write_file(
                path,
                &format!("hugetlb.{}.max", limit.page_size),
                &limit.limit.to_string(),
            )?;
        }
        Ok(())
    }

    fn stats(&self, path: &Path, stats: &mut Stats) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        for page_size in page_sizes_in(path, ".current") {
            let events = read_flat_keyed(path, &format!("hugetlb.{page_size}.events"))?;
            let entry = HugetlbStats {
                usage: read_u64(path, &format!("hugetlb.{page_size}.current"))?.unwrap_or(0),
                // The unified hierarchy has no high-watermark file.
                max_usage: 0,
                failcnt: events.get("max").copied().unwrap_or(0),
            };
            let _ = stats.hugetlb.insert(page_size, entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vessel_common::types::HugepageLimit;

    #[test]
    fn limits_land_in_max_files() {
        let dir = tempfile::tempdir().unwrap();
        let resources = Resources {
            hugepage_limits: vec![
                HugepageLimit {
                    page_size: "2MB".into(),
                    limit: 100,
                },
                HugepageLimit {
                    page_size: "2MB".into(),
                    limit: 300,
                },
            ],
            ..Resources::default()
        };
        HugetlbGroup.set(dir.path(), &resources).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hugetlb.2MB.max")).unwrap(),
            "300"
        );
    }

    #[test]
    fn stats_read_current_and_event_counters() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "hugetlb.2MB.current", "2097152\n").unwrap();
        write_file(dir.path(), "hugetlb.2MB.events", "max 4\n").unwrap();
        let mut stats = Stats::default();
        HugetlbGroup.stats(dir.path(), &mut stats).unwrap();
        let entry = stats.hugetlb.get("2MB").unwrap();
        assert_eq!(entry.usage, 2_097_152);
        assert_eq!(entry.failcnt, 4);
    }
}
