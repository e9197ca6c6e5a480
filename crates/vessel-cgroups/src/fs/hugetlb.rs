//! Legacy hugetlb controller.

use std::collections::HashMap;
use std::path::Path;

use vessel_common::error::Result;
use vessel_common::stats::{HugetlbStats, Stats};
use vessel_common::types::{HugepageLimit, Resources};

use crate::fscommon::{read_u64, write_file};
use crate::registry::{CgroupContext, Subsystem};

/// `hugetlb` controller over `hugetlb.<pagesize>.*` files.
pub struct HugetlbGroup;

/// Reduces a limit list to the effective limit per page size.
///
/// The configuration list may name one page size several times; only the
/// last entry per size is honored, consistent with last-write-wins.
#[must_use]
pub fn effective_limits(limits: &[HugepageLimit]) -> Vec<&HugepageLimit> {
    let mut by_size: HashMap<&str, &HugepageLimit> = HashMap::new();
    for limit in limits {
        let _ = by_size.insert(limit.page_size.as_str(), limit);
    }
    let mut out: Vec<&HugepageLimit> = by_size.into_values().collect();
    out.sort_by(|a, b| a.page_size.cmp(&b.page_size));
    out
}

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
                &format!("hugetlb.{}.limit_in_bytes", limit.page_size),
                &limit.limit.to_string(),
            )?;
        }
        Ok(())
    }

    fn stats(&self, path: &Path, stats: &mut Stats) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        for page_size in page_sizes_in(path, ".usage_in_bytes") {
            let entry = HugetlbStats {
                usage: read_u64(path, &format!("hugetlb.{page_size}.usage_in_bytes"))?
                    .unwrap_or(0),
                max_usage: read_u64(path, &format!("hugetlb.{page_size}.max_usage_in_bytes"))?
                    .unwrap_or(0),
                failcnt: read_u64(path, &format!("hugetlb.{page_size}.failcnt"))?.unwrap_or(0),
            };
            let _ = stats.hugetlb.insert(page_size, entry);
        }
        Ok(())
    }
}

/// Lists the page sizes a cgroup directory reports, by scanning for
/// `hugetlb.<pagesize><suffix>` files.
pub(crate) fn page_sizes_in(path: &Path, suffix: &str) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(path) else {
        return Vec::new();
    };
    let mut sizes: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let middle = name.strip_prefix("hugetlb.")?.strip_suffix(suffix)?;
            (!middle.contains('.')).then(|| middle.to_string())
        })
        .collect();
    sizes.sort();
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_limit_per_page_size_wins() {
        let dir = tempfile::tempdir().unwrap();
        let resources = Resources {
            hugepage_limits: vec![
                HugepageLimit {
                    page_size: "2MB".into(),
                    limit: 100,
                },
                HugepageLimit {
                    page_size: "2MB".into(),
                    limit: 200,
                },
            ],
            ..Resources::default()
        };
        HugetlbGroup.set(dir.path(), &resources).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hugetlb.2MB.limit_in_bytes")).unwrap(),
            "200"
        );
    }

    #[test]
    fn distinct_page_sizes_each_get_their_limit() {
        let dir = tempfile::tempdir().unwrap();
        let resources = Resources {
            hugepage_limits: vec![
                HugepageLimit {
                    page_size: "2MB".into(),
                    limit: 100,
                },
                HugepageLimit {
                    page_size: "1GB".into(),
                    limit: 300,
                },
            ],
            ..Resources::default()
        };
        HugetlbGroup.set(dir.path(), &resources).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hugetlb.2MB.limit_in_bytes")).unwrap(),
            "100"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hugetlb.1GB.limit_in_bytes")).unwrap(),
            "300"
        );
    }

    #[test]
    fn stats_cover_each_reported_page_size() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "hugetlb.2MB.usage_in_bytes", "4194304").unwrap();
        write_file(dir.path(), "hugetlb.2MB.max_usage_in_bytes", "8388608").unwrap();
        write_file(dir.path(), "hugetlb.2MB.failcnt", "2").unwrap();
        let mut stats = Stats::default();
        HugetlbGroup.stats(dir.path(), &mut stats).unwrap();
        let entry = stats.hugetlb.get("2MB").unwrap();
        assert_eq!(entry.usage, 4_194_304);
        assert_eq!(entry.max_usage, 8_388_608);
        assert_eq!(entry.failcnt, 2);
    }

    #[test]
    fn stats_on_missing_path_report_nothing() {
        let mut stats = Stats::default();
        HugetlbGroup
            .stats(Path::new("/nonexistent/cgroup"), &mut stats)
            .unwrap();
        assert!(stats.hugetlb.is_empty());
    }
}
