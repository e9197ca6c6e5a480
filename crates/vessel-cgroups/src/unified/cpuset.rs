//! Unified cpuset controller.
//!
//! The unified hierarchy inherits effective CPUs and memory nodes from
//! the parent on its own, so no seeding step is needed here.

use std::path::Path;

use vessel_common::error::Result;
use vessel_common::stats::Stats;
use vessel_common::types::Resources;

use crate::fscommon::write_file;
use crate::registry::{CgroupContext, Subsystem};

/// `cpuset` controller over CPU and memory-node placement lists.
pub struct CpusetGroup;

impl Subsystem for CpusetGroup {
    fn name(&self) -> &'static str {
        "cpuset"
    }

    fn apply(&self, ctx: &CgroupContext) -> Result<()> {
        let _ = ctx.join(self.name())?;
        Ok(())
    }

    fn set(&self, path: &Path, resources: &Resources) -> Result<()> {
        if let Some(cpus) = &resources.cpuset_cpus {
            write_file(path, "cpuset.cpus", cpus)?;
        }
        if let Some(mems) = &resources.cpuset_mems {
            write_file(path, "cpuset.mems", mems)?;
        }
        Ok(())
    }

    fn stats(&self, _path: &Path, _stats: &mut Stats) -> Result<()> {
        // Placement has no usage accounting.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_writes_placement_lists() {
        let dir = tempfile::tempdir().unwrap();
        let resources = Resources {
            cpuset_cpus: Some("0-3".into()),
            cpuset_mems: Some("0".into()),
            ..Resources::default()
        };
        CpusetGroup.set(dir.path(), &resources).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("cpuset.cpus")).unwrap(),
            "0-3"
        );
    }

    #[test]
    fn empty_resources_touch_nothing() {
        let dir = tempfile::tempdir().unwrap();
        CpusetGroup.set(dir.path(), &Resources::default()).unwrap();
        assert!(!dir.path().join("cpuset.cpus").exists());
    }
}
