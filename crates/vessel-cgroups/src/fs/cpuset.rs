//! Legacy cpuset controller.
//!
//! Unlike the other controllers, a fresh cpuset cgroup starts with empty
//! `cpuset.cpus`/`cpuset.mems` and refuses to accept processes until both
//! are populated, so joining copies the parent's values first.

use std::path::Path;

use vessel_common::constants::CGROUP_PROCS_FILE;
use vessel_common::error::{Result, VesselError};
use vessel_common::stats::Stats;
use vessel_common::types::Resources;

use crate::fscommon::{read_file, write_file};
use crate::registry::{CgroupContext, CgroupVersion, Subsystem};

/// `cpuset` controller over CPU and memory-node placement lists.
pub struct CpusetGroup;

impl Subsystem for CpusetGroup {
    fn name(&self) -> &'static str {
        "cpuset"
    }

    fn apply(&self, ctx: &CgroupContext) -> Result<()> {
        let path = ctx.subsystem_path(self.name());
        if ctx.version == CgroupVersion::Legacy && !ctx.root.join(self.name()).exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&path).map_err(|e| VesselError::Io {
            path: path.clone(),
            source: e,
        })?;
        copy_if_needed(&path, "cpuset.cpus")?;
        copy_if_needed(&path, "cpuset.mems")?;
        write_file(&path, CGROUP_PROCS_FILE, &ctx.pid.to_string())
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

/// Seeds an empty placement file from the parent cgroup.
fn copy_if_needed(path: &Path, file: &str) -> Result<()> {
    let current = read_file(path, file)?.unwrap_or_default();
    if !current.trim().is_empty() {
        return Ok(());
    }
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if let Some(value) = read_file(parent, file)? {
        if !value.trim().is_empty() {
            write_file(path, file, value.trim())?;
        }
    }
    Ok(())
}
