//! The subsystem registry: one ordered list of resource controllers,
//! selected once at startup for whichever hierarchy flavor is mounted.

use std::path::{Path, PathBuf};

use vessel_common::constants::{CGROUP_CONTROLLERS_FILE, CGROUP_PROCS_FILE, CGROUP_ROOT};
use vessel_common::error::{Result, VesselError};
use vessel_common::stats::Stats;
use vessel_common::types::Resources;

use crate::{fs, fscommon, unified};

/// Which control-group API the kernel has mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupVersion {
    /// One hierarchy per controller, `<controller>/<path>` layout.
    Legacy,
    /// Single unified hierarchy for all controllers.
    Unified,
}

/// Detects the mounted hierarchy flavor at the standard mount root.
#[must_use]
pub fn detect_version() -> CgroupVersion {
    detect_version_at(Path::new(CGROUP_ROOT))
}

/// Detects the hierarchy flavor mounted at `root`.
///
/// The unified hierarchy always exposes `cgroup.controllers` at its root.
#[must_use]
pub fn detect_version_at(root: &Path) -> CgroupVersion {
    if root.join(CGROUP_CONTROLLERS_FILE).exists() {
        CgroupVersion::Unified
    } else {
        CgroupVersion::Legacy
    }
}

/// Everything a subsystem needs to locate and join its hierarchy path.
///
/// Subsystems hold no state of their own: the path is re-derived from the
/// context on every call.
#[derive(Debug, Clone)]
pub struct CgroupContext {
    /// Hierarchy mount root.
    pub root: PathBuf,
    /// Container path relative to the mount root.
    pub inner_path: PathBuf,
    /// Process to place into the cgroup.
    pub pid: u32,
    /// Mounted API flavor.
    pub version: CgroupVersion,
}

impl CgroupContext {
    /// Creates a context rooted at the standard mount point.
    #[must_use]
    pub fn new(inner_path: impl Into<PathBuf>, pid: u32, version: CgroupVersion) -> Self {
        Self {
            root: PathBuf::from(CGROUP_ROOT),
            inner_path: inner_path.into(),
            pid,
            version,
        }
    }

    /// Returns the on-disk cgroup directory for a named controller.
    ///
    /// Legacy mounts controllers side by side; the unified hierarchy has
    /// one directory for all of them.
    #[must_use]
    pub fn subsystem_path(&self, name: &str) -> PathBuf {
        let inner = self.inner_path.strip_prefix("/").unwrap_or(&self.inner_path);
        match self.version {
            CgroupVersion::Legacy => self.root.join(name).join(inner),
            CgroupVersion::Unified => self.root.join(inner),
        }
    }

    /// Creates the controller directory (if needed) and joins the target
    /// process into it.
    ///
    /// Returns `None` when the controller hierarchy is not present —
    /// tolerated for optional controllers rather than treated as failure.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than an absent hierarchy.
    pub fn join(&self, name: &str) -> Result<Option<PathBuf>> {
        let path = self.subsystem_path(name);
        if self.version == CgroupVersion::Legacy && !self.root.join(name).exists() {
            tracing::debug!(controller = name, "controller hierarchy not mounted");
            return Ok(None);
        }
        std::fs::create_dir_all(&path).map_err(|e| VesselError::Io {
            path: path.clone(),
            source: e,
        })?;
        fscommon::write_file(&path, CGROUP_PROCS_FILE, &self.pid.to_string())?;
        tracing::debug!(controller = name, pid = self.pid, "joined cgroup");
        Ok(Some(path))
    }
}

/// A named unit of resource control bound to an on-disk cgroup path.
pub trait Subsystem {
    /// Controller name as it appears in the hierarchy.
    fn name(&self) -> &'static str;

    /// Creates-and-joins the target process into this controller's path.
    ///
    /// # Errors
    ///
    /// Returns an error if the join fails for a present controller;
    /// absence of an optional controller is not an error.
    fn apply(&self, ctx: &CgroupContext) -> Result<()>;

    /// Translates the resource bag into this controller's control files.
    /// Only fields that are present are written.
    ///
    /// # Errors
    ///
    /// Any write failure is fatal — a limit that silently fails to apply
    /// would misrepresent the container's constraints.
    fn set(&self, path: &Path, resources: &Resources) -> Result<()>;

    /// Reads this controller's reporting files into the normalized
    /// statistics record.
    ///
    /// # Errors
    ///
    /// A missing path reports zero values; a malformed numeric field is
    /// always an error.
    fn stats(&self, path: &Path, stats: &mut Stats) -> Result<()>;

    /// Removes this controller's cgroup directory.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing directory cannot be removed.
    fn remove(&self, ctx: &CgroupContext) -> Result<()> {
        fscommon::remove_path(&ctx.subsystem_path(self.name()))
    }
}

/// The fixed, ordered list of controllers for one hierarchy flavor.
pub struct SubsystemRegistry {
    version: CgroupVersion,
    subsystems: Vec<Box<dyn Subsystem + Send + Sync>>,
}

impl SubsystemRegistry {
    /// Builds the registry for a known hierarchy flavor.
    #[must_use]
    pub fn new(version: CgroupVersion) -> Self {
        let subsystems: Vec<Box<dyn Subsystem + Send + Sync>> = match version {
            CgroupVersion::Legacy => vec![
                Box::new(fs::memory::MemoryGroup),
                Box::new(fs::cpu::CpuGroup),
                Box::new(fs::cpuset::CpusetGroup),
                Box::new(fs::blkio::BlkioGroup),
                Box::new(fs::hugetlb::HugetlbGroup),
                Box::new(fs::devices::DevicesGroup),
            ],
            CgroupVersion::Unified => vec![
                Box::new(unified::memory::MemoryGroup),
                Box::new(unified::cpu::CpuGroup),
                Box::new(unified::cpuset::CpusetGroup),
                Box::new(unified::io::IoGroup),
                Box::new(unified::hugetlb::HugetlbGroup),
            ],
        };
        Self {
            version,
            subsystems,
        }
    }

    /// Builds the registry for whatever flavor the host has mounted.
    #[must_use]
    pub fn detect() -> Self {
        Self::new(detect_version())
    }

    /// Returns the flavor this registry was built for.
    #[must_use]
    pub const fn version(&self) -> CgroupVersion {
        self.version
    }

    /// Returns the ordered controller list.
    #[must_use]
    pub fn subsystems(&self) -> &[Box<dyn Subsystem + Send + Sync>] {
        &self.subsystems
    }

    /// Looks a controller up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&(dyn Subsystem + Send + Sync)> {
        self.subsystems
            .iter()
            .find(|s| s.name() == name)
            .map(AsRef::as_ref)
    }

    /// Joins the context's process into every controller, in order.
    ///
    /// # Errors
    ///
    /// Propagates the first join failure.
    pub fn apply_all(&self, ctx: &CgroupContext) -> Result<()> {
        for subsystem in &self.subsystems {
            subsystem.apply(ctx)?;
        }
        Ok(())
    }

    /// Applies the resource bag through every controller, in order.
    ///
    /// # Errors
    ///
    /// Propagates the first write failure.
    pub fn set_all(&self, ctx: &CgroupContext, resources: &Resources) -> Result<()> {
        for subsystem in &self.subsystems {
            subsystem.set(&ctx.subsystem_path(subsystem.name()), resources)?;
        }
        Ok(())
    }

    /// Collects statistics from every controller into one record.
    ///
    /// # Errors
    ///
    /// Propagates the first parse failure; absent controllers contribute
    /// zero values.
    pub fn stats_all(&self, ctx: &CgroupContext) -> Result<Stats> {
        let mut stats = Stats::default();
        for subsystem in &self.subsystems {
            subsystem.stats(&ctx.subsystem_path(subsystem.name()), &mut stats)?;
        }
        Ok(stats)
    }
}
