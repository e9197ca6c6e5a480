//! Legacy devices controller.
//!
//! The unified hierarchy has no file-based devices API (access control
//! moved to eBPF programs there), so this controller only exists in the
//! legacy registry.

use std::path::Path;

use vessel_common::error::Result;
use vessel_common::stats::Stats;
use vessel_common::types::Resources;

use crate::fscommon::write_file;
use crate::registry::{CgroupContext, Subsystem};

/// `devices` controller over `devices.allow`/`devices.deny`.
pub struct DevicesGroup;

impl Subsystem for DevicesGroup {
    fn name(&self) -> &'static str {
        "devices"
    }

    fn apply(&self, ctx: &CgroupContext) -> Result<()> {
        let _ = ctx.join(self.name())?;
        Ok(())
    }

    fn set(&self, path: &Path, resources: &Resources) -> Result<()> {
        for rule in &resources.devices {
            let file = if rule.allow {
                "devices.allow"
            } else {
                "devices.deny"
            };
            write_file(path, file, &rule.to_cgroup_entry())?;
        }
        Ok(())
    }

    fn stats(&self, _path: &Path, _stats: &mut Stats) -> Result<()> {
        // Access control has no usage accounting.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use vessel_common::types::DeviceRule;

    use super::*;

    #[test]
    fn rules_route_to_allow_and_deny_files() {
        let dir = tempfile::tempdir().unwrap();
        let resources = Resources {
            devices: vec![
                DeviceRule {
                    allow: false,
                    dev_type: 'a',
                    major: None,
                    minor: None,
                    access: "rwm".into(),
                },
                DeviceRule {
                    allow: true,
                    dev_type: 'c',
                    major: Some(1),
                    minor: Some(3),
                    access: "rwm".into(),
                },
            ],
            ..Resources::default()
        };
        DevicesGroup.set(dir.path(), &resources).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("devices.deny")).unwrap(),
            "a *:* rwm"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("devices.allow")).unwrap(),
            "c 1:3 rwm"
        );
    }
}
