//! Legacy blkio controller.

use std::path::Path;

use vessel_common::error::{Result, VesselError};
use vessel_common::stats::{BlkioStatEntry, Stats};
use vessel_common::types::Resources;

use crate::fscommon::{parse_u64, read_file, write_file};
use crate::registry::{CgroupContext, Subsystem};

/// `blkio` controller over proportional weight and throttle files.
pub struct BlkioGroup;

impl Subsystem for BlkioGroup {
    fn name(&self) -> &'static str {
        "blkio"
    }

    fn apply(&self, ctx: &CgroupContext) -> Result<()> {
        let _ = ctx.join(self.name())?;
        Ok(())
    }

    fn set(&self, path: &Path, resources: &Resources) -> Result<()> {
        if let Some(weight) = resources.blkio_weight {
            write_file(path, "blkio.weight", &weight.to_string())?;
        }
        for td in &resources.blkio_throttle_read_bps {
            write_file(path, "blkio.throttle.read_bps_device", &td.to_legacy_entry())?;
        }
        for td in &resources.blkio_throttle_write_bps {
            write_file(path, "blkio.throttle.write_bps_device", &td.to_legacy_entry())?;
        }
        for td in &resources.blkio_throttle_read_iops {
            write_file(path, "blkio.throttle.read_iops_device", &td.to_legacy_entry())?;
        }
        for td in &resources.blkio_throttle_write_iops {
            write_file(path, "blkio.throttle.write_iops_device", &td.to_legacy_entry())?;
        }
        Ok(())
    }

    fn stats(&self, path: &Path, stats: &mut Stats) -> Result<()> {
        let Some(content) = read_file(path, "blkio.throttle.io_service_bytes")? else {
            return Ok(());
        };
        let file = path.join("blkio.throttle.io_service_bytes");
        let mut entries = Vec::new();
        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            // The trailing "Total <n>" aggregate row has no device column.
            let [device, op, value] = fields.as_slice() else {
                continue;
            };
            let Some((major_str, minor_str)) = device.split_once(':') else {
                continue;
            };
            let major = parse_u64(&file, major_str)?;
            let minor = parse_u64(&file, minor_str)?;
            let value = parse_u64(&file, value)?;
            entries.push(BlkioStatEntry {
                major,
                minor,
                op: op.to_lowercase(),
                value,
            });
        }
        stats.blkio.io_service_bytes_recursive = entries;
        Ok(())
    }
}
