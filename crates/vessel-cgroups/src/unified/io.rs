//! Unified io controller.

use std::path::Path;

use vessel_common::error::{Result, VesselError};
use vessel_common::stats::{BlkioStatEntry, Stats};
use vessel_common::types::{Resources, ThrottleDevice};

use crate::fscommon::{parse_u64, read_nested_keyed, write_file};
use crate::registry::{CgroupContext, Subsystem};

/// `io` controller over `io.max`, `io.bfq.weight` and `io.stat`.
pub struct IoGroup;

impl Subsystem for IoGroup {
    fn name(&self) -> &'static str {
        "io"
    }

    fn apply(&self, ctx: &CgroupContext) -> Result<()> {
        let _ = ctx.join(self.name())?;
        Ok(())
    }

    fn set(&self, path: &Path, resources: &Resources) -> Result<()> {
        if let Some(weight) = resources.blkio_weight {
            write_file(path, "io.bfq.weight", &weight.to_string())?;
        }
        write_limits(path, &resources.blkio_throttle_read_bps, "rbps")?;
        write_limits(path, &resources.blkio_throttle_write_bps, "wbps")?;
        write_limits(path, &resources.blkio_throttle_read_iops, "riops")?;
        write_limits(path, &resources.blkio_throttle_write_iops, "wiops")?;
        Ok(())
    }

    fn stats(&self, path: &Path, stats: &mut Stats) -> Result<()> {
        let file = path.join("io.stat");
        for (device, pairs) in read_nested_keyed(path, "io.stat")? {
            let mut nums = device.split(':');
            let (Some(first), Some(second), None) = (nums.next(), nums.next(), nums.next())
            else {
                return Err(VesselError::Parse {
                    path: file.clone(),
                    value: device,
                });
            };
            // Field order follows the accounting format this mirrors,
            // where the first number is the minor.
            let minor = parse_u64(&file, first)?;
            let major = parse_u64(&file, second)?;
            for pair in &pairs {
                let Some((key, value)) = pair.split_once('=') else {
                    return Err(VesselError::Parse {
                        path: file.clone(),
                        value: pair.clone(),
                    });
                };
                let op = match key {
                    "rbytes" => "read",
                    "wbytes" => "write",
                    _ => continue,
                };
                stats.blkio.io_service_bytes_recursive.push(BlkioStatEntry {
                    major,
                    minor,
                    op: op.to_string(),
                    value: parse_u64(&file, value)?,
                });
            }
        }
        Ok(())
    }
}

fn write_limits(path: &Path, devices: &[ThrottleDevice], key: &str) -> Result<()> {
    for device in devices {
        write_file(path, "io.max", &device.to_unified_entry(key))?;
    }
    Ok(())
}
