//! Time-namespace clock offsets.
//!
//! Offsets must be written to `/proc/<pid>/timens_offsets` after the child
//! has been cloned into its time namespace but before it execs; the child
//! blocks on the acknowledge until that happens.

use vessel_common::constants::proc_path;
use vessel_common::error::{Result, VesselError};
use vessel_common::types::TimeOffsets;

/// Renders the kernel's one-line-per-clock offset format.
#[must_use]
pub fn render_offsets(offsets: &TimeOffsets) -> String {
    let mut out = String::new();
    if let Some(off) = offsets.monotonic {
        out.push_str(&format!("monotonic {} {}\n", off.secs, off.nanos));
    }
    if let Some(off) = offsets.boottime {
        out.push_str(&format!("boottime {} {}\n", off.secs, off.nanos));
    }
    out
}

/// Applies the configured offsets to the target process's time namespace.
///
/// A configuration without offsets is a no-op.
///
/// # Errors
///
/// Returns an error if the offsets file cannot be written; the bootstrap
/// must be aborted in that case.
pub fn apply_offsets(pid: u32, offsets: &TimeOffsets) -> Result<()> {
    if offsets.is_empty() {
        return Ok(());
    }
    let path = proc_path(pid, "timens_offsets");
    std::fs::write(&path, render_offsets(offsets))
        .map_err(|e| VesselError::Io { path, source: e })?;
    tracing::debug!(pid, "applied time namespace offsets");
    Ok(())
}
