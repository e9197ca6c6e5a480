//! User/group ID mapping for freshly created user namespaces.
//!
//! The controller reacts to [`SyncMsg::UsermapRequest`] by writing the
//! child's `uid_map` and `gid_map`, either directly or through the setuid
//! `newuidmap`/`newgidmap` helpers. The order of operations here is
//! security sensitive: `setgroups` must be denied before a rootless
//! single-entry mapping is written (required since Linux 3.19; skipping it
//! reopens a known privilege-escalation hole), and the UID map is written
//! before the GID map.

use std::path::{Path, PathBuf};
use std::process::Command;

use vessel_common::constants::{NEWGIDMAP, NEWUIDMAP, proc_path};
use vessel_common::error::{Result, VesselError};
use vessel_common::types::{BootstrapConfig, IdMap, NamespaceKind, validate_id_maps};

use crate::sync::{SyncHandler, SyncMsg, SyncSocket};
use crate::timens;

/// The side effects one `UsermapRequest` will trigger, decided up front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingPlan {
    /// Whether any map files are written at all. False when the child
    /// joins a pre-existing user namespace, which already defines its maps.
    pub write_maps: bool,
    /// Whether `/proc/<pid>/setgroups` is set to `deny` first.
    pub deny_setgroups: bool,
    /// Helper binary for the UID map, when direct writes lack privilege.
    pub uid_helper: Option<PathBuf>,
    /// Helper binary for the GID map.
    pub gid_helper: Option<PathBuf>,
}

/// Decides how ID maps will be written for the given configuration.
///
/// Rootless callers can write a single-entry map themselves; multi-entry
/// maps need the setuid helpers, located through `lookup` (injected so the
/// decision logic stays testable without a populated `PATH`).
#[must_use]
pub fn plan_usermap<F>(config: &BootstrapConfig, lookup: F) -> MappingPlan
where
    F: Fn(&str) -> Option<PathBuf>,
{
    if config.namespace_path(NamespaceKind::User).is_some() {
        // Joining an existing namespace: its maps are already in place and
        // any write attempt would fail or corrupt them.
        return MappingPlan::default();
    }

    let mut plan = MappingPlan {
        write_maps: !config.uid_mappings.is_empty() || !config.gid_mappings.is_empty(),
        ..MappingPlan::default()
    };
    if !plan.write_maps {
        return plan;
    }

    if config.rootless_euid {
        if config.uid_mappings.len() > 1 {
            plan.uid_helper = lookup(NEWUIDMAP);
        }
        if config.gid_mappings.len() > 1 {
            plan.gid_helper = lookup(NEWGIDMAP);
        } else {
            // Single-entry rootless mapping without a group helper: the
            // kernel requires setgroups(2) to be denied first.
            plan.deny_setgroups = true;
        }
    }
    plan
}

/// Controller-side handler for the bootstrap handshake.
///
/// Holds the launch configuration, the PID of the stage process the
/// controller spawned (whose `/proc` entries receive the map writes), and
/// the final container PID once the child reports it. The reported PID
/// differs from the spawned one because of the multi-stage clone.
#[derive(Debug)]
pub struct BootstrapSupervisor<'a> {
    config: &'a BootstrapConfig,
    stage_pid: u32,
    child_pid: Option<u32>,
}

impl<'a> BootstrapSupervisor<'a> {
    /// Creates a supervisor for one launch.
    #[must_use]
    pub const fn new(config: &'a BootstrapConfig, stage_pid: u32) -> Self {
        Self {
            config,
            stage_pid,
            child_pid: None,
        }
    }

    /// Returns the PID the child reported, once the handshake is done.
    #[must_use]
    pub const fn child_pid(&self) -> Option<u32> {
        self.child_pid
    }

    fn setup_usermap(&self) -> Result<()> {
        validate_id_maps(&self.config.uid_mappings)?;
        validate_id_maps(&self.config.gid_mappings)?;

        let plan = plan_usermap(self.config, |name| which::which(name).ok());
        if !plan.write_maps {
            tracing::debug!("user namespace is pre-existing, no ID maps to write");
            return Ok(());
        }

        if plan.deny_setgroups {
            deny_setgroups(self.stage_pid)?;
        }

        // UID map strictly before GID map.
        write_id_map(
            self.stage_pid,
            "uid_map",
            &self.config.uid_mappings,
            plan.uid_helper.as_deref(),
        )?;
        write_id_map(
            self.stage_pid,
            "gid_map",
            &self.config.gid_mappings,
            plan.gid_helper.as_deref(),
        )?;
        Ok(())
    }
}

impl SyncHandler for BootstrapSupervisor<'_> {
    fn on_message(&mut self, msg: SyncMsg, socket: &mut SyncSocket) -> Result<()> {
        match msg {
            SyncMsg::UsermapRequest => {
                tracing::debug!("child requested user namespace mappings");
                self.setup_usermap()?;
                socket.send(SyncMsg::UsermapAck)
            }
            SyncMsg::TimeOffsetsRequest => {
                tracing::debug!("child requested time namespace offsets");
                timens::apply_offsets(self.stage_pid, &self.config.time_offsets)?;
                socket.send(SyncMsg::TimeOffsetsAck)
            }
            SyncMsg::PidRequest => {
                let pid = socket.recv_pid()?;
                tracing::debug!(pid, "child reported its final pid");
                self.child_pid = Some(pid);
                socket.send(SyncMsg::PidAck)
            }
            other => Err(VesselError::Protocol {
                message: format!("unexpected message {other:?} from child"),
            }),
        }
    }
}

/// Denies `setgroups(2)` for the target process.
///
/// The kernel file only exists since Linux 3.19; absence is tolerated, a
/// failed write on a present file is not.
fn deny_setgroups(pid: u32) -> Result<()> {
    let path = proc_path(pid, "setgroups");
    if !path.exists() {
        return Ok(());
    }
    std::fs::write(&path, "deny").map_err(|e| VesselError::Io { path, source: e })
}

/// Writes one map file, directly or through a setuid helper.
fn write_id_map(pid: u32, file: &str, maps: &[IdMap], helper: Option<&Path>) -> Result<()> {
    if maps.is_empty() {
        return Ok(());
    }
    if let Some(helper) = helper {
        let mut cmd = Command::new(helper);
        let _ = cmd.arg(pid.to_string());
        for m in maps {
            let _ = cmd
                .arg(m.inner.to_string())
                .arg(m.outer.to_string())
                .arg(m.count.to_string());
        }
        let status = cmd.status().map_err(|e| VesselError::Setup {
            message: format!("failed to run {}: {e}", helper.display()),
        })?;
        if !status.success() {
            return Err(VesselError::Setup {
                message: format!("{} exited with {status}", helper.display()),
            });
        }
    } else {
        let path = proc_path(pid, file);
        let lines: Vec<String> = maps.iter().map(IdMap::to_map_line).collect();
        std::fs::write(&path, lines.join("\n"))
            .map_err(|e| VesselError::Io { path, source: e })?;
    }
    tracing::debug!(pid, file, entries = maps.len(), "wrote ID map");
    Ok(())
}
