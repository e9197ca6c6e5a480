//! Externally visible handle to a running container process.
//!
//! The handle is created by the lifecycle manager once the bootstrap
//! handshake has reported the real container PID; waiting, signalling,
//! and console acquisition all go through it.

use std::os::fd::OwnedFd;
use std::sync::mpsc::Receiver;

use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;
use vessel_common::error::{Result, VesselError};

/// Standard I/O descriptors plumbed into the container process.
#[derive(Debug, Default)]
pub struct ProcessIo {
    /// Write end feeding the process's stdin.
    pub stdin: Option<OwnedFd>,
    /// Read end of the process's stdout.
    pub stdout: Option<OwnedFd>,
    /// Read end of the process's stderr.
    pub stderr: Option<OwnedFd>,
}

/// Handle to the container's init process.
#[derive(Debug)]
pub struct Process {
    pid: Pid,
    console_rx: Option<Receiver<OwnedFd>>,
}

impl Process {
    /// Creates a handle for a reported PID.
    #[must_use]
    pub fn new(pid: u32) -> Self {
        Self {
            pid: to_pid(pid),
            console_rx: None,
        }
    }

    /// Creates a handle that can also receive a console master fd from
    /// the bootstrap stages.
    #[must_use]
    pub fn with_console(pid: u32, console_rx: Receiver<OwnedFd>) -> Self {
        Self {
            pid: to_pid(pid),
            console_rx: Some(console_rx),
        }
    }

    /// Returns the process ID.
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    /// Blocks until the process exits and reaps it.
    ///
    /// # Errors
    ///
    /// Returns an error if `waitpid` fails (for instance when the process
    /// was already reaped elsewhere).
    pub fn wait(&self) -> Result<WaitStatus> {
        waitpid(self.pid, None).map_err(|e| VesselError::Setup {
            message: format!("failed to wait for pid {}: {e}", self.pid),
        })
    }

    /// Sends a signal to the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the `kill` syscall fails.
    pub fn signal(&self, sig: Signal) -> Result<()> {
        kill(self.pid, sig).map_err(|e| VesselError::Setup {
            message: format!("failed to signal pid {}: {e}", self.pid),
        })
    }

    /// Receives the pseudo-terminal master descriptor sent by the
    /// bootstrap stages.
    ///
    /// # Errors
    ///
    /// Returns an error if no console was configured for this process or
    /// the sending side closed without delivering one.
    pub fn console(&self) -> Result<OwnedFd> {
        let Some(rx) = &self.console_rx else {
            return Err(VesselError::InvalidConfig {
                message: "process has no console configured".into(),
            });
        };
        rx.recv().map_err(|_| VesselError::Setup {
            message: "console channel closed before a terminal was delivered".into(),
        })
    }
}

/// Reported PIDs arrive as unsigned 32-bit values on the wire; kernel
/// PIDs always fit in `i32`.
#[allow(clippy::cast_possible_wrap)]
const fn to_pid(pid: u32) -> Pid {
    Pid::from_raw(pid as i32)
}
