//! # vessel-core
//!
//! Container bootstrap primitives for the vessel runtime (Linux only).
//!
//! This crate provides:
//! - **Synchronization channel**: the fixed-grammar wire protocol a
//!   controller process and its not-yet-privileged child stages speak while
//!   namespaces and ID maps are being set up.
//! - **ID mapping**: writing `uid_map`/`gid_map` directly or through the
//!   setuid helper binaries, with the `setgroups` hardening step.
//! - **Time namespace**: clock offset configuration for a cloned child.
//! - **Capabilities**: resolving symbolic capability names and applying the
//!   five kernel capability vectors before exec.
//! - **Environment**: sanitizing the environment handed to the payload.
//! - **Process**: the externally visible handle to the running container
//!   process (wait, signal, console acquisition).
//!
//! The ordering constraints between these pieces are security sensitive:
//! the synchronization channel exists precisely so that privileged
//! operations happen at well-defined points of the child's lifecycle.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod capability;
pub mod env;
pub mod process;
pub mod sync;
pub mod timens;
pub mod usermap;
