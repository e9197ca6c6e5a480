//! # vessel-cgroups
//!
//! Cgroup resource control for the vessel runtime (Linux only).
//!
//! The kernel exposes two incompatible control-group APIs: the legacy
//! layout with one hierarchy per controller, and the unified layout with a
//! single hierarchy for everything. This crate hides the difference behind
//! one [`registry::Subsystem`] contract — each controller knows how to
//! join a process, translate a [`vessel_common::types::Resources`] bag
//! into its control files, and report usage into the shared normalized
//! [`vessel_common::stats::Stats`] shape.
//!
//! The systemd-backed driver variant additionally shares one lazily
//! created D-Bus connection across all resource-control calls; its
//! lifecycle lives in [`systemd`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod fs;
pub mod fscommon;
pub mod registry;
pub mod systemd;
pub mod unified;
