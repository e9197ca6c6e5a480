//! # vessel-common
//!
//! Shared types, error definitions, resource models, and constants used
//! across the vessel workspace.
//!
//! This crate is the leaf of the dependency graph — it depends on no other
//! internal crate and provides the foundational primitives that the
//! bootstrap and cgroup crates build upon.
//!
//! Everything in here describes Linux kernel interfaces (user namespaces,
//! control groups, capability vectors); the types are portable but only
//! meaningful on Linux.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod constants;
pub mod error;
pub mod stats;
pub mod types;
