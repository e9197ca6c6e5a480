//! Shared D-Bus connection lifecycle for the systemd cgroup driver.
//!
//! Every systemd-driven cgroup operation goes through one bus connection.
//! The connection is created lazily on first use, shared behind an `Arc`,
//! and replaced at most once when a call fails because the bus went away
//! (a daemon restart, typically). Losing the reconnect race to another
//! thread is fine: whoever wins installs the new connection and everyone
//! else picks it up on the next call.

use std::sync::{Arc, PoisonError, RwLock};

use vessel_common::error::{Result, VesselError};

/// A lazily initialized, shared, resettable handle.
///
/// Readers take the cheap path; initialization takes the write lock and
/// re-checks, so concurrent first calls still observe a single identity.
pub struct SharedHandle<T> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedHandle<T> {
    /// Creates an empty handle.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Returns the cached value, initializing it through `init` exactly
    /// once under contention.
    ///
    /// # Errors
    ///
    /// Propagates the initializer's error; the slot stays empty so a
    /// later call can retry.
    pub fn get_or_init(&self, init: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        {
            let guard = self
                .slot
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = guard.as_ref() {
                return Ok(Arc::clone(value));
            }
        }
        let mut guard = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // A racing thread may have initialized while we waited.
        if let Some(value) = guard.as_ref() {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(init()?);
        *guard = Some(Arc::clone(&value));
        Ok(value)
    }

    /// Clears the cache, but only if `stale` is the currently cached
    /// value. A handle replaced by another thread is left alone.
    pub fn reset_if(&self, stale: &Arc<T>) {
        let mut guard = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().is_some_and(|v| Arc::ptr_eq(v, stale)) {
            *guard = None;
        }
    }
}

/// Manages the bus connection used by the systemd driver.
///
/// The bus flavor is fixed at construction: rootless containers talk to
/// the per-user session instance, everything else to the system instance.
pub struct DbusConnManager {
    rootless: bool,
    handle: SharedHandle<zbus::blocking::Connection>,
}

impl DbusConnManager {
    /// Creates a manager for the given privilege mode.
    #[must_use]
    pub const fn new(rootless: bool) -> Self {
        Self {
            rootless,
            handle: SharedHandle::new(),
        }
    }

    /// Returns the shared connection, dialing the bus on first use.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::Connection`] if the bus cannot be reached.
    pub fn get_connection(&self) -> Result<Arc<zbus::blocking::Connection>> {
        self.handle.get_or_init(|| {
            let conn = if self.rootless {
                zbus::blocking::Connection::session()
            } else {
                zbus::blocking::Connection::system()
            };
            conn.map_err(|e| VesselError::Connection {
                message: format!("failed to connect to D-Bus: {e}"),
            })
        })
    }

    /// Drops the cached connection if `conn` is still the cached one.
    pub fn reset_connection(&self, conn: &Arc<zbus::blocking::Connection>) {
        self.handle.reset_if(conn);
    }

    /// Handles a failed bus call: if `err` indicates the connection is
    /// gone, drops it and dials once. A failed redial is logged and
    /// swallowed — the next operation will retry from scratch.
    pub fn check_and_reconnect(&self, conn: &Arc<zbus::blocking::Connection>, err: &zbus::Error) {
        if !is_connection_closed(err) {
            return;
        }
        self.reset_connection(conn);
        if let Err(e) = self.get_connection() {
            tracing::warn!(error = %e, "failed to re-establish D-Bus connection");
        }
    }
}

/// Whether a bus error means the underlying connection is unusable.
fn is_connection_closed(err: &zbus::Error) -> bool {
    matches!(err, zbus::Error::InputOutput(_))
}
