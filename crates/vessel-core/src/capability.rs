//! Capability vector application for least-privilege exec.
//!
//! Symbolic `CAP_*` names are resolved through a process-wide, lazily
//! built, immutable lookup table. Unknown or kernel-unavailable names are
//! dropped with a single aggregated warning rather than failing, so
//! configurations stay portable across kernel versions. The kernel tracks
//! capability state per thread, so both appliers must run on the thread
//! that will exec the payload.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use capctl::{Cap, CapSet, CapState};
use vessel_common::error::{Result, VesselError};
use vessel_common::types::CapabilitiesSpec;

static CAP_TABLE: OnceLock<HashMap<String, Cap>> = OnceLock::new();

/// Returns the shared symbolic-name lookup table, built once.
fn cap_table() -> &'static HashMap<String, Cap> {
    CAP_TABLE.get_or_init(|| Cap::iter().map(|c| (format!("CAP_{c:?}"), c)).collect())
}

/// Returns every capability name this build knows about.
///
/// Used by introspection commands; the running kernel may support fewer.
#[must_use]
pub fn known_capabilities() -> Vec<String> {
    Cap::iter().map(|c| format!("CAP_{c:?}")).collect()
}

/// Resolved capability sets plus the thread's capability state handle.
#[derive(Debug)]
pub struct Caps {
    state: CapState,
    bounding: CapSet,
    effective: CapSet,
    inheritable: CapSet,
    permitted: CapSet,
    ambient: CapSet,
}

impl Caps {
    /// Resolves a declarative capability configuration.
    ///
    /// Unknown or unavailable names are dropped with one aggregated
    /// warning. Ambient entries not raised in the inheritable set are
    /// dropped with a separate warning: the kernel rejects such entries,
    /// and failing the whole configuration over them would break
    /// previously accepted configurations.
    ///
    /// # Errors
    ///
    /// Returns an error if the current thread's capability state cannot
    /// be read.
    pub fn new(spec: &CapabilitiesSpec) -> Result<Self> {
        let table = cap_table();
        let mut unknown: BTreeSet<String> = BTreeSet::new();

        let mut resolve = |names: &[String]| -> CapSet {
            let mut set = CapSet::empty();
            for name in names {
                match table.get(name.as_str()) {
                    Some(&cap) if cap.is_supported() => set.add(cap),
                    _ => {
                        let _ = unknown.insert(name.clone());
                    }
                }
            }
            set
        };

        let bounding = resolve(&spec.bounding);
        let effective = resolve(&spec.effective);
        let inheritable = resolve(&spec.inheritable);
        let permitted = resolve(&spec.permitted);
        let requested_ambient = resolve(&spec.ambient);

        // Ambient must be a subset of inheritable; anything else is
        // silently corrected, with a warning, for compatibility.
        let mut ambient = CapSet::empty();
        let mut ignored: BTreeSet<String> = BTreeSet::new();
        for cap in requested_ambient.iter() {
            if inheritable.has(cap) {
                ambient.add(cap);
            } else {
                let _ = ignored.insert(format!("CAP_{cap:?}"));
            }
        }
        if !ignored.is_empty() {
            tracing::warn!(
                capabilities = ?ignored,
                "ignoring ambient capabilities not raised in the inheritable set"
            );
        }
        if !unknown.is_empty() {
            tracing::warn!(
                capabilities = ?unknown,
                "ignoring unknown or unavailable capabilities"
            );
        }

        let state = CapState::get_current().map_err(|e| VesselError::Setup {
            message: format!("failed to read capability state: {e}"),
        })?;
        Ok(Self {
            state,
            bounding,
            effective,
            inheritable,
            permitted,
            ambient,
        })
    }

    /// Shrinks the bounding set to the configured allowlist.
    ///
    /// Run early, before the other sets, to lower the privilege ceiling
    /// first. The bounding set can only lose capabilities, so repeating
    /// this call is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if a capability cannot be dropped.
    pub fn apply_bounding_set(&self) -> Result<()> {
        for cap in Cap::iter() {
            if self.bounding.has(cap) {
                continue;
            }
            if capctl::bounding::read(cap) == Some(true) {
                capctl::bounding::drop(cap).map_err(|e| VesselError::Setup {
                    message: format!("failed to drop CAP_{cap:?} from bounding set: {e}"),
                })?;
            }
        }
        tracing::debug!("bounding set applied");
        Ok(())
    }

    /// Applies all five capability sets, immediately before exec.
    ///
    /// Order is fixed: bounding, permitted, inheritable, effective,
    /// ambient. Must run on the same OS thread that will exec.
    ///
    /// # Errors
    ///
    /// Returns an error if any kernel capability operation fails.
    pub fn apply_caps(&self) -> Result<()> {
        self.apply_bounding_set()?;

        let mut state = self.state;
        state.permitted = self.permitted;
        state.inheritable = self.inheritable;
        state.effective = self.effective;
        state.set_current().map_err(|e| VesselError::Setup {
            message: format!("failed to set capability state: {e}"),
        })?;

        capctl::ambient::clear().map_err(|e| VesselError::Setup {
            message: format!("failed to clear ambient set: {e}"),
        })?;
        for cap in self.ambient.iter() {
            capctl::ambient::raise(cap).map_err(|e| VesselError::Setup {
                message: format!("failed to raise CAP_{cap:?} in ambient set: {e}"),
            })?;
        }
        tracing::debug!("capability sets applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::layer::{Context, Layer};
    use tracing_subscriber::prelude::*;

    use super::*;

    fn names(entries: &[&str]) -> Vec<String> {
        entries.iter().map(ToString::to_string).collect()
    }

    /// Records every warn-level event emitted while a closure runs.
    #[derive(Clone, Default)]
    struct WarningCollector {
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl WarningCollector {
        fn capture(f: impl FnOnce()) -> Vec<String> {
            let collector = Self::default();
            let subscriber = tracing_subscriber::registry().with(collector.clone());
            tracing::subscriber::with_default(subscriber, f);
            let messages = collector.messages.lock().unwrap();
            messages.clone()
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for WarningCollector {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                let mut rendered = String::new();
                event.record(&mut |field: &tracing::field::Field,
                                   value: &dyn std::fmt::Debug| {
                    use std::fmt::Write;
                    let _ = write!(rendered, "{field}={value:?} ");
                });
                self.messages.lock().unwrap().push(rendered);
            }
        }
    }

    #[test]
    fn known_capabilities_use_kernel_names() {
        let known = known_capabilities();
        assert!(known.contains(&"CAP_CHOWN".to_string()));
        assert!(known.contains(&"CAP_SYS_ADMIN".to_string()));
        assert!(known.iter().all(|n| n.starts_with("CAP_")));
    }

    #[test]
    fn unknown_name_is_dropped_from_every_set() {
        let spec = CapabilitiesSpec {
            bounding: names(&["CAP_CHOWN", "CAP_NOT_A_REAL_CAP"]),
            effective: names(&["CAP_NOT_A_REAL_CAP"]),
            inheritable: names(&["CAP_NOT_A_REAL_CAP"]),
            permitted: names(&["CAP_NOT_A_REAL_CAP"]),
            ambient: names(&["CAP_NOT_A_REAL_CAP"]),
        };
        let caps = Caps::new(&spec).unwrap();
        assert!(caps.bounding.has(Cap::CHOWN));
        assert_eq!(caps.bounding.iter().count(), 1);
        assert_eq!(caps.effective.iter().count(), 0);
        assert_eq!(caps.inheritable.iter().count(), 0);
        assert_eq!(caps.permitted.iter().count(), 0);
        assert_eq!(caps.ambient.iter().count(), 0);
    }

    #[test]
    fn ambient_outside_inheritable_is_dropped() {
        let spec = CapabilitiesSpec {
            inheritable: names(&["CAP_CHOWN"]),
            ambient: names(&["CAP_CHOWN", "CAP_KILL"]),
            ..CapabilitiesSpec::default()
        };
        let caps = Caps::new(&spec).unwrap();
        assert!(caps.ambient.has(Cap::CHOWN));
        assert!(!caps.ambient.has(Cap::KILL));
        // The resulting ambient set is always a subset of inheritable.
        assert!(caps.ambient.iter().all(|c| caps.inheritable.has(c)));
    }

    #[test]
    fn empty_spec_resolves_to_empty_sets() {
        let caps = Caps::new(&CapabilitiesSpec::default()).unwrap();
        assert_eq!(caps.bounding.iter().count(), 0);
        assert_eq!(caps.ambient.iter().count(), 0);
    }

    #[test]
    fn unknown_names_produce_exactly_one_warning() {
        let spec = CapabilitiesSpec {
            bounding: names(&["CAP_CHOWN", "CAP_NOT_A_REAL_CAP", "CAP_ALSO_FAKE"]),
            effective: names(&["CAP_NOT_A_REAL_CAP"]),
            ..CapabilitiesSpec::default()
        };
        let warnings = WarningCollector::capture(|| {
            let _ = Caps::new(&spec).unwrap();
        });
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("CAP_NOT_A_REAL_CAP"));
        assert!(warnings[0].contains("CAP_ALSO_FAKE"));
    }

    #[test]
    fn fully_valid_spec_warns_about_nothing() {
        let spec = CapabilitiesSpec {
            bounding: names(&["CAP_CHOWN"]),
            inheritable: names(&["CAP_CHOWN"]),
            ambient: names(&["CAP_CHOWN"]),
            ..CapabilitiesSpec::default()
        };
        let warnings = WarningCollector::capture(|| {
            let _ = Caps::new(&spec).unwrap();
        });
        assert!(warnings.is_empty());
    }

    #[test]
    fn repeated_bounding_application_leaves_the_set_unchanged() {
        // A bounding spec equal to the thread's current bounding set drops
        // nothing, so this runs unprivileged.
        let current = capctl::bounding::probe();
        let spec = CapabilitiesSpec {
            bounding: current.iter().map(|c| format!("CAP_{c:?}")).collect(),
            ..CapabilitiesSpec::default()
        };
        let caps = Caps::new(&spec).unwrap();
        caps.apply_bounding_set().unwrap();
        assert_eq!(capctl::bounding::probe(), current);
        caps.apply_bounding_set().unwrap();
        assert_eq!(capctl::bounding::probe(), current);
    }
}
