//! Environment sanitization for the exec step.
//!
//! The sanitized environment is an explicit value threaded through to the
//! spawn call; nothing here mutates the controller's own process-wide
//! environment as a side channel.

use vessel_common::error::{Result, VesselError};

/// A validated, deduplicated environment for the new process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedEnv {
    /// `KEY=value` entries, one per key, original order preserved.
    pub vars: Vec<String>,
    /// Whether `HOME` was present (callers fill in a fallback otherwise).
    pub home_set: bool,
    /// Effective `PATH` value, used for payload binary lookup.
    pub path: Option<String>,
}

/// Checks the supplied environment for validity and removes duplicates,
/// keeping the last value for each key.
///
/// # Errors
///
/// Returns an error for entries without `=`, with an empty name, or
/// containing a NUL byte.
pub fn prepare_env(env: &[String]) -> Result<SanitizedEnv> {
    // Construct the output in reverse so the last occurrence of each key
    // survives, then restore the original order.
    let mut out: Vec<&String> = Vec::with_capacity(env.len());
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for kv in env.iter().rev() {
        let Some(eq) = kv.find('=') else {
            return Err(VesselError::InvalidConfig {
                message: format!("invalid environment variable {kv:?}: missing '='"),
            });
        };
        if eq == 0 {
            return Err(VesselError::InvalidConfig {
                message: format!("invalid environment variable {kv:?}: name cannot be empty"),
            });
        }
        let key = &kv[..eq];
        if kv.contains('\0') {
            return Err(VesselError::InvalidConfig {
                message: format!("invalid environment variable {key:?}: contains nul byte"),
            });
        }
        if !seen.insert(key) {
            continue;
        }
        out.push(kv);
    }
    out.reverse();

    let path = out
        .iter()
        .find_map(|kv| kv.strip_prefix("PATH=").map(ToString::to_string));
    let home_set = seen.contains("HOME");
    Ok(SanitizedEnv {
        vars: out.into_iter().cloned().collect(),
        home_set,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(entries: &[&str]) -> Vec<String> {
        entries.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn last_duplicate_wins_and_order_is_preserved() {
        let sanitized =
            prepare_env(&env(&["A=1", "B=2", "A=3", "C=4"])).unwrap();
        assert_eq!(sanitized.vars, env(&["B=2", "A=3", "C=4"]));
    }

    #[test]
    fn missing_equals_is_rejected() {
        assert!(prepare_env(&env(&["NOVALUE"])).is_err());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(prepare_env(&env(&["=oops"])).is_err());
    }

    #[test]
    fn nul_byte_is_rejected() {
        assert!(prepare_env(&env(&["A=b\0c"])).is_err());
    }

    #[test]
    fn home_flag_reflects_presence() {
        assert!(prepare_env(&env(&["HOME=/root"])).unwrap().home_set);
        assert!(!prepare_env(&env(&["A=1"])).unwrap().home_set);
    }

    #[test]
    fn path_value_is_surfaced() {
        let sanitized =
            prepare_env(&env(&["PATH=/old", "PATH=/usr/bin:/bin"])).unwrap();
        assert_eq!(sanitized.path.as_deref(), Some("/usr/bin:/bin"));
    }

    #[test]
    fn empty_environment_is_valid() {
        let sanitized = prepare_env(&[]).unwrap();
        assert!(sanitized.vars.is_empty());
        assert!(!sanitized.home_set);
        assert_eq!(sanitized.path, None);
    }
}
