//! Environment-driven settings.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `TOLLGATE_ADDR` | `0.0.0.0:3000` | Listen address |
//! | `TOLLGATE_PRELOAD_MODE` | `parallel` | `parallel` or `sequential` |
//!
//! ```rust,no_run
//! use tollgate::{Registry, Settings};
//!
//! let settings = Settings::from_env().expect("bad configuration");
//! settings.apply(&Registry::global());
//! ```

use std::env;
use std::net::SocketAddr;

use tracing::info;

use crate::error::Error;
use crate::preload::PreloadMode;
use crate::registry::Registry;

pub const ADDR_VAR: &str = "TOLLGATE_ADDR";
pub const PRELOAD_MODE_VAR: &str = "TOLLGATE_PRELOAD_MODE";

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Settings {
    pub addr: SocketAddr,
    pub preload_mode: PreloadMode,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup(ADDR_VAR).unwrap_or_else(|| DEFAULT_ADDR.to_owned());
        let addr = addr
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("{ADDR_VAR}: invalid socket address `{addr}`")))?;

        let preload_mode = match lookup(PRELOAD_MODE_VAR) {
            Some(raw) => raw.trim().parse()?,
            None => PreloadMode::default(),
        };

        Ok(Self { addr, preload_mode })
    }

    /// Set the registry's process-wide preload mode.
    pub fn apply(&self, registry: &Registry) {
        registry.set_preload_mode(self.preload_mode);
        info!(mode = %self.preload_mode, "preload mode set");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, Error> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.addr.port(), 3000);
        assert_eq!(s.preload_mode, PreloadMode::Parallel);
    }

    #[test]
    fn reads_both_variables() {
        let s = settings(&[(ADDR_VAR, "127.0.0.1:8080"), (PRELOAD_MODE_VAR, " sequential ")]).unwrap();
        assert_eq!(s.addr.port(), 8080);
        assert_eq!(s.preload_mode, PreloadMode::Sequential);
    }

    #[test]
    fn rejects_unknown_mode_and_bad_address() {
        assert!(matches!(settings(&[(PRELOAD_MODE_VAR, "eager")]), Err(Error::InvalidArgument(_))));
        assert!(matches!(settings(&[(ADDR_VAR, "localhost")]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn apply_sets_the_registry_mode() {
        let registry = Registry::new();
        settings(&[(PRELOAD_MODE_VAR, "sequential")]).unwrap().apply(&registry);
        assert_eq!(registry.preloaders().mode(), PreloadMode::Sequential);
    }
}
