//! Named request gates.
//!
//! A conditional is a predicate over the request registered under a unique
//! name. Routes list conditional names; the route only applies to a request
//! when every listed predicate holds. Entries are never replaced or removed.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Error, Registrant};
use crate::handler::panic_message;
use crate::request::Request;

/// A registered gate.
pub type Predicate = Arc<dyn Fn(&Request) -> bool + Send + Sync + 'static>;

/// Name → predicate registry.
#[derive(Default)]
pub struct Conditionals {
    entries: RwLock<HashMap<String, Predicate>>,
}

impl Conditionals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `predicate` under `name`.
    ///
    /// Fails with [`Error::InvalidArgument`] for an empty name and with
    /// [`Error::DuplicateRegistration`] if the name is taken.
    pub fn register<F>(&self, name: impl Into<String>, predicate: F) -> Result<(), Error>
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("conditional name must not be empty".into()));
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&name) {
            return Err(Error::DuplicateRegistration { kind: Registrant::Conditional, name });
        }
        entries.insert(name, Arc::new(predicate));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Predicate> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    /// Evaluate `names` against `req`, in order.
    ///
    /// Stops at the first predicate that does not hold; later ones are never
    /// called. An empty list always passes. A name that was never registered
    /// fails with [`Error::UnknownConditional`] when it is reached, and a
    /// predicate that panics with [`Error::ConditionFailed`].
    pub fn evaluate(&self, names: &[String], req: &Request) -> Result<bool, Error> {
        for name in names {
            let predicate = self
                .get(name)
                .ok_or_else(|| Error::UnknownConditional(name.clone()))?;
            let held = panic::catch_unwind(AssertUnwindSafe(|| predicate(req))).map_err(|panic| {
                Error::ConditionFailed { name: name.clone(), source: panic_message(panic).into() }
            })?;
            if !held {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
