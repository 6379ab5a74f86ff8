//! The conditional and preloader registries, bundled.
//!
//! Production code registers everything on [`Registry::global`] during start-up,
//! before the server accepts traffic. Tests build their own isolated
//! [`Registry::new`] so registrations never leak between them. Neither form
//! offers removal.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::conditional::Conditionals;
use crate::error::{BoxError, Error};
use crate::preload::{PreloadMode, Preloaders};
use crate::request::Request;

#[derive(Default)]
pub struct Registry {
    conditionals: Conditionals,
    preloaders: Preloaders,
}

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

impl Registry {
    /// An empty registry, independent of the process-wide one.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The process-wide registry, created empty on first use.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(Registry::new))
    }

    pub fn conditionals(&self) -> &Conditionals {
        &self.conditionals
    }

    pub fn preloaders(&self) -> &Preloaders {
        &self.preloaders
    }

    /// Shorthand for [`Conditionals::register`].
    pub fn conditional<F>(&self, name: impl Into<String>, predicate: F) -> Result<&Self, Error>
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.conditionals.register(name, predicate)?;
        Ok(self)
    }

    /// Shorthand for [`Preloaders::register`].
    pub fn preloader<F, Fut, T, E>(&self, name: impl Into<String>, fetch: F) -> Result<&Self, Error>
    where
        F: Fn(&Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Into<Value> + 'static,
        E: Into<BoxError> + 'static,
    {
        self.preloaders.register(name, fetch)?;
        Ok(self)
    }

    pub fn set_preload_mode(&self, mode: PreloadMode) {
        self.preloaders.set_mode(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_are_isolated() {
        let a = Registry::new();
        let b = Registry::new();
        a.conditional("isAdmin", |_: &Request| true).unwrap();

        assert!(a.conditionals().contains("isAdmin"));
        assert!(!b.conditionals().contains("isAdmin"));
        b.conditional("isAdmin", |_: &Request| false).unwrap();
    }

    #[test]
    fn global_is_shared() {
        let first = Registry::global();
        let second = Registry::global();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn registrations_chain() {
        let registry = Registry::new();
        registry
            .conditional("a", |_: &Request| true)
            .and_then(|r| r.preloader("b", |_: &Request| async { Ok::<_, BoxError>("x") }))
            .unwrap();
        assert!(registry.preloaders().contains("b"));
        assert_eq!(registry.preloaders().mode(), PreloadMode::Parallel);
    }
}
