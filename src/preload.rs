//! Named asynchronous data preloaders and their orchestration.
//!
//! A preloader fetches one piece of data for a request (the current user, the
//! resource named in the path, …) and is registered under a unique name. A
//! route lists the preloaders it needs; before its responder runs, the
//! orchestrator executes them and attaches the results to the request as
//! [`PreloadedData`], keyed by preloader name.
//!
//! How the listed preloaders run is a process-wide choice ([`PreloadMode`]):
//!
//! - **Parallel**: all of them at once; the first failure wins.
//! - **Sequential**: one at a time in list order; each resolves before the
//!   next is even called, and the first failure stops the run.
//!
//! The mode never changes the shape of the result. There is no timeout: a
//! preloader that never resolves stalls its request.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures::FutureExt;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{BoxError, Error, Registrant};
use crate::handler::{BoxFuture, panic_message};
use crate::request::Request;

/// A registered preloader, normalized to "request in, value or error out".
///
/// The returned future is `'static`: copy what you need out of the request
/// before the `async move` block.
pub type Preloader = Arc<dyn Fn(&Request) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync + 'static>;

// ── PreloadMode ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PreloadMode {
    #[default]
    Parallel,
    Sequential,
}

impl PreloadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }
}

/// Accepts `parallel` or `sequential`, case-insensitively.
impl FromStr for PreloadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("parallel") {
            Ok(Self::Parallel)
        } else if s.eq_ignore_ascii_case("sequential") {
            Ok(Self::Sequential)
        } else {
            Err(Error::InvalidArgument(format!(
                "preload mode must be `parallel` or `sequential`, got `{s}`"
            )))
        }
    }
}

impl fmt::Display for PreloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── PreloadedData ────────────────────────────────────────────────────────────

/// Preloader results for one request, keyed by preloader name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreloadedData(HashMap<String, Value>);

impl PreloadedData {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Deserialize one result into a concrete type.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.0.get(name).and_then(|v| T::deserialize(v).ok())
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_inner(self) -> HashMap<String, Value> {
        self.0
    }
}

impl FromIterator<(String, Value)> for PreloadedData {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ── Preloaders ───────────────────────────────────────────────────────────────

/// Name → preloader registry, plus the process-wide orchestration mode.
#[derive(Default)]
pub struct Preloaders {
    entries: RwLock<HashMap<String, Preloader>>,
    sequential: AtomicBool,
}

impl Preloaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fetch` under `name`.
    ///
    /// `fetch` receives the request and returns a future resolving to any
    /// value convertible into JSON, or an error. Fails with
    /// [`Error::InvalidArgument`] for an empty name and with
    /// [`Error::DuplicateRegistration`] if the name is taken.
    ///
    /// ```rust
    /// use tollgate::{Preloaders, Request};
    ///
    /// let preloaders = Preloaders::new();
    /// preloaders
    ///     .register("user", |req: &Request| {
    ///         let id = req.param("id").unwrap_or_default().to_owned();
    ///         async move { Ok::<_, std::io::Error>(format!("user-{id}")) }
    ///     })
    ///     .unwrap();
    /// ```
    pub fn register<F, Fut, T, E>(&self, name: impl Into<String>, fetch: F) -> Result<(), Error>
    where
        F: Fn(&Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Into<Value> + 'static,
        E: Into<BoxError> + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("preloader name must not be empty".into()));
        }

        let preloader: Preloader = Arc::new(move |req: &Request| -> BoxFuture<'static, Result<Value, BoxError>> {
            let fut = fetch(req);
            Box::pin(async move { fut.await.map(Into::into).map_err(Into::into) })
        });

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&name) {
            return Err(Error::DuplicateRegistration { kind: Registrant::Preloader, name });
        }
        entries.insert(name, preloader);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    pub fn set_mode(&self, mode: PreloadMode) {
        self.sequential.store(mode == PreloadMode::Sequential, Ordering::Release);
    }

    pub fn mode(&self) -> PreloadMode {
        if self.sequential.load(Ordering::Acquire) {
            PreloadMode::Sequential
        } else {
            PreloadMode::Parallel
        }
    }

    /// Look up every name before anything runs.
    fn resolve(&self, names: &[String]) -> Result<Vec<(String, Preloader)>, Error> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        names
            .iter()
            .map(|name| {
                entries
                    .get(name)
                    .map(|p| (name.clone(), Arc::clone(p)))
                    .ok_or_else(|| Error::UnknownPreloader(name.clone()))
            })
            .collect()
    }

    /// Run the preloaders named in `names` for `req` under the current mode.
    ///
    /// Fails with [`Error::UnknownPreloader`] before running anything if a
    /// name is unregistered, and with [`Error::PreloadFailed`] for the first
    /// preloader that fails or panics. Partial results are never returned.
    pub async fn orchestrate(&self, names: &[String], req: &Request) -> Result<PreloadedData, Error> {
        let resolved = self.resolve(names)?;
        if resolved.is_empty() {
            return Ok(PreloadedData::default());
        }

        let mode = self.mode();
        let started = Instant::now();
        let data: PreloadedData = match mode {
            PreloadMode::Parallel => {
                let pending = resolved.into_iter().map(|(name, preloader)| run(name, preloader, req));
                try_join_all(pending).await?.into_iter().collect()
            }
            PreloadMode::Sequential => {
                let mut data = HashMap::with_capacity(resolved.len());
                for (name, preloader) in resolved {
                    let (name, value) = run(name, preloader, req).await?;
                    data.insert(name, value);
                }
                PreloadedData(data)
            }
        };

        debug!(%mode, count = names.len(), elapsed_ms = started.elapsed().as_millis() as u64, "preloaded");
        Ok(data)
    }
}

async fn run(name: String, preloader: Preloader, req: &Request) -> Result<(String, Value), Error> {
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| preloader(req))) {
        Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
        Err(panic) => Err(panic),
    };
    match outcome {
        Ok(Ok(value)) => Ok((name, value)),
        Ok(Err(source)) => Err(Error::PreloadFailed { name, source }),
        Err(panic) => Err(Error::PreloadFailed { name, source: panic_message(panic).into() }),
    }
}
