//! Declarative route definitions.
//!
//! A [`RouteDefinition`] is what an application writes: a path, the methods it
//! answers, a responder, and optionally a validator plus the names of the
//! conditionals and preloaders it depends on. Every field is optional while
//! the definition is being built so a loader can hand over whatever it found;
//! [`RouteDefinition::check`] turns it into a [`Route`] whose required fields
//! are guaranteed present.
//!
//! ```rust
//! use tollgate::{FieldError, Request, RouteDefinition};
//!
//! let def = RouteDefinition::new()
//!     .path("/admin/users/{id}")
//!     .method(["GET", "HEAD"])
//!     .conditions(["isAdmin"])
//!     .preload(["user"])
//!     .validate(|req: &Request| {
//!         let bad = req.param("id").is_some_and(|id| id.parse::<u64>().is_err());
//!         async move {
//!             if bad { vec![FieldError::new("id", "must be numeric")] } else { Vec::new() }
//!         }
//!     })
//!     .respond(|req: Request| async move {
//!         Ok::<_, std::io::Error>(req.preloaded().get("user").cloned().unwrap_or_default())
//!     });
//! assert!(def.check().is_ok());
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::{BoxError, Error, FieldError};
use crate::handler::{BoxFuture, IntoReply};
use crate::method::{Method, MethodSpec};
use crate::request::Request;
use crate::response::Response;

/// The route's final handler, normalized. `Ok(None)` declines the request.
pub type Responder = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<Option<Response>, BoxError>> + Send + Sync + 'static>;

/// A route's validator, normalized. Resolves to the field errors it found.
pub type Validator = Arc<dyn Fn(&Request) -> BoxFuture<'static, Vec<FieldError>> + Send + Sync + 'static>;

// ── RouteDefinition ──────────────────────────────────────────────────────────

/// A route as declared, before validation.
#[derive(Clone, Default)]
pub struct RouteDefinition {
    path: Option<String>,
    method: Option<MethodSpec>,
    respond: Option<Responder>,
    may_pass: bool,
    validate: Option<Validator>,
    conditions: Vec<String>,
    preload: Vec<String>,
    origin: Option<String>,
}

impl RouteDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for the three required fields.
    pub fn route<F, Fut, R>(method: impl Into<MethodSpec>, path: impl Into<String>, respond: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply + 'static,
    {
        Self::new().method(method).path(path).respond(respond)
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// One verb, `"ALL"`, or a list of verbs.
    pub fn method(mut self, method: impl Into<MethodSpec>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// The responder: receives the request (with preloaded data attached)
    /// and returns a response, or a `Result` whose error fails the request.
    /// Returning `Option::None` declines: the next handler bound under the
    /// same method and path gets the request as it arrived.
    pub fn respond<F, Fut, R>(mut self, respond: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply + 'static,
    {
        self.respond = Some(Arc::new(move |req: Request| -> BoxFuture<'static, Result<Option<Response>, BoxError>> {
            let fut = respond(req);
            Box::pin(async move { fut.await.into_reply() })
        }));
        self.may_pass = R::MAY_PASS;
        self
    }

    /// The validator: inspects the request and resolves to its field errors.
    /// An empty list means the request is valid.
    pub fn validate<F, Fut>(mut self, validate: F) -> Self
    where
        F: Fn(&Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<FieldError>> + Send + 'static,
    {
        self.validate = Some(Arc::new(move |req: &Request| -> BoxFuture<'static, Vec<FieldError>> {
            Box::pin(validate(req))
        }));
        self
    }

    /// Names of conditionals that must all hold for this route to apply.
    pub fn conditions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions = names.into_iter().map(Into::into).collect();
        self
    }

    /// Names of preloaders whose results the responder needs.
    pub fn preload<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preload = names.into_iter().map(Into::into).collect();
        self
    }

    /// Where this definition came from (file, module, manifest entry).
    /// Assembly errors are tagged with it.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn origin_id(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// Validate the definition.
    ///
    /// Checks, in order: `path` present and non-empty, `method` present,
    /// `respond` present ([`Error::MissingField`]), then every declared verb
    /// ([`Error::InvalidMethod`]). Errors carry the origin when one is set.
    pub fn check(self) -> Result<Route, Error> {
        let origin = self.origin.clone();
        self.check_fields().map_err(|e| match origin {
            Some(origin) => e.within(origin),
            None => e,
        })
    }

    fn check_fields(self) -> Result<Route, Error> {
        let path = self.path.filter(|p| !p.is_empty()).ok_or(Error::MissingField("path"))?;
        let method = self.method.ok_or(Error::MissingField("method"))?;
        let responder = self.respond.ok_or(Error::MissingField("respond"))?;
        let methods = method.resolve()?;

        Ok(Route {
            path,
            methods,
            responder,
            may_pass: self.may_pass,
            validator: self.validate,
            conditions: self.conditions,
            preload: self.preload,
            origin: self.origin,
        })
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("respond", &self.respond.is_some())
            .field("validate", &self.validate.is_some())
            .field("conditions", &self.conditions)
            .field("preload", &self.preload)
            .field("origin", &self.origin)
            .finish()
    }
}

// ── Route ────────────────────────────────────────────────────────────────────

/// A validated route definition.
pub struct Route {
    pub(crate) path: String,
    pub(crate) methods: Vec<Method>,
    pub(crate) responder: Responder,
    pub(crate) may_pass: bool,
    pub(crate) validator: Option<Validator>,
    pub(crate) conditions: Vec<String>,
    pub(crate) preload: Vec<String>,
    pub(crate) origin: Option<String>,
}

impl Route {
    pub fn path(&self) -> &str { &self.path }
    pub fn methods(&self) -> &[Method] { &self.methods }
    pub fn conditions(&self) -> &[String] { &self.conditions }
    pub fn preload(&self) -> &[String] { &self.preload }
    pub fn origin(&self) -> Option<&str> { self.origin.as_deref() }
    pub fn has_validator(&self) -> bool { self.validator.is_some() }
    /// Whether the responder can decline requests.
    pub fn may_pass(&self) -> bool { self.may_pass }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("conditions", &self.conditions)
            .field("preload", &self.preload)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
