//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. Each (method, path)
//! pattern owns a stack of handlers in binding order: a request is offered to
//! each in turn until one responds or fails. If every handler passes, or
//! nothing matches, the answer is `404`. Failures go to one error pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use matchit::Router as MatchitRouter;
use serde::Serialize;
use tracing::error;

use crate::compose::Composer;
use crate::definition::RouteDefinition;
use crate::error::{Error, ErrorCode, FieldError};
use crate::handler::{BoxedHandler, Handler, Outcome};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::table::{Dispatcher, RouteTable};

/// Turns a request-time failure into the response the client sees.
pub type ErrorHandler = Arc<dyn Fn(&Error) -> Response + Send + Sync + 'static>;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Builder methods return `self` so registrations chain naturally.
pub struct Router {
    trees: HashMap<Method, MatchitRouter<usize>>,
    slots: HashMap<(Method, String), usize>,
    stacks: Vec<Vec<BoxedHandler>>,
    on_error: ErrorHandler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            slots: HashMap::new(),
            stacks: Vec::new(),
            on_error: Arc::new(render_error),
        }
    }

    /// Register a plain handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if the path is malformed or conflicts with an existing pattern.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.bind(method, path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("{e}"));
        self
    }

    /// Assemble `definitions` into a route table and bind it.
    pub fn mount<I>(mut self, definitions: I, composer: &Composer) -> Result<Self, Error>
    where
        I: IntoIterator<Item = RouteDefinition>,
    {
        RouteTable::assemble(definitions)?.bind(composer, &mut self)?;
        Ok(self)
    }

    /// Replace the error pipeline. The default is [`render_error`].
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) -> Response + Send + Sync + 'static,
    {
        self.on_error = Arc::new(handler);
        self
    }

    fn lookup(&self, method: Method, path: &str) -> Option<(&[BoxedHandler], HashMap<String, String>)> {
        let tree = self.trees.get(&method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((&self.stacks[*matched.value], params))
    }

    /// Route one request to a response.
    pub async fn handle(&self, mut req: Request) -> Response {
        let method = req.method();
        let path = req.path().to_owned();

        let Some((stack, params)) = self.lookup(method, &path) else {
            return Response::status(StatusCode::NOT_FOUND);
        };
        req.set_params(params);

        for handler in stack {
            match handler.call(req).await {
                Outcome::Respond(res) => return res,
                Outcome::Pass(back) => req = back,
                Outcome::Fail(err) => {
                    error!(%method, path = %path, error = %err, "request failed");
                    return (self.on_error)(&err);
                }
            }
        }

        Response::status(StatusCode::NOT_FOUND)
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl Dispatcher for Router {
    fn bind(&mut self, method: Method, path: &str, handler: BoxedHandler) -> Result<(), Error> {
        let key = (method, path.to_owned());
        if let Some(&slot) = self.slots.get(&key) {
            self.stacks[slot].push(handler);
            return Ok(());
        }

        let slot = self.stacks.len();
        self.trees
            .entry(method)
            .or_default()
            .insert(path, slot)
            .map_err(|e| Error::InvalidRoute { path: path.to_owned(), reason: e.to_string() })?;
        self.stacks.push(vec![handler]);
        self.slots.insert(key, slot);
        Ok(())
    }
}

// ── Error pipeline ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ValidationBody<'a> {
    code: ErrorCode,
    errors: &'a [FieldError],
}

/// Default error pipeline.
///
/// Validation failures become `400` with a JSON body
/// `{"code":"INVALID_PARAMETERS","errors":[…]}`; anything else is a bare `500`.
pub fn render_error(err: &Error) -> Response {
    match err.root() {
        Error::ValidationFailed { code, errors } => {
            match serde_json::to_vec(&ValidationBody { code: *code, errors }) {
                Ok(body) => Response::builder().status(StatusCode::BAD_REQUEST).json(body),
                Err(_) => Response::status(StatusCode::BAD_REQUEST),
            }
        }
        _ => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
