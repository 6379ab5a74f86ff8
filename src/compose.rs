//! Handler composition: one execution chain per route.
//!
//! ```text
//! gate ──false──▶ Outcome::Pass(req)
//!  │ true
//! validate ──errors──▶ Outcome::Fail(ValidationFailed)
//!  │ ok
//! preload ──error──▶ Outcome::Fail(UnknownPreloader | PreloadFailed)
//!  │ ok
//! respond ──error / panic──▶ Outcome::Fail(RespondFailed)
//!  │ ok                 └─None──▶ Outcome::Pass(req as it arrived)
//! Outcome::Respond(res)
//! ```
//!
//! Each step runs only if the previous one succeeded, and every request
//! produces exactly one outcome. A panic in any user callback (predicate,
//! validator, extractor, preloader, responder) is caught and reported as
//! that step's failure.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;

use crate::definition::Route;
use crate::error::{Error, FieldError};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Outcome, panic_message};
use crate::registry::Registry;
use crate::request::Request;

/// The host's validation-error extraction capability: given the request after
/// the validation step, the field errors to report, or `None`.
pub type Extractor = Arc<dyn Fn(&Request) -> Option<Vec<FieldError>> + Send + Sync + 'static>;

/// Builds route handlers that close over one [`Registry`].
#[derive(Clone)]
pub struct Composer {
    registry: Arc<Registry>,
    extractor: Extractor,
}

impl Composer {
    /// A composer reading errors recorded on the request
    /// ([`Request::validation_errors`]).
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry, extractor: Arc::new(recorded_errors) }
    }

    /// Replace the validation-error extraction capability.
    pub fn with_extractor<F>(mut self, extract: F) -> Self
    where
        F: Fn(&Request) -> Option<Vec<FieldError>> + Send + Sync + 'static,
    {
        self.extractor = Arc::new(extract);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Build the handler for `route`.
    pub fn compose(&self, route: Route) -> BoxedHandler {
        Arc::new(RouteHandler {
            route: Arc::new(route),
            registry: Arc::clone(&self.registry),
            extractor: Arc::clone(&self.extractor),
        })
    }
}

fn recorded_errors(req: &Request) -> Option<Vec<FieldError>> {
    let errors = req.validation_errors();
    (!errors.is_empty()).then(|| errors.to_vec())
}

#[derive(Clone)]
struct RouteHandler {
    route: Arc<Route>,
    registry: Arc<Registry>,
    extractor: Extractor,
}

impl ErasedHandler for RouteHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome> {
        let this = self.clone();
        Box::pin(async move { this.run(req).await })
    }
}

impl RouteHandler {
    async fn run(self, mut req: Request) -> Outcome {
        let route = &*self.route;

        match self.registry.conditionals().evaluate(&route.conditions, &req) {
            Ok(true) => {}
            Ok(false) => {
                debug!(path = %route.path, "conditions not met, passing");
                return Outcome::Pass(req);
            }
            Err(e) => return Outcome::Fail(e),
        }

        // Handed to the next handler if the responder declines.
        let arrived = route.may_pass.then(|| req.clone());

        if let Some(validate) = &route.validator {
            let checked = match panic::catch_unwind(AssertUnwindSafe(|| validate(&req))) {
                Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
                Err(panic) => Err(panic),
            };
            match checked {
                Ok(errors) => req.record_validation_errors(errors),
                Err(panic) => return Outcome::Fail(Error::ValidateFailed(panic_message(panic).into())),
            }
        }
        match panic::catch_unwind(AssertUnwindSafe(|| (self.extractor)(&req))) {
            Ok(Some(errors)) if !errors.is_empty() => return Outcome::Fail(Error::validation(errors)),
            Ok(_) => {}
            Err(panic) => return Outcome::Fail(Error::ValidateFailed(panic_message(panic).into())),
        }

        let preloaded = self.registry.preloaders().orchestrate(&route.preload, &req).await;
        match preloaded {
            Ok(data) => req.set_preloaded(data),
            Err(e) => return Outcome::Fail(e),
        }

        let respond = Arc::clone(&route.responder);
        match AssertUnwindSafe(async move { respond(req).await }).catch_unwind().await {
            Ok(Ok(Some(res))) => Outcome::Respond(res),
            Ok(Ok(None)) => match arrived {
                Some(req) => {
                    debug!(path = %route.path, "responder declined, passing");
                    Outcome::Pass(req)
                }
                None => Outcome::Fail(Error::RespondFailed("responder declined without a request to pass on".into())),
            },
            Ok(Err(e)) => Outcome::Fail(Error::RespondFailed(e)),
            Err(panic) => Outcome::Fail(Error::RespondFailed(panic_message(panic).into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::definition::RouteDefinition;
    use crate::error::{BoxError, ErrorCode};
    use crate::method::Method;
    use crate::response::Response;

    fn compose(registry: &Arc<Registry>, def: RouteDefinition) -> BoxedHandler {
        Composer::new(Arc::clone(registry)).compose(def.check().unwrap())
    }

    fn counting_responder(calls: &Arc<AtomicUsize>) -> impl Fn(Request) -> futures::future::Ready<Response> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move |_req| {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Response::text("done"))
        }
    }

    fn with_admin_gate() -> Arc<Registry> {
        let registry = Registry::new();
        registry
            .conditional("isAdmin", |req: &Request| req.header("x-role") == Some("admin"))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn failed_gate_passes_without_responding() {
        let registry = with_admin_gate();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = compose(
            &registry,
            RouteDefinition::route("GET", "/admin", counting_responder(&calls)).conditions(["isAdmin"]),
        );

        let outcome = handler.call(Request::new(Method::Get, "/admin")).await;
        assert!(outcome.is_pass());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let req = Request::new(Method::Get, "/admin").with_header("x-role", "admin");
        let res = handler.call(req).await.into_response().unwrap();
        assert_eq!(res.body(), b"done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gated_out_route_never_validates_or_preloads() {
        let registry = with_admin_gate();
        let touched = Arc::new(AtomicUsize::new(0));
        let (v, p) = (Arc::clone(&touched), Arc::clone(&touched));
        registry
            .preloader("user", move |_: &Request| {
                p.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, BoxError>("alice") }
            })
            .unwrap();
        let handler = compose(
            &registry,
            RouteDefinition::route("GET", "/", |_req: Request| async { "x" })
                .conditions(["isAdmin"])
                .preload(["user"])
                .validate(move |_: &Request| {
                    v.fetch_add(1, Ordering::SeqCst);
                    async { Vec::new() }
                }),
        );

        assert!(handler.call(Request::new(Method::Get, "/")).await.is_pass());
        assert_eq!(touched.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_conditional_fails_the_request() {
        let handler = compose(
            &Registry::new(),
            RouteDefinition::route("GET", "/", |_req: Request| async { "x" }).conditions(["ghost"]),
        );
        let err = handler.call(Request::new(Method::Get, "/")).await.into_error().unwrap();
        assert!(matches!(err, Error::UnknownConditional(ref n) if n == "ghost"));
    }

    #[tokio::test]
    async fn validation_errors_stop_before_respond() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = compose(
            &registry,
            RouteDefinition::route("POST", "/users", counting_responder(&calls)).validate(|req: &Request| {
                let empty = req.body().is_empty();
                async move {
                    if empty { vec![FieldError::new("body", "required")] } else { Vec::new() }
                }
            }),
        );

        let err = handler.call(Request::new(Method::Post, "/users")).await.into_error().unwrap();
        assert_eq!(err.code(), Some(ErrorCode::InvalidParameters));
        assert_eq!(err.field_errors(), [FieldError::new("body", "required")]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let ok = handler.call(Request::new(Method::Post, "/users").with_body("{}")).await;
        assert!(ok.into_response().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_recorded_by_the_host_are_reported() {
        let handler = compose(
            &Registry::new(),
            RouteDefinition::route("GET", "/", |_req: Request| async { "x" }),
        );
        let mut req = Request::new(Method::Get, "/");
        req.reject(FieldError::new("q", "too short"));

        let err = handler.call(req).await.into_error().unwrap();
        assert_eq!(err.field_errors().len(), 1);
    }

    #[tokio::test]
    async fn custom_extractor_replaces_the_default() {
        let def = RouteDefinition::route("GET", "/", |_req: Request| async { "x" })
            .validate(|_: &Request| async { vec![FieldError::new("ignored", "by extractor")] });
        let handler = Composer::new(Registry::new())
            .with_extractor(|req: &Request| {
                req.header("x-bad").map(|_| vec![FieldError::new("x-bad", "present")])
            })
            .compose(def.check().unwrap());

        assert!(handler.call(Request::new(Method::Get, "/")).await.into_response().is_some());
        let bad = Request::new(Method::Get, "/").with_header("x-bad", "1");
        let err = handler.call(bad).await.into_error().unwrap();
        assert_eq!(err.field_errors()[0].field, "x-bad");
    }

    #[tokio::test]
    async fn preloaded_data_reaches_the_responder() {
        let registry = Registry::new();
        registry
            .preloader("user", |req: &Request| {
                let id = req.param("id").unwrap_or_default().to_owned();
                async move { Ok::<_, BoxError>(json!({ "id": id, "name": "alice" })) }
            })
            .unwrap();
        let handler = compose(
            &registry,
            RouteDefinition::route("GET", "/users/{id}", |req: Request| async move {
                req.preloaded().get("user").cloned().ok_or("no user")
            })
            .preload(["user"]),
        );

        let req = Request::new(Method::Get, "/users/7").with_param("id", "7");
        let res = handler.call(req).await.into_response().unwrap();
        assert_eq!(res.body(), br#"{"id":"7","name":"alice"}"#);
    }

    #[tokio::test]
    async fn preload_failure_skips_the_responder() {
        let registry = Registry::new();
        registry
            .preloader("user", |_: &Request| async { Err::<serde_json::Value, _>("db down") })
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = compose(
            &registry,
            RouteDefinition::route("GET", "/", counting_responder(&calls)).preload(["user"]),
        );

        let err = handler.call(Request::new(Method::Get, "/")).await.into_error().unwrap();
        assert!(matches!(err, Error::PreloadFailed { ref name, .. } if name == "user"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_preloader_fails_the_request() {
        let handler = compose(
            &Registry::new(),
            RouteDefinition::route("GET", "/", |_req: Request| async { "x" }).preload(["ghost"]),
        );
        let err = handler.call(Request::new(Method::Get, "/")).await.into_error().unwrap();
        assert!(matches!(err, Error::UnknownPreloader(_)));
    }

    #[tokio::test]
    async fn responder_errors_are_captured() {
        let handler = compose(
            &Registry::new(),
            RouteDefinition::route("GET", "/", |_req: Request| async {
                Err::<Response, _>("backend unavailable")
            }),
        );
        let err = handler.call(Request::new(Method::Get, "/")).await.into_error().unwrap();
        assert!(matches!(err, Error::RespondFailed(_)));
        assert_eq!(err.to_string(), "responder failed: backend unavailable");
    }

    #[tokio::test]
    async fn predicate_panics_are_captured() {
        let registry = Registry::new();
        registry
            .conditional("firstHeader", |req: &Request| req.headers()[0].0 == "x-role")
            .unwrap();
        let handler = compose(
            &registry,
            RouteDefinition::route("GET", "/", |_req: Request| async { "x" }).conditions(["firstHeader"]),
        );

        let err = handler.call(Request::new(Method::Get, "/")).await.into_error().unwrap();
        assert!(matches!(err, Error::ConditionFailed { ref name, .. } if name == "firstHeader"));
    }

    #[tokio::test]
    async fn validator_panics_are_captured() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = compose(
            &Registry::new(),
            RouteDefinition::route("POST", "/", counting_responder(&calls)).validate(|_: &Request| async {
                let rules: Vec<FieldError> = Vec::new();
                vec![rules[0].clone()]
            }),
        );

        let err = handler.call(Request::new(Method::Post, "/")).await.into_error().unwrap();
        assert!(matches!(err, Error::ValidateFailed(_)));
        assert!(err.to_string().starts_with("validator failed: index out of bounds"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn extractor_panics_are_captured() {
        let handler = Composer::new(Registry::new())
            .with_extractor(|_: &Request| panic!("extractor broke"))
            .compose(RouteDefinition::route("GET", "/", |_req: Request| async { "x" }).check().unwrap());

        let err = handler.call(Request::new(Method::Get, "/")).await.into_error().unwrap();
        assert_eq!(err.to_string(), "validator failed: extractor broke");
    }

    #[tokio::test]
    async fn preloader_panics_are_captured() {
        let registry = Registry::new();
        registry
            .preloader("user", |_: &Request| async {
                let rows: Vec<serde_json::Value> = Vec::new();
                Ok::<_, BoxError>(rows[0].clone())
            })
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = compose(
            &registry,
            RouteDefinition::route("GET", "/", counting_responder(&calls)).preload(["user"]),
        );

        let err = handler.call(Request::new(Method::Get, "/")).await.into_error().unwrap();
        assert!(matches!(err, Error::PreloadFailed { ref name, .. } if name == "user"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn declining_responder_hands_back_the_request_as_it_arrived() {
        let registry = Registry::new();
        registry.preloader("user", |_: &Request| async { Ok::<_, BoxError>("alice") }).unwrap();
        let handler = compose(
            &registry,
            RouteDefinition::route("GET", "/", |req: Request| async move {
                req.header("x-mine").map(|_| "mine")
            })
            .preload(["user"])
            .validate(|_: &Request| async { Vec::new() }),
        );

        let mine = Request::new(Method::Get, "/").with_header("x-mine", "1");
        assert_eq!(handler.call(mine).await.into_response().unwrap().body(), b"mine");

        let Outcome::Pass(back) = handler.call(Request::new(Method::Get, "/")).await else {
            panic!("expected the request to be passed on");
        };
        assert!(back.preloaded().is_empty());
        assert!(back.validation_errors().is_empty());
    }

    #[tokio::test]
    async fn responder_panics_are_captured() {
        let handler = compose(
            &Registry::new(),
            RouteDefinition::route("GET", "/", |req: Request| async move {
                if req.path() == "/" {
                    panic!("boom");
                }
                "unreachable"
            }),
        );
        let err = handler.call(Request::new(Method::Get, "/")).await.into_error().unwrap();
        assert_eq!(err.to_string(), "responder failed: boom");
    }
}
