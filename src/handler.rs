//! Handler trait, type erasure, and the outcome every handler reports.
//!
//! # How handlers are stored
//!
//! The router keeps handlers of *different* concrete types in one table, so
//! each is hidden behind `dyn ErasedHandler`:
//!
//! ```text
//! async fn health(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.on(Method::Get, "/healthz", health)
//! health.into_boxed_handler()                      ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(health))                      ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time               ← one vtable dispatch
//! ```
//!
//! Composed route handlers (see [`Composer`](crate::Composer)) implement
//! `ErasedHandler` directly and sit in the same table.
//!
//! # Outcomes
//!
//! A handler answers with exactly one [`Outcome`]. `Pass` hands the request
//! back so the router can offer it to the next handler bound under the same
//! method and path; `Fail` routes the error to the centralized error pipeline.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{BoxError, Error};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Send` lets tokio move it across worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler did with a request.
pub enum Outcome {
    /// The request was handled.
    Respond(Response),
    /// Not applicable here; the request is returned untouched for the next handler.
    Pass(Request),
    /// Processing failed. The error goes to the router's error pipeline.
    Fail(Error),
}

impl Outcome {
    pub fn is_pass(&self) -> bool { matches!(self, Self::Pass(_)) }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Respond(res) => Some(res),
            _ => None,
        }
    }

    pub fn into_error(self) -> Option<Error> {
        match self {
            Self::Fail(err) => Some(err),
            _ => None,
        }
    }
}

/// Internal dispatch interface.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every plain route handler.
///
/// Automatically satisfied for any `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome> {
        let fut = (self.0)(req);
        Box::pin(async move { Outcome::Respond(fut.await.into_response()) })
    }
}

// ── Responder return values ───────────────────────────────────────────────────

/// What a route responder may return.
///
/// - anything that is a response: the request is answered;
/// - `Option<R>`: `None` declines the request, which is handed to the next
///   handler bound under the same method and path exactly as the gate would;
/// - `Result<R, E>` of either: the error becomes [`Error::RespondFailed`].
pub trait IntoReply {
    /// Whether this type can decline. Routes whose responder cannot keep no
    /// copy of the request for the next handler.
    #[doc(hidden)]
    const MAY_PASS: bool = false;

    /// `Ok(None)` declines.
    fn into_reply(self) -> Result<Option<Response>, BoxError>;
}

impl<R, E> IntoReply for Result<R, E>
where
    R: IntoReply,
    E: Into<BoxError>,
{
    const MAY_PASS: bool = R::MAY_PASS;

    fn into_reply(self) -> Result<Option<Response>, BoxError> {
        self.map_err(Into::into).and_then(IntoReply::into_reply)
    }
}

impl<R: IntoResponse> IntoReply for Option<R> {
    const MAY_PASS: bool = true;

    fn into_reply(self) -> Result<Option<Response>, BoxError> {
        Ok(self.map(IntoResponse::into_response))
    }
}

macro_rules! reply_via_into_response {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoReply for $ty {
                fn into_reply(self) -> Result<Option<Response>, BoxError> {
                    Ok(Some(self.into_response()))
                }
            }
        )*
    };
}

reply_via_into_response!(Response, &'static str, String, http::StatusCode, serde_json::Value);

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_owned(),
            Err(_) => "panicked".to_owned(),
        },
    }
}
