//! # tollgate
//!
//! Declarative route definitions, compiled into one request pipeline per route.
//!
//! A route says *what* it needs: a path, its methods, a responder, and
//! optionally a validator, the named conditionals that gate it and the named
//! preloaders that fetch its data. tollgate turns each into a handler with a
//! fixed execution order:
//!
//! ```text
//! gate → validate → preload → respond
//! ```
//!
//! - **Gate**: every named conditional must hold, else the route passes and
//!   the router offers the request to the next route bound on the same path.
//! - **Validate**: field errors stop the request with `400` and code
//!   `INVALID_PARAMETERS`.
//! - **Preload**: named preloaders run in parallel or strictly in order
//!   (a process-wide [`PreloadMode`]); results reach the responder through
//!   [`Request::preloaded`].
//! - **Respond**: errors and panics are caught and reported, never unwound.
//!
//! Routes with more conditions are bound first, so narrower routes are tried
//! before broader ones.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tollgate::{Composer, Registry, Request, RouteDefinition, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tollgate::Error> {
//!     let registry = Registry::global();
//!     registry.conditional("isAdmin", |req: &Request| req.header("x-role") == Some("admin"))?;
//!     registry.preloader("user", |req: &Request| {
//!         let id = req.param("id").unwrap_or_default().to_owned();
//!         async move { Ok::<_, std::io::Error>(serde_json::json!({ "id": id })) }
//!     })?;
//!
//!     let routes = vec![
//!         RouteDefinition::route("GET", "/users/{id}", get_user)
//!             .conditions(["isAdmin"])
//!             .preload(["user"]),
//!     ];
//!
//!     let app = Router::new().mount(routes, &Composer::new(registry))?;
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Result<serde_json::Value, &'static str> {
//!     req.preloaded().get("user").cloned().ok_or("user not preloaded")
//! }
//! ```

mod compose;
mod conditional;
mod config;
mod definition;
mod error;
mod handler;
mod loader;
mod method;
mod preload;
mod registry;
mod request;
mod response;
mod router;
mod server;
mod table;

pub use compose::{Composer, Extractor};
pub use conditional::{Conditionals, Predicate};
pub use config::Settings;
pub use definition::{Responder, Route, RouteDefinition, Validator};
pub use error::{BoxError, Error, ErrorCode, FieldError, Registrant};
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, IntoReply, Outcome};
pub use loader::{Manifest, is_loadable};
pub use method::{Method, MethodSpec};
pub use preload::{PreloadMode, PreloadedData, Preloader, Preloaders};
pub use registry::Registry;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{ErrorHandler, Router, render_error};
pub use server::Server;
pub use table::{Dispatcher, RouteTable};
