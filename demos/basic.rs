//! Minimal tollgate example: gated admin routes, a validated create endpoint,
//! preloaded data, and a plain health check.
//!
//! Run with:
//!   TOLLGATE_PRELOAD_MODE=sequential cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42                       # public view
//!   curl -H 'x-role: admin' http://localhost:3000/users/42    # admin view
//!   curl -X POST http://localhost:3000/users                  # 400, validation
//!   curl -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl http://localhost:3000/healthz

use std::time::Duration;

use http::StatusCode;
use serde_json::{Value, json};
use tollgate::{
    Composer, FieldError, Manifest, Method, Registry, Request, Response, RouteDefinition, Router,
    Server, Settings,
};

#[tokio::main]
async fn main() -> Result<(), tollgate::Error> {
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env()?;
    let registry = Registry::global();
    settings.apply(&registry);

    registry.conditional("isAdmin", |req: &Request| req.header("x-role") == Some("admin"))?;
    registry.preloader("user", |req: &Request| {
        let id = req.param("id").unwrap_or_default().to_owned();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, std::io::Error>(json!({ "id": id, "name": "alice", "email": "alice@example.com" }))
        }
    })?;
    registry.preloader("permissions", |_: &Request| async {
        Ok::<_, std::io::Error>(json!(["users:read", "users:write"]))
    })?;

    let routes = Manifest::new()
        .group(
            "users",
            Manifest::new()
                .entry("admin_view", admin_view())
                .entry("public_view", public_view())
                .entry("create", create_user())
                .entry("_wip", RouteDefinition::route("GET", "/wip", |_req: Request| async { "hidden" })),
        )
        .flatten();

    let app = Router::new()
        .mount(routes, &Composer::new(registry))?
        .on(Method::Get, "/healthz", |_req: Request| async { "ok" });

    Server::from_addr(settings.addr).serve(app).await
}

// GET /users/{id} for admins: full record plus permissions.
fn admin_view() -> RouteDefinition {
    RouteDefinition::route("GET", "/users/{id}", |req: Request| async move {
        let data = req.preloaded();
        Ok::<_, &'static str>(json!({
            "user": data.get("user").cloned().ok_or("user not preloaded")?,
            "permissions": data.get("permissions").cloned().unwrap_or(Value::Null),
        }))
    })
    .conditions(["isAdmin"])
    .preload(["user", "permissions"])
}

// GET /users/{id} for everyone else: name only.
fn public_view() -> RouteDefinition {
    RouteDefinition::route("GET", "/users/{id}", |req: Request| async move {
        let name = req.preloaded().get("user").and_then(|u| u["name"].as_str().map(str::to_owned));
        Ok::<_, &'static str>(json!({ "name": name.ok_or("user not preloaded")? }))
    })
    .preload(["user"])
}

// POST /users with a JSON body carrying a non-empty name.
fn create_user() -> RouteDefinition {
    RouteDefinition::route("POST", "/users", |_req: Request| async {
        Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/99")
            .json(br#"{"id":"99"}"#.to_vec())
    })
    .validate(|req: &Request| {
        let name = serde_json::from_slice::<Value>(req.body())
            .ok()
            .and_then(|v| v["name"].as_str().map(str::to_owned));
        async move {
            match name {
                Some(name) if !name.is_empty() => Vec::new(),
                _ => vec![FieldError::new("name", "is required")],
            }
        }
    })
}
