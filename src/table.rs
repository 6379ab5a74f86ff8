//! Route table assembly.
//!
//! Turns an ordered list of definitions into bound handlers:
//!
//! 1. every definition is checked before anything is bound, so a bad
//!    definition aborts start-up with nothing half-registered;
//! 2. routes are stably sorted by condition count, most conditions first;
//! 3. each route is composed once and bound under every method it declares.
//!
//! A route with more conditions is narrower, so it is offered to the
//! dispatcher ahead of broader routes on overlapping paths. Ties keep the
//! order the definitions were discovered in.

use tracing::{info, warn};

use crate::compose::Composer;
use crate::definition::{Route, RouteDefinition};
use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::method::Method;

/// The host capability the table binds into.
pub trait Dispatcher {
    /// Bind `handler` under `method` and `path`. Handlers bound earlier under
    /// the same pair are tried first.
    fn bind(&mut self, method: Method, path: &str, handler: BoxedHandler) -> Result<(), Error>;
}

/// Validated routes in binding order.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Check every definition, then order them for binding.
    pub fn assemble<I>(definitions: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = RouteDefinition>,
    {
        let mut routes = definitions
            .into_iter()
            .map(RouteDefinition::check)
            .collect::<Result<Vec<_>, _>>()?;
        routes.sort_by(|a, b| b.conditions.len().cmp(&a.conditions.len()));
        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Compose each route and bind it for every declared method. Returns the
    /// number of bindings made.
    pub fn bind<D>(self, composer: &Composer, dispatcher: &mut D) -> Result<usize, Error>
    where
        D: Dispatcher + ?Sized,
    {
        let registry = composer.registry();
        let mut bound = 0;

        for route in self.routes {
            for name in route.conditions.iter().filter(|n| !registry.conditionals().contains(n)) {
                warn!(path = %route.path, conditional = %name, "conditional not registered yet");
            }
            for name in route.preload.iter().filter(|n| !registry.preloaders().contains(n)) {
                warn!(path = %route.path, preloader = %name, "preloader not registered yet");
            }

            let path = route.path.clone();
            let methods = route.methods.clone();
            let origin = route.origin.clone();
            let handler = composer.compose(route);

            for method in methods {
                let result = dispatcher.bind(method, &path, BoxedHandler::clone(&handler));
                if let Err(e) = result {
                    return Err(match &origin {
                        Some(origin) => e.within(origin.clone()),
                        None => e,
                    });
                }
                info!(%method, path = %path, "route bound");
                bound += 1;
            }
        }

        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::request::Request;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Method, String)>,
    }

    impl Dispatcher for Recorder {
        fn bind(&mut self, method: Method, path: &str, _handler: BoxedHandler) -> Result<(), Error> {
            self.calls.push((method, path.to_owned()));
            Ok(())
        }
    }

    async fn ok(_req: Request) -> &'static str {
        "ok"
    }

    fn def(path: &str, conditions: &[&str]) -> RouteDefinition {
        RouteDefinition::route("GET", path, ok).conditions(conditions.iter().copied())
    }

    #[test]
    fn more_conditions_bind_first() {
        let table = RouteTable::assemble([def("/open", &[]), def("/narrow", &["a", "b"])]).unwrap();
        let mut recorder = Recorder::default();
        table.bind(&Composer::new(Registry::new()), &mut recorder).unwrap();

        let paths: Vec<_> = recorder.calls.iter().map(|(_, p)| p.as_str()).collect();
        assert_eq!(paths, ["/narrow", "/open"]);
    }

    #[test]
    fn ties_keep_discovery_order() {
        let table = RouteTable::assemble([
            def("/first", &["a"]),
            def("/none", &[]),
            def("/second", &["b"]),
            def("/both", &["a", "b"]),
        ])
        .unwrap();

        let paths: Vec<_> = table.routes().iter().map(Route::path).collect();
        assert_eq!(paths, ["/both", "/first", "/second", "/none"]);
    }

    #[test]
    fn binds_once_per_declared_method() {
        let table = RouteTable::assemble([
            RouteDefinition::route(["GET", "POST"], "/items", ok),
        ])
        .unwrap();
        let mut recorder = Recorder::default();
        let bound = table.bind(&Composer::new(Registry::new()), &mut recorder).unwrap();

        assert_eq!(bound, 2);
        assert_eq!(
            recorder.calls,
            vec![(Method::Get, "/items".to_owned()), (Method::Post, "/items".to_owned())]
        );
    }

    #[test]
    fn one_bad_definition_binds_nothing() {
        let result = RouteTable::assemble([
            def("/fine", &[]),
            RouteDefinition::route("FETCH", "/bad", ok).origin("routes/bad"),
        ]);

        let err = result.unwrap_err();
        assert!(matches!(err.root(), Error::InvalidMethod(m) if m == "FETCH"));
        assert_eq!(err.to_string(), "routes/bad: invalid method `FETCH`");
    }

    #[test]
    fn dispatcher_rejections_carry_the_origin() {
        struct Refuse;
        impl Dispatcher for Refuse {
            fn bind(&mut self, _: Method, path: &str, _: BoxedHandler) -> Result<(), Error> {
                Err(Error::InvalidRoute { path: path.to_owned(), reason: "conflict".into() })
            }
        }

        let table = RouteTable::assemble([def("/x", &[]).origin("x.rs")]).unwrap();
        let err = table.bind(&Composer::new(Registry::new()), &mut Refuse).unwrap_err();
        assert!(matches!(err, Error::Definition { ref origin, .. } if origin == "x.rs"));
    }
}
