//! Statically assembled route manifests.
//!
//! Route definitions are grouped the way a project lays out its route
//! modules: named entries, some of them nested groups. [`Manifest::flatten`]
//! walks the tree in declaration order and produces the plain list the
//! [`RouteTable`](crate::RouteTable) consumes. Along the way it
//!
//! - skips the `index` entry of every group;
//! - skips entries whose name starts with `_` or `.` (drafts, disabled routes);
//! - tags each definition with its slash-joined entry path as its origin,
//!   unless the definition already names one.
//!
//! ```rust
//! use tollgate::{Manifest, Request, RouteDefinition};
//!
//! async fn list(_req: Request) -> &'static str { "[]" }
//!
//! let routes = Manifest::new()
//!     .entry("list", RouteDefinition::route("GET", "/users", list))
//!     .entry("_draft", RouteDefinition::route("GET", "/draft", list))
//!     .group("admin", Manifest::new().entry("audit", RouteDefinition::route("GET", "/audit", list)))
//!     .flatten();
//!
//! let origins: Vec<_> = routes.iter().filter_map(|d| d.origin_id()).collect();
//! assert_eq!(origins, ["list", "admin/audit"]);
//! ```

use crate::definition::RouteDefinition;

const INDEX_ENTRY: &str = "index";

/// Whether an entry name is loaded. `index` and names starting with `_` or
/// `.` are not.
pub fn is_loadable(name: &str) -> bool {
    name != INDEX_ENTRY && !name.starts_with('_') && !name.starts_with('.')
}

enum Entry {
    Route(RouteDefinition),
    Group(Manifest),
}

/// An ordered tree of named route definitions.
#[derive(Default)]
pub struct Manifest {
    entries: Vec<(String, Entry)>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, name: impl Into<String>, definition: RouteDefinition) -> Self {
        self.entries.push((name.into(), Entry::Route(definition)));
        self
    }

    pub fn group(mut self, name: impl Into<String>, group: Manifest) -> Self {
        self.entries.push((name.into(), Entry::Group(group)));
        self
    }

    /// The loadable definitions, depth-first in declaration order.
    pub fn flatten(self) -> Vec<RouteDefinition> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(self, prefix: &str, out: &mut Vec<RouteDefinition>) {
        for (name, entry) in self.entries {
            if !is_loadable(&name) {
                continue;
            }
            let id = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
            match entry {
                Entry::Route(def) if def.origin_id().is_some() => out.push(def),
                Entry::Route(def) => out.push(def.origin(id)),
                Entry::Group(group) => group.flatten_into(&id, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    async fn ok(_req: Request) -> &'static str {
        "ok"
    }

    fn route(path: &str) -> RouteDefinition {
        RouteDefinition::route("GET", path, ok)
    }

    #[test]
    fn filter_excludes_index_and_markers() {
        assert!(is_loadable("users"));
        assert!(is_loadable("index_users"));
        assert!(!is_loadable("index"));
        assert!(!is_loadable("_draft"));
        assert!(!is_loadable(".hidden"));
    }

    #[test]
    fn nested_groups_flatten_in_order() {
        let defs = Manifest::new()
            .entry("a", route("/a"))
            .group(
                "g",
                Manifest::new()
                    .entry("index", route("/skip"))
                    .entry("b", route("/b"))
                    .group(".disabled", Manifest::new().entry("c", route("/c"))),
            )
            .entry("d", route("/d").origin("custom"))
            .flatten();

        let origins: Vec<_> = defs.iter().filter_map(RouteDefinition::origin_id).collect();
        assert_eq!(origins, ["a", "g/b", "custom"]);
    }
}
