//! HTTP method as a typed enum, and the method declaration a route carries.
//!
//! Only the verbs a route definition may declare are modelled. Anything else is
//! rejected while the route table is assembled, and at the server boundary
//! with `405 Method Not Allowed` before it ever reaches a handler.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A recognized HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    /// Every recognized verb, in the order `"ALL"` expands to.
    pub const ALL: [Method; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
    ];

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
        }
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            other     => Err(Error::InvalidMethod(other.to_owned())),
        }
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = Error;

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── MethodSpec ────────────────────────────────────────────────────────────────

/// The `method` field of a route definition, as written.
///
/// Verbs stay strings until the definition is validated so that a bad verb
/// is reported by name instead of failing to type-check.
///
/// ```rust
/// use tollgate::MethodSpec;
///
/// let one: MethodSpec = "GET".into();
/// let any: MethodSpec = "ALL".into();
/// let some: MethodSpec = ["GET", "HEAD"].into();
/// # let _ = (one, any, some);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MethodSpec {
    /// The `"ALL"` wildcard: every recognized verb.
    All,
    /// One verb or an ordered list of verbs.
    List(Vec<String>),
}

impl MethodSpec {
    /// Resolves the declaration to concrete verbs, keeping declaration order
    /// and dropping repeats.
    pub fn resolve(&self) -> Result<Vec<Method>, Error> {
        let verbs = match self {
            Self::All => return Ok(Method::ALL.to_vec()),
            Self::List(verbs) => verbs,
        };
        if verbs.is_empty() {
            return Err(Error::MissingField("method"));
        }

        let mut methods = Vec::with_capacity(verbs.len());
        for verb in verbs {
            let method: Method = verb.parse()?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        Ok(methods)
    }
}

impl From<&str> for MethodSpec {
    fn from(verb: &str) -> Self {
        if verb == "ALL" { Self::All } else { Self::List(vec![verb.to_owned()]) }
    }
}

impl From<String> for MethodSpec {
    fn from(verb: String) -> Self {
        verb.as_str().into()
    }
}

impl From<Method> for MethodSpec {
    fn from(method: Method) -> Self {
        Self::List(vec![method.as_str().to_owned()])
    }
}

impl<const N: usize> From<[&str; N]> for MethodSpec {
    fn from(verbs: [&str; N]) -> Self {
        Self::List(verbs.iter().map(|v| (*v).to_owned()).collect())
    }
}

impl From<Vec<&str>> for MethodSpec {
    fn from(verbs: Vec<&str>) -> Self {
        Self::List(verbs.into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<Method>> for MethodSpec {
    fn from(methods: Vec<Method>) -> Self {
        Self::List(methods.into_iter().map(|m| m.as_str().to_owned()).collect())
    }
}
