//! Incoming HTTP request type.
//!
//! The request doubles as the per-request context the pipeline works on:
//! conditionals and preloaders read it, the validator's findings are recorded
//! on it, and the preloaded data is attached to it before the responder runs.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::FieldError;
use crate::method::Method;
use crate::preload::PreloadedData;

/// An incoming HTTP request.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: HashMap<String, String>,
    validation_errors: Vec<FieldError>,
    preloaded: PreloadedData,
}

impl Request {
    /// A bare request. The server fills in the rest; tests and embedders use
    /// the `with_*` methods.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: Vec::new(),
            body: Bytes::new(),
            params: HashMap::new(),
            validation_errors: Vec::new(),
            preloaded: PreloadedData::default(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns a query-string value. First occurrence wins; no percent-decoding.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.as_deref()?
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Field errors recorded on this request so far.
    pub fn validation_errors(&self) -> &[FieldError] { &self.validation_errors }

    /// Data produced by the route's preloaders, keyed by preloader name.
    pub fn preloaded(&self) -> &PreloadedData { &self.preloaded }

    /// Record a field error. Host middleware may call this before the route
    /// handler runs; the validation step reports everything recorded.
    pub fn reject(&mut self, error: FieldError) {
        self.validation_errors.push(error);
    }

    pub(crate) fn record_validation_errors(&mut self, errors: Vec<FieldError>) {
        self.validation_errors.extend(errors);
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn set_preloaded(&mut self, data: PreloadedData) {
        self.preloaded = data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_lookup_takes_first_match() {
        let req = Request::new(Method::Get, "/items").with_query("limit=10&flag&limit=20");
        assert_eq!(req.query_param("limit"), Some("10"));
        assert_eq!(req.query_param("flag"), Some(""));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::new(Method::Get, "/").with_header("X-Role", "admin");
        assert_eq!(req.header("x-role"), Some("admin"));
    }
}
