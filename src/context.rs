//! Per-request state handed to every handler.
//!
//! A [`RequestCtx`] carries the request line (method, path, raw query) in and
//! the response under construction out. The router writes the bound path
//! parameters and the matched pattern onto it before the handler runs, so all
//! per-request state stays local to one request.

use std::sync::Arc;

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use tracing::warn;

use crate::router::ParamVec;

/// Content type used for router generated bodies (404, 405, errors).
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Separator between the path and the query string of a request URI.
pub const QUERY_SEPARATOR: char = '?';

/// Request/response context for one dispatch.
#[derive(Debug, Clone)]
pub struct RequestCtx {
    method: Method,
    path: String,
    query: Option<String>,
    params: ParamVec,
    matched_route: Option<Arc<str>>,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl RequestCtx {
    /// Build a context from a method and a request target such as
    /// `/users/42?expand=true`.
    ///
    /// An empty query (`/x?`) is treated as no query at all.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once(QUERY_SEPARATOR) {
            Some((path, query)) => (path, (!query.is_empty()).then(|| query.to_owned())),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_owned(),
            query,
            params: ParamVec::new(),
            matched_route: None,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Adapt an `http::Request`. Only the method and URI are used; headers and
    /// body stay with the caller.
    #[must_use]
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let uri = req.uri();
        let mut ctx = Self::new(req.method().clone(), uri.path());
        ctx.query = uri.query().filter(|q| !q.is_empty()).map(str::to_owned);
        ctx
    }

    /// Consume the context and produce the response built by the handler.
    #[must_use]
    pub fn into_response(self) -> Response<Vec<u8>> {
        let mut res = Response::new(self.body);
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decode the query string into `(name, value)` pairs, in order.
    #[must_use]
    pub fn query_args(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get a decoded query argument by name. The last occurrence wins.
    #[must_use]
    pub fn query_arg(&self, name: &str) -> Option<String> {
        self.query_args()
            .into_iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Path parameters bound by the matched route, in pattern order.
    #[must_use]
    pub fn params(&self) -> &ParamVec {
        &self.params
    }

    /// Get a path parameter by name.
    ///
    /// Last write wins when a pattern reuses a name at different depths.
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// The registered pattern that served this request, once routed.
    #[must_use]
    pub fn matched_route(&self) -> Option<&str> {
        self.matched_route.as_deref()
    }

    pub(crate) fn bind(&mut self, params: ParamVec, route: Arc<str>) {
        self.params = params;
        self.matched_route = Some(route);
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Look up a response header as a string.
    ///
    /// Any UTF-8 value is returned, so a redirect to a non-ASCII path reads
    /// back as it was set.
    #[must_use]
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
    }

    /// Set a response header, replacing any previous value.
    ///
    /// Values that are not legal header values are dropped with a warning.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_bytes(value.as_bytes()) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => warn!(header = %name, value, "Dropping invalid response header value"),
        }
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.set_header(CONTENT_TYPE, content_type);
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// Write a plain text response.
    pub fn text(&mut self, status: StatusCode, body: impl Into<Vec<u8>>) {
        self.status = status;
        self.set_content_type(DEFAULT_CONTENT_TYPE);
        self.body = body.into();
    }

    /// Write an error response: status, default content type and message
    /// body. Previously set headers are kept.
    pub fn error(&mut self, message: &str, status: StatusCode) {
        self.text(status, message);
    }

    /// Redirect to `location` with the given status and an empty body.
    pub fn redirect(&mut self, location: &str, status: StatusCode) {
        self.status = status;
        self.body.clear();
        self.set_header(LOCATION, location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_new_splits_query() {
        let ctx = RequestCtx::new(Method::GET, "/search?q=rust&page=2");
        assert_eq!(ctx.path(), "/search");
        assert_eq!(ctx.query(), Some("q=rust&page=2"));

        let ctx = RequestCtx::new(Method::GET, "/search?");
        assert_eq!(ctx.path(), "/search");
        assert_eq!(ctx.query(), None);
    }

    #[test]
    fn test_query_args_decode() {
        let ctx = RequestCtx::new(Method::GET, "/s?name=J%C3%BCrgen+K&limit=10&limit=20");
        assert_eq!(ctx.query_arg("name").as_deref(), Some("Jürgen K"));
        assert_eq!(ctx.query_arg("limit").as_deref(), Some("20"));
        assert_eq!(ctx.query_arg("missing"), None);
        assert_eq!(ctx.query_args().len(), 3);
    }

    #[test]
    fn test_param_last_write_wins() {
        let mut ctx = RequestCtx::new(Method::GET, "/org/1/user/2");
        ctx.bind(
            smallvec![
                (Arc::from("id"), "1".to_string()),
                (Arc::from("id"), "2".to_string()),
            ],
            Arc::from("/org/:id/user/:id"),
        );
        assert_eq!(ctx.param("id"), Some("2"));
        assert_eq!(ctx.matched_route(), Some("/org/:id/user/:id"));
    }

    #[test]
    fn test_from_request_and_into_response() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("http://example.com/items/7?dry_run=1")
            .body(())
            .unwrap();
        let mut ctx = RequestCtx::from_request(&req);
        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/items/7");
        assert_eq!(ctx.query(), Some("dry_run=1"));

        ctx.text(StatusCode::CREATED, "made");
        let res = ctx.into_response();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
        assert_eq!(res.body(), b"made");
    }

    #[test]
    fn test_redirect_sets_location() {
        let mut ctx = RequestCtx::new(Method::GET, "/straße");
        ctx.set_body("stale");
        ctx.redirect("/Straße", StatusCode::MOVED_PERMANENTLY);
        assert_eq!(ctx.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            ctx.headers().get(LOCATION).map(|v| v.as_bytes()),
            Some("/Straße".as_bytes())
        );
        assert_eq!(ctx.header(LOCATION), Some("/Straße"));
        assert!(ctx.body().is_empty());
    }

    #[test]
    fn test_invalid_header_value_is_dropped() {
        let mut ctx = RequestCtx::new(Method::GET, "/");
        ctx.set_header(LOCATION, "/bad\nvalue");
        assert!(ctx.headers().get(LOCATION).is_none());
    }
}
