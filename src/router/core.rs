//! Router core: route registration, groups and the dispatch policy.
//!
//! Registration happens through `&mut Router` (or a [`Group`] borrowed from
//! it) during startup. Serving takes `&Router`, so a built router can be put
//! behind an `Arc` and shared by any number of threads without locking.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use http::header::ALLOW;
use http::{Method, StatusCode};
use smallvec::SmallVec;
use tracing::{debug, error, info};

use super::radix::Node;
use super::RouteError;
use crate::context::{RequestCtx, QUERY_SEPARATOR};
use crate::handler::{panic_message, Handler, PanicHandler, PanicPayload};
use crate::path::{clean_path, expand_optional_segments};
use crate::runtime_config::RouterConfig;
use crate::static_files::StaticFiles;

/// Maximum number of path parameters before heap allocation.
/// Most routes have four or fewer (e.g. `/users/{id}/posts/{post_id}`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the route tree and are
/// shared by every request; values are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Name of the catch-all parameter used by [`Router::serve_files`].
pub const FILEPATH_PARAM: &str = "filepath";

/// Result of successfully matching a request path to a route
#[derive(Clone)]
pub struct RouteMatch {
    /// The handler registered for the route
    pub handler: Arc<dyn Handler>,
    /// The concrete pattern that matched (e.g. `/users/{id}`)
    pub route: Arc<str>,
    /// Path parameters extracted from the URL, in pattern order
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Get a path parameter by name
    ///
    /// Uses "last write wins" semantics: if a name repeats at different path
    /// depths (e.g. `/org/{id}/user/{id}`), returns the last occurrence.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("route", &self.route)
            .field("path_params", &self.path_params)
            .finish_non_exhaustive()
    }
}

/// Value stored in the trie for every concrete pattern.
struct Route {
    handler: Arc<dyn Handler>,
    pattern: Arc<str>,
}

/// What [`Router::serve`] did with a request.
///
/// The response itself is always written to the [`RequestCtx`]; the outcome
/// lets callers and tests see which branch of the dispatch policy ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A registered handler ran
    Handled,
    /// A handler panicked and the panic handler was invoked
    Recovered,
    /// The client was redirected
    Redirect {
        location: String,
        status: StatusCode,
        /// `false` for a trailing slash redirect, `true` for a cleaned or
        /// case-corrected path
        fixed_path: bool,
    },
    /// Automatic reply to `OPTIONS`
    Options { allow: String },
    /// The path exists for other methods only
    MethodNotAllowed { allow: String },
    /// Nothing matched
    NotFound,
}

macro_rules! method_shortcuts {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Register a `", stringify!($method), "` route. Shortcut for `handle(Method::", stringify!($method), ", ..)`.")]
            pub fn $name<H: Handler>(&mut self, path: &str, handler: H) -> Result<(), RouteError> {
                self.handle(Method::$method, path, handler)
            }
        )*
    };
}

/// Request router backed by one radix tree per HTTP method
///
/// Matching is O(k) in the length of the request path. When no route
/// matches exactly the router can redirect to the path with (without) a
/// trailing slash, redirect to a cleaned and case-corrected path, answer
/// `OPTIONS` automatically and answer 405 instead of 404; see
/// [`RouterConfig`].
///
/// ```
/// use http::{Method, StatusCode};
/// use routetree::{Outcome, RequestCtx, Router};
///
/// # fn main() -> Result<(), routetree::RouteError> {
/// let mut router = Router::new();
/// router.get("/users/{id}", |ctx: &mut RequestCtx| {
///     let id = ctx.param("id").unwrap_or_default().to_owned();
///     ctx.text(StatusCode::OK, id);
/// })?;
///
/// let mut ctx = RequestCtx::new(Method::GET, "/users/42");
/// assert_eq!(router.serve(&mut ctx), Outcome::Handled);
/// assert_eq!(ctx.body(), b"42");
/// # Ok(())
/// # }
/// ```
pub struct Router {
    /// Root node per method, in first-registration order
    trees: Vec<(Method, Node<Route>)>,
    /// Concrete patterns per method, in registration order
    registered_paths: Vec<(Method, Vec<String>)>,
    config: RouterConfig,
    not_found: Option<Arc<dyn Handler>>,
    method_not_allowed: Option<Arc<dyn Handler>>,
    panic_handler: Option<PanicHandler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("registered_paths", &self.registered_paths)
            .field("config", &self.config)
            .field("not_found", &self.not_found.is_some())
            .field("method_not_allowed", &self.method_not_allowed.is_some())
            .field("panic_handler", &self.panic_handler.is_some())
            .finish()
    }
}

impl Router {
    /// Create an empty router with the default policy (everything enabled)
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            trees: Vec::new(),
            registered_paths: Vec::new(),
            config,
            not_found: None,
            method_not_allowed: None,
            panic_handler: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RouterConfig {
        &mut self.config
    }

    /// Handler used instead of the plain `404 Not Found` response
    pub fn set_not_found<H: Handler>(&mut self, handler: H) {
        self.not_found = Some(Arc::new(handler));
    }

    /// Handler used instead of the plain `405 Method Not Allowed` response.
    /// The `Allow` header is already set when it runs.
    pub fn set_method_not_allowed<H: Handler>(&mut self, handler: H) {
        self.method_not_allowed = Some(Arc::new(handler));
    }

    /// Recover from panics raised while serving a request
    ///
    /// Without a panic handler a panicking handler unwinds through
    /// [`Router::serve`] into the caller.
    pub fn set_panic_handler<F>(&mut self, handler: F)
    where
        F: Fn(&mut RequestCtx, PanicPayload) + Send + Sync + 'static,
    {
        self.panic_handler = Some(Arc::new(handler));
    }

    /// Create a group whose routes all share `prefix`
    ///
    /// A trailing `/` is dropped from the prefix and `/` means no prefix.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        let prefix = normalize_prefix(prefix);
        info!(prefix = %prefix, "Route group created");
        Group {
            router: self,
            prefix,
        }
    }

    /// Register `handler` for `method` and `path`
    ///
    /// Trailing optional segments (`{name?}`) register one concrete pattern
    /// per variant, most specific first.
    pub fn handle<H: Handler>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        self.add(method, path, Arc::new(handler))
    }

    method_shortcuts! {
        get => GET,
        head => HEAD,
        options => OPTIONS,
        post => POST,
        put => PUT,
        patch => PATCH,
        delete => DELETE,
    }

    /// Serve files below `root` for `GET` requests on `path`
    ///
    /// `path` must end with `/*filepath` or `/{filepath:*}`; the captured
    /// suffix is resolved inside `root`.
    ///
    /// ```no_run
    /// # let mut router = routetree::Router::new();
    /// router.serve_files("/static/*filepath", "/var/www")?;
    /// # Ok::<(), routetree::RouteError>(())
    /// ```
    pub fn serve_files(&mut self, path: &str, root: impl Into<PathBuf>) -> Result<(), RouteError> {
        let files = files_handler(path, root.into())?;
        self.add(Method::GET, path, files)
    }

    fn add(&mut self, method: Method, path: &str, handler: Arc<dyn Handler>) -> Result<(), RouteError> {
        if !path.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash {
                path: path.to_owned(),
            });
        }

        for pattern in expand_optional_segments(path) {
            let route = Route {
                handler: Arc::clone(&handler),
                pattern: Arc::from(pattern.as_str()),
            };
            self.insert_route(&method, &pattern, route)?;
            debug!(method = %method, path = %pattern, "Route registered");
        }
        Ok(())
    }

    /// Insert into the method's tree (created on first success) and record
    /// the pattern.
    fn insert_route(&mut self, method: &Method, pattern: &str, route: Route) -> Result<(), RouteError> {
        match self.trees.iter_mut().find(|(m, _)| m == method) {
            Some((_, root)) => root.insert(pattern, route)?,
            None => {
                let mut root = Node::default();
                root.insert(pattern, route)?;
                self.trees.push((method.clone(), root));
            }
        }

        match self.registered_paths.iter_mut().find(|(m, _)| m == method) {
            Some((_, paths)) => paths.push(pattern.to_owned()),
            None => self
                .registered_paths
                .push((method.clone(), vec![pattern.to_owned()])),
        }
        Ok(())
    }

    fn tree(&self, method: &Method) -> Option<&Node<Route>> {
        self.trees
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, root)| root)
    }

    /// Every registered concrete pattern, grouped by method in registration
    /// order
    #[must_use]
    pub fn list(&self) -> &[(Method, Vec<String>)] {
        &self.registered_paths
    }

    /// Match `method` and `path` without applying any dispatch policy
    ///
    /// Returns the match, or `None` plus whether the path with (without) a
    /// trailing slash would match.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> (Option<RouteMatch>, bool) {
        let Some(root) = self.tree(method) else {
            return (None, false);
        };
        let mut params = ParamVec::new();
        match root.get_value(path, Some(&mut params)) {
            (Some(route), _) => (
                Some(RouteMatch {
                    handler: Arc::clone(&route.handler),
                    route: Arc::clone(&route.pattern),
                    path_params: params,
                }),
                false,
            ),
            (None, tsr) => (None, tsr),
        }
    }

    /// Value of the `Allow` header for `path`, or `None` when no other method
    /// serves it
    ///
    /// `OPTIONS` and the request method itself are skipped; `OPTIONS` is
    /// appended to a non-empty list. The server-wide paths `*` and `/*` list
    /// every registered method.
    #[must_use]
    pub fn allowed(&self, path: &str, method: &Method) -> Option<String> {
        let server_wide = path == "*" || path == "/*";
        let mut allow = String::new();

        for (m, root) in &self.trees {
            if *m == Method::OPTIONS {
                continue;
            }
            if !server_wide && (m == method || root.get_value(path, None).0.is_none()) {
                continue;
            }
            if !allow.is_empty() {
                allow.push_str(", ");
            }
            allow.push_str(m.as_str());
        }

        if allow.is_empty() {
            return None;
        }
        allow.push_str(", OPTIONS");
        Some(allow)
    }

    /// Route one request, writing the response onto `ctx`
    ///
    /// With a panic handler configured, everything including the custom 404
    /// and 405 handlers runs under `catch_unwind`.
    pub fn serve(&self, ctx: &mut RequestCtx) -> Outcome {
        let Some(panic_handler) = &self.panic_handler else {
            return self.dispatch(ctx);
        };

        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(ctx))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    reason = panic_message(payload.as_ref()),
                    "Handler panicked, recovering"
                );
                panic_handler(ctx, payload);
                Outcome::Recovered
            }
        }
    }

    fn dispatch(&self, ctx: &mut RequestCtx) -> Outcome {
        if let Some(root) = self.tree(ctx.method()) {
            let mut params = ParamVec::new();
            let (value, tsr) = root.get_value(ctx.path(), Some(&mut params));
            if let Some(route) = value {
                debug!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    route = %route.pattern,
                    "Route matched"
                );
                ctx.bind(params, Arc::clone(&route.pattern));
                route.handler.handle(ctx);
                return Outcome::Handled;
            }

            if ctx.method() != Method::CONNECT && ctx.path() != "/" {
                let status = redirect_status(ctx.method());

                if tsr && self.config.redirect_trailing_slash {
                    let location = with_query(toggle_trailing_slash(ctx.path()), ctx.query());
                    return redirect(ctx, location, status, false);
                }

                if self.config.redirect_fixed_path {
                    let cleaned = clean_path(ctx.path());
                    if let Some(fixed) = root
                        .find_case_insensitive_path(&cleaned, self.config.redirect_trailing_slash)
                    {
                        let location = with_query(fixed, ctx.query());
                        return redirect(ctx, location, status, true);
                    }
                }
            }
        }

        if ctx.method() == Method::OPTIONS {
            if self.config.handle_options {
                if let Some(allow) = self.allowed(ctx.path(), ctx.method()) {
                    debug!(path = %ctx.path(), allow = %allow, "Automatic OPTIONS reply");
                    ctx.set_header(ALLOW, &allow);
                    return Outcome::Options { allow };
                }
            }
        } else if self.config.handle_method_not_allowed {
            if let Some(allow) = self.allowed(ctx.path(), ctx.method()) {
                debug!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    allow = %allow,
                    "Method not allowed"
                );
                ctx.set_header(ALLOW, &allow);
                match &self.method_not_allowed {
                    Some(handler) => handler.handle(ctx),
                    None => ctx.error("Method Not Allowed", StatusCode::METHOD_NOT_ALLOWED),
                }
                return Outcome::MethodNotAllowed { allow };
            }
        }

        debug!(method = %ctx.method(), path = %ctx.path(), "No route matched");
        match &self.not_found {
            Some(handler) => handler.handle(ctx),
            None => ctx.error("Not Found", StatusCode::NOT_FOUND),
        }
        Outcome::NotFound
    }
}

impl Handler for Router {
    fn handle(&self, ctx: &mut RequestCtx) {
        self.serve(ctx);
    }
}

/// A view of a [`Router`] that prefixes every registered path
///
/// Groups only borrow the router; the routes they register live in the
/// router's trees like any other.
///
/// ```
/// # let mut router = routetree::Router::new();
/// let mut api = router.group("/api");
/// let mut v1 = api.group("/v1");
/// v1.get("/users", |_ctx: &mut routetree::RequestCtx| {})?;
/// assert_eq!(router.list()[0].1, vec!["/api/v1/users"]);
/// # Ok::<(), routetree::RouteError>(())
/// ```
pub struct Group<'r> {
    router: &'r mut Router,
    prefix: String,
}

impl fmt::Debug for Group<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group").field("prefix", &self.prefix).finish()
    }
}

impl Group<'_> {
    /// The accumulated prefix, empty for the root
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Create a nested group; prefixes concatenate
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        let prefix = format!("{}{}", self.prefix, normalize_prefix(prefix));
        info!(prefix = %prefix, "Route group created");
        Group {
            router: &mut *self.router,
            prefix,
        }
    }

    /// Register `handler` for `method` and the prefixed `path`
    pub fn handle<H: Handler>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        let full = self.full_path(path)?;
        self.router.add(method, &full, Arc::new(handler))
    }

    method_shortcuts! {
        get => GET,
        head => HEAD,
        options => OPTIONS,
        post => POST,
        put => PUT,
        patch => PATCH,
        delete => DELETE,
    }

    /// Prefixed version of [`Router::serve_files`]
    pub fn serve_files(&mut self, path: &str, root: impl Into<PathBuf>) -> Result<(), RouteError> {
        let files = files_handler(path, root.into())?;
        let full = self.full_path(path)?;
        self.router.add(Method::GET, &full, files)
    }

    fn full_path(&self, path: &str) -> Result<String, RouteError> {
        if !path.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash {
                path: path.to_owned(),
            });
        }
        Ok(format!("{}{path}", self.prefix))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_end_matches('/').to_owned()
}

fn files_handler(path: &str, root: PathBuf) -> Result<Arc<dyn Handler>, RouteError> {
    let valid = path.ends_with(&format!("/*{FILEPATH_PARAM}"))
        || path.ends_with(&format!("/{{{FILEPATH_PARAM}:*}}"));
    if !valid {
        return Err(RouteError::InvalidFilesPath {
            path: path.to_owned(),
        });
    }
    info!(path, root = %root.display(), "Serving static files");
    Ok(Arc::new(StaticFiles::new(root)))
}

/// 301 keeps `GET`/`HEAD` semantics; everything else gets 307 so the client
/// repeats the request with the same method and body.
fn redirect_status(method: &Method) -> StatusCode {
    if *method == Method::GET || *method == Method::HEAD {
        StatusCode::MOVED_PERMANENTLY
    } else {
        StatusCode::TEMPORARY_REDIRECT
    }
}

fn toggle_trailing_slash(path: &str) -> String {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_owned(),
        _ => format!("{path}/"),
    }
}

fn with_query(mut location: String, query: Option<&str>) -> String {
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        location.push(QUERY_SEPARATOR);
        location.push_str(query);
    }
    location
}

fn redirect(ctx: &mut RequestCtx, location: String, status: StatusCode, fixed_path: bool) -> Outcome {
    debug!(
        method = %ctx.method(),
        path = %ctx.path(),
        location = %location,
        status = status.as_u16(),
        fixed_path,
        "Redirecting"
    );
    ctx.redirect(&location, status);
    Outcome::Redirect {
        location,
        status,
        fixed_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_trailing_slash() {
        assert_eq!(toggle_trailing_slash("/foo"), "/foo/");
        assert_eq!(toggle_trailing_slash("/foo/"), "/foo");
        assert_eq!(toggle_trailing_slash("/a/b/"), "/a/b");
    }

    #[test]
    fn test_with_query() {
        assert_eq!(with_query("/a".into(), Some("x=1")), "/a?x=1");
        assert_eq!(with_query("/a".into(), Some("")), "/a");
        assert_eq!(with_query("/a".into(), None), "/a");
    }

    #[test]
    fn test_redirect_status() {
        assert_eq!(redirect_status(&Method::GET), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(redirect_status(&Method::HEAD), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(redirect_status(&Method::POST), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            redirect_status(&Method::from_bytes(b"PURGE").unwrap()),
            StatusCode::TEMPORARY_REDIRECT
        );
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/api/"), "/api");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("/api"), "/api");
    }

    #[test]
    fn test_router_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Router>();
    }
}
