//! Ordered request router.
//!
//! Routes are tried in registration order and the first one whose method
//! filter and pattern both accept the request wins. No radix tree, no
//! specificity ranking: earlier registrations shadow later ones.

use std::collections::HashMap;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue, ORIGIN};
use http::{HeaderMap, Method, StatusCode};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::method::{IntoMethodFilter, MethodFilter};
use crate::middleware::{BoxedMiddleware, Cors, Flow, Middleware};
use crate::pattern::Pattern;
use crate::request::Request;
use crate::response::Response;

struct Route {
    method: MethodFilter,
    pattern: Pattern,
    handler: BoxedHandler,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
pub struct Router {
    routes: Vec<Route>,
    middleware: Vec<BoxedMiddleware>,
    error_status: StatusCode,
    validation_status: StatusCode,
    expose_errors: bool,
    default_headers: HeaderMap,
    cors: Option<Cors>,
}

impl Router {
    /// An empty router. Handler and validation errors both answer
    /// `418 I'm a teapot` with the error message exposed.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            middleware: Vec::new(),
            error_status: StatusCode::IM_A_TEAPOT,
            validation_status: StatusCode::IM_A_TEAPOT,
            expose_errors: true,
            default_headers: HeaderMap::new(),
            cors: None,
        }
    }

    /// Register a handler for a method + pattern pair. Returns `self` for chaining.
    ///
    /// `method` is an [`http::Method`], a method name (`"get"` is uppercased)
    /// or `"*"` for every method. Placeholders use `@name` syntax and
    /// `req.param("name")` retrieves them:
    ///
    /// ```rust
    /// # use aapje::{Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// # async fn welcome(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .route("GET",  "/user/@id", get_user)
    ///     .route("POST", "/users",    create_user)
    ///     .route("*",    "/",         welcome);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics on an unknown method name or when a placeholder name repeats
    /// within `pattern`. Routes are registered at startup, so this fails fast.
    pub fn route(mut self, method: impl IntoMethodFilter, pattern: &str, handler: impl Handler) -> Self {
        let pattern = Pattern::compile(pattern)
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
        self.routes.push(Route {
            method: method.into_method_filter(),
            pattern,
            handler: handler.into_boxed_handler(),
        });
        self
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(Method::DELETE, pattern, handler)
    }

    /// Register a handler for every method.
    pub fn any(self, pattern: &str, handler: impl Handler) -> Self {
        self.route(MethodFilter::Any, pattern, handler)
    }

    /// Append a middleware step. Steps run before route matching, in order.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Status for requests whose handler returned an error.
    pub fn error_status(mut self, status: StatusCode) -> Self {
        self.error_status = status;
        self
    }

    /// Status for query-builder validation errors (bad identifier, limit or
    /// sort). Defaults to the same status as other handler errors.
    pub fn validation_status(mut self, status: StatusCode) -> Self {
        self.validation_status = status;
        self
    }

    /// When `false`, error bodies carry the status reason instead of the
    /// error message.
    pub fn expose_errors(mut self, expose: bool) -> Self {
        self.expose_errors = expose;
        self
    }

    /// Headers added to every response, 404s and error answers included,
    /// unless the response already sets the same name. Invalid pairs are
    /// dropped with a warning.
    ///
    /// ```rust
    /// # use aapje::Router;
    /// Router::new().default_headers([("X-Powered-By", "aapje")]);
    /// ```
    pub fn default_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            let (name, value) = (name.as_ref(), value.as_ref());
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    self.default_headers.insert(name, value);
                }
                _ => warn!(header = name, "dropping invalid default header"),
            }
        }
        self
    }

    /// Enables CORS with `policy`; see [`Cors`].
    pub fn cors(mut self, policy: Cors) -> Self {
        self.cors = Some(policy);
        self
    }

    /// Finds the first route accepting `method` and `path`.
    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        self.routes.iter()
            .filter(|route| route.method.accepts(method))
            .find_map(|route| {
                let params = route.pattern.matches(path)?;
                debug!(%method, path, route = route.pattern.as_str(), "route matched");
                Some((Arc::clone(&route.handler), params))
            })
    }

    /// Routes one request and produces its response.
    ///
    /// A CORS preflight is answered first, then middleware may answer;
    /// otherwise the first matching route's handler runs. No match answers
    /// `404 {"error":"Not Found"}`; a handler error answers the configured
    /// error status with `{"error": …}`. CORS and default headers are added
    /// to whichever response comes out.
    pub async fn dispatch(&self, req: Request) -> Response {
        let origin = req.header(ORIGIN.as_str()).map(str::to_owned);
        let mut response = self.respond(req).await;

        let headers = response.headers_mut();
        if let (Some(cors), Some(origin)) = (&self.cors, origin.as_deref()) {
            cors.decorate(origin, headers);
        }
        for (name, value) in &self.default_headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        response
    }

    async fn respond(&self, mut req: Request) -> Response {
        if let Some(cors) = self.cors.as_ref().filter(|_| Cors::is_preflight(&req)) {
            return cors.preflight(&req);
        }

        for step in &self.middleware {
            if let Flow::Respond(response) = step.handle(&req) {
                return response;
            }
        }

        let Some((handler, params)) = self.lookup(req.method(), req.path()) else {
            debug!(method = %req.method(), path = req.path(), "no route matched");
            return Response::builder()
                .status(StatusCode::NOT_FOUND)
                .echo(json!({ "error": "Not Found" }));
        };

        req.set_params(params);
        match handler.call(req).await {
            Ok(response) => response,
            Err(e) => self.error_response(&e),
        }
    }

    fn error_response(&self, err: &Error) -> Response {
        let status = if err.is_validation() { self.validation_status } else { self.error_status };
        warn!(status = status.as_u16(), "handler failed: {err}");

        let message = if self.expose_errors {
            err.to_string()
        } else {
            status.canonical_reason().unwrap_or("Error").to_owned()
        };
        Response::builder().status(status).echo(json!({ "error": message }))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_req: Request) -> Response { Response::text("") }

    #[test]
    fn lookup_respects_registration_order() {
        let router = Router::new()
            .get("/user/@id", noop)
            .get("/user/me", noop);
        let (_, params) = router.lookup(&Method::GET, "/user/me").unwrap();
        assert_eq!(params["id"], "me");
    }

    #[test]
    fn lookup_filters_by_method() {
        let router = Router::new().post("/users", noop);
        assert!(router.lookup(&Method::GET, "/users").is_none());
        assert!(router.lookup(&Method::POST, "/users").is_some());
    }

    #[test]
    fn wildcard_routes_match_all_methods() {
        let router = Router::new().route("*", "/", noop);
        for m in [Method::GET, Method::PUT, Method::PATCH, Method::HEAD] {
            assert!(router.lookup(&m, "/").is_some());
        }
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn duplicate_placeholders_panic() {
        let _ = Router::new().get("/a/@x/@x", noop);
    }

    #[test]
    #[should_panic(expected = "invalid route method")]
    fn bad_method_name_panics() {
        let _ = Router::new().route("GE T", "/", noop);
    }
}
