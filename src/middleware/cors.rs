//! Cross-origin resource sharing.
//!
//! Registered with [`Router::cors`](crate::Router::cors). Preflight requests
//! (`OPTIONS` carrying `Access-Control-Request-Method`) are answered with
//! `204 No Content` before any middleware runs, so an auth check never sees
//! them. Every other response to an allowed origin gets the
//! `Access-Control-Allow-*` headers added on the way out.
//!
//! ```rust
//! use aapje::{Router, middleware::Cors};
//! use http::Method;
//!
//! let app = Router::new().cors(
//!     Cors::new()
//!         .allow_origins(["https://example.com", "https://example.org"])
//!         .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
//!         .allow_headers(["Content-Type", "Authorization"])
//!         .allow_credentials(true),
//! );
//! ```

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, HeaderName, HeaderValue, ORIGIN,
    VARY,
};
use http::{HeaderMap, Method, StatusCode};

use crate::request::Request;
use crate::response::Response;

/// CORS policy. Starts out allowing nothing.
#[derive(Clone, Debug, Default)]
pub struct Cors {
    origins: Vec<String>,
    methods: Vec<Method>,
    headers: Vec<String>,
    credentials: bool,
}

impl Cors {
    pub fn new() -> Self { Self::default() }

    /// Origins allowed to read responses. `"*"` allows any origin.
    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origins.extend(origins.into_iter().map(Into::into));
        self
    }

    /// Methods announced in preflight answers.
    pub fn allow_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Request headers announced in preflight answers.
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers.extend(headers.into_iter().map(Into::into));
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.credentials = allow;
        self
    }

    fn allows(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == "*" || o == origin)
    }

    pub(crate) fn is_preflight(req: &Request) -> bool {
        *req.method() == Method::OPTIONS && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
    }

    /// `204` answer to a preflight. Carries no CORS headers when the origin
    /// is not allowed, which the browser treats as a refusal.
    pub(crate) fn preflight(&self, req: &Request) -> Response {
        let mut response = Response::status(StatusCode::NO_CONTENT);
        let Some(origin) = req.header(ORIGIN.as_str()) else { return response };
        if !self.allows(origin) {
            return response;
        }

        let headers = response.headers_mut();
        self.decorate(origin, headers);
        let methods = self.methods.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        set(headers, ACCESS_CONTROL_ALLOW_METHODS, &methods);
        set(headers, ACCESS_CONTROL_ALLOW_HEADERS, &self.headers.join(", "));
        response
    }

    /// Adds the origin and credentials headers for an allowed `origin`,
    /// unless the response already names an allowed origin.
    pub(crate) fn decorate(&self, origin: &str, headers: &mut HeaderMap) {
        if !self.allows(origin) || headers.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
            return;
        }
        // A wildcard can't be combined with credentials, so echo the origin.
        let any = self.origins.iter().any(|o| o == "*");
        if any && !self.credentials {
            set(headers, ACCESS_CONTROL_ALLOW_ORIGIN, "*");
        } else {
            set(headers, ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
        if self.credentials {
            set(headers, ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
        }
    }
}

fn set(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if value.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn preflight_request(origin: &str) -> Request {
        Request::new(
            http::Request::builder()
                .method(Method::OPTIONS)
                .uri("/users")
                .header("origin", origin)
                .header("access-control-request-method", "POST")
                .body(Bytes::new())
                .unwrap(),
        )
    }

    #[test]
    fn only_options_with_request_method_is_a_preflight() {
        assert!(Cors::is_preflight(&preflight_request("https://a.io")));

        let plain = Request::new(http::Request::options("/").body(Bytes::new()).unwrap());
        assert!(!Cors::is_preflight(&plain));
    }

    #[test]
    fn wildcard_without_credentials_answers_star() {
        let cors = Cors::new().allow_origins(["*"]);
        let mut headers = HeaderMap::new();
        cors.decorate("https://anyone.io", &mut headers);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(VARY).is_none());
    }

    #[test]
    fn wildcard_with_credentials_echoes_origin() {
        let cors = Cors::new().allow_origins(["*"]).allow_credentials(true);
        let mut headers = HeaderMap::new();
        cors.decorate("https://anyone.io", &mut headers);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://anyone.io");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[VARY], "Origin");
    }

    #[test]
    fn decorating_twice_adds_nothing() {
        let cors = Cors::new().allow_origins(["https://example.com"]);
        let mut headers = HeaderMap::new();
        cors.decorate("https://example.com", &mut headers);
        cors.decorate("https://example.com", &mut headers);
        assert_eq!(headers.get_all(VARY).iter().count(), 1);
    }

    #[test]
    fn unknown_origin_gets_a_bare_preflight() {
        let cors = Cors::new().allow_origins(["https://example.com"]).allow_methods([Method::GET]);
        let res = cors.preflight(&preflight_request("https://evil.io"));
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
        assert!(res.headers().is_empty());
    }
}
