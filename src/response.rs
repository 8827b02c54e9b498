//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Build a [`Response`] in your handler and return it. The builder starts
//! from `200 OK` and `Content-Type: application/json`; a terminal method
//! (`echo`, `raw`, `json`, `text`, `no_body`) consumes it, so nothing can be
//! written after the body.

use bytes::Bytes;
use cookie::Cookie;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue, SET_COOKIE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

const APPLICATION_JSON: &str = "application/json";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK, no custom headers needed)
///
/// ```rust
/// use aapje::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status, headers or cookies)
///
/// ```rust
/// use aapje::{Cookie, Response};
/// use http::StatusCode;
/// use serde_json::json;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .cookie(Cookie::build(("seen", "1")).path("/").http_only(true))
///     .echo(json!({ "created_user_id": 42 }));
///
/// Response::builder()
///     .header("content-type", "application/xml")
///     .raw("<ok/>");
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// `200 OK`, `application/json`, body sent as-is.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { status: code, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// Builder for responses that need a custom status, headers or cookies.
    pub fn builder() -> ResponseBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        ResponseBuilder { status: StatusCode::OK, headers }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`].
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Numeric status. Codes outside `100..=999` become `500`.
    pub fn status_code(self, code: u16) -> Self {
        self.status(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
    }

    /// Sets a header, replacing any earlier value under the same name.
    /// Invalid names or values are dropped with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(header = name, "dropping invalid response header"),
        }
        self
    }

    /// Sets several headers at once; later pairs win.
    pub fn headers<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers.into_iter()
            .fold(self, |b, (k, v)| b.header(k.as_ref(), v.as_ref()))
    }

    /// Adds a `Set-Cookie` header. Accepts a [`Cookie`] or a cookie builder.
    pub fn cookie(mut self, cookie: impl Into<Cookie<'static>>) -> Self {
        let cookie: Cookie<'static> = cookie.into();
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                self.headers.append(SET_COOKIE, value);
            }
            Err(_) => warn!(cookie = cookie.name(), "dropping invalid cookie"),
        }
        self
    }

    pub fn cookies<C>(self, cookies: impl IntoIterator<Item = C>) -> Self
    where
        C: Into<Cookie<'static>>,
    {
        cookies.into_iter().fold(self, |b, c| b.cookie(c))
    }

    /// Terminate with a JSON-encoded body.
    ///
    /// A bare string is wrapped as `{"echo": "<string>"}` so the body is
    /// always a JSON document. Use [`raw`](Self::raw) to send text verbatim.
    pub fn echo(self, content: impl Into<Value>) -> Response {
        let content = match content.into() {
            Value::String(s) => json!({ "echo": s }),
            other => other,
        };
        let body = serde_json::to_vec(&content).unwrap_or_default();
        self.finish(body.into())
    }

    /// Terminate with a body sent verbatim under the current headers.
    pub fn raw(self, body: impl Into<Bytes>) -> Response {
        self.finish(body.into())
    }

    /// Terminate with pre-serialized JSON (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.header(CONTENT_TYPE.as_str(), APPLICATION_JSON).finish(body.into())
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        let body: String = body.into();
        self.header(CONTENT_TYPE.as_str(), TEXT_PLAIN).finish(Bytes::from(body))
    }

    /// Terminate with no body (e.g. `204 No Content`).
    pub fn no_body(mut self) -> Response {
        self.headers.remove(CONTENT_TYPE);
        self.finish(Bytes::new())
    }

    fn finish(self, body: Bytes) -> Response {
        Response { status: self.status, headers: self.headers, body }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a bare status from a handler: `return StatusCode::NO_CONTENT`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// A JSON value is echoed with `200 OK`.
impl IntoResponse for Value {
    fn into_response(self) -> Response { Response::builder().echo(self) }
}

/// Serializes `T` as the JSON body.
///
/// ```rust
/// use aapje::Json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { id: u64, name: String }
///
/// async fn get_user(_req: aapje::Request) -> Json<User> {
///     Json(User { id: 1, name: "alice".into() })
/// }
/// ```
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(bytes) => Response::json(bytes),
            Err(e) => {
                warn!("failed to serialize response body: {e}");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_json() {
        let res = Response::builder().echo(json!({ "ok": true }));
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body(), br#"{"ok":true}"#);
    }

    #[test]
    fn bare_string_is_wrapped() {
        let res = Response::builder().echo("Hello, world!");
        assert_eq!(res.body(), br#"{"echo":"Hello, world!"}"#);
    }

    #[test]
    fn raw_keeps_body_and_custom_content_type() {
        let res = Response::builder()
            .header("Content-Type", "text/html")
            .raw("<h1>Hello</h1>");
        assert_eq!(res.header("content-type"), Some("text/html"));
        assert_eq!(res.body(), b"<h1>Hello</h1>");
    }

    #[test]
    fn headers_replace_and_merge() {
        let res = Response::builder()
            .headers([("X-One", "1"), ("X-Two", "2"), ("X-One", "3")])
            .no_body();
        assert_eq!(res.header("x-one"), Some("3"));
        assert_eq!(res.header("x-two"), Some("2"));
        assert!(res.header("content-type").is_none());
    }

    #[test]
    fn invalid_header_is_dropped() {
        let res = Response::builder().header("bad header", "v").echo(Value::Null);
        assert_eq!(res.headers().len(), 1);
    }

    #[test]
    fn cookies_become_set_cookie_headers() {
        let res = Response::builder()
            .cookie(Cookie::build(("a", "1")).path("/").http_only(true))
            .cookies([Cookie::new("b", "2")])
            .echo(json!({}));
        let set: Vec<_> = res.headers().get_all(SET_COOKIE).iter()
            .map(|v| v.to_str().unwrap().to_owned())
            .collect();
        assert_eq!(set.len(), 2);
        assert!(set[0].starts_with("a=1"));
        assert!(set[0].contains("HttpOnly"));
        assert!(set[0].contains("Path=/"));
        assert_eq!(set[1], "b=2");
    }

    #[test]
    fn numeric_status() {
        assert_eq!(Response::builder().status_code(418).no_body().status_code(), 418);
        assert_eq!(Response::builder().status_code(42).no_body().status_code(), 500);
    }

    #[test]
    fn json_wrapper_serializes() {
        #[derive(Serialize)]
        struct User { id: u32 }
        let res = Json(User { id: 7 }).into_response();
        assert_eq!(res.body(), br#"{"id":7}"#);
    }
}
