//! Incoming HTTP request type.
//!
//! A read-only view: the server buffers the body, the router attaches path
//! parameters, and handlers only ever read.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::OnceLock;

use bytes::Bytes;
use cookie::Cookie;
use http::header::{CONTENT_TYPE, COOKIE, USER_AGENT};
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::Error;
use crate::multipart;

/// An incoming HTTP request with a fully buffered body.
pub struct Request {
    head: http::request::Parts,
    body: Bytes,
    params: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
    parts: OnceLock<Vec<multipart::Part>>,
}

/// A file part of a `multipart/form-data` body.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// Form field name.
    pub field: String,
    /// Client-supplied file name.
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Request {
    pub fn new(req: http::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        Self { head, body, params: HashMap::new(), remote_addr: None, parts: OnceLock::new() }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name)?.to_str().ok()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/@id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }

    /// Every cookie sent in `Cookie` headers. Unparseable pairs are skipped.
    pub fn cookies(&self) -> HashMap<String, String> {
        self.head.headers.get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .map(|c| (c.name().to_owned(), c.value().to_owned()))
            .collect()
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        self.query_params().remove(key)
    }

    /// Decoded URL query string. A repeated key keeps its last value.
    pub fn query_params(&self) -> HashMap<String, String> {
        let query = self.head.uri.query().unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn form_param(&self, key: &str) -> Option<String> {
        self.form_params().remove(key)
    }

    /// Form fields from an urlencoded body, or the non-file parts of a
    /// multipart body. Any other content type yields no fields.
    pub fn form_params(&self) -> HashMap<String, String> {
        let Some(content_type) = self.header(CONTENT_TYPE.as_str()) else {
            return HashMap::new();
        };

        if mime_is(content_type, "application/x-www-form-urlencoded") {
            return url::form_urlencoded::parse(&self.body).into_owned().collect();
        }

        self.parts()
            .iter()
            .filter(|p| p.filename.is_none())
            .map(|p| (p.name.clone(), String::from_utf8_lossy(&p.data).into_owned()))
            .collect()
    }

    /// First uploaded file sent under form field `field`.
    pub fn file(&self, field: &str) -> Option<UploadedFile> {
        self.files().into_iter().find(|f| f.field == field)
    }

    /// Every file part of a `multipart/form-data` body, in body order.
    pub fn files(&self) -> Vec<UploadedFile> {
        self.parts()
            .iter()
            .filter_map(|p| {
                Some(UploadedFile {
                    field: p.name.clone(),
                    name: p.filename.clone()?,
                    content_type: p.content_type.clone(),
                    data: p.data.clone(),
                })
            })
            .collect()
    }

    /// Multipart parts, decoded on first use. A malformed body has none.
    fn parts(&self) -> &[multipart::Part] {
        self.parts.get_or_init(|| {
            let Some(boundary) = self.header(CONTENT_TYPE.as_str()).and_then(multipart::boundary) else {
                return Vec::new();
            };
            multipart::parse(self.body.clone(), &boundary).unwrap_or_else(|e| {
                warn!(path = self.path(), "discarding malformed multipart body: {e}");
                Vec::new()
            })
        })
    }

    /// The body decoded as JSON. An empty body decodes to `null`.
    pub fn input(&self) -> Result<Value, Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The body deserialized into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Peer address as text, `"0.0.0.0"` when unknown.
    pub fn ip(&self) -> String {
        self.remote_addr
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|| "0.0.0.0".to_owned())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(USER_AGENT.as_str())
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        Self::new(req)
    }
}

fn mime_is(content_type: &str, mime: &str) -> bool {
    content_type.split(';')
        .next()
        .is_some_and(|m| m.trim().eq_ignore_ascii_case(mime))
}
