//! Middleware layer.
//!
//! Middleware runs before route matching, in registration order, and either
//! lets the request through ([`Flow::Continue`]) or answers it outright
//! ([`Flow::Respond`]). It is the right place for request logging and
//! header checks such as `Authorization`.
//!
//! CORS needs to touch responses too, so [`Cors`] is registered on the
//! router with [`Router::cors`](crate::Router::cors) rather than as a step.
//!
//! ```rust
//! use aapje::{Router, Response, middleware::{self, Flow}};
//! use http::StatusCode;
//! use serde_json::json;
//!
//! let app = Router::new()
//!     .middleware(middleware::log_requests)
//!     .middleware(|req: &aapje::Request| match req.header("authorization") {
//!         Some(_) => Flow::Continue,
//!         None => Flow::Respond(
//!             Response::builder()
//!                 .status(StatusCode::UNAUTHORIZED)
//!                 .echo(json!({ "error": "Unauthorized" })),
//!         ),
//!     });
//! ```

use std::sync::Arc;

use tracing::info;

use crate::request::Request;
use crate::response::Response;

mod cors;

pub use cors::Cors;

/// The outcome of one middleware step.
pub enum Flow {
    /// Hand the request to the next middleware, then the routes.
    Continue,
    /// Stop here and send this response.
    Respond(Response),
}

/// Implemented for every `Fn(&Request) -> Flow` that can be shared across
/// connections.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: &Request) -> Flow;
}

impl<F> Middleware for F
where
    F: Fn(&Request) -> Flow + Send + Sync + 'static,
{
    fn handle(&self, req: &Request) -> Flow {
        self(req)
    }
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// Logs method, path, peer address and user agent of every request.
pub fn log_requests(req: &Request) -> Flow {
    info!(
        method = %req.method(),
        path = req.path(),
        ip = %req.ip(),
        user_agent = req.user_agent().unwrap_or("-"),
        "request"
    );
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn request_logging_never_stops_a_request() {
        let req = Request::new(http::Request::get("/x").body(Bytes::new()).unwrap());
        assert!(matches!(log_requests(&req), Flow::Continue));
    }
}
