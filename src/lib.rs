//! # aapje
//!
//! A small HTTP micro-framework: ordered routes with `@name` placeholders,
//! a thin request/response layer, and a parameterized query builder over one
//! database connection.
//!
//! - **Routing**: routes are tried in registration order, first match wins.
//!   `"*"` routes answer every method. No match is a `404`.
//! - **Errors**: a handler that returns `Err` gets a `418` (configurable)
//!   with `{"error": "<message>"}`.
//! - **Queries**: table and column names must match `^[A-Za-z0-9_-]+$`;
//!   values always travel as bound parameters.
//! - **Headers**: [`Router::default_headers`] and [`Router::cors`] decorate
//!   every response; CORS preflights are answered before middleware.
//!
//! TLS, body-size limits and rate limiting belong to the reverse proxy in
//! front of the server.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use aapje::db::{Columns, Database, DbConfig, MySql, SelectOptions};
//! use aapje::{Error, Request, Response, Router, Server};
//! use http::StatusCode;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let db: Arc<Database<MySql>> =
//!         Arc::new(Database::new(DbConfig::new("localhost", "app", "app", "secret")));
//!
//!     let get_db = Arc::clone(&db);
//!     let app = Router::new()
//!         .route("*", "/", |_req: Request| async { Response::builder().echo("Hello, world!") })
//!         .get("/user/@id", move |req: Request| {
//!             let db = Arc::clone(&get_db);
//!             async move {
//!                 let id = req.param("id").unwrap_or_default();
//!                 let user = db
//!                     .select("users", &Columns::All, &json!({ "id": id }), &SelectOptions::new())
//!                     .await?;
//!                 Ok::<_, Error>(match user {
//!                     Some(user) => Response::builder().echo(user),
//!                     None => Response::builder()
//!                         .status(StatusCode::NOT_FOUND)
//!                         .echo(json!({ "error": "User not found" })),
//!                 })
//!             }
//!         });
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//! ```

pub mod db;
mod error;
mod handler;
mod method;
pub mod middleware;
mod multipart;
mod pattern;
pub mod query;
mod request;
mod response;
mod router;
mod server;

pub use cookie::{Cookie, SameSite};
pub use db::Database;
pub use error::Error;
pub use handler::{Handler, IntoOutcome};
pub use method::{IntoMethodFilter, MethodFilter};
pub use pattern::Pattern;
pub use request::{Request, UploadedFile};
pub use response::{IntoResponse, Json, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;

/// The crate version, as reported by the demo's welcome route.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
