//! Minimal aapje example: a users API over SQLite plus request/response tricks.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl -X POST http://localhost:3000/users \
//!        -H 'authorization: Bearer demo' \
//!        -d '{"email":"a@b.com","name":"alice"}'
//!   curl -H 'authorization: Bearer demo' http://localhost:3000/user/1
//!   curl -H 'authorization: Bearer demo' 'http://localhost:3000/users?limit=5'
//!   curl -X DELETE -H 'authorization: Bearer demo' http://localhost:3000/user/1
//!   curl -c - http://localhost:3000/set-cookie
//!   curl -i -X OPTIONS http://localhost:3000/users \
//!        -H 'origin: https://example.com' -H 'access-control-request-method: POST'

use std::sync::Arc;

use aapje::db::{Columns, Database, DbConfig, SelectOptions, Sort, Sqlite, Statement};
use aapje::middleware::{self, Cors, Flow};
use aapje::{Cookie, Error, Request, Response, Router, SameSite, Server, VERSION};
use http::{Method, StatusCode};
use serde_json::{Value, json};

type Db = Arc<Database<Sqlite>>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let db: Db = Arc::new(Database::new(DbConfig::sqlite(":memory:")));
    db.execute(&Statement::new(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, email TEXT NOT NULL, name TEXT NOT NULL)",
        vec![],
    ))
    .await?;

    let app = Router::new()
        .default_headers([("X-Powered-By", "aapje")])
        .cors(
            Cors::new()
                .allow_origins(["https://example.com", "https://example.org"])
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers(["Content-Type", "Authorization"])
                .allow_credentials(true),
        )
        .middleware(middleware::log_requests)
        .middleware(require_auth)
        .route("*", "/", welcome)
        .get("/users", with_db(Arc::clone(&db), list_users))
        .post("/users", with_db(Arc::clone(&db), create_user))
        .get("/user/@id", with_db(Arc::clone(&db), get_user))
        .put("/user/@id", with_db(Arc::clone(&db), update_user))
        .delete("/user/@id", with_db(Arc::clone(&db), delete_user))
        .get("/client-info", client_info)
        .get("/set-cookie", set_cookie)
        .post("/upload", upload)
        .get("/html", |_req: Request| async {
            Response::builder().header("Content-Type", "text/html").raw("<h1>Hello, world!</h1>")
        });

    Server::bind("0.0.0.0:3000").serve(app).await
}

/// Adapts `fn(Db, Request)` handlers into router handlers holding a clone of the handle.
fn with_db<F, Fut>(db: Db, f: F) -> impl Fn(Request) -> Fut + Send + Sync + 'static
where
    F: Fn(Db, Request) -> Fut + Send + Sync + 'static,
    Fut: Send + 'static,
{
    move |req| f(Arc::clone(&db), req)
}

// Everything but the welcome page and cookie demo needs a bearer token.
fn require_auth(req: &Request) -> Flow {
    if matches!(req.path(), "/" | "/set-cookie" | "/html") {
        return Flow::Continue;
    }
    match req.header("authorization") {
        Some(h) if h.starts_with("Bearer ") => Flow::Continue,
        _ => Flow::Respond(
            Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .echo(json!({ "error": "Unauthorized" })),
        ),
    }
}

// * /
async fn welcome(_req: Request) -> Response {
    Response::builder().echo(json!({ "message": "Welcome to aapje!", "version": VERSION }))
}

// GET /users?limit=5&sort=desc
async fn list_users(db: Db, req: Request) -> Result<Response, Error> {
    let mut options = SelectOptions::new().order_by("id");
    if let Some(sort) = req.query_param("sort") {
        options = options.sort(sort.parse::<Sort>()?);
    }
    if let Some(limit) = req.query_param("limit") {
        let limit = limit.parse::<i64>()
            .map_err(|_| Error::InvalidArgument(format!("Invalid limit: {limit}")))?;
        options = options.limit(limit);
    }

    let users = db.select_all("users", &Columns::All, &Value::Null, &options).await?;
    Ok(Response::builder().echo(users))
}

// POST /users  {"email": "...", "name": "..."}
async fn create_user(db: Db, req: Request) -> Result<Response, Error> {
    let input = req.input()?;
    let (Some(email), Some(name)) = (input["email"].as_str(), input["name"].as_str()) else {
        return Ok(Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .echo(json!({ "error": "Email and name are required" })));
    };

    let id = db.insert("users", &json!({ "email": email, "name": name })).await?;
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .echo(json!({ "created_user_id": id })))
}

// GET /user/@id
async fn get_user(db: Db, req: Request) -> Result<Response, Error> {
    let id = req.param("id").unwrap_or_default();
    let user = db.select("users", &Columns::All, &json!({ "id": id }), &SelectOptions::new()).await?;
    Ok(match user {
        Some(user) => Response::builder().echo(user),
        None => not_found(),
    })
}

// PUT /user/@id  (only email and name are writable)
async fn update_user(db: Db, req: Request) -> Result<Response, Error> {
    let id = req.param("id").unwrap_or_default();
    let input = req.input()?;
    let data: serde_json::Map<String, Value> = ["email", "name"]
        .into_iter()
        .filter_map(|k| input.get(k).map(|v| (k.to_owned(), v.clone())))
        .collect();
    if data.is_empty() {
        return Ok(Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .echo(json!({ "error": "No valid fields to update" })));
    }

    match db.update("users", &Value::Object(data), &json!({ "id": id })).await? {
        0 => Ok(not_found()),
        _ => Ok(Response::builder().echo(json!({ "updated_user_id": id }))),
    }
}

// DELETE /user/@id
async fn delete_user(db: Db, req: Request) -> Result<Response, Error> {
    let id = req.param("id").unwrap_or_default();
    db.delete("users", &json!({ "id": id })).await?;
    Ok(Response::builder().echo(json!({ "deleted_user_id": id })))
}

// GET /client-info
async fn client_info(req: Request) -> Response {
    Response::builder().echo(json!({ "ip": req.ip(), "user_agent": req.user_agent() }))
}

// GET /set-cookie
async fn set_cookie(_req: Request) -> Response {
    Response::builder()
        .cookie(
            Cookie::build(("example_cookie", "cookie_value"))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax),
        )
        .echo(json!({ "message": "Cookie set" }))
}

// POST /upload  (multipart/form-data, field "file")
async fn upload(req: Request) -> Response {
    match req.file("file") {
        Some(file) => Response::builder()
            .header("X-Upload-Status", "Success")
            .echo(json!({ "uploaded_file": file.name, "bytes": file.data.len() })),
        None => Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .echo(json!({ "error": "No file uploaded" })),
    }
}

fn not_found() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .echo(json!({ "error": "User not found" }))
}
