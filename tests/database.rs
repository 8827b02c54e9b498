#![cfg(feature = "sqlite")]

use std::sync::Arc;

use aapje::db::{Columns, Database, DbConfig, SelectOptions, Sort, Sqlite, Statement};
use aapje::{Error, Request, Response, Router};
use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::{Value, json};

async fn users_db() -> Database<Sqlite> {
    let db = Database::new(DbConfig::sqlite(":memory:"));
    db.execute(&Statement::new(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, email TEXT NOT NULL, name TEXT NOT NULL)",
        vec![],
    ))
    .await
    .unwrap();
    db
}

#[tokio::test]
async fn connection_opens_on_first_query_only() {
    let db: Database<Sqlite> = Database::new(DbConfig::sqlite(":memory:"));
    assert!(!db.is_connected().await);

    // Rejected before any SQL exists, so nothing connects.
    let err = db.insert("users;", &json!({ "a": 1 })).await.unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier(_)));
    assert!(!db.is_connected().await);

    db.query(&Statement::new("SELECT 1 AS one", vec![])).await.unwrap();
    assert!(db.is_connected().await);
}

#[tokio::test]
async fn insert_returns_generated_ids() {
    let db = users_db().await;
    let first = db.insert("users", &json!({ "email": "a@b.com", "name": "A" })).await.unwrap();
    let second = db.insert("users", &json!({ "email": "c@d.com", "name": "C" })).await.unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[tokio::test]
async fn select_returns_at_most_one_row() {
    let db = users_db().await;
    db.insert("users", &json!({ "email": "a@b.com", "name": "A" })).await.unwrap();
    db.insert("users", &json!({ "email": "b@b.com", "name": "A" })).await.unwrap();

    let row = db
        .select("users", &Columns::All, &json!({ "id": 1 }), &SelectOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(Value::Object(row), json!({ "id": 1, "email": "a@b.com", "name": "A" }));

    let newest = db
        .select(
            "users",
            &Columns::list(["email"]),
            &json!({ "name": "A" }),
            &SelectOptions::new().order_by("id").sort(Sort::Desc),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(newest["email"], "b@b.com");

    let missing = db
        .select("users", &Columns::All, &json!({ "id": 99 }), &SelectOptions::new())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn select_all_orders_and_limits() {
    let db = users_db().await;
    for i in 1..=6 {
        db.insert("users", &json!({ "email": format!("u{i}@x.io"), "name": "U" })).await.unwrap();
    }

    let rows = db
        .select_all(
            "users",
            &Columns::list(["id", "email"]),
            &Value::Null,
            &SelectOptions::try_from(&json!({ "orderBy": "id", "sort": "desc", "limit": 5 })).unwrap(),
        )
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, [6, 5, 4, 3, 2]);
    assert_eq!(rows[0].keys().collect::<Vec<_>>(), ["id", "email"]);

    let err = db
        .select_all("users", &Columns::All, &Value::Null, &SelectOptions::new().limit(0))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid limit: 0");
}

#[tokio::test]
async fn update_and_delete_report_affected_rows() {
    let db = users_db().await;
    db.insert("users", &json!({ "email": "a@b.com", "name": "A" })).await.unwrap();
    db.insert("users", &json!({ "email": "b@b.com", "name": "B" })).await.unwrap();

    let changed = db
        .update("users", &json!({ "name": "Z" }), &json!({ "email": "a@b.com" }))
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let row = db
        .select("users", &Columns::list(["name"]), &json!({ "id": 1 }), &SelectOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["name"], "Z");

    assert_eq!(db.delete("users", &json!({ "id": 2 })).await.unwrap(), 1);
    assert_eq!(db.delete("users", &Value::Null).await.unwrap(), 1);
    let left = db.select_all("users", &Columns::All, &Value::Null, &SelectOptions::new()).await.unwrap();
    assert!(left.is_empty());
}

#[tokio::test]
async fn values_never_reach_the_sql_text() {
    let db = users_db().await;
    let hostile = "x'); DROP TABLE users; --";
    db.insert("users", &json!({ "email": hostile, "name": "H" })).await.unwrap();

    let row = db
        .select("users", &Columns::All, &json!({ "email": hostile }), &SelectOptions::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["email"], hostile);
}

#[tokio::test]
async fn handlers_share_the_database() {
    let db = Arc::new(users_db().await);

    let create_db = Arc::clone(&db);
    let read_db = Arc::clone(&db);
    let app = Router::new()
        .post("/users", move |req: Request| {
            let db = Arc::clone(&create_db);
            async move {
                let input = req.input()?;
                let id = db.insert("users", &input).await?;
                Ok::<_, Error>(
                    Response::builder()
                        .status(StatusCode::CREATED)
                        .echo(json!({ "created_user_id": id })),
                )
            }
        })
        .get("/user/@id", move |req: Request| {
            let db = Arc::clone(&read_db);
            async move {
                let id = req.param("id").unwrap_or_default();
                let user = db
                    .select("users", &Columns::All, &json!({ "id": id }), &SelectOptions::new())
                    .await?;
                Ok::<_, Error>(match user {
                    Some(user) => Response::builder().echo(user),
                    None => Response::builder()
                        .status(StatusCode::NOT_FOUND)
                        .echo(json!({ "error": "User not found" })),
                })
            }
        });

    let create = Request::new(
        http::Request::post("/users")
            .header("content-type", "application/json")
            .body(Bytes::from_static(br#"{"email":"a@b.com","name":"A"}"#))
            .unwrap(),
    );
    let res = app.dispatch(create).await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    assert_eq!(serde_json::from_slice::<Value>(res.body()).unwrap(), json!({ "created_user_id": 1 }));

    let get = |path: &str| {
        Request::new(http::Request::builder().method(Method::GET).uri(path).body(Bytes::new()).unwrap())
    };
    let res = app.dispatch(get("/user/1")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(res.body()).unwrap()["email"], "a@b.com");

    let res = app.dispatch(get("/user/9")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

    // A bad column name in the body is a validation error: 418 by default.
    let bad = Request::new(
        http::Request::post("/users")
            .body(Bytes::from_static(br#"{"email; --":"x"}"#))
            .unwrap(),
    );
    let res = app.dispatch(bad).await;
    assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);
    assert_eq!(
        serde_json::from_slice::<Value>(res.body()).unwrap(),
        json!({ "error": "Invalid identifier: email; --" })
    );
}
