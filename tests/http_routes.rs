use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use rust_sqlite_crud::http_server::{CrudState, HttpServer, HttpServerConfig};
use rust_sqlite_crud::{ConnectionProvider, RecordEngine, RuleRegistry, SqliteConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn create_app() -> (Router, ConnectionProvider, TempDir) {
    let dir = TempDir::new().unwrap();
    let provider = ConnectionProvider::new(SqliteConfig::new(dir.path().join("shop.db")));
    provider
        .with_connection(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE plants (pid INTEGER PRIMARY KEY, name TEXT NOT NULL, quantity INTEGER);
                CREATE TABLE orders (oid INTEGER PRIMARY KEY, pid INTEGER, cid INTEGER, OrderDate TEXT);
                CREATE TABLE order_details (oid INTEGER, pid INTEGER, quantity INTEGER);
                INSERT INTO plants VALUES (1, 'Fern', 3), (2, 'Cactus', 0);
                INSERT INTO orders VALUES (10, 1, 7, '2024-05-01');
                INSERT INTO order_details VALUES (10, 1, 2);
                "#,
            )?;
            Ok(())
        })
        .unwrap();

    let state = CrudState::new(provider.clone(), RecordEngine::new(RuleRegistry::plant_store()));
    let router = HttpServer::with_state(HttpServerConfig::default(), state).router();
    (router, provider, dir)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

fn plant_count(provider: &ConnectionProvider) -> i64 {
    provider
        .with_connection(|conn| Ok(conn.query_row("SELECT count(*) FROM plants", [], |r| r.get(0))?))
        .unwrap()
}

#[tokio::test]
async fn home_lists_tables() {
    let (app, _provider, _dir) = create_app();
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "tables": ["plants", "orders", "order_details"] })
    );
}

#[tokio::test]
async fn view_returns_columns_and_rows() {
    let (app, _provider, _dir) = create_app();
    let response = app.oneshot(get("/view/plants")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["table"], "plants");
    assert_eq!(body["columns"], json!(["pid", "name", "quantity"]));
    assert_eq!(body["rows"][0], json!([1, "Fern", 3]));
}

#[tokio::test]
async fn view_unknown_table_is_bad_request() {
    let (app, _provider, _dir) = create_app();
    let response = app.oneshot(get("/view/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn add_form_describes_columns() {
    let (app, _provider, _dir) = create_app();
    let response = app.oneshot(get("/add/PLANTS")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["table"], "plants");
    assert_eq!(body["columns"][0]["name"], "pid");
    assert_eq!(body["columns"][0]["primary_key"], true);
    assert_eq!(body["columns"][1]["not_null"], true);
}

#[tokio::test]
async fn add_inserts_and_redirects() {
    let (app, provider, _dir) = create_app();
    let response = app
        .oneshot(post_form("/add/plants", "pid=3&name=Ivy&quantity=4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/view/plants");
    assert_eq!(plant_count(&provider), 3);
}

#[tokio::test]
async fn add_rejects_negative_quantity() {
    let (app, provider, _dir) = create_app();
    let response = app
        .oneshot(post_form("/add/plants", "pid=3&name=Ivy&quantity=-4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("negative"));
    assert_eq!(plant_count(&provider), 2);
}

#[tokio::test]
async fn add_order_for_out_of_stock_plant_is_rejected() {
    let (app, _provider, _dir) = create_app();
    let response = app
        .oneshot(post_form("/add/orders", "oid=11&pid=2&cid=7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("out of stock"));
}

#[tokio::test]
async fn delete_redirects_even_when_nothing_matches() {
    let (app, provider, _dir) = create_app();
    let response = app
        .clone()
        .oneshot(post_form("/delete/plants/pid/99", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(plant_count(&provider), 2);

    let response = app
        .oneshot(post_form("/delete/plants/pid/2", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(plant_count(&provider), 1);
}

#[tokio::test]
async fn update_form_shows_current_record() {
    let (app, _provider, _dir) = create_app();
    let response = app.clone().oneshot(get("/update/plants/pid/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["record"], json!({ "pid": 1, "name": "Fern", "quantity": 3 }));

    let response = app.oneshot(get("/update/plants/pid/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn table_names_are_echoed_in_catalog_spelling() {
    let (app, _provider, _dir) = create_app();
    let response = app.clone().oneshot(get("/update/PLANTS/pid/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["table"], "plants");

    let response = app.oneshot(get("/view/Plants")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["table"], "plants");
}

#[tokio::test]
async fn update_changes_row_and_redirects() {
    let (app, _provider, _dir) = create_app();
    let response = app
        .clone()
        .oneshot(post_form("/update/plants/pid/1", "name=Boston+Fern&quantity=5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/view/plants");

    let response = app.oneshot(get("/update/plants/pid/1")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["record"]["name"], "Boston Fern");
    assert_eq!(body["record"]["quantity"], 5);
}

#[tokio::test]
async fn update_with_unknown_column_is_rejected() {
    let (app, _provider, _dir) = create_app();
    let response = app
        .oneshot(post_form("/update/plants/pid/1", "colour=green"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn query_plants_by_customer() {
    let (app, _provider, _dir) = create_app();
    let response = app.clone().oneshot(get("/query_plants")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["plants"]["rows"], json!([]));

    let response = app
        .oneshot(post_form("/query_plants", "customer_id=7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["plants"]["columns"],
        json!(["PlantName", "quantity", "OrderDate"])
    );
    assert_eq!(body["plants"]["rows"], json!([["Fern", 2, "2024-05-01"]]));
}
