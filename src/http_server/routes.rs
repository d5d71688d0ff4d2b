//! CRUD HTTP Routes
//!
//! Each handler opens its own connection on a blocking worker, does its
//! work through the [`RecordEngine`], and closes the connection before the
//! response is sent.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::report;
use crate::sqlite::schema::{self, ColumnInfo};
use crate::sqlite::{
    ConnectionProvider, CrudError, CrudResult, Filter, Record, RecordEngine, ResultSet, Value,
};

// ==================
// Shared State
// ==================

/// State shared across handlers. Holds no connection, only what is needed
/// to open one per request.
#[derive(Debug, Clone)]
pub struct CrudState {
    pub provider: ConnectionProvider,
    pub engine: RecordEngine,
}

impl CrudState {
    pub fn new(provider: ConnectionProvider, engine: RecordEngine) -> Self {
        Self { provider, engine }
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub table: String,
    #[serde(flatten)]
    pub records: ResultSet,
}

#[derive(Debug, Serialize)]
pub struct AddFormResponse {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Serialize)]
pub struct UpdateFormResponse {
    pub table: String,
    pub columns: Vec<String>,
    pub record: Record,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryPlantsForm {
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlantsResponse {
    pub plants: ResultSet,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

// ==================
// CRUD Routes
// ==================

/// Create CRUD routes
pub fn crud_routes(state: Arc<CrudState>) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/view/:table", get(view_table_handler))
        .route("/add/:table", get(add_form_handler).post(add_record_handler))
        .route("/delete/:table/:column/:value", post(delete_record_handler))
        .route(
            "/update/:table/:column/:value",
            get(update_form_handler).post(update_record_handler),
        )
        .route(
            "/query_plants",
            get(query_plants_form_handler).post(query_plants_handler),
        )
        .with_state(state)
}

// ==================
// Helper Functions
// ==================

fn error_response(err: CrudError) -> ApiError {
    let code = err.status_code();
    if err.is_rejection() {
        warn!(error = %err, "request rejected");
    } else {
        error!(error = %err, "request failed");
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorResponse {
            error: err.to_string(),
            code,
        }),
    )
}

/// Run `work` on a blocking worker with a connection scoped to this call.
async fn with_connection<T, F>(state: &Arc<CrudState>, work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection, &RecordEngine) -> CrudResult<T> + Send + 'static,
{
    let state = Arc::clone(state);
    let joined = tokio::task::spawn_blocking(move || {
        state
            .provider
            .with_connection(|conn| work(conn, &state.engine))
    })
    .await;

    match joined {
        Ok(result) => result.map_err(error_response),
        Err(e) => {
            error!(error = %e, "blocking task failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error".to_string(),
                    code: 500,
                }),
            ))
        }
    }
}

/// Location of a table's view page, percent-encoding anything that is not
/// safe in a path segment.
fn view_location(table: &str) -> String {
    let mut location = String::from("/view/");
    for byte in table.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.' | b'~') {
            location.push(byte as char);
        } else {
            location.push_str(&format!("%{:02X}", byte));
        }
    }
    location
}

// ==================
// Table Handlers
// ==================

async fn home_handler(State(state): State<Arc<CrudState>>) -> ApiResult<Json<TablesResponse>> {
    let tables = with_connection(&state, |conn, engine| engine.list_tables(conn)).await?;
    Ok(Json(TablesResponse { tables }))
}

async fn view_table_handler(
    State(state): State<Arc<CrudState>>,
    Path(table): Path<String>,
) -> ApiResult<Json<ViewResponse>> {
    let response = with_connection(&state, move |conn, engine| {
        let table = schema::resolve_table(conn, &table)?;
        let records = engine.select(conn, &table, None)?;
        Ok(ViewResponse { table, records })
    })
    .await?;
    Ok(Json(response))
}

// ==================
// Record Handlers
// ==================

async fn add_form_handler(
    State(state): State<Arc<CrudState>>,
    Path(table): Path<String>,
) -> ApiResult<Json<AddFormResponse>> {
    let info = with_connection(&state, move |conn, _| schema::describe_table(conn, &table)).await?;
    Ok(Json(AddFormResponse {
        table: info.name,
        columns: info.columns,
    }))
}

async fn add_record_handler(
    State(state): State<Arc<CrudState>>,
    Path(table): Path<String>,
    Form(fields): Form<Vec<(String, String)>>,
) -> ApiResult<Redirect> {
    let record = Record::from_form(fields);
    let table = with_connection(&state, move |conn, engine| {
        let table = schema::resolve_table(conn, &table)?;
        engine.insert(conn, &table, &record)?;
        Ok(table)
    })
    .await?;
    info!(%table, "record added");
    Ok(Redirect::to(&view_location(&table)))
}

async fn delete_record_handler(
    State(state): State<Arc<CrudState>>,
    Path((table, column, value)): Path<(String, String, String)>,
) -> ApiResult<Redirect> {
    let filter = Filter::new(&column, Value::Text(value));
    let (table, deleted) = with_connection(&state, move |conn, engine| {
        let table = schema::resolve_table(conn, &table)?;
        let deleted = engine.delete(conn, &table, &filter)?;
        Ok((table, deleted))
    })
    .await?;
    info!(%table, deleted, "records deleted");
    Ok(Redirect::to(&view_location(&table)))
}

async fn update_form_handler(
    State(state): State<Arc<CrudState>>,
    Path((table, column, value)): Path<(String, String, String)>,
) -> ApiResult<Json<UpdateFormResponse>> {
    let response = with_connection(&state, move |conn, engine| {
        let table = schema::resolve_table(conn, &table)?;
        let filter = Filter::new(&column, Value::Text(value.clone()));
        let rows = engine.select(conn, &table, Some(&filter))?;
        let record = rows.first_record().ok_or_else(|| CrudError::RecordNotFound {
            table: table.clone(),
            column,
            value,
        })?;
        Ok(UpdateFormResponse {
            table,
            columns: rows.columns,
            record,
        })
    })
    .await?;
    Ok(Json(response))
}

async fn update_record_handler(
    State(state): State<Arc<CrudState>>,
    Path((table, column, value)): Path<(String, String, String)>,
    Form(fields): Form<Vec<(String, String)>>,
) -> ApiResult<Redirect> {
    let filter = Filter::new(&column, Value::Text(value));
    let record = Record::from_form(fields);
    let table = with_connection(&state, move |conn, engine| {
        let table = schema::resolve_table(conn, &table)?;
        engine.update(conn, &table, &filter, &record)?;
        Ok(table)
    })
    .await?;
    info!(%table, "record updated");
    Ok(Redirect::to(&view_location(&table)))
}

// ==================
// Report Handlers
// ==================

async fn query_plants_form_handler() -> Json<PlantsResponse> {
    Json(PlantsResponse {
        plants: ResultSet::default(),
    })
}

async fn query_plants_handler(
    State(state): State<Arc<CrudState>>,
    Form(form): Form<QueryPlantsForm>,
) -> ApiResult<Json<PlantsResponse>> {
    let customer_id = match form.customer_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => return Ok(Json(PlantsResponse { plants: ResultSet::default() })),
    };
    let plants = with_connection(&state, move |conn, _| {
        report::plants_ordered_by_customer(conn, customer_id)
    })
    .await?;
    Ok(Json(PlantsResponse { plants }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_location_encodes_unsafe_bytes() {
        assert_eq!(view_location("plants"), "/view/plants");
        assert_eq!(view_location("order details"), "/view/order%20details");
        assert_eq!(view_location("a/b"), "/view/a%2Fb");
    }

    #[test]
    fn error_response_uses_status_code() {
        let (status, Json(body)) = error_response(CrudError::UnknownTable("nope".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, 400);
        assert!(body.error.contains("nope"));
    }
}
