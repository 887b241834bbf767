//! Request handlers for the HTTP API.

use crate::commands::{self, plural};
use crate::import::ImportSummary;
use crate::model::{Transaction, TransactionField};
use crate::server::error::{ApiError, ApiResult};
use crate::server::{AppState, MAX_UPLOAD_BYTES};
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Where the bytes of an upload come from.
#[derive(Debug)]
enum Source {
    Example,
    File { name: String, bytes: Bytes },
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadResponse {
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    row_errors: Vec<String>,
}

impl From<ImportSummary> for UploadResponse {
    fn from(summary: ImportSummary) -> Self {
        let count = summary.rows_processed();
        Self {
            message: format!("Successfully processed {count} row{}", plural(count)),
            row_errors: summary.row_errors().to_vec(),
        }
    }
}

/// GET /health
pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/upload_csv
///
/// Accepts a multipart upload with a `file` part, or a request for the bundled example file: a
/// `use_example` form field, a JSON body with a truthy `use_example`, or any other body that
/// mentions `example`.
pub(crate) async fn upload_csv(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ApiResult<Json<UploadResponse>> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();

    let source = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart request: {e}")))?;
        read_multipart(multipart).await?
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), MAX_UPLOAD_BYTES)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {e}")))?;
        read_body(&content_type, &bytes)?
    };

    let summary = match source {
        Source::Example => {
            let path = state.config.example_file();
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(ApiError::NotFound("Example file not found".to_string()));
            }
            info!("Importing the example file {}", path.display());
            state.importer.import_file(&path).await?
        }
        Source::File { name, bytes } => {
            info!("Importing uploaded file '{name}' ({} bytes)", bytes.len());
            state.importer.import(&bytes, &name).await?
        }
    };
    Ok(Json(summary.into()))
}

async fn read_multipart(mut multipart: Multipart) -> ApiResult<Source> {
    let mut use_example = false;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "use_example" => use_example = true,
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read file content: {e}"))
                })?;
                file = Some((file_name, bytes));
            }
            other => debug!("Ignoring multipart field '{other}'"),
        }
    }

    if use_example {
        return Ok(Source::Example);
    }
    let (name, bytes) = file.ok_or_else(invalid_format)?;
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    if !name.to_lowercase().ends_with(".csv") {
        return Err(ApiError::bad_request(format!(
            "Only CSV files are supported, got '{name}'"
        )));
    }
    if bytes.is_empty() {
        return Err(ApiError::bad_request("The uploaded file is empty"));
    }
    Ok(Source::File { name, bytes })
}

/// Reads a non-multipart upload body, which can only ever ask for the example file.
fn read_body(content_type: &str, bytes: &[u8]) -> ApiResult<Source> {
    if content_type.starts_with("application/json") {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")))?;
        return match value.get("use_example") {
            Some(v) if is_truthy(v) => Ok(Source::Example),
            _ => Err(invalid_format()),
        };
    }
    if bytes.windows(b"example".len()).any(|w| w == b"example") {
        return Ok(Source::Example);
    }
    Err(invalid_format())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn invalid_format() -> ApiError {
    ApiError::bad_request("Invalid request format: No file or example data found")
}

/// GET /api/transactions
pub(crate) async fn list_transactions(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let out = commands::list(state.config.clone()).await?;
    Ok(Json(out.into_structure().unwrap_or_default()))
}

/// DELETE /api/transactions/delete-all
pub(crate) async fn delete_all(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let out = commands::clear(state.config.clone()).await?;
    Ok(Json(json!({ "message": out.message() })))
}

/// PUT /api/transactions/:id/category
pub(crate) async fn update_category(
    state: State<Arc<AppState>>,
    id: Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    update(state, id, TransactionField::Category, body).await
}

/// PUT /api/transaction/:id/currency
pub(crate) async fn update_currency(
    state: State<Arc<AppState>>,
    id: Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    update(state, id, TransactionField::Currency, body).await
}

/// PUT /api/transaction/:id/account
pub(crate) async fn update_account(
    state: State<Arc<AppState>>,
    id: Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    update(state, id, TransactionField::Account, body).await
}

/// PUT /api/transaction/:id/memo
pub(crate) async fn update_memo(
    state: State<Arc<AppState>>,
    id: Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    update(state, id, TransactionField::Memo, body).await
}

async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    field: TransactionField,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let value = field_value(&body, field)?;
    let out = commands::update(state.config.clone(), &id, field, value.as_deref()).await?;
    Ok(Json(json!({
        "message": out.message(),
        "transaction": out.structure(),
    })))
}

/// Pulls the new value for `field` out of a JSON object body. An empty body, a missing key and
/// `null` all mean "not supplied".
fn field_value(body: &[u8], field: TransactionField) -> ApiResult<Option<String>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| ApiError::bad_request("The request body must be a JSON object"))?;
    let key = field.body_key();
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ApiError::bad_request(format!(
            "'{key}' must be a string, got {other}"
        ))),
    }
}
