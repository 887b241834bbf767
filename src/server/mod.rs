//! The HTTP API.
//!
//! Every route answers with JSON. Errors are rendered as `{"error": "..."}` with a 400, 404 or 500
//! status. When a static directory is configured, any path that no route matches is served from
//! it, falling back to its `index.html`.

mod error;
mod handlers;

use crate::error::Re;
use crate::import::Importer;
use crate::Config;
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// The largest request body the upload endpoint will read.
pub(crate) const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// State shared by every handler.
#[derive(Debug)]
pub(crate) struct AppState {
    config: Config,
    // One importer for the whole server so that concurrent uploads queue up behind each other.
    importer: Importer,
}

impl AppState {
    pub(crate) fn new(config: Config) -> Self {
        let importer = config.importer();
        Self { config, importer }
    }
}

/// Create the application router with all API endpoints.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.static_dir();

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/upload_csv", post(handlers::upload_csv))
        .route("/api/transactions", get(handlers::list_transactions))
        .route("/api/transactions/delete-all", delete(handlers::delete_all))
        .route(
            "/api/transactions/:id/category",
            put(handlers::update_category),
        )
        .route(
            "/api/transaction/:id/currency",
            put(handlers::update_currency),
        )
        .route("/api/transaction/:id/account", put(handlers::update_account))
        .route("/api/transaction/:id/memo", put(handlers::update_memo))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => {
            info!("Serving static files from {}", dir.display());
            let index = dir.join("index.html");
            app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => app,
    };

    app.layer(cors).layer(TraceLayer::new_for_http())
}

/// Binds to `listen` and serves the API until Ctrl-C is received.
pub(crate) async fn run(config: Config, listen: &str) -> Re<()> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid listen address '{listen}'"))?;
    let app = router(Arc::new(AppState::new(config)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to bind to {addr}"))?;
    info!("Listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("The server stopped with an error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C, the server will run until killed: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::test::TestEnv;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tower::ServiceExt;

    const BOUNDARY: &str = "intake-test-boundary";

    const SAMPLE: &str = "date,description,debit,credit\n\
        2024-01-02,Coffee Shop,4.50,\n\
        2024-01-03,Refund,,12.00\n";

    fn app(env: &TestEnv) -> Router {
        router(Arc::new(AppState::new(env.config())))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Builds a multipart body with one part per `(name, file_name, content)`.
    fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file_name {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                     Content-Type: text/csv\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method(Method::POST)
            .uri("/api/upload_csv")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let env = TestEnv::new().await;
        let (status, body) = send(app(&env), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_upload_file_then_list() {
        let env = TestEnv::new().await;
        let (status, body) = send(
            app(&env),
            multipart(&[("file", Some("bank.csv"), SAMPLE)]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully processed 2 rows");
        assert!(body.get("row_errors").is_none());

        let (status, body) = send(app(&env), get("/api/transactions")).await;
        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["description"], "Refund");
        assert_eq!(list[0]["amount"], json!(12.0));
        assert_eq!(list[1]["amount"], json!(-4.5));
        assert_eq!(list[1]["currency"], "USD");
        assert!(list[1]["custom_category"].is_null());
    }

    #[tokio::test]
    async fn test_upload_reports_row_errors() {
        let env = TestEnv::new().await;
        let content = "Payee,Outflow,Inflow\nGrocer,1.00,\n";
        let (status, body) = send(
            app(&env),
            multipart(&[("file", Some("budget.csv"), content)]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully processed 0 rows");
        assert_eq!(body["row_errors"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_files() {
        let env = TestEnv::new().await;

        let (status, body) = send(
            app(&env),
            multipart(&[("file", Some("notes.txt"), SAMPLE)]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("CSV"));

        let (status, _) = send(app(&env), multipart(&[("file", Some("empty.csv"), "")])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(app(&env), multipart(&[("other", None, "x")])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request format"));
    }

    #[tokio::test]
    async fn test_upload_malformed_json() {
        let env = TestEnv::new().await;
        let request = json_request(Method::POST, "/api/upload_csv", "{\"use_example\": ");
        let (status, body) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON"));
    }

    #[tokio::test]
    async fn test_upload_example_missing() {
        let env = TestEnv::new().await;
        let request = json_request(Method::POST, "/api/upload_csv", r#"{"use_example": true}"#);
        let (status, body) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Example file not found");
    }

    #[tokio::test]
    async fn test_upload_example() {
        let env = TestEnv::new().await;
        env.write_file("sample_transactions.csv", SAMPLE).await;

        let request = json_request(Method::POST, "/api/upload_csv", r#"{"use_example": true}"#);
        let (status, body) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully processed 2 rows");

        let (status, _) = send(app(&env), multipart(&[("use_example", None, "true")])).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/upload_csv")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("use_example=true"))
            .unwrap();
        let (status, _) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(env.config().db().count_transactions().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upload_undecodable_file_is_server_error() {
        let env = TestEnv::new().await;
        env.insert_transaction("2024-01-01", "Old", Decimal::ONE).await;

        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"bad.csv\"\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(&[0xff, 0xfe, 0x41]);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/upload_csv")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let (status, body) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Error processing file"));
        // The store was cleared before the file failed to decode.
        assert_eq!(env.config().db().count_transactions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_category() {
        let env = TestEnv::new().await;
        let id = env.insert_transaction("2024-01-01", "Coffee", Decimal::ONE).await;
        let uri = format!("/api/transactions/{id}/category");

        let request = json_request(Method::PUT, &uri, r#"{"custom_category": "Treats"}"#);
        let (status, body) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transaction"]["custom_category"], "Treats");
        assert_eq!(body["transaction"]["category"], "");

        let request = json_request(Method::PUT, &uri, "{oops");
        let (status, _) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_empty_currency_is_rejected() {
        let env = TestEnv::new().await;
        let id = env.insert_transaction("2024-01-01", "Coffee", Decimal::ONE).await;
        let uri = format!("/api/transaction/{id}/currency");

        let request = json_request(Method::PUT, &uri, r#"{"currency": ""}"#);
        let (status, body) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Currency cannot be empty");

        let t = env.config().db().get_transaction(&id).await.unwrap().unwrap();
        assert_eq!(t.currency(), "USD");

        let request = json_request(Method::PUT, &uri, r#"{"currency": "EUR"}"#);
        let (status, body) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Currency updated successfully");
    }

    #[tokio::test]
    async fn test_update_memo_unknown_id() {
        let env = TestEnv::new().await;
        let id = env.insert_transaction("2024-01-01", "Coffee", Decimal::ONE).await;
        let request = json_request(
            Method::PUT,
            "/api/transaction/does-not-exist/memo",
            r#"{"memo": "hello"}"#,
        );
        let (status, body) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Transaction not found");

        let t = env.config().db().get_transaction(&id).await.unwrap().unwrap();
        assert_eq!(t.memo(), Some(""));
    }

    #[tokio::test]
    async fn test_update_account() {
        let env = TestEnv::new().await;
        let id = env.insert_transaction("2024-01-01", "Coffee", Decimal::ONE).await;
        let uri = format!("/api/transaction/{id}/account");
        let request = json_request(Method::PUT, &uri, r#"{"account": "Savings"}"#);
        let (status, body) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transaction"]["account"], "Savings");
    }

    #[tokio::test]
    async fn test_delete_all() {
        let env = TestEnv::new().await;
        env.insert_transaction("2024-01-01", "A", Decimal::ONE).await;
        env.insert_transaction("2024-01-02", "B", Decimal::ONE).await;
        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/api/transactions/delete-all")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "All transactions successfully deleted");
        assert_eq!(env.config().db().count_transactions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_static_fallback() {
        let mut env = TestEnv::new().await;
        env.write_file("www/index.html", "<html>intake</html>").await;
        env.set_config_file(ConfigFile::new("USD", None, Some(PathBuf::from("www"))))
            .await;

        let response = app(&env).oneshot(get("/some/page")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<html>intake</html>");

        let (status, _) = send(app(&env), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_without_static_dir() {
        let env = TestEnv::new().await;
        let response = app(&env).oneshot(get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
