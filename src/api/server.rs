//! HTTP server for the import/export API.
//!
//! # API Endpoints
//!
//! | Method | Path                   | Description                        |
//! |--------|------------------------|------------------------------------|
//! | GET    | `/health`              | Health check                       |
//! | POST   | `/api/import`          | Upload CSV for import              |
//! | GET    | `/api/export/{entity}` | Download the entity as `.xlsx`     |
//! | GET    | `/api/audit`           | Recent audit entries, newest first |
//! | GET    | `/api/events`          | SSE stream of pipeline events      |
//!
//! Tenant and actor identity arrive via `x-company-id`, `x-user-id` and
//! `x-user-email` headers; session management itself lives outside this
//! service.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::Value;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::events::EVENT_BROADCASTER;
use super::types::{error_response, ImportResponse};
use crate::audit::{self, Actor, AuditLogEntry};
use crate::entity::EntityRegistry;
use crate::export::run_export;
use crate::import::run_import;
use crate::store::SqliteStore;

type ApiError = (StatusCode, Json<Value>);

/// Shared server state: the store handle and the entity registry, built
/// once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub registry: Arc<EntityRegistry>,
}

/// Start the HTTP server.
pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/import", post(import_csv))
        .route("/api/export/{entity}", get(export_entity))
        .route("/api/audit", get(audit_log))
        .route("/api/events", get(sse_events))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("crmport server running on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint.
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "crmport",
        "version": env!("CARGO_PKG_VERSION"),
        "entities": state.registry.names(),
    }))
}

/// SSE endpoint for real-time pipeline events.
async fn sse_events() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = EVENT_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let json = serde_json::to_string(&event).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload CSV endpoint: runs the whole import pipeline for one file.
async fn import_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let actor = actor_from_headers(&headers)?;

    let mut file_data: Option<Vec<u8>> = None;
    let mut entity = "contacts".to_string();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        bad_request(format!("multipart error: {}", e))
    })? {
        match field.name().unwrap_or("") {
            "file" => {
                file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| bad_request(format!("read error: {}", e)))?
                        .to_vec(),
                );
            }
            "entity" => {
                entity = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("read error: {}", e)))?;
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| bad_request("no file provided".to_string()))?;

    info!(
        entity = %entity,
        tenant = %actor.company_id,
        size = bytes.len(),
        "import upload received"
    );

    let result = run_import(&state.store, &state.registry, &actor, &entity, &bytes)
        .await
        .map_err(|e| {
            use crate::error::ImportRunError;
            let status = match &e {
                ImportRunError::UnknownEntity(_) => StatusCode::NOT_FOUND,
                ImportRunError::Parse(_) => StatusCode::BAD_REQUEST,
            };
            (status, Json(error_response(&e.to_string())))
        })?;

    Ok(Json(ImportResponse::from(result)))
}

/// Download endpoint: the entity's records as a spreadsheet.
async fn export_entity(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let actor = actor_from_headers(&headers)?;

    let payload = run_export(&state.store, &state.registry, &actor, &entity)
        .await
        .map_err(|e| {
            use crate::error::ExportError;
            let status = match &e {
                ExportError::UnknownEntity(_) | ExportError::NothingToExport { .. } => {
                    StatusCode::NOT_FOUND
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(error_response(&e.to_string())))
        })?;

    let response = (
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", payload.filename),
            ),
        ],
        payload.bytes,
    );

    Ok(response.into_response())
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    limit: Option<usize>,
}

/// Recent audit entries for the calling tenant, newest first.
async fn audit_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let limit = query.limit.unwrap_or(50).min(200);

    let entries = audit::recent(&state.store, &actor.company_id, limit)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response(&e.to_string())),
            )
        })?;

    Ok(Json(entries))
}

/// Build the acting identity from request headers. `x-company-id` is
/// mandatory; user id/email fall back to placeholders for tooling calls.
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let company_id = header_value(headers, "x-company-id")
        .ok_or_else(|| bad_request("missing x-company-id header".to_string()))?;

    Ok(Actor {
        user_id: header_value(headers, "x-user-id").unwrap_or_else(|| "unknown".to_string()),
        user_email: header_value(headers, "x-user-email").unwrap_or_else(|| "unknown".to_string()),
        company_id,
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(error_response(&message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_requires_company_id() {
        let headers = HeaderMap::new();
        assert!(actor_from_headers(&headers).is_err());
    }

    #[test]
    fn test_actor_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-company-id", "acme".parse().unwrap());
        headers.insert("x-user-id", "u1".parse().unwrap());

        let actor = actor_from_headers(&headers).unwrap();
        assert_eq!(actor.company_id, "acme");
        assert_eq!(actor.user_id, "u1");
        assert_eq!(actor.user_email, "unknown");
    }
}
