//! HTTP request handlers for the panel API.
//!
//! - `/api/servers` create and list
//! - `/api/servers/{id}` get
//! - `/api/servers/{id}/start`, `/api/servers/{id}/stop` lifecycle actions
//! - `/api/servers/{id}/events` event history
//! - `/api/events` live lifecycle stream
//! - `/health` liveness

use crate::api::events::{format_lagged, format_sse_message};
use crate::error::Result;
use crate::server::{CreateServerRequest, ServerId, ServerLifecycleManager, ServerStatus};
use actix_web::{
    HttpRequest, HttpResponse, Responder,
    web::{Data, Json, Path, Query},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

/// Body of an accepted lifecycle action
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub status: ServerStatus,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// `POST /api/servers`
pub async fn create_server(
    manager: Data<ServerLifecycleManager>,
    request: Json<CreateServerRequest>,
) -> Result<HttpResponse> {
    let server = manager.create(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(server))
}

/// `GET /api/servers`
pub async fn list_servers(manager: Data<ServerLifecycleManager>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(manager.list().await?))
}

/// `GET /api/servers/{id}`
pub async fn get_server(
    manager: Data<ServerLifecycleManager>,
    id: Path<String>,
) -> Result<HttpResponse> {
    let id: ServerId = id.parse()?;
    Ok(HttpResponse::Ok().json(manager.get(id).await?))
}

/// `POST /api/servers/{id}/start`
pub async fn start_server(
    manager: Data<ServerLifecycleManager>,
    id: Path<String>,
) -> Result<HttpResponse> {
    let id: ServerId = id.parse()?;
    manager.start(id).await?;

    Ok(HttpResponse::Accepted().json(ActionResponse {
        success: true,
        message: "Server starting".to_string(),
        status: ServerStatus::Starting,
    }))
}

/// `POST /api/servers/{id}/stop`
pub async fn stop_server(
    manager: Data<ServerLifecycleManager>,
    id: Path<String>,
) -> Result<HttpResponse> {
    let id: ServerId = id.parse()?;
    manager.stop(id).await?;

    Ok(HttpResponse::Accepted().json(ActionResponse {
        success: true,
        message: "Server stopping".to_string(),
        status: ServerStatus::Stopping,
    }))
}

/// `GET /api/servers/{id}/events?limit=N`
pub async fn server_events(
    manager: Data<ServerLifecycleManager>,
    id: Path<String>,
    query: Query<EventsQuery>,
) -> Result<HttpResponse> {
    let id: ServerId = id.parse()?;
    Ok(HttpResponse::Ok().json(manager.events(id, query.limit).await?))
}

/// `GET /api/events`
///
/// Streams every lifecycle event recorded after the client connected.
pub async fn event_stream(manager: Data<ServerLifecycleManager>, req: HttpRequest) -> impl Responder {
    tracing::debug!(
        peer = ?req.peer_addr(),
        "Client connected to lifecycle event stream"
    );

    let mut receiver = manager.subscribe();

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Some(bytes) = format_sse_message(&event) {
                        yield Ok::<_, actix_web::Error>(bytes);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "SSE client lagged behind lifecycle events");
                    yield Ok(format_lagged(skipped));
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Lifecycle event channel closed");
                    break;
                }
            }
        }
    };

    HttpResponse::Ok()
        .append_header(("Content-Type", "text/event-stream"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Connection", "keep-alive"))
        .streaming(stream)
}

/// `GET /health`
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
