//! HTTP API for the panel using Actix Web.
//!
//! The API is a thin mapping from routes to [`ServerLifecycleManager`]
//! operations; it never touches the store or the container runtime directly.
//!
//! # Endpoints
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | `POST` | `/api/servers` | create, `201` |
//! | `GET` | `/api/servers` | list |
//! | `GET` | `/api/servers/{id}` | get |
//! | `POST` | `/api/servers/{id}/start` | start, `202` |
//! | `POST` | `/api/servers/{id}/stop` | stop, `202` |
//! | `GET` | `/api/servers/{id}/events` | event history |
//! | `GET` | `/api/events` | SSE lifecycle stream |
//! | `GET` | `/health` | liveness |
//!
//! Errors render as `{"error": "...", "code": <status>}`.

mod actix_error;
pub mod events;
pub mod handlers;

use crate::config::{ApiConfig, DEFAULT_WORKERS};
use crate::error::{Error, Result};
use crate::server::ServerLifecycleManager;

use actix_cors::Cors;
use actix_web::{
    App, HttpServer, middleware,
    dev::ServerHandle,
    web::{self, Data},
};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Register every API route on an Actix service config.
///
/// The app must carry a `Data<ServerLifecycleManager>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| Error::InvalidConfig(err.to_string()).into());

    cfg.app_data(json_config)
        .route("/health", web::get().to(handlers::health))
        .service(
            web::scope("/api")
                .route("/servers", web::post().to(handlers::create_server))
                .route("/servers", web::get().to(handlers::list_servers))
                .route("/servers/{id}", web::get().to(handlers::get_server))
                .route("/servers/{id}/start", web::post().to(handlers::start_server))
                .route("/servers/{id}/stop", web::post().to(handlers::stop_server))
                .route("/servers/{id}/events", web::get().to(handlers::server_events))
                .route("/events", web::get().to(handlers::event_stream)),
        );
}

/// Handle for controlling a running API server
#[derive(Clone)]
pub struct ApiHandle {
    server: ServerHandle,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    addrs: Vec<SocketAddr>,
}

impl ApiHandle {
    /// Addresses the server is bound to
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Gracefully stop the server
    pub async fn shutdown(&self) -> Result<()> {
        self.server.stop(true).await;

        let mut task = self.task.lock().await;
        if let Some(h) = task.take() {
            match tokio::time::timeout(std::time::Duration::from_secs(5), h).await {
                Ok(Err(e)) => tracing::warn!("Error while joining API server task: {}", e),
                Ok(Ok(())) => {}
                Err(_) => tracing::warn!("Timeout waiting for API server task to finish"),
            }
        }

        tracing::info!("API server shut down");
        Ok(())
    }
}

/// HTTP API server
pub struct ApiServer;

impl ApiServer {
    /// Bind and start the API server in a background task
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be resolved or bound.
    pub fn start(manager: ServerLifecycleManager, config: &ApiConfig) -> Result<ApiHandle> {
        let addr_str = format!("{}:{}", config.address, config.port);
        let addr = addr_str
            .to_socket_addrs()
            .map_err(|e| Error::Other(format!("Failed to parse socket address: {}", e)))?
            .next()
            .ok_or_else(|| Error::Other(format!("Could not parse socket address: {}", addr_str)))?;

        tracing::info!(address = %addr_str, "Starting API server with Actix Web");

        let manager = Data::new(manager);

        let mut server_builder = HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(middleware::Logger::default())
                .wrap(cors)
                .app_data(manager.clone())
                .configure(configure)
        });

        let workers = config.workers.unwrap_or(DEFAULT_WORKERS);
        tracing::info!(workers = workers, "Setting number of Actix Web workers");
        server_builder = server_builder.workers(workers);

        let server_builder = server_builder
            .bind(addr)
            .map_err(|e| Error::Other(format!("Failed to bind server: {}", e)))?;
        let addrs = server_builder.addrs();
        let server = server_builder.run();

        let server_handle = server.handle();
        let task = tokio::spawn(async move {
            if let Err(e) = server.await {
                tracing::error!(error = %e, "Actix server task error");
            }
        });

        tracing::info!(?addrs, "API server started successfully");

        Ok(ApiHandle {
            server: server_handle,
            task: Arc::new(Mutex::new(Some(task))),
            addrs,
        })
    }
}
