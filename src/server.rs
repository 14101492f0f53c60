//! HTTP dispatcher
//!
//! Routes:
//! - `GET /cloud-config/{mac}` - rendered cloud-config for a node
//! - `GET /static/*` - files from the static directory
//! - `GET /healthz` - liveness
//!
//! Every request re-reads the descriptor and renders on a blocking thread.
//! A failure or panic while serving one request only affects that request.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::cache::{DescriptorSource, FileSource, RemoteCache};
use crate::config::{RenderConfig, ServeConfig};
use crate::pipeline;
use crate::{Error, Result};

/// Content type of rendered documents
pub const CLOUD_CONFIG_CONTENT_TYPE: &str = "text/yaml; charset=utf-8";

/// Shared, read-only server state
pub struct AppState {
    /// Rendering inputs
    pub config: RenderConfig,
    /// Descriptor provider
    pub source: Arc<dyn DescriptorSource>,
    /// Directory served under `/static/`
    pub static_dir: PathBuf,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Cache { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": "internal error"})),
    )
        .into_response()
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "request handler panicked");
    internal_error()
}

/// Cloud-config endpoint handler
pub async fn cloud_config_handler(
    State(state): State<Arc<AppState>>,
    Path(mac): Path<String>,
) -> Response {
    let requested = mac.to_lowercase();
    debug!(mac = %requested, "cloud-config request received");

    let raw = match state.source.get().await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(mac = %requested, error = %e, "cluster descriptor unavailable");
            return e.into_response();
        }
    };

    let render_state = Arc::clone(&state);
    let render_mac = requested.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        pipeline::render_request(&render_state.config, &raw, &render_mac)
    })
    .await;

    match rendered {
        Ok(Ok(doc)) => {
            info!(mac = %requested, bytes = doc.as_bytes().len(), "served cloud-config");
            ([(header::CONTENT_TYPE, CLOUD_CONFIG_CONTENT_TYPE)], doc.into_string()).into_response()
        }
        Ok(Err(e)) => {
            warn!(mac = %requested, error = %e, "failed to render cloud-config");
            e.into_response()
        }
        Err(join_err) => {
            error!(mac = %requested, error = %join_err, "render task failed");
            internal_error()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Build the router
pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/cloud-config/{mac}", get(cloud_config_handler))
        .route("/healthz", get(healthz))
        .nest_service("/static", static_files)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// Descriptor source for a serve configuration
pub fn descriptor_source(config: &ServeConfig) -> Result<Arc<dyn DescriptorSource>> {
    Ok(match &config.cluster_desc_url {
        Some(url) => {
            let cache = RemoteCache::new(url.clone(), config.render.cluster_desc.clone())?;
            info!(
                url = cache.url(),
                local = %cache.local_path().display(),
                "mirroring remote cluster descriptor"
            );
            Arc::new(cache)
        }
        None => {
            let file = FileSource::new(config.render.cluster_desc.clone());
            info!(path = %file.path().display(), "reading cluster descriptor from disk");
            Arc::new(file)
        }
    })
}

/// Run the server until Ctrl-C
pub async fn serve(config: ServeConfig) -> Result<()> {
    let state = Arc::new(AppState {
        source: descriptor_source(&config)?,
        static_dir: config.static_dir.clone(),
        config: config.render.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|source| Error::Listen {
            addr: config.addr,
            source,
        })?;
    info!(addr = %config.addr, "cloud-config server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| Error::Listen {
            addr: config.addr,
            source,
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
