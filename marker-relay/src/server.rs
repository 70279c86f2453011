use std::{
    future::Future,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    dispatcher::{Dispatcher, RelayStats, Variant},
    registry::ConnectionRegistry,
    selection::{IndexSource, SeededIndex, ThreadRngIndex},
    session,
};

/// Everything needed to start a relay.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub static_dir: PathBuf,
    pub variant: Variant,
    /// Seed for marker selection; `None` draws from the thread-local RNG.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            static_dir: PathBuf::from("static"),
            variant: Variant::default(),
            seed: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// `/ws` upgrades to the relay, `/stats` reports membership, and every other
/// path is served from `static_dir`.
pub fn build_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/stats", get(stats_handler))
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_failed_upgrade(|err| warn!(error = %err, "websocket upgrade failed"))
        .on_upgrade(move |socket| session::serve_socket(socket, state.dispatcher))
}

async fn stats_handler(State(state): State<AppState>) -> Json<RelayStats> {
    Json(state.dispatcher.stats().await)
}

pub struct Server {
    listener: TcpListener,
    state: AppState,
    static_dir: PathBuf,
}

impl Server {
    pub fn new(
        listener: TcpListener,
        dispatcher: Arc<Dispatcher>,
        static_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            listener,
            state: AppState { dispatcher },
            static_dir: static_dir.into(),
        }
    }

    /// Binds the configured address and builds a dispatcher over a fresh
    /// registry.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.listen)
            .await
            .with_context(|| format!("failed to bind {}", config.listen))?;

        let picker: Arc<dyn IndexSource> = match config.seed {
            Some(seed) => Arc::new(SeededIndex::new(seed)),
            None => Arc::new(ThreadRngIndex),
        };
        let dispatcher = Dispatcher::new(
            Arc::new(ConnectionRegistry::new()),
            picker,
            config.variant,
        );

        Ok(Self::new(listener, Arc::new(dispatcher), config.static_dir))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.state.dispatcher)
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Server {
            listener,
            state,
            static_dir,
        } = self;
        let variant = state.dispatcher.variant();
        let router = build_router(state, &static_dir);

        info!(?variant, static_dir = %static_dir.display(), "relay serving");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("relay server failed")?;
        info!("relay shut down");

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{registry::channel_sink, selection::SequenceIndex};

    fn state(variant: Variant) -> AppState {
        AppState {
            dispatcher: Arc::new(Dispatcher::new(
                Arc::new(ConnectionRegistry::new()),
                Arc::new(SequenceIndex::default()),
                variant,
            )),
        }
    }

    fn static_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("static")
    }

    #[tokio::test]
    async fn stats_report_live_connections() {
        let state = state(Variant::Echo);
        let registry = state.dispatcher.registry();
        let (sink, _rx) = channel_sink();
        registry.register(registry.next_id(), sink).await;
        let router = build_router(state.clone(), static_dir());

        let response = router
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let stats: RelayStats = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            stats,
            RelayStats {
                connections: 1,
                variant: Variant::Echo,
                pending_sender: None,
            }
        );
    }

    #[tokio::test]
    async fn plain_request_to_ws_is_rejected() {
        let router = build_router(state(Variant::Greeting), static_dir());

        let response = router
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn other_paths_serve_static_files() {
        let router = build_router(state(Variant::Greeting), static_dir());

        let response = router
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("/ws"));

        let missing = router
            .oneshot(Request::get("/missing.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn default_config_listens_on_8080() {
        let config = ServerConfig::default();
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert_eq!(config.variant, Variant::Greeting);
    }
}
