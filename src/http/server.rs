//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the resilience state for the configured downstream
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Apply hot-reloaded call policies
//! - Serve until shutdown

use arc_swap::ArcSwap;
use axum::{
    extract::State,
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::config::{AdminConfig, CallerConfig, ServiceConfig};
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::resilience::{
    CallPolicy, Dependency, DependencyRegistry, FallbackResolver, HttpExecutor, ResponseSource,
    RetryCoordinator,
};

/// Set on fallback responses; value is the failure category.
pub const FALLBACK_HEADER: &str = "x-fallback";

/// Number of attempts the call took.
pub const CALL_ATTEMPTS_HEADER: &str = "x-call-attempts";

/// Startup errors that make serving impossible.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid downstream url '{url}': {source}")]
    InvalidDownstream {
        url: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DependencyRegistry>,
    pub dependency: Arc<Dependency>,
    pub executor: Arc<HttpExecutor>,
    pub coordinator: Arc<RetryCoordinator>,
    pub policy: Arc<ArcSwap<CallPolicy>>,
    pub service: ServiceConfig,
    pub admin: AdminConfig,
}

/// HTTP server for the guarded caller.
pub struct HttpServer {
    router: Router,
    config: CallerConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: CallerConfig) -> Result<Self, ServerError> {
        let downstream = &config.downstream;
        let executor = HttpExecutor::from_base(&downstream.base_url, &downstream.path).map_err(|source| {
            ServerError::InvalidDownstream {
                url: downstream.base_url.clone(),
                source,
            }
        })?;

        let registry = Arc::new(DependencyRegistry::new());
        let dependency = registry.register(
            &downstream.name,
            config.rate_limit.clone(),
            config.circuit_breaker.clone(),
        );

        let state = AppState {
            registry,
            dependency,
            executor: Arc::new(executor),
            coordinator: Arc::new(RetryCoordinator::new(FallbackResolver::new(
                &config.service.name,
                &downstream.name,
            ))),
            policy: Arc::new(ArcSwap::from_pointee(CallPolicy::from_config(&config))),
            service: config.service.clone(),
            admin: config.admin.clone(),
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &CallerConfig, state: AppState) -> Router {
        let service = &config.service.name;
        let mut router = Router::new()
            .route(&format!("/{}/hello", service), get(hello_handler))
            .route(
                &format!("/{}/call-{}", service, config.downstream.name),
                get(call_handler),
            )
            .route("/health", get(|| async { "ok" }));

        if config.admin.enabled {
            router = router.merge(admin::setup_admin_router(state.clone()));
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                .layer(propagate_request_id_layer())
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configuration updates replace the call policy; breaker and limiter
    /// state are kept.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<CallerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            dependency = %self.config.downstream.name,
            downstream = %self.state.executor.uri(),
            "HTTP server starting"
        );

        let policy = self.state.policy.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(new_config) => {
                            let new_policy = CallPolicy::from_config(&new_config);
                            tracing::info!(
                                max_attempts = new_policy.retry.max_attempts,
                                attempt_timeout = ?new_policy.attempt_timeout,
                                "Call policy reloaded"
                            );
                            policy.store(Arc::new(new_policy));
                        }
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Shared breaker/limiter registry.
    pub fn registry(&self) -> Arc<DependencyRegistry> {
        self.state.registry.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &CallerConfig {
        &self.config
    }
}

async fn hello_handler(State(state): State<AppState>) -> String {
    state.service.greeting.clone()
}

/// Protected call to the downstream. Always answers 200 with a text body.
async fn call_handler(State(state): State<AppState>) -> Response {
    tracing::info!(
        dependency = %state.dependency.name,
        "Initiating protected call"
    );

    let policy = state.policy.load_full();
    let resolution = state
        .coordinator
        .execute(&state.dependency, state.executor.as_ref(), &policy)
        .await;

    let attempts = resolution.attempts.len();
    let source = resolution.source;
    let mut response = resolution.body.into_response();
    let headers = response.headers_mut();
    headers.insert(CALL_ATTEMPTS_HEADER, HeaderValue::from(attempts));
    if let ResponseSource::Fallback(kind) = source {
        headers.insert(FALLBACK_HEADER, HeaderValue::from_static(kind.as_str()));
    }
    response
}
