//! SSO Proxy
//!
//! Single-binary Rust service that:
//! 1. Listens for incoming requests
//! 2. Runs every request through the SSO gateway (login page, token
//!    handshake, optional two-factor)
//! 3. Proxies authenticated requests to the upstream application
//!
//! `/health` and `/metrics` are served outside the gateway.

mod config;
mod metrics;
mod otp_store;
mod proxy;
mod session;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;
use otp::YubicoVerifier;
use sso::{Callbacks, Mode, RemoteUser, SsoConfig, SsoLayer, Templates};

use crate::config::{Config, GatewayConfig, WhitelistEntry};
use crate::otp_store::OtpSecretFile;
use crate::proxy::ProxyState;
use crate::session::Sessions;

/// How long in-flight requests may take to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    proxy: ProxyState,
    mode: Mode,
    sessions: Option<Sessions>,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Build the gateway from the `[sso]` section.
fn build_gateway(sso: &GatewayConfig) -> Result<SsoLayer> {
    let mut config = SsoConfig::new(sso.mode);
    if let Some(endpoint) = &sso.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(accept) = &sso.accept {
        config = config.with_accept(accept);
    }
    if let Some(ssl_verify) = sso.ssl_verify {
        config = config.with_ssl_verify(ssl_verify);
    }
    if let Some(dir) = &sso.static_dir {
        config = config.with_static_dir(dir);
    }
    if let Some(key) = &sso.user_id_key {
        config = config.with_user_id_key(key);
    }

    let templates = Templates::load(
        sso.login_template.as_deref(),
        sso.otp_template.as_deref(),
        sso.setup_template.as_deref(),
    )
    .context("failed to read page templates")?;

    let whitelist = sso
        .whitelist
        .iter()
        .map(WhitelistEntry::to_pattern)
        .collect::<Result<Vec<_>, _>>()?;

    let mut callbacks = Callbacks::new();
    if !sso.allowed_logins.is_empty() {
        let allowed: HashSet<String> = sso.allowed_logins.iter().cloned().collect();
        callbacks = callbacks.authorized(move |user: &RemoteUser| allowed.contains(&user.login));
    }
    if let Some(path) = &sso.otp_secrets_file {
        let store = Arc::new(OtpSecretFile::open(path)?);
        let reader = store.clone();
        callbacks = callbacks
            .get_otp_secret(move |user| reader.get(user))
            .set_otp_secret(move |user, secret| store.set(user, secret));
        info!(path = %path.display(), "two-factor authentication enabled");
    }

    if let Some(yubico) = &sso.yubico {
        let mut verifier = YubicoVerifier::new(&yubico.client_id, yubico.api_key.clone());
        if let Some(url) = &yubico.url {
            verifier = verifier.with_url(url);
        }
        config = config.with_hardware_verifier(verifier);
    }

    Ok(config
        .with_templates(templates)
        .with_whitelist(whitelist)
        .with_callbacks(callbacks)
        .build()?)
}

/// Build the axum router: health and metrics first, everything else through
/// the gateway to the upstream proxy.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, gateway: SsoLayer, max_connections: usize) -> Router {
    let mut protected = Router::new()
        .fallback(proxy::handler)
        .with_state(state.proxy.clone())
        .layer(gateway);
    if let Some(sessions) = state.sessions.clone() {
        protected = protected.layer(axum::middleware::from_fn_with_state(
            sessions,
            session::attach_session,
        ));
    }

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback_service(protected)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting sso-proxy");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder()?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        upstream_url = %config.server.upstream_url,
        mode = %config.sso.mode,
        whitelist = config.sso.whitelist.len(),
        "configuration loaded"
    );

    let gateway = build_gateway(&config.sso).context("failed to configure SSO gateway")?;

    let state = AppState {
        proxy: ProxyState::new(
            config.server.upstream_url.clone(),
            Duration::from_secs(config.server.timeout_secs),
        ),
        mode: config.sso.mode,
        sessions: (config.sso.mode == Mode::Session).then(Sessions::default),
        started_at: Instant::now(),
        prometheus,
    };

    let app = build_router(state, gateway, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires: the server is
    // told to drain, then the drain races the timeout.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Liveness plus a few counters. Never behind the gateway.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "mode": state.mode.as_str(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "requests_served": state.proxy.requests_total.load(Ordering::Relaxed),
        "errors_total": state.proxy.errors_total.load(Ordering::Relaxed),
        "sessions": state.sessions.as_ref().map(Sessions::len),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
