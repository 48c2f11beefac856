//! audioconv-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Create the scratch and output directories and wire the converter.
//! 4. Probe the converter once so a missing binary is visible in the logs.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use audioconv_core::{FfmpegConverter, HealthReport, HealthStatus};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // RUST_LOG wins over AUDIOCONV_LOG; an invalid filter falls back to info
    // and is reported once the subscriber is up.
    let mut filter_error = None;
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        cfg.log_level
            .parse::<tracing_subscriber::EnvFilter>()
            .unwrap_or_else(|e| {
                filter_error = Some(e.to_string());
                tracing_subscriber::EnvFilter::new("info")
            })
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if let Some(error) = filter_error {
        warn!(log_level = %cfg.log_level, %error, "invalid AUDIOCONV_LOG filter; using 'info'");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "audioconv-server starting");

    // ── 3. Shared application state ────────────────────────────────────────────
    let converter = FfmpegConverter::new(cfg.ffmpeg_path.clone())
        .with_timeout(cfg.convert_timeout)
        .with_probe_timeout(cfg.health_timeout);
    let state = Arc::new(AppState::new(cfg.clone(), Arc::new(converter)).await?);
    info!(
        output_dir = %state.paths.output_root().display(),
        scratch_dir = %state.paths.scratch_root().display(),
        max_file_size_mb = cfg.max_file_size_mb,
        max_concurrent = state.pipeline.max_concurrent(),
        "storage ready"
    );

    // ── 4. Converter probe ─────────────────────────────────────────────────────
    let report = HealthReport::probe(state.pipeline.converter(), cfg.max_file_size_mb).await;
    match (report.status, report.converter_tool.version) {
        (HealthStatus::Healthy, Some(version)) => {
            info!(ffmpeg = %cfg.ffmpeg_path.display(), %version, "converter available");
        }
        _ => warn!(
            ffmpeg = %cfg.ffmpeg_path.display(),
            "converter not reachable; conversions will fail until it is installed"
        ),
    }

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, docs = cfg.enable_docs, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("audioconv-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
