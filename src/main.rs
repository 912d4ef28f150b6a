use std::future::ready;

use axum::routing::get;
use empo::telemetry;
use opentelemetry::global;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_LOG_FILTER: &str = "info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Export targets are only known once configuration is read.
    let state = {
        let _guard = tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer())
            .set_default();
        empo::initialize_state().await?
    };

    let export = state.config.telemetry.clone();
    let logs = match &export.otlp_endpoint {
        Some(endpoint) => {
            global::set_tracer_provider(telemetry::setup_tracer(endpoint)?);
            Some(telemetry::setup_logging(endpoint)?)
        },
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer())
        .with(logs)
        .init();

    let mut app = empo::app(state.clone());
    if export.prometheus {
        let handle = telemetry::setup_metrics_recorder()?;
        app = app.route("/metrics", get(move || ready(handle.render())));
    }

    let address = format!("0.0.0.0:{}", state.config.port);
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(%address, name = %state.config.name, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
