//! genrelay entry point.
//!
//! Bootstraps the relay worker: configuration loading, logging setup, TCP
//! listener, and signal handling for graceful shutdown.

use std::process::ExitCode;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use genrelay::config;
use genrelay::engine::StubEngine;
use genrelay::shared_engine;
use genrelay::shutdown::ShutdownResult;
use genrelay::telemetry::{init_logging, LogConfig};
use genrelay::{Server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "serve" | "" => match serve().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Server error: {e}");
                ExitCode::FAILURE
            }
        },
        "version" | "--version" | "-V" => {
            println!("genrelay {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {command}");
            print_usage();
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load();

    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    init_logging(&LogConfig { format: cfg.log_format, level })?;

    tracing::info!(model = %cfg.model, "loading model");
    let engine = shared_engine(StubEngine::new(cfg.model.clone()));

    let server = Server::new(
        engine,
        ServerConfig {
            channel_capacity: cfg.channel_capacity,
            max_frame_size: cfg.max_frame_size,
            max_connections: cfg.max_connections,
        },
    );
    let coordinator = server.coordinator();

    let listener = TcpListener::bind(cfg.bind).await?;
    let shutdown = CancellationToken::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("termination signal received");
            shutdown.cancel();
        });
    }

    server.run(listener, shutdown).await?;

    tracing::info!(
        in_flight = coordinator.in_flight_count(),
        "draining in-flight sessions"
    );
    match coordinator.initiate(cfg.shutdown_timeout).await {
        ShutdownResult::Complete => tracing::info!("shutdown complete"),
        ShutdownResult::Timeout { remaining } => {
            tracing::warn!(remaining, "shutdown timed out with sessions still in flight");
        }
    }
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn print_usage() {
    eprintln!(
        "genrelay - streaming generation relay worker v{}

USAGE:
    genrelay [COMMAND]

COMMANDS:
    serve        Run the worker (default when no command given)
    version      Show version information
    help         Show this help message

ENVIRONMENT:
    GENRELAY_BIND              Listen address (default: 127.0.0.1:50051)
    GENRELAY_MODEL             Model identifier (default: stub)
    GENRELAY_CHANNEL_CAPACITY  In-flight chunks before backpressure (default: 128)
    GENRELAY_MAX_FRAME_SIZE    Max wire frame size in bytes (default: 128 MiB)
    GENRELAY_MAX_CONNECTIONS   Max concurrent connections (default: 64)
    GENRELAY_SHUTDOWN_TIMEOUT  Graceful drain timeout in seconds (default: 30)
    GENRELAY_LOG_FORMAT        json or pretty (default: json)
    RUST_LOG                   Log level filter (default: info)",
        env!("CARGO_PKG_VERSION")
    );
}
