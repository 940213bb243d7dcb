//! # VoiceScribe Bridge - Main Application Entry Point
//!
//! A local inter-process bridge: the native dictation app POSTs audio to this
//! server over loopback HTTP and gets transcribed text back, without embedding
//! the model runtime itself.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (TOML file + environment variables)
//! - **error**: the handful of error shapes the wire contract allows
//! - **state**: shared application state handed to every worker
//! - **model**: the speech-to-text model and the exclusive section around it
//! - **handlers**: the five-route HTTP surface
//! - **middleware**: per-request tracing
//!
//! ## Startup ordering is the contract:
//! Tracing first, then config, then the model - *before* the listener binds.
//! A load failure exits nonzero with the port never bound; the server never
//! runs in a "listening but unready" state from a failed initial load.

mod config;
mod error;
mod handlers;
mod middleware;
mod model;
mod state;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
// `crate::` disambiguates from the external `config` crate.
use crate::config::{AppConfig, BIND_HOST};
use error::AppError;
use model::ModelManager;
use state::AppState;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    // Ignore a missing .env file; it's a development convenience.
    dotenv::dotenv().ok();

    init_tracing();

    let app_config = AppConfig::load()?;
    app_config.validate()?;

    info!("Starting voicescribe-bridge v{}", env!("CARGO_PKG_VERSION"));

    // Load the model before anything can connect. This is the slow part of
    // startup (seconds to minutes on a cold cache) and the only fatal one:
    // on failure we return the error, main exits nonzero, no port was bound.
    let manager = ModelManager::load(&app_config.model)
        .await
        .context("Failed to load speech-to-text model")?;

    let app_state = AppState::new(manager, app_config.clone());
    let bind_addr = (BIND_HOST, app_config.server.port);
    let max_upload_bytes = app_config.server.max_upload_bytes;

    info!(
        "Transcription server listening on http://{}:{}",
        bind_addr.0, bind_addr.1
    );

    let shutdown_state = app_state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Raw audio uploads blow through actix's default payload cap.
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            // Malformed JSON should come back in the same flat error shape as
            // everything else, not actix's default plain-text body.
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(err.to_string()).into()
            }))
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure)
    })
    .bind(bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Race the server against the shutdown signal. The signal future is the
    // explicit shutdown channel the accept loop observes - no polled flags.
    tokio::select! {
        result = server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
            }
        }
        _ = shutdown_signal() => {
            info!("Shutting down server...");
            // Graceful: stop accepting, let in-flight requests (including a
            // running inference call) finish before exiting with status 0.
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped after {}s", shutdown_state.uptime_seconds());
    Ok(())
}

/// Console logging via tracing. `RUST_LOG` controls verbosity; the default
/// keeps this crate chatty and actix quiet.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voicescribe_bridge=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves when SIGINT (Ctrl+C) or SIGTERM arrives.
#[cfg(unix)]
async fn shutdown_signal() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("Failed to install SIGTERM handler");
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("Failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received Ctrl+C");
}
