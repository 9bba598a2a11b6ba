//! SQL grader · answer-grading backend for SQL exercises
//!
//! - Axum HTTP + WebSocket API
//! - Embedded SQLite runner: fresh in-memory database per query, hard timeouts
//! - Static SPA fallback (STATIC_DIR/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   GRADER_CONFIG_PATH  : path to TOML config (budgets, policy, datasets, challenges)
//!   STATIC_DIR          : frontend directory (default "./static")
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod guard;
mod dataset;
mod runner;
mod normalize;
mod compare;
mod diagnostic;
mod session;
mod challenges;
mod progress;
mod limiter;
mod seeds;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Catalogs, grader, progress store and limiter.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "sql_grader", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "sql_grader", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!(target: "sql_grader", "Ctrl-C received; shutting down"),
    Err(e) => warn!(target: "sql_grader", error = %e, "Could not listen for Ctrl-C; shutting down"),
  }
}
