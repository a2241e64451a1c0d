//! Defines routes for the ephemeral file-sharing service.
//!
//! ## Structure
//! - `POST /upload`       — multipart upload, returns the share link
//! - `GET  /files`        — list live files (display only)
//! - `GET  /{identifier}` — resolve a share link and stream the file
//! - `GET  /healthz`, `GET /readyz` — probes
//!
//! axum matches the literal routes (`/upload`, `/files`, `/healthz`,
//! `/readyz`) before the `/{identifier}` capture, so those names can
//! never shadow a share link lookup.

use crate::{
    handlers::{
        file_handlers::{download_file, list_files, upload_file},
        health_handlers::{healthz, readyz},
    },
    services::lifecycle::ShareService,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for all file-sharing routes.
///
/// The router carries shared state (`ShareService`) to all handlers.
pub fn routes() -> Router<ShareService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // upload + listing
        .route("/upload", post(upload_file))
        .route("/files", get(list_files))
        // public share links
        .route("/{identifier}", get(download_file))
}
