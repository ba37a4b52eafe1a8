//! Axum HTTP server for chroma-key composition.
//!
//! This crate provides:
//! - `POST /api/compose` and `GET /api/download/:filename`
//! - A single-flight gate that rejects concurrent compositions
//! - Pluggable source acquisition (direct download, yt-dlp)
//! - Health, readiness and Prometheus metrics endpoints

pub mod acquisition;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod scheduler;
pub mod security;
pub mod state;

pub use acquisition::{DirectDownloader, FallbackAcquirer, SourceAcquirer, YtDlpDownloader};
pub use config::{AcquisitionStrategy, ApiConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use scheduler::{FlightPermit, SingleFlight};
pub use state::AppState;
