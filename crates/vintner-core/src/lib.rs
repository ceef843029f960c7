//! # Vintner Core
//!
//! Throttled retrieval and revision reconciliation for FRED/ALFRED time series.
//!
//! ## Overview
//!
//! Economic series are revised after publication. Each revision date is a *vintage*, and
//! the host can return a series either **dense** (every observation date at every vintage)
//! or **sparse** (only new or changed values). This crate provides:
//!
//! - **Request admission** bounded by a concurrency cap and a rolling per-minute quota
//! - **Retrying downloads** that absorb rate limiting and transient failures
//! - **Chunked observation retrieval** that stays correct across the host's 50-vintage limit
//! - **Sparse/dense composition** of revision histories
//! - **As-of resolution** of what was known during a real-time window
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | `FredClient` facade and builder |
//! | [`composer`] | Sparse/dense conversion (`VintageComposer`) |
//! | [`config`] | Client configuration |
//! | [`domain`] | Domain models (Symbol, Observation, Vintage) |
//! | [`error`] | Error types |
//! | [`fetcher`] | Gate admission, retries and status handling for one request |
//! | [`http_client`] | HTTP client abstraction |
//! | [`observations`] | Chunked observation retrieval |
//! | [`payload`] | Response payload parsing |
//! | [`realtime`] | Real-time window resolution |
//! | [`retry`] | Retry budget and backoff |
//! | [`statistics`] | Request counters |
//! | [`throttling`] | Concurrency cap and request window |
//! | [`vintage_dates`] | Paged vintage date retrieval |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vintner_core::{ClientConfig, DataDensity, FredClient, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = FredClient::builder(ClientConfig::from_env()).build()?;
//!     let gdp = Symbol::parse("GDP")?;
//!
//!     let history = client.observations(&gdp, DataDensity::Sparse).await?;
//!     for row in history.iter().take(5) {
//!         println!("{} @ {}: {}", row.obs_date, row.vintage_date, row.value);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   FredClient    │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Vintage Date    │────▶│ Chunked Obs.     │
//! │ Resolver        │     │ Fetcher          │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Retrying        │────▶│ Request Gate     │
//! │ Fetcher         │     │ (slots + window) │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ HTTP Client     │     │ Vintage Composer │
//! │ (reqwest)       │     │ Real-Time Window │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Missing series and exhausted retries are reported as empty results. Errors carry a
//! [`SourceErrorKind`]:
//!
//! ```rust
//! use vintner_core::{SourceError, SourceErrorKind};
//!
//! fn handle_error(error: SourceError) {
//!     match error.kind() {
//!         SourceErrorKind::InvalidRequest => {
//!             // Fix the call
//!         }
//!         SourceErrorKind::MalformedResponse => {
//!             // Report upstream payload problem
//!         }
//!         SourceErrorKind::Cancelled => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - The API key is appended to outgoing requests only and never logged
//! - Symbols containing query delimiters are rejected

pub mod client;
pub mod composer;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod observations;
pub mod payload;
pub mod realtime;
pub mod retry;
pub mod statistics;
pub mod throttling;
pub mod vintage_dates;

// Client
pub use client::{FredClient, FredClientBuilder};

// Composition
pub use composer::{StandardComposer, VintageComposer};
pub use realtime::{resolve_as_of, RealTimeWindow};

// Configuration
pub use config::{ClientConfig, DEFAULT_BASE_URL, MAX_VINTAGE_CHUNK_SIZE};

// Domain models
pub use domain::{
    is_missing_value, same_value, DataDensity, Observation, Symbol, Vintage, MISSING_VALUE,
};

// Error types
pub use error::{ParseError, SourceError, SourceErrorKind, ValidationError};

// Pipeline stages
pub use fetcher::RetryingFetcher;
pub use observations::ChunkedObservationFetcher;
pub use vintage_dates::VintageDateResolver;

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, StatusClass};

// Payload parsing
pub use payload::{JsonPayloadParser, PayloadParser};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Statistics
pub use statistics::{DownloadStatistics, RequestCounters};

// Throttling
pub use throttling::{GatePermit, RequestGate};
