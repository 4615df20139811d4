//! # Fee Metrics SDK
//!
//! A Rust library for acquiring, normalizing and serving protocol fee
//! metrics sourced from an external aggregation API. It provides the data
//! layer behind a fee dashboard: everything between the upstream aggregate
//! source and the JSON the presentation layer renders.
//!
//! ## Overview
//!
//! The SDK separates fee-data acquisition from presentation. It focuses on:
//!
//! - **Acquisition**: snapshot fetching with TTL caching and stale-on-error
//!   fallback, so the dashboard always prefers some data over an error
//! - **Normalization**: heterogeneous upstream records mapped into a uniform
//!   protocol metric model with a synthetic trailing-week series
//! - **Bundling & Filtering**: grouping related protocols into aggregated
//!   bundles and applying category/chain predicates with readable tags
//! - **Tiered Caching**: individual (protocol, attribute, date) values
//!   persisted across a fast ephemeral tier and a durable tier with
//!   read-through/write-through semantics
//!
//! ## Architecture
//!
//! ### Acquisition Layer
//! One process-wide snapshot cache in front of the upstream HTTP source.
//! Within the TTL window no network access happens; after it, a failed
//! refresh serves the previous snapshot however old it is.
//!
//! ### Transformation Layer
//! Pure functions from a raw snapshot to the published metric set. The
//! trailing-week series is an explicit approximation reconstructed from
//! aggregate windows, not ground-truth history.
//!
//! ### Cache Tiers
//! An ordered fallback chain of key/value backends, fastest first, with the
//! last tier as the source of truth. Unconfigured or unreachable tiers
//! degrade to absent reads and no-op writes instead of failing requests.

// Core Types
/// Domain model: raw upstream records, normalized metrics, bundles
pub mod protocols;
/// Error taxonomy for failures that cross the pipeline boundary
pub mod errors;

// Acquisition Layer
/// DefiLlama client and process-wide snapshot cache
pub mod defillama;

// Transformation Layer
/// Raw record normalization and synthetic series generation
pub mod normalize;
/// Category/chain filtering and bundle aggregation
pub mod filters;

// Cache Tiers
/// Redis fast-tier adapter
pub mod redis_store;
/// PostgreSQL durable-tier adapter
pub mod database;
/// Tiered read-through/write-through value cache
pub mod value_cache;

// Service Layer
/// Request-facing orchestration of the pipeline
pub mod fee_service;
/// Inbound HTTP surface (feature `web`)
#[cfg(feature = "web")]
pub mod api_server;

// Infrastructure
/// Metrics and observability
pub mod metrics;
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use errors::FeeError;
pub use fee_service::FeeService;
pub use protocols::{Category, ProtocolMetric};
pub use settings::Settings;
pub use value_cache::ValueCache;
