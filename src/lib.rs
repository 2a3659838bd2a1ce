//! # railtrace
//!
//! Live rail-telemetry reconciliation engine.
//!
//! The crate ingests a loosely-typed live position feed, resolves each
//! update against a static timetable dataset through a weighted scoring
//! pass, and maintains an in-memory collection of per-train views with
//! TTL-based staleness eviction. Persisted deltas are replayed through the
//! same resolve-and-merge path on cold start, so a restart converges on the
//! state a continuously-running engine would hold.
//!
//! ## Layout
//!
//! - [`models`] — wire envelope normalization, static dataset, timestamps
//! - [`services`] — resolver, run merger, sweeper, cold-start reconciler
//! - [`engine`] — the serialized mutation owner and its snapshot type
//! - [`db`] — storage traits, in-memory store, factory, checksums
//! - [`connection`] — feed status and event fan-out
//! - [`config`] — TOML engine configuration
//! - [`api`] — shared identifier and view types

pub mod api;
pub mod config;
pub mod connection;
pub mod db;
pub mod engine;
pub mod models;
pub mod services;

pub use api::*;
pub use config::EngineConfig;
pub use engine::LiveEngine;
