//! Store implementations module.
//!
//! This module contains implementations of the store traits:
//! - `local`: In-memory implementation for unit testing and local development

pub mod local;

pub use local::MemoryStore;
