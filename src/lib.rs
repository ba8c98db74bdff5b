//! Knowledge tracing and study scheduling.
//!
//! [`engine::Engine`] is the entry point: it tracks per-topic mastery with
//! Bayesian Knowledge Tracing, picks what to study next, and keeps a dated
//! study plan moving through its sessions.

pub mod catalog;
pub mod config;
pub mod difficulty;
pub mod engine;
pub mod error;
pub mod mastery;
pub mod models;
pub mod scheduler;
pub mod selector;
pub mod session;
pub mod store;

pub use engine::Engine;
pub use error::{ConfigError, EngineError, StoreError};
