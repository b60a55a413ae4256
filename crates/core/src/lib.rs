//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Resource manifest and shell resource list
//! - Cache stores with in-memory and SQLite backends
//! - The worker lifecycle, fetch routing and control messages
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod keys;
pub mod manifest;
pub mod network;
pub mod worker;

pub use cache::{CacheDb, CacheNames, CacheStorage, MemoryStorage};
pub use config::{AppConfig, WorkerConfig};
pub use error::Error;
pub use http::{CacheMode, Request, Response};
pub use manifest::{ResourceManifest, ShellResources};
pub use network::Network;
pub use worker::{Worker, WorkerEvent, WorkerState};
