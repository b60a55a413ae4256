//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting the worker's stores.

pub mod get;
pub mod status;

pub use get::{CacheGetParams, get_impl};
pub use status::status_impl;
