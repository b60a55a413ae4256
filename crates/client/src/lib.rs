//! Client code for shellcache.
//!
//! This crate provides the HTTP implementation of the worker's network seam
//! and request URL handling shared by the server.

pub mod fetch;

pub use fetch::{FetchConfig, HttpNetwork, UrlError, parse_request_url, resolve};
