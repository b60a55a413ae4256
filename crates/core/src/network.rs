//! The network seam the worker fetches through.

use async_trait::async_trait;

use crate::Error;
use crate::http::{Request, Response};

/// Performs a request against the network.
///
/// A transport failure (nothing received) is an `Err`. An HTTP error status
/// is still `Ok`; callers decide what to do with non-ok responses. Timeouts
/// belong to the implementation.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
