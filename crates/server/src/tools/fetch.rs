//! worker_fetch tool implementation.
//!
//! Delivers an intercepted request to the worker and reports how it was
//! answered.

use chrono::Utc;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::resolve;
use shellcache_core::worker::{FetchDecision, ServeSource};
use shellcache_core::{Error, Request, Worker};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Absolute URL, or a path relative to the worker origin (`/main.dart.js`).
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are mediated.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the worker_fetch tool.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// "respond" or "passthrough".
    pub decision: &'static str,
    /// Manifest key the request resolved to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ServeSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_bytes: Option<usize>,
    /// Body as text, when it is valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// ISO8601 timestamp of when the request was answered.
    pub served_at: String,
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(worker: &Worker, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(ToolError::InvalidInput("method cannot be empty".into()).into());
    }

    let url = resolve(&worker.config().origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let request = Request::new(params.method.trim(), url.clone());
    let served_at = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    let output = match worker.handle_fetch(&request).await {
        FetchDecision::Passthrough => WorkerFetchOutput {
            url,
            decision: "passthrough",
            key: None,
            source: None,
            status: None,
            content_type: None,
            body_bytes: None,
            body: None,
            served_at,
        },
        FetchDecision::Respond(result) => {
            let served = result?;
            let response = served.response;
            WorkerFetchOutput {
                url,
                decision: "respond",
                key: Some(served.key),
                source: Some(served.source),
                status: Some(response.status),
                content_type: response.header("content-type").map(String::from),
                body_bytes: Some(response.body.len()),
                body: std::str::from_utf8(&response.body).ok().map(String::from),
                served_at,
            }
        }
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::*;

    fn params(url: &str) -> WorkerFetchParams {
        WorkerFetchParams { url: url.into(), method: default_method() }
    }

    #[tokio::test]
    async fn test_fetch_shell_from_cache() {
        let worker = ready_worker(&[("/index.html", "<html>")]).await;

        let out = output(&fetch_impl(&worker, params("/index.html")).await.unwrap());
        assert_eq!(out["decision"], "respond");
        assert_eq!(out["key"], "index.html");
        assert_eq!(out["source"], "cache");
        assert_eq!(out["status"], 200);
        assert_eq!(out["body"], "<html>");
        assert_eq!(out["content_type"], "text/plain");
    }

    #[tokio::test]
    async fn test_fetch_root_goes_to_network() {
        let worker = ready_worker(&[("/index.html", "<html>"), ("/", "root")]).await;

        let out = output(&fetch_impl(&worker, params("#/settings")).await.unwrap());
        assert_eq!(out["url"], "https://app.example/#/settings");
        assert_eq!(out["key"], "/");
        assert_eq!(out["source"], "network");
        assert_eq!(out["body"], "root");
    }

    #[tokio::test]
    async fn test_fetch_unknown_passes_through() {
        let worker = ready_worker(&[("/index.html", "<html>")]).await;

        let out = output(&fetch_impl(&worker, params("/api/user")).await.unwrap());
        assert_eq!(out["decision"], "passthrough");
        assert!(out.get("status").is_none());

        let post = WorkerFetchParams { url: "/main.dart.js".into(), method: "post".into() };
        let out = output(&fetch_impl(&worker, post).await.unwrap());
        assert_eq!(out["decision"], "passthrough");
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_input() {
        let worker = ready_worker(&[("/index.html", "<html>")]).await;

        let err = fetch_impl(&worker, params("")).await.unwrap_err();
        assert_eq!(err.code.0, -32602);

        let err = fetch_impl(&worker, params("main.dart.js")).await.unwrap_err();
        assert_eq!(err.code.0, -32005);
    }
}
