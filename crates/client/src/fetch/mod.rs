//! HTTP implementation of the worker's network seam.
//!
//! ### Request handling
//! - `Reload` requests bypass intermediate caches (`Cache-Control: no-cache`)
//! - Fragments are never sent; queries are kept as-is
//! - Redirects are followed (reqwest default policy)
//!
//! ### Responses
//! - Any received response is returned, whatever its status
//! - Only transport failures and oversized bodies are errors
//! - Max body bytes: 64MB (configurable)

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, parse_request_url, resolve};

use shellcache_core::config::AppConfig;
use shellcache_core::http::{CacheMode, Request, Response};
use shellcache_core::network::Network;
use shellcache_core::Error;

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 64MB)
    pub max_bytes: usize,

    /// Request timeout (default: 30s)
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "shellcache/0.1".to_string(), max_bytes: 64 * 1024 * 1024, timeout: Duration::from_secs(30) }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), max_bytes: config.max_bytes, timeout: config.timeout() }
    }
}

/// Network backed by a shared reqwest client.
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new network with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, len: u64) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = parse_request_url(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method, e)))?;

        let mut builder = self.http.request(method, url.as_str());
        if request.cache_mode == CacheMode::Reload {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Network(format!("timed out fetching {}", url))
            } else {
                Error::Network(format!("network error: {}", e))
            }
        })?;

        if let Some(len) = response.content_length()
            && len > self.config.max_bytes as u64
        {
            return Err(self.too_large(len));
        }

        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(self.too_large(body.len() as u64));
        }

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response and hand back the raw request head.
    async fn one_shot(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&head).to_lowercase()
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "shellcache/0.1");
        assert_eq!(config.max_bytes, 64 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "test/1".into(), max_bytes: 10, timeout_ms: 500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "test/1");
        assert_eq!(config.max_bytes, 10);
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_fetch_ok_response() {
        let (base, server) =
            one_shot("HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: 6\r\n\r\n<html>").await;
        let network = HttpNetwork::new(FetchConfig::default()).unwrap();

        let response = network.fetch(&Request::get(format!("{base}/index.html"))).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.header("Content-Type"), Some("text/html"));
        assert_eq!(response.body.as_ref(), b"<html>");

        let head = server.await.unwrap();
        assert!(head.starts_with("get /index.html http/1.1"));
        assert!(head.contains("user-agent: shellcache/0.1"));
        assert!(!head.contains("cache-control"));
    }

    #[tokio::test]
    async fn test_reload_bypasses_caches() {
        let (base, server) = one_shot("HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n").await;
        let network = HttpNetwork::new(FetchConfig::default()).unwrap();

        let request = Request::get(format!("{base}/main.dart.js")).with_cache_mode(CacheMode::Reload);
        network.fetch(&request).await.unwrap();

        let head = server.await.unwrap();
        assert!(head.contains("cache-control: no-cache"));
        assert!(head.contains("pragma: no-cache"));
    }

    #[tokio::test]
    async fn test_error_status_is_not_an_error() {
        let (base, _server) = one_shot("HTTP/1.1 404 Not Found\r\ncontent-length: 9\r\n\r\nnot found").await;
        let network = HttpNetwork::new(FetchConfig::default()).unwrap();

        let response = network.fetch(&Request::get(format!("{base}/missing.js"))).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_ok());
        assert_eq!(response.body.as_ref(), b"not found");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let (base, _server) = one_shot("HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\n0123456789").await;
        let config = FetchConfig { max_bytes: 4, ..Default::default() };
        let network = HttpNetwork::new(config).unwrap();

        let err = network.fetch(&Request::get(format!("{base}/big.bin"))).await.unwrap_err();
        assert!(matches!(err, Error::FetchTooLarge(_)));
    }

    #[tokio::test]
    async fn test_declared_length_compared_without_truncation() {
        let (base, _server) =
            one_shot("HTTP/1.1 200 OK\r\ncontent-length: 4294967300\r\n\r\n0123456789").await;
        let config = FetchConfig { max_bytes: 4, ..Default::default() };
        let network = HttpNetwork::new(config).unwrap();

        let err = network.fetch(&Request::get(format!("{base}/huge.bin"))).await.unwrap_err();
        match err {
            Error::FetchTooLarge(msg) => assert!(msg.starts_with("4294967300 bytes")),
            other => panic!("expected FetchTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let network = HttpNetwork::new(FetchConfig::default()).unwrap();
        let err = network.fetch(&Request::get(format!("http://{addr}/"))).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let network = HttpNetwork::new(FetchConfig::default()).unwrap();
        let err = network.fetch(&Request::get("ftp://app.example/a.js")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
