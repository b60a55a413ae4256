//! URL handling for intercepted and outgoing requests.

use url::Url;

/// Error type for request URL failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request target against the application origin.
///
/// Root-relative paths (`/main.dart.js`) and a bare fragment (`#/route`)
/// are resolved against `origin`; anything else must be an absolute http(s)
/// URL. Fragments and queries are kept because key derivation looks at
/// both. The host is lowercased by parsing.
pub fn resolve(origin: &str, input: &str) -> Result<String, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let base = parse_http(origin)?;
    let parsed = if trimmed.starts_with('/') || trimmed.starts_with('#') {
        base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
    } else {
        parse_http(trimmed)?
    };

    Ok(parsed.to_string())
}

/// Parse a URL for sending over the wire. The fragment is dropped.
pub fn parse_request_url(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = parse_http(trimmed)?;
    parsed.set_fragment(None);
    Ok(parsed)
}

fn parse_http(input: &str) -> Result<Url, UrlError> {
    let parsed = Url::parse(input).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}
