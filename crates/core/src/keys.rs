//! Mapping between request URLs and manifest resource keys.
//!
//! The origin is always passed in; nothing here reads ambient state.

/// Sentinel key aliasing the application root document.
pub const ROOT_KEY: &str = "/";

/// Query marker used by the application for cache-busting.
const VERSION_QUERY: &str = "?v=";

/// Derive the manifest key for a request URL.
///
/// Returns `None` for URLs outside `origin`. The `?v=` cache-busting suffix
/// is dropped, and the bare origin, the origin root with a fragment, and an
/// empty path all map to [`ROOT_KEY`].
pub fn resource_key(url: &str, origin: &str) -> Option<String> {
    let rest = url.strip_prefix(origin)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let mut key = rest.strip_prefix('/').unwrap_or(rest);
    if let Some(idx) = key.find(VERSION_QUERY) {
        key = &key[..idx];
    }

    if rest.is_empty() || rest.starts_with("/#") || key.is_empty() {
        return Some(ROOT_KEY.to_string());
    }

    Some(key.to_string())
}

/// Absolute URL used to request the resource named by `key`.
pub fn request_url(origin: &str, key: &str) -> String {
    if key == ROOT_KEY { format!("{origin}/") } else { format!("{origin}/{key}") }
}

/// Store key for a request URL: the URL without its fragment, with the
/// bare origin spelled as the origin root.
///
/// Hash routes of one document share a single entry.
pub fn cache_url(url: &str, origin: &str) -> String {
    let url = url.split_once('#').map_or(url, |(before, _)| before);
    if url == origin { format!("{origin}/") } else { url.to_string() }
}
