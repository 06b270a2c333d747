//! Mapping request URLs to manifest keys.
//!
//! Manifest keys are paths relative to the origin (`main.dart.js`,
//! `icons/Icon-192.png`), with [`ROOT_KEY`] standing for the entry document.
//! `origin` is always the serialized origin without a trailing slash.

use crate::manifest::ROOT_KEY;

/// Cache-busting query marker appended by the app's loader.
const VERSION_QUERY: &str = "?v=";

/// Key of an intercepted request.
///
/// Drops a `?v=` suffix, and maps the bare origin, `origin/#fragment` and
/// `origin/` to the root key. Returns `None` for URLs outside the origin.
pub fn request_key(origin: &str, url: &str) -> Option<String> {
    if url == origin {
        return Some(ROOT_KEY.to_string());
    }
    let rest = url.strip_prefix(origin)?.strip_prefix('/')?;
    if rest.starts_with('#') {
        return Some(ROOT_KEY.to_string());
    }

    let key = match rest.find(VERSION_QUERY) {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    if key.is_empty() {
        Some(ROOT_KEY.to_string())
    } else {
        Some(key.to_string())
    }
}

/// Key of an entry already stored in a cache namespace.
///
/// Unlike [`request_key`] the query string is kept: stored entries are
/// compared against the manifest exactly as they were cached.
pub fn stored_key(origin: &str, url: &str) -> Option<String> {
    let rest = url.strip_prefix(origin)?;
    if rest.is_empty() {
        return Some(ROOT_KEY.to_string());
    }
    let key = rest.strip_prefix('/')?;
    if key.is_empty() {
        Some(ROOT_KEY.to_string())
    } else {
        Some(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://app.test";

    #[test]
    fn test_root_normalization() {
        for url in [
            "https://app.test",
            "https://app.test/",
            "https://app.test/#/settings",
            "https://app.test/#",
            "https://app.test/?v=42",
        ] {
            assert_eq!(request_key(ORIGIN, url).as_deref(), Some("/"), "{}", url);
        }
    }

    #[test]
    fn test_version_query_stripped() {
        assert_eq!(
            request_key(ORIGIN, "https://app.test/main.dart.js?v=123").as_deref(),
            Some("main.dart.js")
        );
        assert_eq!(
            request_key(ORIGIN, "https://app.test/main.dart.js").as_deref(),
            Some("main.dart.js")
        );
        // Other queries are part of the key
        assert_eq!(
            request_key(ORIGIN, "https://app.test/main.dart.js?x=1").as_deref(),
            Some("main.dart.js?x=1")
        );
    }

    #[test]
    fn test_nested_paths() {
        assert_eq!(
            request_key(ORIGIN, "https://app.test/assets/fonts/MaterialIcons-Regular.otf").as_deref(),
            Some("assets/fonts/MaterialIcons-Regular.otf")
        );
        assert_eq!(
            request_key(ORIGIN, "https://app.test/api/data").as_deref(),
            Some("api/data")
        );
    }

    #[test]
    fn test_foreign_urls() {
        assert_eq!(request_key(ORIGIN, "https://cdn.test/flutter.js"), None);
        assert_eq!(request_key(ORIGIN, "https://app.testing/flutter.js"), None);
        assert_eq!(stored_key(ORIGIN, "https://cdn.test/flutter.js"), None);
    }

    #[test]
    fn test_stored_key() {
        assert_eq!(stored_key(ORIGIN, "https://app.test/").as_deref(), Some("/"));
        assert_eq!(stored_key(ORIGIN, "https://app.test").as_deref(), Some("/"));
        assert_eq!(
            stored_key(ORIGIN, "https://app.test/index.html").as_deref(),
            Some("index.html")
        );
        assert_eq!(
            stored_key(ORIGIN, "https://app.test/main.dart.js?v=1").as_deref(),
            Some("main.dart.js?v=1")
        );
    }
}
