use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP request method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Other(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the network layer should treat intermediate HTTP caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheMode {
    #[default]
    Default,
    /// Always go to the origin server, never reuse a cached HTTP response.
    Reload,
}

/// An absolute-URL request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub url: String,
    #[serde(default)]
    pub cache_mode: CacheMode,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            cache_mode: CacheMode::Default,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::Get
    }
}

/// A fully buffered response.
///
/// Cloning copies the body, so a clone can be stored while the original is
/// handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Status in the 200-299 range.
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("get"), Method::Get);
        assert_eq!(Method::parse("POST"), Method::Post);
        assert_eq!(Method::parse("patch"), Method::Other("PATCH".to_string()));
        assert_eq!(Method::Other("PATCH".to_string()).to_string(), "PATCH");
    }

    #[test]
    fn test_response_is_ok() {
        assert!(Response::ok("x").is_ok());
        assert!(Response::new(204, Vec::new()).is_ok());
        assert!(!Response::new(304, Vec::new()).is_ok());
        assert!(!Response::new(404, "missing").is_ok());
        assert!(!Response::new(503, "down").is_ok());
    }

    #[test]
    fn test_response_header_lookup_ignores_case() {
        let response = Response::ok("x").with_header("Content-Type", "text/html");
        assert_eq!(response.header("content-type"), Some("text/html"));
        assert_eq!(response.header("etag"), None);
    }
}
