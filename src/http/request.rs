use std::fmt;

use url::Url;

use crate::http::header::Headers;

/// Base used to resolve origin-form targets (`/path?query`) into full URLs.
const ORIGIN_BASE: &str = "http://localhost";

/// HTTP request methods accepted by the parser.
///
/// Any other verb on the start line is a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
}

/// A parsed HTTP request.
///
/// Produced by [`crate::http::parser::read_request`] and handed to exactly
/// one handler invocation. Handlers only ever see it by shared reference.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method
    pub method: Method,
    /// The request target resolved into a URL (path + query)
    pub url: Url,
    /// Protocol version token from the start line, e.g. "HTTP/1.1"
    pub version: String,
    /// Request headers
    pub headers: Headers,
    /// Declared body length from `Content-Length`, 0 when absent
    pub content_length: u64,
    /// Raw body bytes
    pub body: Vec<u8>,
}

/// Builder for constructing Request objects outside the parser.
pub struct RequestBuilder {
    method: Option<Method>,
    target: Option<String>,
    version: Option<String>,
    headers: Headers,
    body: Vec<u8>,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// Matching is case-sensitive, as method tokens are.
    ///
    /// ```
    /// # use ferrule::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// assert_eq!(Method::from_str("PATCH"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a request target the way a server sees it on the start line.
///
/// Accepts origin-form (`/index.html?x=1`) and absolute-form
/// (`http://host/index.html`). Anything else, including relative paths,
/// is rejected.
pub fn parse_target(target: &str) -> Option<Url> {
    if target.starts_with('/') {
        // Concatenate rather than join so "//x" stays a path, not a host.
        Url::parse(&format!("{ORIGIN_BASE}{target}")).ok()
    } else {
        Url::parse(target).ok().filter(|url| !url.cannot_be_a_base())
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            target: None,
            version: None,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.add(key, value);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let target = self.target.ok_or("target missing")?;
        let url = parse_target(&target).ok_or("invalid target")?;
        let mut headers = self.headers;
        let content_length = self.body.len() as u64;
        if content_length > 0 {
            headers.set("Content-Length", content_length.to_string());
        }

        Ok(Request {
            method: self.method.ok_or("method missing")?,
            url,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers,
            content_length,
            body: self.body,
        })
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// The percent-encoded path component of the target.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// First value of a header (case-insensitive).
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// The `Host` header, or an empty string when the client sent none.
    pub fn host(&self) -> &str {
        self.header("Host").unwrap_or("")
    }

    pub fn is_http11(&self) -> bool {
        self.version == "HTTP/1.1"
    }
}
