use std::collections::HashMap;
use std::fmt;

use crate::http::response::StatusCode;

/// Methods the server answers. Listed in the `Allow` header of a 405.
pub const SUPPORTED_METHODS: [&str; 3] = ["GET", "HEAD", "POST"];

/// HTTP request methods.
///
/// GET, HEAD and POST are served. Any other token is kept verbatim in
/// `Other` so the response and the access log can still name it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// POST - Submit data
    POST,
    /// Any other method token, answered with 501 Not Implemented
    Other(String),
}

impl Method {
    /// Parses an HTTP method token.
    ///
    /// Supported methods match regardless of case and are stored in their
    /// canonical form. Anything else is kept verbatim.
    ///
    /// # Example
    ///
    /// ```
    /// # use pollhttpd::http::request::Method;
    /// assert_eq!(Method::parse("GET"), Method::GET);
    /// assert_eq!(Method::parse("head"), Method::HEAD);
    /// assert_eq!(Method::parse("PUT"), Method::Other("PUT".to_string()));
    /// ```
    pub fn parse(s: &str) -> Self {
        [Method::GET, Method::HEAD, Method::POST]
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .unwrap_or_else(|| Method::Other(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::Other(token) => token,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Method::Other(_))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol versions the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    /// Parses the exact version literal from a request line.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HTTP/1.0" => Some(Version::Http10),
            "HTTP/1.1" => Some(Version::Http11),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }

    /// Whether connections stay open unless the client asks otherwise.
    pub fn persistent_by_default(&self) -> bool {
        matches!(self, Version::Http11)
    }
}

/// Request headers the parser records. Everything else is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderName {
    Host,
    UserAgent,
    ContentType,
    ContentLength,
    Accept,
    AcceptLanguage,
    AcceptEncoding,
    Connection,
}

impl HeaderName {
    pub const ALL: [HeaderName; 8] = [
        HeaderName::Host,
        HeaderName::UserAgent,
        HeaderName::ContentType,
        HeaderName::ContentLength,
        HeaderName::Accept,
        HeaderName::AcceptLanguage,
        HeaderName::AcceptEncoding,
        HeaderName::Connection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderName::Host => "Host",
            HeaderName::UserAgent => "User-Agent",
            HeaderName::ContentType => "Content-Type",
            HeaderName::ContentLength => "Content-Length",
            HeaderName::Accept => "Accept",
            HeaderName::AcceptLanguage => "Accept-Language",
            HeaderName::AcceptEncoding => "Accept-Encoding",
            HeaderName::Connection => "Connection",
        }
    }

    /// Case-insensitive lookup of a header field token.
    pub fn lookup(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(token))
    }
}

/// Represents a parsed HTTP request from a client.
///
/// A request is never rejected outright: protocol faults are recorded in
/// `status` so a well-formed error response can still be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method, literal token kept for unsupported ones
    pub method: Method,
    /// Request path without the query string, possibly empty
    pub path: String,
    /// Everything after the first `?` of the request target
    pub query: String,
    /// Protocol version exactly as sent
    pub version: String,
    /// Recognized headers, last occurrence wins
    pub headers: HashMap<HeaderName, String>,
    /// Bytes following the blank line
    pub body: Vec<u8>,
    /// Status derived while parsing
    pub status: StatusCode,
}

impl Request {
    /// An empty request with a success status.
    pub fn empty() -> Self {
        Self {
            method: Method::Other(String::new()),
            path: String::new(),
            query: String::new(),
            version: String::new(),
            headers: HashMap::new(),
            body: Vec::new(),
            status: StatusCode::Ok,
        }
    }

    /// Retrieves a recognized header value.
    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(&name).map(|v| v.as_str())
    }

    /// Retrieves the Content-Length header value and parses it as a usize.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.header(HeaderName::ContentLength)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// The version as a known protocol, `None` when unsupported.
    pub fn protocol(&self) -> Option<Version> {
        Version::parse(&self.version)
    }

    /// Determines whether the connection should remain open after the response.
    ///
    /// Only HTTP/1.1 is persistent by default. A `Connection` header other
    /// than `keep-alive` closes; no header keeps the default.
    pub fn keep_alive(&self) -> bool {
        let persistent = self
            .protocol()
            .is_some_and(|version| version.persistent_by_default());

        persistent
            && self
                .header(HeaderName::Connection)
                .is_none_or(|v| v.eq_ignore_ascii_case("keep-alive"))
    }

    /// Path and query joined back together.
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    /// Records a protocol fault. Success can never be restored this way.
    pub fn fault(&mut self, status: StatusCode) {
        if !status.is_success() {
            self.status = status;
        }
    }
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    request: Request,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        let mut request = Request::empty();
        request.method = Method::GET;
        request.path = "/".to_string();
        request.version = Version::Http11.as_str().to_string();
        Self { request }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.request.method = method;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.request.path = path.into();
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.request.query = query.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.request.version = version.into();
        self
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.request.headers.insert(name, value.into());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.request.body = body;
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.request.status = status;
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}
