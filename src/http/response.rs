use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

use crate::http::page;
use crate::http::request::{Method, Request, SUPPORTED_METHODS, Version};

/// Fixed identifier sent in the `Server` header.
pub const SERVER_NAME: &str = "pollhttpd/0.1";

/// Every response body is an HTML page.
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

/// HTTP status codes the server can answer with.
///
/// - `Ok` (200): Request successful
/// - `MethodNotAllowed` (405): Method known but not allowed
/// - `RequestTimeout` (408): Client too slow
/// - `UnsupportedMediaType` (415): Body format not accepted
/// - `ExpectationFailed` (417): `Expect` header present
/// - `InternalServerError` (500): Server error
/// - `NotImplemented` (501): Method not supported
/// - `HttpVersionNotSupported` (505): Protocol version not supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusCode {
    /// 200 OK
    #[default]
    Ok,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 408 Request Timeout
    RequestTimeout,
    /// 415 Unsupported Media Type
    UnsupportedMediaType,
    /// 417 Expectation Failed
    ExpectationFailed,
    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
    /// 505 HTTP Version Not Supported
    HttpVersionNotSupported,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use pollhttpd::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::HttpVersionNotSupported.as_u16(), 505);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::RequestTimeout => 408,
            StatusCode::UnsupportedMediaType => 415,
            StatusCode::ExpectationFailed => 417,
            StatusCode::InternalServerError => 500,
            StatusCode::NotImplemented => 501,
            StatusCode::HttpVersionNotSupported => 505,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::UnsupportedMediaType => "Unsupported Media Type",
            StatusCode::ExpectationFailed => "Expectation Failed",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::HttpVersionNotSupported => "HTTP Version Not Supported",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

/// Represents a complete HTTP response ready to be sent to a client.
///
/// Headers keep their insertion order so the same request always
/// serializes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Protocol version of the status line
    pub version: Version,
    /// The HTTP status code
    pub status: StatusCode,
    /// HTTP headers in the order they are sent
    pub headers: Vec<(String, String)>,
    /// Response body as bytes
    pub body: Vec<u8>,
}

impl Response {
    /// Looks up a header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use pollhttpd::http::response::*;
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "text/html")
///     .body(b"<p>hi</p>".to_vec())
///     .build();
///
/// assert_eq!(response.header("content-length"), Some("9"));
/// ```
pub struct ResponseBuilder {
    version: Version,
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    /// Creates a new HTTP/1.1 response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            version: Version::Http11,
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Adds a header, replacing the value of an existing one in place.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((key, value)),
        }
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Builds the final Response.
    ///
    /// Adds a Content-Length header based on body size if none was set.
    pub fn build(mut self) -> Response {
        let has_length = self
            .headers
            .iter()
            .any(|(key, _)| key.eq_ignore_ascii_case("Content-Length"));
        if !has_length {
            self.headers
                .push(("Content-Length".to_string(), self.body.len().to_string()));
        }

        Response {
            version: self.version,
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

/// `Keep-Alive` header parameters advertised on persistent connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveHint {
    pub timeout: Duration,
    pub max: u32,
}

/// Everything besides the request that shapes a response.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    /// Client address embedded in the page
    pub peer: SocketAddr,
    /// Value of the `Date` header
    pub date: SystemTime,
    /// `Some` when the connection stays open after this response
    pub keep_alive: Option<KeepAliveHint>,
}

/// Builds the response for a parsed request.
///
/// Only a successful GET or POST carries a body. HEAD and every error
/// status advertise `Content-Length: 0` and send nothing after the headers.
pub fn build_response(request: &Request, ctx: &ResponseContext) -> Response {
    let status = request.status;
    let with_body = status.is_success() && matches!(request.method, Method::GET | Method::POST);
    let body = if with_body {
        page::render(request, ctx.peer).into_bytes()
    } else {
        Vec::new()
    };

    let mut builder = ResponseBuilder::new(status)
        .version(request.protocol().unwrap_or(Version::Http11))
        .header("Date", httpdate::fmt_http_date(ctx.date))
        .header("Server", SERVER_NAME)
        .header("Content-Length", body.len().to_string())
        .header("Content-Type", CONTENT_TYPE_HTML);

    if status == StatusCode::MethodNotAllowed {
        builder = builder.header("Allow", SUPPORTED_METHODS.join(", "));
    }

    builder = match ctx.keep_alive {
        Some(hint) => builder.header("Connection", "keep-alive").header(
            "Keep-Alive",
            format!("timeout={}, max={}", hint.timeout.as_secs(), hint.max),
        ),
        None => builder.header("Connection", "close"),
    };

    builder.body(body).build()
}
