//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.x side of the server: turning buffered
//! bytes into requests and requests into response bytes.
//!
//! # Architecture
//!
//! - **`connection`**: per-connection state machine driven by readiness events
//! - **`parser`**: frames and parses requests from byte buffers; never fails
//! - **`request`**: the parsed request model
//! - **`response`**: status codes, response builder and the response rules
//! - **`writer`**: serializes responses and writes them to non-blocking sockets
//! - **`page`**: the HTML page sent back for GET and POST
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Buffer input until a request is framed
//!        └──────┬──────┘
//!               │ Request framed, parsed, response built
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Flush, resuming on writability
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! # Example
//!
//! ```
//! use pollhttpd::http::parser::parse_http_request;
//! use pollhttpd::http::response::StatusCode;
//!
//! let request = parse_http_request(b"GET /x?y=1 HTTP/1.1\r\nHost: h\r\n\r\n");
//! assert_eq!(request.path, "/x");
//! assert_eq!(request.query, "y=1");
//! assert_eq!(request.status, StatusCode::Ok);
//! ```

pub mod connection;
pub mod page;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
