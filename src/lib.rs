//! pollhttpd - single-threaded, readiness-driven HTTP server
//!
//! One thread multiplexes every client socket, parses requests, answers
//! them with a generated page and evicts idle connections.

pub mod access_log;
pub mod config;
pub mod http;
pub mod server;
