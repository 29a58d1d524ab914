//! The HTML page returned for successful GET and POST requests.

use std::net::SocketAddr;

use crate::http::request::{HeaderName, Request};

const TITLE: &str = "pollhttpd";

/// Renders a page echoing the requested URL, the client address and the
/// request body.
pub fn render(request: &Request, peer: SocketAddr) -> String {
    let host = request.header(HeaderName::Host).unwrap_or_default();
    let body = String::from_utf8_lossy(&request.body);

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n\t<title>{}</title>\n</head>\n<body>\n\
         \thttp://{}{} {}:{}\n\
         \t{}\n\
         </body>\n</html>",
        TITLE,
        escape(host),
        escape(&request.target()),
        peer.ip(),
        peer.port(),
        escape(&body),
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
