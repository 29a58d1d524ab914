use crate::http::request::{HeaderName, Method, Request, Version};
use crate::http::response::StatusCode;

const HEAD_DELIMITER: &[u8] = b"\r\n\r\n";

/// Why no request could be framed from a connection buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// More bytes are needed before the request is complete
    Incomplete,
    /// The request would not fit in the configured limit
    TooLarge,
}

/// Parser position inside the head section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RequestLine,
    HeaderLines,
}

/// Decides how many leading bytes of `buf` form one request.
///
/// A request is complete once its blank line has arrived together with as
/// many body bytes as `Content-Length` announces (none when absent or
/// unparseable).
pub fn frame_request(buf: &[u8], max_request_bytes: usize) -> Result<usize, ParseError> {
    let Some(headers_end) = find_headers_end(buf) else {
        return if buf.len() >= max_request_bytes {
            Err(ParseError::TooLarge)
        } else {
            Err(ParseError::Incomplete)
        };
    };

    let head = String::from_utf8_lossy(&buf[..headers_end]);
    let declared = head
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .filter(|(token, _)| token.trim().eq_ignore_ascii_case("Content-Length"))
        .filter_map(|(_, value)| value.trim().parse::<usize>().ok())
        .last()
        .unwrap_or(0);

    let total = (headers_end + HEAD_DELIMITER.len()).saturating_add(declared);
    if total > max_request_bytes {
        return Err(ParseError::TooLarge);
    }
    if buf.len() < total {
        return Err(ParseError::Incomplete);
    }

    Ok(total)
}

/// Parses one raw request.
///
/// Never fails: unsupported input is reported through `Request::status` and
/// malformed pieces degrade to empty fields.
pub fn parse_http_request(buf: &[u8]) -> Request {
    let (head, body) = match find_headers_end(buf) {
        Some(end) => (&buf[..end], &buf[end + HEAD_DELIMITER.len()..]),
        None => (buf, &[][..]),
    };

    let mut request = Request::empty();
    request.body = body.to_vec();

    let head = String::from_utf8_lossy(head);
    let mut state = State::RequestLine;
    for line in head.split("\r\n") {
        state = match state {
            State::RequestLine => {
                parse_request_line(line, &mut request);
                State::HeaderLines
            }
            State::HeaderLines => {
                parse_header_line(line, &mut request);
                State::HeaderLines
            }
        };
    }

    request
}

fn parse_request_line(line: &str, request: &mut Request) {
    let (method, rest) = split_token(line);
    let (target, rest) = split_token(rest);
    // Extra tokens stay attached to the version and make it unsupported.
    let version = rest.trim();

    request.method = Method::parse(method);
    if !request.method.is_supported() {
        request.fault(StatusCode::NotImplemented);
    }

    match target.split_once('?') {
        Some((path, query)) => {
            request.path = path.to_string();
            request.query = query.to_string();
        }
        None => {
            request.path = target.to_string();
            request.query.clear();
        }
    }

    request.version = version.to_string();
    match Version::parse(version) {
        Some(version) if version.persistent_by_default() => {
            request
                .headers
                .insert(HeaderName::Connection, "keep-alive".to_string());
        }
        Some(_) => {}
        None => {
            if request.status.is_success() {
                request.fault(StatusCode::HttpVersionNotSupported);
            }
        }
    }
}

fn parse_header_line(line: &str, request: &mut Request) {
    if line.is_empty() {
        return;
    }

    let Some((token, value)) = line.split_once(':') else {
        tracing::trace!(line, "ignoring header line without colon");
        return;
    };
    let token = token.trim();
    let value = value.trim();

    if token.eq_ignore_ascii_case("Expect") {
        request.fault(StatusCode::ExpectationFailed);
        return;
    }

    match HeaderName::lookup(token) {
        Some(name) => {
            request.headers.insert(name, value.to_string());
        }
        None => tracing::trace!(header = token, "ignoring unrecognized header"),
    }
}

fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    s.split_once(|c: char| c.is_ascii_whitespace())
        .unwrap_or((s, ""))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_DELIMITER.len())
        .position(|w| w == HEAD_DELIMITER)
}
