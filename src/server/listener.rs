use std::io;
use std::net::SocketAddr;

use mio::net::{TcpListener, TcpStream};

/// Connections taken off the listen queue in one burst.
#[derive(Debug, Default)]
pub struct AcceptBurst {
    pub accepted: Vec<(TcpStream, SocketAddr)>,
    /// True when the queue reported would-block before the cap was hit
    pub exhausted: bool,
}

/// Binds a non-blocking listener.
pub fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    TcpListener::bind(addr)
}

/// Accepts queued connections until would-block or `max` accepts.
///
/// Any error other than would-block or an interrupt is returned; the
/// caller treats it as fatal.
pub fn accept_burst(listener: &TcpListener, max: usize) -> io::Result<AcceptBurst> {
    let mut burst = AcceptBurst::default();

    while burst.accepted.len() < max {
        match listener.accept() {
            Ok(conn) => burst.accepted.push(conn),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                burst.exhausted = true;
                break;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(burst)
}
