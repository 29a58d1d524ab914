use std::io::{self, Read};
use std::net::SocketAddr;
use std::time::{Instant, SystemTime};

use bytes::BytesMut;
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};

use crate::access_log::{AccessLog, AccessRecord};
use crate::http::parser::{ParseError, frame_request, parse_http_request};
use crate::http::response::{KeepAliveHint, ResponseContext, build_response};
use crate::http::writer::{ResponseWriter, WriteStatus};

const READ_CHUNK: usize = 4096;

/// One accepted client socket and everything the loop tracks about it.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
    last_activity: Instant,
    keep_alive: bool,
    state: ConnectionState,
    registered: Option<Interest>,
}

#[derive(Debug)]
pub enum ConnectionState {
    /// Waiting for a complete request
    Reading,
    /// A response is partially written
    Writing(ResponseWriter),
    /// Done; the loop will drop the connection
    Closed,
}

/// What a read burst ended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The socket reported would-block
    Drained,
    /// The read cap or buffer limit was hit while data may still be waiting
    Pending,
    /// The peer closed its end
    Closed,
}

/// What the event loop should do with a connection after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep it registered
    Open,
    /// Keep it and revisit it without waiting for a new event
    ReadPending,
    /// Remove it from the table
    Close,
}

/// Per-pass settings and sinks the read/respond path needs.
pub struct ExchangeContext<'a> {
    pub now: Instant,
    pub date: SystemTime,
    pub keep_alive: KeepAliveHint,
    pub max_request_bytes: usize,
    pub read_burst: usize,
    pub access_log: &'a mut AccessLog,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, now: Instant) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            last_activity: now,
            keep_alive: false,
            state: ConnectionState::Reading,
            registered: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnectionState::Closed)
    }

    /// Bytes received but not yet consumed by a request.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn idle_for(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Interest matching the current state.
    ///
    /// Input is left in the kernel while a response is pending.
    pub fn interest(&self) -> Interest {
        match self.state {
            ConnectionState::Writing(_) => Interest::WRITABLE,
            _ => Interest::READABLE,
        }
    }

    pub fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        let interest = self.interest();
        registry.register(&mut self.stream, token, interest)?;
        self.registered = Some(interest);
        Ok(())
    }

    /// Re-registers only when the wanted interest changed.
    pub fn sync_interest(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        let wanted = self.interest();
        if self.registered != Some(wanted) {
            registry.reregister(&mut self.stream, token, wanted)?;
            self.registered = Some(wanted);
        }
        Ok(())
    }

    /// Deregisters and closes the socket.
    pub fn close(mut self, registry: &Registry) {
        if self.registered.is_some() {
            if let Err(e) = registry.deregister(&mut self.stream) {
                tracing::debug!(peer = %self.peer, error = %e, "deregister failed");
            }
        }
        // Dropping the stream closes the descriptor.
    }

    /// Reacts to one readiness event.
    ///
    /// Pending output is flushed first. Input is only read once no response
    /// is pending, then every complete request in the buffer is answered in
    /// order. End-of-stream closes without a response.
    pub fn handle_readiness(
        &mut self,
        readable: bool,
        writable: bool,
        ctx: &mut ExchangeContext<'_>,
    ) -> io::Result<Disposition> {
        // Hang-ups arrive as readable even when only writability is
        // registered; the failed write is what surfaces them.
        if writable || matches!(self.state, ConnectionState::Writing(_)) {
            self.drive(ctx)?;
        }

        // A flush that just finished may leave input unread since the last
        // readable edge, so the socket is read on either event.
        let mut pending = false;
        if (readable || writable) && matches!(self.state, ConnectionState::Reading) {
            match self.read_burst(ctx.now, ctx.read_burst, ctx.max_request_bytes)? {
                ReadOutcome::Closed => {
                    tracing::debug!(peer = %self.peer, "peer closed connection");
                    self.state = ConnectionState::Closed;
                    return Ok(Disposition::Close);
                }
                ReadOutcome::Pending => pending = true,
                ReadOutcome::Drained => {}
            }
            self.drive(ctx)?;
        }

        Ok(if self.is_closed() {
            Disposition::Close
        } else if pending {
            Disposition::ReadPending
        } else {
            Disposition::Open
        })
    }

    /// Reads until would-block, end-of-stream, `max_reads` reads or until
    /// `limit` bytes are buffered.
    pub fn read_burst(&mut self, now: Instant, max_reads: usize, limit: usize) -> io::Result<ReadOutcome> {
        let mut temp = [0u8; READ_CHUNK];

        for _ in 0..max_reads {
            let room = limit.saturating_sub(self.buffer.len()).min(READ_CHUNK);
            if room == 0 {
                return Ok(ReadOutcome::Pending);
            }
            match self.stream.read(&mut temp[..room]) {
                Ok(0) => return Ok(ReadOutcome::Closed),
                Ok(n) => {
                    self.buffer.extend_from_slice(&temp[..n]);
                    self.last_activity = now;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReadOutcome::Drained);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(ReadOutcome::Pending)
    }

    /// Advances the state machine as far as it goes without blocking.
    fn drive(&mut self, ctx: &mut ExchangeContext<'_>) -> io::Result<()> {
        loop {
            match &mut self.state {
                ConnectionState::Writing(writer) => match writer.write_to(&mut self.stream)? {
                    WriteStatus::Blocked { progressed } => {
                        if progressed {
                            self.last_activity = ctx.now;
                        }
                        return Ok(());
                    }
                    WriteStatus::Done => {
                        self.last_activity = ctx.now;
                        self.state = if self.keep_alive {
                            ConnectionState::Reading
                        } else {
                            ConnectionState::Closed
                        };
                    }
                },
                ConnectionState::Reading => {
                    let Some((raw, oversized)) = self.next_request(ctx.max_request_bytes) else {
                        return Ok(());
                    };
                    let writer = self.respond(&raw, oversized, ctx);
                    self.state = ConnectionState::Writing(writer);
                }
                ConnectionState::Closed => return Ok(()),
            }
        }
    }

    fn next_request(&mut self, max_request_bytes: usize) -> Option<(BytesMut, bool)> {
        match frame_request(&self.buffer, max_request_bytes) {
            Ok(len) => Some((self.buffer.split_to(len), false)),
            Err(ParseError::Incomplete) => None,
            Err(ParseError::TooLarge) => {
                tracing::warn!(
                    peer = %self.peer,
                    buffered = self.buffer.len(),
                    "request exceeds size limit, answering and closing"
                );
                Some((self.buffer.split(), true))
            }
        }
    }

    fn respond(&mut self, raw: &[u8], oversized: bool, ctx: &mut ExchangeContext<'_>) -> ResponseWriter {
        let request = parse_http_request(raw);
        self.keep_alive = request.keep_alive() && !oversized;

        let response = build_response(
            &request,
            &ResponseContext {
                peer: self.peer,
                date: ctx.date,
                keep_alive: self.keep_alive.then_some(ctx.keep_alive),
            },
        );

        ctx.access_log
            .record(&AccessRecord::new(ctx.date, self.peer, &request));
        tracing::debug!(
            peer = %self.peer,
            method = %request.method,
            path = %request.path,
            status = response.status.as_u16(),
            keep_alive = self.keep_alive,
            "responding"
        );

        ResponseWriter::new(&response)
    }
}
