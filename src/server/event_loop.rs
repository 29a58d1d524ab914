use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use anyhow::Context;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, error, info, warn};

use crate::access_log::AccessLog;
use crate::config::ServerConfig;
use crate::http::connection::{Connection, Disposition, ExchangeContext};
use crate::http::response::KeepAliveHint;
use crate::server::clock::{Clock, SystemClock};
use crate::server::listener;
use crate::server::table::ConnectionTable;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;
const EVENT_CAPACITY: usize = 1024;

/// Whether the loop should keep going after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Asks a running server to stop. Usable from any thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    waker: Arc<Waker>,
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) -> io::Result<()> {
        self.requested.store(true, Ordering::SeqCst);
        self.waker.wake()
    }
}

/// Drain work carried into the next pass.
#[derive(Debug, Default)]
struct Backlog {
    accept: bool,
    reads: Vec<Token>,
}

impl Backlog {
    fn is_empty(&self) -> bool {
        !self.accept && self.reads.is_empty()
    }
}

/// The event loop and everything it owns.
pub struct Server<C: Clock = SystemClock> {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: ConnectionTable,
    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
    settings: ServerConfig,
    access_log: AccessLog,
    clock: C,
    backlog: Backlog,
}

impl Server<SystemClock> {
    pub fn bind(settings: &ServerConfig, access_log: AccessLog) -> anyhow::Result<Self> {
        Self::bind_with_clock(settings, access_log, SystemClock)
    }
}

impl<C: Clock> Server<C> {
    pub fn bind_with_clock(settings: &ServerConfig, access_log: AccessLog, clock: C) -> anyhow::Result<Self> {
        let addr = settings.socket_addr()?;
        let poll = Poll::new().context("failed to create poller")?;
        let mut listener =
            listener::bind(addr).with_context(|| format!("failed to bind {}", addr))?;
        let local_addr = listener.local_addr()?;

        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .context("failed to register listener")?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER).context("failed to create waker")?);

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENT_CAPACITY),
            listener,
            local_addr,
            connections: ConnectionTable::new(settings.max_connections, FIRST_CONNECTION),
            waker,
            shutdown: Arc::new(AtomicBool::new(false)),
            settings: settings.clone(),
            access_log,
            clock,
            backlog: Backlog::default(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            waker: Arc::clone(&self.waker),
            requested: Arc::clone(&self.shutdown),
        }
    }

    /// Serves until shutdown is requested or a fatal error occurs.
    ///
    /// Every open connection is closed before returning.
    pub fn run(mut self) -> anyhow::Result<()> {
        info!(addr = %self.local_addr, "Listening");

        let poll_timeout = self.settings.poll_timeout();
        let result = loop {
            match self.poll_once(Some(poll_timeout)) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break Ok(()),
                Err(e) => {
                    error!(error = ?e, "event loop stopped");
                    break Err(e);
                }
            }
        };

        let closed = self.close_all();
        info!(closed, "server stopped");
        result
    }

    /// Runs one wait and handles everything it reported, then sweeps idle
    /// connections.
    pub fn poll_once(&mut self, timeout: Option<Duration>) -> anyhow::Result<Flow> {
        let timeout = if self.backlog.is_empty() {
            timeout
        } else {
            Some(Duration::ZERO)
        };

        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(Flow::Continue);
            }
            return Err(anyhow::Error::new(e).context("readiness wait failed"));
        }

        let ready: Vec<(Token, bool, bool)> = self
            .events
            .iter()
            .map(|event| {
                let readable = event.is_readable() || event.is_read_closed() || event.is_error();
                (event.token(), readable, event.is_writable())
            })
            .collect();

        let carried = std::mem::take(&mut self.backlog);
        if carried.accept {
            self.accept_connections()?;
        }
        for token in carried.reads {
            self.serve(token, true, false);
        }

        for (token, readable, writable) in ready {
            match token {
                LISTENER => self.accept_connections()?,
                WAKER => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        info!("shutdown requested");
                        return Ok(Flow::Stop);
                    }
                }
                token => self.serve(token, readable, writable),
            }
        }

        self.sweep_idle();
        Ok(Flow::Continue)
    }

    fn accept_connections(&mut self) -> anyhow::Result<()> {
        let burst = listener::accept_burst(&self.listener, self.settings.accept_burst)
            .context("accept failed")?;
        if !burst.exhausted {
            self.backlog.accept = true;
        }

        let now = self.clock.now();
        for (stream, peer) in burst.accepted {
            if self.connections.is_full() {
                warn!(%peer, limit = self.settings.max_connections, "connection limit reached, dropping");
                continue;
            }
            match self
                .connections
                .insert(self.poll.registry(), Connection::new(stream, peer, now))
            {
                Ok(token) => debug!(%peer, token = token.0, "accepted connection"),
                Err(e) => warn!(%peer, error = %e, "failed to register connection"),
            }
        }

        Ok(())
    }

    fn serve(&mut self, token: Token, readable: bool, writable: bool) {
        let registry = self.poll.registry();
        let Some(conn) = self.connections.get_mut(token) else {
            return;
        };

        let mut ctx = ExchangeContext {
            now: self.clock.now(),
            date: SystemTime::now(),
            keep_alive: KeepAliveHint {
                timeout: self.settings.idle_timeout(),
                max: self.settings.keep_alive_max,
            },
            max_request_bytes: self.settings.max_request_bytes,
            read_burst: self.settings.read_burst,
            access_log: &mut self.access_log,
        };

        let outcome = conn
            .handle_readiness(readable, writable, &mut ctx)
            .and_then(|disposition| {
                if disposition != Disposition::Close {
                    conn.sync_interest(registry, token)?;
                }
                Ok(disposition)
            });

        match outcome {
            Ok(Disposition::Open) => {}
            Ok(Disposition::ReadPending) => self.backlog.reads.push(token),
            Ok(Disposition::Close) => {
                if let Some(peer) = self.connections.close(registry, token) {
                    debug!(%peer, "connection closed");
                }
            }
            Err(e) => {
                if let Some(peer) = self.connections.close(registry, token) {
                    warn!(%peer, error = %e, "connection error, closing");
                }
            }
        }
    }

    fn sweep_idle(&mut self) {
        let now = self.clock.now();
        let timeout = self.settings.idle_timeout();
        for peer in self.connections.sweep(self.poll.registry(), now, timeout) {
            info!(%peer, "connection timed out");
        }
    }

    fn close_all(&mut self) -> usize {
        self.backlog = Backlog::default();
        self.connections.drain(self.poll.registry())
    }
}
