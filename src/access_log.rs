//! One record per served request.
//!
//! Records always go to `tracing` on the `access` target. When a file is
//! configured they are also appended to it, one line each.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::time::SystemTime;

use anyhow::Context;

use crate::http::request::Request;
use crate::http::response::StatusCode;

/// What gets logged about a single request.
#[derive(Debug, Clone)]
pub struct AccessRecord<'a> {
    pub time: SystemTime,
    pub peer: SocketAddr,
    pub method: &'a str,
    pub path: &'a str,
    pub status: StatusCode,
}

impl<'a> AccessRecord<'a> {
    pub fn new(time: SystemTime, peer: SocketAddr, request: &'a Request) -> Self {
        Self {
            time,
            peer,
            method: request.method.as_str(),
            path: &request.path,
            status: request.status,
        }
    }
}

impl fmt::Display for AccessRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {}:{} {} {} : {}",
            httpdate::fmt_http_date(self.time),
            self.peer.ip(),
            self.peer.port(),
            self.method,
            self.path,
            self.status.as_u16()
        )
    }
}

/// Access log sink owned by the event loop.
#[derive(Debug, Default)]
pub struct AccessLog {
    file: Option<LineWriter<File>>,
}

impl AccessLog {
    /// Logs through `tracing` only.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Appends records to `path`, creating the file if needed.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open access log {}", path.display()))?;

        Ok(Self {
            file: Some(LineWriter::new(file)),
        })
    }

    pub fn record(&mut self, record: &AccessRecord<'_>) {
        tracing::info!(
            target: "access",
            peer = %record.peer,
            method = record.method,
            path = record.path,
            status = record.status.as_u16(),
            "request served"
        );

        if let Some(file) = self.file.as_mut() {
            if let Err(e) = writeln!(file, "{}", record) {
                tracing::warn!(error = %e, "failed to write access log record");
            }
        }
    }
}
