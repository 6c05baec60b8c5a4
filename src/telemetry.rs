/*
 *  Copyright (C) 2026 the project contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! The telemetry store: a per-packet row sink with
//! connection-recovery semantics. The core engine depends only on
//! [`TelemetryStore`]; [`RedisTelemetryStore`] is the concrete adapter used
//! by the demo binary.

use crate::error::{TelemetryError, TelemetryResult};
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// One per-packet row collected between flushes.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRow {
    pub seq: i64,
    pub ssrc: u32,
    pub arrival_ms: i64,
    pub payload_size: u32,
}

/// Outcome of a [`TelemetryStore::save`] call, matching the external
/// contract's disposition codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Ok,
    ConnectError,
    SessionError,
    TypeError,
    Other,
}

/// External per-packet statistics sink. A concrete adapter owns the
/// actual transport (Redis, a file, a test double); the engine only ever
/// calls through this trait under its own bounded-retry loop.
pub trait TelemetryStore: Send {
    fn connect(&mut self, ip: &str, port: u16) -> TelemetryResult<()>;
    fn set_config(&mut self, session_id: &str, kind: &str) -> TelemetryResult<()>;
    fn collect(&mut self, row: TelemetryRow);
    fn save(&mut self) -> SaveOutcome;
    fn close(&mut self);
}

/// In-process telemetry store with no external transport, used when no
/// `redis_ip` is configured or a concrete adapter is unavailable.
#[derive(Debug, Default)]
pub struct NullTelemetryStore {
    buffered: Vec<TelemetryRow>,
}

impl TelemetryStore for NullTelemetryStore {
    fn connect(&mut self, _ip: &str, _port: u16) -> TelemetryResult<()> {
        Ok(())
    }

    fn set_config(&mut self, _session_id: &str, _kind: &str) -> TelemetryResult<()> {
        Ok(())
    }

    fn collect(&mut self, row: TelemetryRow) {
        self.buffered.push(row);
    }

    fn save(&mut self) -> SaveOutcome {
        self.buffered.clear();
        SaveOutcome::Ok
    }

    fn close(&mut self) {
        self.buffered.clear();
    }
}

/// Redis-backed [`TelemetryStore`]: the recognized
/// `redis_ip`/`redis_port`/`redis_sid` bootstrap options and
/// connect/session/type error kinds map directly onto a Redis client
/// session, so this adapter uses the `redis` crate rather than inventing a
/// bespoke protocol.
pub struct RedisTelemetryStore {
    client: Option<redis::Client>,
    connection: Option<redis::Connection>,
    session_id: String,
    kind: String,
    key_prefix: String,
    buffered: Vec<TelemetryRow>,
}

impl RedisTelemetryStore {
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self {
            client: None,
            connection: None,
            session_id: String::new(),
            kind: String::new(),
            key_prefix: key_prefix.into(),
            buffered: Vec::new(),
        }
    }

    fn stream_key(&self) -> String {
        format!("{}:{}:{}", self.key_prefix, self.session_id, self.kind)
    }
}

impl TelemetryStore for RedisTelemetryStore {
    #[instrument(skip(self), fields(ip, port))]
    fn connect(&mut self, ip: &str, port: u16) -> TelemetryResult<()> {
        let url = format!("redis://{ip}:{port}/");
        let client = redis::Client::open(url.as_str())
            .map_err(|e| TelemetryError::Connect(e.to_string()))?;
        let connection = client
            .get_connection()
            .map_err(|e| TelemetryError::Connect(e.to_string()))?;
        self.client = Some(client);
        self.connection = Some(connection);
        debug!("connected to telemetry store");
        Ok(())
    }

    fn set_config(&mut self, session_id: &str, kind: &str) -> TelemetryResult<()> {
        if self.connection.is_none() {
            return Err(TelemetryError::Session("not connected".to_string()));
        }
        self.session_id = session_id.to_string();
        self.kind = kind.to_string();
        Ok(())
    }

    fn collect(&mut self, row: TelemetryRow) {
        self.buffered.push(row);
    }

    #[instrument(skip(self))]
    fn save(&mut self) -> SaveOutcome {
        if self.session_id.is_empty() || self.kind.is_empty() {
            return SaveOutcome::SessionError;
        }

        let Some(connection) = self.connection.as_mut() else {
            return SaveOutcome::ConnectError;
        };
        if self.buffered.is_empty() {
            return SaveOutcome::Ok;
        }

        let key = self.stream_key();
        let outcome = (|| -> TelemetryResult<()> {
            for row in &self.buffered {
                let payload = serde_json::to_string(row)
                    .map_err(|e| TelemetryError::Type(e.to_string()))?;
                redis::cmd("RPUSH")
                    .arg(&key)
                    .arg(payload)
                    .query::<()>(connection)
                    .map_err(|e| TelemetryError::Other(e.to_string()))?;
            }
            Ok(())
        })();

        // The RPUSH loop only ever raises Type or Other; Connect and Session
        // are handled by the guards above and kept here so this match stays
        // exhaustive over TelemetryError without a wildcard arm.
        match outcome {
            Ok(()) => {
                self.buffered.clear();
                SaveOutcome::Ok
            }
            Err(TelemetryError::Connect(_)) => SaveOutcome::ConnectError,
            Err(TelemetryError::Session(_)) => SaveOutcome::SessionError,
            Err(TelemetryError::Type(_)) => SaveOutcome::TypeError,
            Err(TelemetryError::Other(reason)) => {
                warn!(reason, "telemetry save failed");
                SaveOutcome::Other
            }
        }
    }

    fn close(&mut self) {
        self.connection = None;
        self.client = None;
        self.buffered.clear();
    }
}
