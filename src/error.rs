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

use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by a concrete [`crate::telemetry::TelemetryStore`] adapter.
///
/// These are caught by the bounded retry loop in [`crate::proxy::Proxy`] and
/// never propagate past it: a connect failure triggers a reconnect
/// attempt, a session/type failure triggers reconfiguration, and once the
/// retry budget is exhausted the row is logged and dropped.
#[derive(Error, Debug, Diagnostic)]
pub enum TelemetryError {
    #[error("telemetry store connect error: {0}")]
    Connect(String),
    #[error("telemetry store session error: {0}")]
    Session(String),
    #[error("telemetry store type error: {0}")]
    Type(String),
    #[error("telemetry store error: {0}")]
    Other(String),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Construction-time errors for [`crate::proxy::Proxy`]. Only raised while
/// building the engine; the hot path never surfaces an error to its caller.
#[derive(Error, Debug, Diagnostic)]
pub enum ProxyError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type ProxyResult<T> = Result<T, ProxyError>;
