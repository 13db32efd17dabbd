// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

// One [`thiserror`] enum per subsystem, composed into [`CoreError`].
//
// Callers match on the subsystem enum they triggered (`ClientError`,
// `UpdateError`, ...); `CoreError` exists only so the outermost entry point
// in [`crate::runtime`] can hold one value through `?`.

use std::fmt;

/// A one-byte MQTT v5 reason code, as carried on CONNACK/SUBACK/UNSUBACK/PUBACK/DISCONNECT.
///
/// Only `SUCCESS` is distinguished by name; every other value is treated
/// uniformly as a failure and the raw byte is preserved for diagnostics,
/// since the core never branches on a specific non-success code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasonCode(pub u8);

impl ReasonCode {
    pub const SUCCESS: ReasonCode = ReasonCode(0x00);

    pub fn is_success(self) -> bool {
        self.0 == 0x00
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VbiError {
    #[error("malformed variable byte integer: fifth continuation byte")]
    Malformed,
    #[error("variable byte integer overflow")]
    Overflow,
    #[error("not enough bytes to decode variable byte integer")]
    Incomplete,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error(transparent)]
    Vbi(#[from] VbiError),
    #[error("string exceeds 65535 bytes")]
    StringTooLong,
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,
    #[error("buffer truncated while decoding {0}")]
    Truncated(&'static str),
    #[error("unexpected packet type byte 0x{0:02X}")]
    UnknownPacketType(u8),
    #[error("packet type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport io error: {0}")]
    Io(#[source] std::io::Error),
    #[error("transport operation timed out")]
    Timeout,
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("broker refused connection: {0}")]
    ConnectionRefused(ReasonCode),
    #[error("broker reported an error: {0}")]
    MqttReason(ReasonCode),
    #[error("server sent DISCONNECT: {0}")]
    ServerDisconnect(ReasonCode),
    #[error("timed out waiting for an acknowledgement")]
    AckTimeout,
    #[error("keep-alive violated: no PINGRESP after three consecutive timeouts")]
    KeepAliveViolated,
    #[error("no free 16-bit packet ids remain")]
    PacketIdExhausted,
    #[error("connection is not established")]
    NotConnected,
    #[error("protocol desynchronised, connection closed")]
    ProtocolDesync,
}

#[derive(Debug, thiserror::Error)]
pub enum ZipError {
    #[error("end of central directory record not found or corrupt")]
    BadEocd,
    #[error("central directory header signature mismatch for entry {0}")]
    BadCentralDirectoryHeader(usize),
    #[error("multi-disk archives are not supported")]
    MultiDiskUnsupported,
    #[error("unknown member: {0}")]
    NoSuchMember(String),
    #[error("unsupported compression method {0} for member {1}")]
    UnsupportedCompression(u16, String),
    #[error("crc-32 mismatch for member {0}")]
    Crc32Mismatch(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum WheelError {
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error("no .dist-info directory found in wheel")]
    NoDistInfo,
    #[error("malformed RECORD line: {0}")]
    MalformedRecord(String),
    #[error("malformed metadata header line: {0}")]
    MalformedMetadata(String),
    #[error("missing required metadata key {0}")]
    MissingMetadata(&'static str),
    #[error("member {name} failed verification: {reason}")]
    VerificationFailed { name: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Wheel(#[from] WheelError),
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error("existing installation of {name} has tag {existing}, delivered wheel has tag {delivered}")]
    WheelUpgradeTagMismatch {
        name: String,
        existing: String,
        delivered: String,
    },
    #[error("package path {0:?} contains unsafe components")]
    UnsafePkgPath(String),
    #[error("delivered payload sha-256 does not match manifest pkg_sha256")]
    ChecksumMismatch,
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),
    #[error("malformed package id: {0}")]
    MalformedPkgId(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config field {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("config document is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error composing every subsystem error, used only at the
/// [`crate::runtime`] boundary where a single `?`-propagating type is needed.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Update(#[from] UpdateError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
