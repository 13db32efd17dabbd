/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
// The byte-stream capability the client needs. A transport splits into an
// independent reader and writer half so the read loop and outbound writes
// never contend for the same lock.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::ClientConfig as RustlsClientConfig;
use tokio_rustls::TlsConnector;
use std::sync::Arc;

use crate::error::TransportError;

#[async_trait::async_trait]
pub trait TransportReader: Send {
    async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, TransportError>;
}

#[async_trait::async_trait]
pub trait TransportWriter: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
    async fn flush(&mut self) -> Result<(), TransportError>;
    async fn close(&mut self);
}

/// A connected, not-yet-split transport. Concrete transports are constructed
/// externally (by `crate::runtime`) and injected into the client.
pub trait Transport: Send {
    fn into_split(self: Box<Self>) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>);
}

struct HalfReader<R>(R);

#[async_trait::async_trait]
impl<R: AsyncRead + Unpin + Send> TransportReader for HalfReader<R> {
    async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; len];
        self.0
            .read_exact(&mut buf)
            .await
            .map_err(|_| TransportError::Closed)?;
        Ok(buf)
    }
}

struct HalfWriter<W>(W);

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> TransportWriter for HalfWriter<W> {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.0.write_all(bytes).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.0.flush().await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.0.shutdown().await;
    }
}

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port)).await?;
        Ok(TcpTransport { stream })
    }
}

impl Transport for TcpTransport {
    fn into_split(self: Box<Self>) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>) {
        let (read_half, write_half): (OwnedReadHalf, OwnedWriteHalf) = self.stream.into_split();
        (
            Box::new(HalfReader(read_half)),
            Box::new(HalfWriter(write_half)),
        )
    }
}

pub struct TlsTransport {
    stream: TlsStream<TcpStream>,
}

impl TlsTransport {
    pub async fn connect(
        host: &str,
        port: u16,
        config: Arc<RustlsClientConfig>,
    ) -> Result<Self, TransportError> {
        let tcp = TcpStream::connect((host, port)).await?;
        let connector = TlsConnector::from(config);
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| TransportError::Io(std::io::Error::other("invalid server name")))?;
        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(TransportError::Io)?;
        Ok(TlsTransport { stream })
    }
}

impl Transport for TlsTransport {
    fn into_split(self: Box<Self>) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        (
            Box::new(HalfReader(read_half)),
            Box::new(HalfWriter(write_half)),
        )
    }
}

/// An in-memory transport over a [`tokio::io::DuplexStream`], so integration
/// tests can drive [`crate::mqtt::client::MqttClient`] against a fake broker
/// without a real socket.
#[cfg(feature = "test-util")]
pub struct DuplexTransport {
    stream: tokio::io::DuplexStream,
}

#[cfg(feature = "test-util")]
impl DuplexTransport {
    pub fn new(stream: tokio::io::DuplexStream) -> Self {
        DuplexTransport { stream }
    }
}

#[cfg(feature = "test-util")]
impl Transport for DuplexTransport {
    fn into_split(self: Box<Self>) -> (Box<dyn TransportReader>, Box<dyn TransportWriter>) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        (
            Box::new(HalfReader(read_half)),
            Box::new(HalfWriter(write_half)),
        )
    }
}
