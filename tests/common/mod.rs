//! Integration test infrastructure.
//!
//! Provides a scripted mock IRC server on a loopback listener for
//! asserting on the engine's wire behavior.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::timeout;

/// A mock IRC server accepting one client connection at a time.
pub struct MockServer {
    listener: TcpListener,
}

/// One accepted client connection, line-oriented.
pub struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl MockServer {
    /// Bind to an ephemeral loopback port.
    pub async fn bind() -> anyhow::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind("127.0.0.1:0").await?,
        })
    }

    /// The `host:port` address clients should dial.
    pub fn address(&self) -> String {
        self.listener
            .local_addr()
            .expect("listener has a local address")
            .to_string()
    }

    /// Accept the next client connection.
    pub async fn accept(&self) -> anyhow::Result<ServerConn> {
        let (stream, _peer) = timeout(Duration::from_secs(5), self.listener.accept()).await??;
        let (read, write) = stream.into_split();
        Ok(ServerConn {
            reader: BufReader::new(read),
            writer: write,
        })
    }
}

impl ServerConn {
    /// Read one line from the client, terminator stripped.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
        anyhow::ensure!(n > 0, "client closed the connection");
        Ok(line.trim_end().to_string())
    }

    /// Read lines until one starts with the given prefix; returns it.
    pub async fn recv_until(&mut self, prefix: &str) -> anyhow::Result<String> {
        loop {
            let line = self.recv().await?;
            if line.starts_with(prefix) {
                return Ok(line);
            }
        }
    }

    /// Send one line to the client (CRLF appended).
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
