//! Shared harness for the protocol suites: an in-memory wire speaking raw
//! NNTP to a server running over a duplex pipe.

#![allow(dead_code)]

use std::sync::Arc;

use nntp_server::{Article, Backend, Headers, MemoryBackend, NntpServer, PostingStatus};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};

/// Backend seeded with the two conventional test groups.
pub fn seeded_backend() -> Arc<MemoryBackend> {
    let backend = MemoryBackend::new();
    backend.add_group("misc.test", "More testing.", PostingStatus::Permitted);
    backend.add_group("alt.test", "A test.", PostingStatus::NotPermitted);
    Arc::new(backend)
}

/// Build a simple test article.
pub fn article(message_id: &str, groups: &str, subject: &str, body: &str) -> Article {
    let mut headers = Headers::new();
    headers.append("From", "poster@example.com");
    headers.append("Newsgroups", groups);
    headers.append("Message-Id", message_id);
    headers.append("Subject", subject);
    headers.append("Date", "Thu, 1 Jan 2026 00:00:00 GMT");
    Article::buffered(headers, body.as_bytes().to_vec())
}

/// Post straight into the backend, bypassing the wire.
pub async fn seed(backend: &MemoryBackend, message_id: &str, subject: &str, body: &str) {
    backend
        .post(article(message_id, "misc.test", subject, body))
        .await
        .expect("seeding article");
}

/// A raw client-side wire talking to a server session over an in-memory
/// duplex pipe.
pub struct Wire {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl Wire {
    /// Spawn a server session and return the connected client side.
    pub async fn connect(backend: Arc<dyn Backend>) -> Self {
        let (client_side, server_side) = tokio::io::duplex(256 * 1024);
        let server = NntpServer::new(backend);
        tokio::spawn(async move {
            let _ = server.process(server_side).await;
        });
        let (reader, writer) = tokio::io::split(client_side);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Read one status line, asserting CRLF framing and stripping it.
    pub async fn line(&mut self) -> String {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await.expect("read line");
        assert!(n > 0, "unexpected EOF from server");
        assert!(line.ends_with("\r\n"), "server line missing CRLF: {line:?}");
        line.truncate(line.len() - 2);
        line
    }

    /// Send one CRLF-terminated command line.
    pub async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.expect("send");
        self.writer.write_all(b"\r\n").await.expect("send");
    }

    /// Send raw bytes verbatim.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("send raw");
    }

    /// Read a dot-framed payload: lines until the lone-dot terminator,
    /// dot-unstuffed.
    pub async fn multiline(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.line().await;
            if line == "." {
                return lines;
            }
            match line.strip_prefix('.') {
                Some(unstuffed) => lines.push(unstuffed.to_string()),
                None => lines.push(line),
            }
        }
    }

    /// True once the server has closed the connection.
    pub async fn closed(&mut self) -> bool {
        let mut buf = [0u8; 1];
        matches!(self.reader.read(&mut buf).await, Ok(0))
    }
}
