//! Line-oriented NNTP wire codec
//!
//! Wraps a byte stream in buffered CRLF line I/O plus the two multi-line
//! framings the protocol needs: dot-stuffed payload reads (a line of just
//! `.` terminates, a leading `.` is doubled in transit) and a
//! [`MultilineWriter`] that applies the inverse transform. Payload bytes
//! are treated as opaque; only the framing is interpreted, so the codec is
//! 8-bit clean.

use std::io;

use memchr::memchr;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};

use crate::types::Headers;

/// A buffered NNTP connection over any byte stream.
///
/// All writes are flushed before the owner goes back to reading, either by
/// [`Connection::write_line`] (which flushes itself) or by
/// [`MultilineWriter::close`].
#[derive(Debug)]
pub struct Connection<S> {
    stream: BufStream<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufStream::new(stream),
        }
    }

    /// Read one line, stripping the CRLF terminator (a lone LF is
    /// tolerated). Returns `Ok(None)` on clean EOF.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self
            .read_line_bytes()
            .await?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    async fn read_line_bytes(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Ok(Some(buf))
    }

    /// Write one CRLF-terminated line and flush.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await
    }

    /// Begin a dot-framed multi-line payload. The payload is not complete
    /// (and not flushed) until [`MultilineWriter::close`] runs.
    pub fn multiline(&mut self) -> MultilineWriter<'_, S> {
        MultilineWriter {
            conn: self,
            at_line_start: true,
        }
    }

    /// Read the next line of a dot-framed payload, undoing dot-stuffing.
    ///
    /// The returned bytes include the original line terminator. `Ok(None)`
    /// means the lone-dot terminator was consumed and the payload is over.
    /// EOF before the terminator is an error: the peer broke framing.
    pub async fn read_multiline_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut raw = Vec::new();
        let n = self.stream.read_until(b'\n', &mut raw).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before multi-line terminator",
            ));
        }
        if raw == b".\r\n" || raw == b".\n" {
            return Ok(None);
        }
        if raw.first() == Some(&b'.') {
            raw.remove(0);
        }
        Ok(Some(raw))
    }

    /// Collect an entire dot-framed payload into one buffer.
    pub async fn read_multiline(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.read_multiline_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Read a MIME-style header block up to (and consuming) the blank
    /// separator line. Field names are canonicalised; continuation lines
    /// starting with SP/HT fold into the previous value.
    ///
    /// Note the block is read raw, not dot-unstuffed: header field names
    /// cannot legitimately begin with `.`.
    pub async fn read_header_block(&mut self) -> io::Result<Headers> {
        let mut headers = Headers::new();
        loop {
            let line = self.read_line_bytes().await?.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed inside header block",
                )
            })?;
            if line.is_empty() {
                return Ok(headers);
            }
            if line[0] == b' ' || line[0] == b'\t' {
                let text = String::from_utf8_lossy(&line);
                if !headers.extend_last(text.trim()) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "continuation line before any header field",
                    ));
                }
                continue;
            }
            let colon = memchr(b':', &line).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "malformed header line")
            })?;
            let name = String::from_utf8_lossy(&line[..colon]);
            let value = String::from_utf8_lossy(&line[colon + 1..]);
            headers.append(name.trim(), value.trim_start().to_string());
        }
    }

    /// Flush any buffered output.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }
}

/// Writer side of a dot-framed payload.
///
/// Bytes pass through unchanged except that a line beginning with `.` gets
/// a second `.` prepended. [`MultilineWriter::close`] terminates the
/// payload with a lone `.` line (inserting a line break first when the
/// payload did not end with one) and flushes.
pub struct MultilineWriter<'a, S> {
    conn: &'a mut Connection<S>,
    at_line_start: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> MultilineWriter<'_, S> {
    /// Write payload bytes, dot-stuffing as needed.
    pub async fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            if self.at_line_start && buf[0] == b'.' {
                self.conn.stream.write_all(b".").await?;
            }
            match memchr(b'\n', buf) {
                Some(i) => {
                    self.conn.stream.write_all(&buf[..=i]).await?;
                    self.at_line_start = true;
                    buf = &buf[i + 1..];
                }
                None => {
                    self.conn.stream.write_all(buf).await?;
                    self.at_line_start = false;
                    buf = &[];
                }
            }
        }
        Ok(())
    }

    /// Write one payload line with a CRLF terminator.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write_all(line.as_bytes()).await?;
        self.write_all(b"\r\n").await
    }

    /// Copy an entire body stream through the dot-stuffing transform.
    pub async fn copy_from<R: AsyncRead + Unpin + ?Sized>(
        &mut self,
        body: &mut R,
    ) -> io::Result<u64> {
        let mut buf = [0u8; 8192];
        let mut total = 0u64;
        loop {
            let n = body.read(&mut buf).await?;
            if n == 0 {
                return Ok(total);
            }
            self.write_all(&buf[..n]).await?;
            total += n as u64;
        }
    }

    /// Emit the terminator line and flush.
    pub async fn close(self) -> io::Result<()> {
        if !self.at_line_start {
            self.conn.stream.write_all(b"\r\n").await?;
        }
        self.conn.stream.write_all(b".\r\n").await?;
        self.conn.stream.flush().await
    }
}
