//! Minimal NNTP client: the dual of the server surface
//!
//! Each operation writes one command line and reads one status line,
//! optionally followed by a dot-framed payload exposed as a [`BodyReader`]
//! that borrows the client, so the body must be consumed (or the reader
//! dropped, desynchronising the connection) before the next command.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::codec::Connection;
use crate::error::{Error, NntpError, Result};
use crate::types::{Group, PostingStatus};

/// An NNTP client over any byte stream (TCP in production, an in-memory
/// duplex pair in tests).
#[derive(Debug)]
pub struct Client<S = TcpStream> {
    conn: Connection<S>,
    banner: String,
}

impl Client<TcpStream> {
    /// Connect over TCP and complete the greeting exchange.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::handshake(stream).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    /// Consume the server greeting on an established stream. The server
    /// must announce itself with a `200` banner.
    pub async fn handshake(stream: S) -> Result<Self> {
        let mut conn = Connection::new(stream);
        let (_, banner) = read_code_line(&mut conn, 200).await?;
        debug!(banner, "connected");
        Ok(Self { conn, banner })
    }

    /// The greeting text the server sent after its status code.
    #[must_use]
    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// AUTHINFO USER/PASS exchange: expects `381` after the username and
    /// `281` after the password. Returns the final status message.
    pub async fn authenticate(&mut self, user: &str, pass: &str) -> Result<String> {
        self.conn.write_line(&format!("authinfo user {user}")).await?;
        read_code_line(&mut self.conn, 381).await?;
        self.conn.write_line(&format!("authinfo pass {pass}")).await?;
        let (_, msg) = read_code_line(&mut self.conn, 281).await?;
        Ok(msg)
    }

    /// Select a group. The `211` reply carries `count low high name`.
    pub async fn group(&mut self, name: &str) -> Result<Group> {
        let (_, msg) = self.command(&format!("GROUP {name}"), 211).await?;
        let parts: Vec<&str> = msg.split(' ').collect();
        if parts.len() != 4 {
            return Err(Error::InvalidResponse(format!(
                "expected `count low high name`, got {msg:?}"
            )));
        }
        let number = |s: &str| {
            s.parse::<i64>()
                .map_err(|_| Error::InvalidResponse(format!("bad number {s:?} in {msg:?}")))
        };
        Ok(Group {
            name: parts[3].to_string(),
            description: String::new(),
            count: number(parts[0])?,
            low: number(parts[1])?,
            high: number(parts[2])?,
            posting: PostingStatus::Unknown,
        })
    }

    /// Fetch a full article by number or `<message-id>`.
    pub async fn article(&mut self, spec: &str) -> Result<(i64, String, BodyReader<'_, S>)> {
        self.conn.write_line(&format!("ARTICLE {spec}")).await?;
        self.articleish(220).await
    }

    /// Fetch just the headers.
    pub async fn head(&mut self, spec: &str) -> Result<(i64, String, BodyReader<'_, S>)> {
        self.conn.write_line(&format!("HEAD {spec}")).await?;
        self.articleish(221).await
    }

    /// Fetch just the body.
    pub async fn body(&mut self, spec: &str) -> Result<(i64, String, BodyReader<'_, S>)> {
        self.conn.write_line(&format!("BODY {spec}")).await?;
        self.articleish(222).await
    }

    async fn articleish(&mut self, expect: u16) -> Result<(i64, String, BodyReader<'_, S>)> {
        let (_, msg) = read_code_line(&mut self.conn, expect).await?;
        let mut parts = msg.splitn(2, ' ');
        let number = parts
            .next()
            .unwrap_or("")
            .parse::<i64>()
            .map_err(|_| Error::InvalidResponse(format!("bad article number in {msg:?}")))?;
        let message_id = parts.next().unwrap_or("").to_string();
        Ok((
            number,
            message_id,
            BodyReader {
                conn: &mut self.conn,
                done: false,
            },
        ))
    }

    /// Post an article. The stream carries headers, a blank line, and the
    /// body; it is copied through the dot-stuffing transform verbatim.
    pub async fn post<R: AsyncRead + Unpin + ?Sized>(&mut self, article: &mut R) -> Result<()> {
        self.conn.write_line("POST").await?;
        read_code_line(&mut self.conn, 340).await?;
        let mut w = self.conn.multiline();
        w.copy_from(article).await?;
        w.close().await?;
        read_code_line(&mut self.conn, 240).await?;
        Ok(())
    }

    /// Escape hatch for verbs not modelled here: send `cmd` verbatim and
    /// read one status line. `expect` matches like the other operations:
    /// a one-digit value matches the code class, two digits the first two
    /// digits, three the exact code.
    pub async fn command(&mut self, cmd: &str, expect: u16) -> Result<(u16, String)> {
        self.conn.write_line(cmd).await?;
        read_code_line(&mut self.conn, expect).await
    }
}

/// Reader over one dot-framed response payload. Lines come back
/// dot-unstuffed with their original terminators.
#[derive(Debug)]
pub struct BodyReader<'a, S> {
    conn: &'a mut Connection<S>,
    done: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> BodyReader<'_, S> {
    /// Next payload line, or `None` once the terminator has been read.
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        match self.conn.read_multiline_chunk().await? {
            Some(line) => Ok(Some(line)),
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }

    /// Collect the remainder of the payload.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(line) = self.next_line().await? {
            out.extend_from_slice(&line);
        }
        Ok(out)
    }

    /// Consume and discard the remainder of the payload.
    pub async fn discard(&mut self) -> Result<()> {
        while self.next_line().await?.is_some() {}
        Ok(())
    }

    /// Whether the payload terminator has been consumed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.done
    }
}

/// Read one status line and check it against `expect` (textproto-style:
/// one digit matches the class, two the first two digits, three the exact
/// code). A mismatch surfaces the server's own code and message.
async fn read_code_line<S: AsyncRead + AsyncWrite + Unpin>(
    conn: &mut Connection<S>,
    expect: u16,
) -> Result<(u16, String)> {
    let line = conn.read_line().await?.ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed while awaiting status line",
        ))
    })?;
    let (code, msg) = parse_code_line(&line)?;
    if !code_matches(code, expect) {
        return Err(NntpError::new(code, msg).into());
    }
    Ok((code, msg))
}

fn parse_code_line(line: &str) -> Result<(u16, String)> {
    let digits = line.as_bytes().get(..3).filter(|d| d.iter().all(u8::is_ascii_digit));
    let code = digits
        .and_then(|d| std::str::from_utf8(d).ok())
        .and_then(|d| d.parse::<u16>().ok())
        .ok_or_else(|| Error::InvalidResponse(line.to_string()))?;
    let msg = line.get(4..).unwrap_or("").to_string();
    Ok((code, msg))
}

fn code_matches(code: u16, expect: u16) -> bool {
    match expect {
        0 => true,
        1..=9 => code / 100 == expect,
        10..=99 => code / 10 == expect,
        _ => code == expect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_line() {
        let (code, msg) = parse_code_line("211 3 1 3 misc.test").unwrap();
        assert_eq!(code, 211);
        assert_eq!(msg, "3 1 3 misc.test");

        let (code, msg) = parse_code_line("205").unwrap();
        assert_eq!(code, 205);
        assert_eq!(msg, "");

        assert!(parse_code_line("not a status").is_err());
        assert!(parse_code_line("20").is_err());
    }

    #[test]
    fn test_code_matches_classes() {
        // Exact
        assert!(code_matches(220, 220));
        assert!(!code_matches(221, 220));
        // Two-digit prefix
        assert!(code_matches(221, 22));
        assert!(code_matches(224, 22));
        assert!(!code_matches(231, 22));
        // Class
        assert!(code_matches(215, 2));
        assert!(code_matches(299, 2));
        assert!(!code_matches(340, 2));
    }
}
