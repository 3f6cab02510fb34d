//! Per-connection protocol engine
//!
//! One [`Session`] owns one connection for its lifetime: greeting, then a
//! strict read-dispatch-reply loop until EOF, QUIT, or a transport
//! failure. Protocol errors ([`NntpError`]) are written back on one line
//! and the session continues; any other error drops the connection
//! without a reply.
//!
//! [`NntpError`]: crate::error::NntpError

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::codec::Connection;
use crate::command::{parse_range, Command};
use crate::error::{Error, NntpError, Result};
use crate::types::{Article, Group};

/// What the session loop does after a handler returns.
enum Outcome {
    Continue,
    Quit,
}

/// State owned by a single connection: the wire codec, the backend this
/// session talks to (swapped on successful AUTHINFO), and the currently
/// selected group.
pub(crate) struct Session<S> {
    conn: Connection<S>,
    backend: Arc<dyn Backend>,
    group: Option<Group>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    pub(crate) fn new(stream: S, backend: Arc<dyn Backend>) -> Self {
        Self {
            conn: Connection::new(stream),
            backend,
            group: None,
        }
    }

    /// Drive the session to completion. Transport failures after the
    /// greeting close the connection silently, as the protocol requires.
    pub(crate) async fn run(mut self) -> io::Result<()> {
        if self.backend.allow_post() {
            self.conn.write_line("200 Hello!").await?;
        } else {
            self.conn.write_line("201 Hello!").await?;
        }

        loop {
            let line = match self.conn.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("client hung up");
                    return Ok(());
                }
                Err(e) => {
                    debug!(error = %e, "read failed, dropping connection");
                    return Ok(());
                }
            };

            let mut fields = line.split(' ');
            let verb = fields.next().unwrap_or("");
            let args: Vec<&str> = fields.collect();
            debug!(verb, "command received");

            match self.dispatch(verb, &args).await {
                Ok(Outcome::Continue) => {}
                Ok(Outcome::Quit) => return Ok(()),
                Err(Error::Nntp(e)) => {
                    if let Err(we) = self.conn.write_line(&e.to_string()).await {
                        debug!(error = %we, "write failed, dropping connection");
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!(error = %e, "dropping connection");
                    return Ok(());
                }
            }
        }
    }

    async fn dispatch(&mut self, verb: &str, args: &[&str]) -> Result<Outcome> {
        match Command::parse(verb) {
            Command::Quit => self.handle_quit().await,
            Command::Group => self.handle_group(args).await,
            Command::List => self.handle_list(args).await,
            Command::Head => self.handle_head(args).await,
            Command::Body => self.handle_body(args).await,
            Command::Article => self.handle_article(args).await,
            Command::Post => self.handle_post().await,
            Command::Ihave => self.handle_ihave(args).await,
            Command::Capabilities => self.handle_capabilities().await,
            Command::Mode => self.handle_mode().await,
            Command::Authinfo => self.handle_authinfo(args).await,
            Command::Newgroups => self.handle_newgroups().await,
            Command::Over | Command::Xover => self.handle_over(args).await,
            Command::Unknown => Err(NntpError::UNKNOWN_COMMAND.into()),
        }
    }

    async fn handle_quit(&mut self) -> Result<Outcome> {
        self.conn.write_line("205 bye").await?;
        Ok(Outcome::Quit)
    }

    async fn handle_mode(&mut self) -> Result<Outcome> {
        if self.backend.allow_post() {
            self.conn.write_line("200 Posting allowed").await?;
        } else {
            self.conn.write_line("201 Posting prohibited").await?;
        }
        Ok(Outcome::Continue)
    }

    async fn handle_capabilities(&mut self) -> Result<Outcome> {
        let allow_post = self.backend.allow_post();
        self.conn.write_line("101 Capability list:").await?;
        let mut w = self.conn.multiline();
        w.write_line("VERSION 2").await?;
        w.write_line("READER").await?;
        if allow_post {
            w.write_line("POST").await?;
            w.write_line("IHAVE").await?;
        }
        w.write_line("OVER").await?;
        w.write_line("XOVER").await?;
        w.write_line("LIST ACTIVE NEWSGROUPS OVERVIEW.FMT").await?;
        w.close().await?;
        Ok(Outcome::Continue)
    }

    async fn handle_group(&mut self, args: &[&str]) -> Result<Outcome> {
        let name = match args.first() {
            Some(name) if !name.is_empty() => *name,
            _ => return Err(NntpError::NO_SUCH_GROUP.into()),
        };
        let group = self.backend.get_group(name).await?;
        self.conn
            .write_line(&format!(
                "211 {} {} {} {}",
                group.count, group.low, group.high, group.name
            ))
            .await?;
        self.group = Some(group);
        Ok(Outcome::Continue)
    }

    async fn handle_list(&mut self, args: &[&str]) -> Result<Outcome> {
        let keyword = args
            .first()
            .map(|k| k.to_ascii_lowercase())
            .unwrap_or_else(|| "active".to_string());

        if keyword == "overview.fmt" {
            self.conn
                .write_line("215 Order of fields in overview database.")
                .await?;
            let mut w = self.conn.multiline();
            for field in [
                "Subject:",
                "From:",
                "Date:",
                "Message-ID:",
                "References:",
                ":bytes",
                ":lines",
            ] {
                w.write_line(field).await?;
            }
            w.close().await?;
            return Ok(Outcome::Continue);
        }

        let groups = self.backend.list_groups(-1).await?;
        self.conn.write_line("215 list of newsgroups follows").await?;
        let mut w = self.conn.multiline();
        for g in &groups {
            match keyword.as_str() {
                "active" => {
                    w.write_line(&format!("{} {} {} {}", g.name, g.high, g.low, g.posting))
                        .await?;
                }
                "newsgroups" => {
                    w.write_line(&format!("{} {}", g.name, g.description)).await?;
                }
                // Unrecognised keywords produce an empty list body
                _ => {}
            }
        }
        w.close().await?;
        Ok(Outcome::Continue)
    }

    async fn handle_newgroups(&mut self) -> Result<Outcome> {
        // Date/time arguments are accepted and ignored
        self.conn.write_line("231 list of newsgroups follows").await?;
        self.conn.multiline().close().await?;
        Ok(Outcome::Continue)
    }

    /// Resolve an ARTICLE/HEAD/BODY spec. Message-id specs work without a
    /// selected group; numeric specs require one. There is no
    /// current-article pointer, so a missing spec is `420`.
    async fn lookup_article(&self, spec: Option<&str>) -> Result<Article> {
        let spec = match spec {
            Some(spec) if !spec.is_empty() => spec,
            _ => return Err(NntpError::NO_CURRENT_ARTICLE.into()),
        };
        if spec.starts_with('<') {
            self.backend.get_article(self.group.as_ref(), spec).await
        } else {
            let group = self.group.as_ref().ok_or(NntpError::NO_GROUP_SELECTED)?;
            self.backend.get_article(Some(group), spec).await
        }
    }

    async fn handle_head(&mut self, args: &[&str]) -> Result<Outcome> {
        let article = self.lookup_article(args.first().copied()).await?;
        let message_id = article.message_id().unwrap_or_default().to_string();
        self.conn.write_line(&format!("221 1 {message_id}")).await?;
        let mut w = self.conn.multiline();
        for (name, value) in article.headers.first_values() {
            w.write_line(&format!("{name}: {value}")).await?;
        }
        w.close().await?;
        Ok(Outcome::Continue)
    }

    async fn handle_body(&mut self, args: &[&str]) -> Result<Outcome> {
        let mut article = self.lookup_article(args.first().copied()).await?;
        let message_id = article.message_id().unwrap_or_default().to_string();
        self.conn.write_line(&format!("222 1 {message_id}")).await?;
        let mut w = self.conn.multiline();
        w.copy_from(&mut article.body).await?;
        w.close().await?;
        Ok(Outcome::Continue)
    }

    async fn handle_article(&mut self, args: &[&str]) -> Result<Outcome> {
        let mut article = self.lookup_article(args.first().copied()).await?;
        let message_id = article.message_id().unwrap_or_default().to_string();
        self.conn.write_line(&format!("220 1 {message_id}")).await?;
        let mut w = self.conn.multiline();
        for (name, value) in article.headers.first_values() {
            w.write_line(&format!("{name}: {value}")).await?;
        }
        w.write_line("").await?;
        w.copy_from(&mut article.body).await?;
        w.close().await?;
        Ok(Outcome::Continue)
    }

    /// Read the dot-framed article a client sends after `340`/`335`:
    /// header block up to the blank separator, then the dot-stuffed body
    /// through its terminator. Malformed headers abort with `441`.
    async fn read_article(&mut self) -> Result<Article> {
        let headers = match self.conn.read_header_block().await {
            Ok(headers) => headers,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                debug!(error = %e, "rejecting malformed article headers");
                return Err(NntpError::POSTING_FAILED.into());
            }
            Err(e) => return Err(e.into()),
        };
        let body = self.conn.read_multiline().await?;
        Ok(Article::buffered(headers, body))
    }

    async fn handle_post(&mut self) -> Result<Outcome> {
        if !self.backend.allow_post() {
            return Err(NntpError::POSTING_NOT_PERMITTED.into());
        }
        self.conn.write_line("340 Go ahead").await?;
        let article = self.read_article().await?;
        self.backend.post(article).await?;
        self.conn.write_line("240 article received OK").await?;
        Ok(Outcome::Continue)
    }

    async fn handle_ihave(&mut self, args: &[&str]) -> Result<Outcome> {
        if !self.backend.allow_post() {
            return Err(NntpError::NOT_WANTED.into());
        }
        let id = match args.first() {
            Some(id) if !id.is_empty() => *id,
            _ => return Err(NntpError::SYNTAX.into()),
        };
        // Decline anything we already have; lookup failure means we want it
        if self.backend.get_article(None, id).await.is_ok() {
            return Err(NntpError::NOT_WANTED.into());
        }
        self.conn.write_line("335 send it").await?;
        let article = self.read_article().await?;
        self.backend.post(article).await?;
        self.conn.write_line("235 article received OK").await?;
        Ok(Outcome::Continue)
    }

    async fn handle_over(&mut self, args: &[&str]) -> Result<Outcome> {
        let group = self
            .group
            .clone()
            .ok_or(NntpError::NO_GROUP_SELECTED)?;
        let (from, to) = parse_range(args.first().copied().unwrap_or(""));
        let articles = self.backend.get_articles(&group, from, to).await?;
        self.conn.write_line("224 here it comes").await?;
        let mut w = self.conn.multiline();
        for numbered in &articles {
            let h = &numbered.article.headers;
            w.write_line(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                numbered.number,
                h.get("Subject").unwrap_or_default(),
                h.get("From").unwrap_or_default(),
                h.get("Date").unwrap_or_default(),
                h.get("Message-Id").unwrap_or_default(),
                h.get("References").unwrap_or_default(),
                numbered.article.bytes,
                numbered.article.lines
            ))
            .await?;
        }
        w.close().await?;
        Ok(Outcome::Continue)
    }

    async fn handle_authinfo(&mut self, args: &[&str]) -> Result<Outcome> {
        if args.len() < 2 || !args[0].eq_ignore_ascii_case("user") {
            return Err(NntpError::SYNTAX.into());
        }
        if self.backend.authorized() {
            self.conn.write_line("250 authenticated").await?;
            return Ok(Outcome::Continue);
        }
        let user = args[1].to_string();

        self.conn.write_line("350 Continue").await?;
        let line = self.conn.read_line().await?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "client hung up mid-AUTHINFO")
        })?;
        let mut parts = line.splitn(3, ' ');
        let pass = match (parts.next(), parts.next(), parts.next()) {
            (Some(verb), Some(sub), Some(pass))
                if verb.eq_ignore_ascii_case("authinfo") && sub.eq_ignore_ascii_case("pass") =>
            {
                pass
            }
            _ => return Err(NntpError::SYNTAX.into()),
        };

        if let Some(replacement) = self.backend.authenticate(&user, pass).await? {
            self.backend = replacement;
        }
        self.conn.write_line("250 authenticated").await?;
        Ok(Outcome::Continue)
    }
}
