//! Server handle: one backend, one session per connection
//!
//! Listener setup stays with the embedder; [`NntpServer::process`] runs a
//! complete session over any established byte stream, which is also what
//! the in-memory test harness uses. [`NntpServer::serve`] is the stock
//! accept loop for TCP deployments.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, warn};

use crate::backend::Backend;
use crate::session::Session;

/// An NNTP server frontend for a shared [`Backend`].
#[derive(Clone)]
pub struct NntpServer {
    backend: Arc<dyn Backend>,
}

impl NntpServer {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The default backend handed to new sessions.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Run one NNTP session over an established connection. Returns once
    /// the client quits, hangs up, or the transport fails.
    pub async fn process<S>(&self, stream: S) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        Session::new(stream, Arc::clone(&self.backend)).run().await
    }

    /// Accept loop: spawns one task per inbound connection. Runs until
    /// the listener itself fails fatally.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let server = Arc::new(self);
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    continue;
                }
            };
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                debug!(%addr, "client connected");
                if let Err(e) = server.process(stream).await {
                    warn!(%addr, error = %e, "session ended abnormally");
                }
                debug!(%addr, "client disconnected");
            });
        }
    }
}

impl std::fmt::Debug for NntpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NntpServer").finish_non_exhaustive()
    }
}
