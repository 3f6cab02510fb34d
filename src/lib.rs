//! # NNTP Server Framework
//!
//! A server core for the Network News Transfer Protocol (RFC 3977) with a
//! pluggable storage backend, plus a small client library exposing the
//! inverse surface.
//!
//! ## Architecture
//!
//! - **codec**: CRLF line I/O and dot-stuffed multi-line framing over any
//!   byte stream
//! - **types**: groups, headers, articles with lazy single-pass bodies
//! - **error**: the numeric protocol-error taxonomy and the
//!   reply-vs-close classification
//! - **command**: verb parsing and the OVER/XOVER range grammar
//! - **backend**: the capability contract any storage plugs in through
//! - **session**: the per-connection protocol engine (greeting, dispatch
//!   loop, one handler per verb)
//! - **server**: the frontend tying a shared backend to connections
//! - **client**: connect, authenticate, group, article/head/body, post
//! - **memory**: a bounded in-memory backend, also used by the test
//!   suites and the `nntpd` demo binary
//!
//! ## Design
//!
//! The server is transport-agnostic: anything `AsyncRead + AsyncWrite`
//! hosts a session, so integration tests run over in-memory duplex pipes
//! and production runs over TCP. Within a session the protocol is strict
//! request/response; concurrency comes from running one task per
//! connection against a shared, internally synchronised backend.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nntp_server::{MemoryBackend, NntpServer, PostingStatus};
//!
//! # async fn example() -> std::io::Result<()> {
//! let backend = MemoryBackend::new();
//! backend.add_group("misc.test", "More testing.", PostingStatus::Permitted);
//!
//! let server = NntpServer::new(Arc::new(backend));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:1119").await?;
//! server.serve(listener).await
//! # }
//! ```

pub mod backend;
pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod memory;
pub mod server;
mod session;
pub mod types;

pub use backend::Backend;
pub use client::Client;
pub use error::{Error, NntpError, Result};
pub use memory::MemoryBackend;
pub use server::NntpServer;
pub use types::{Article, Body, Group, Headers, NumberedArticle, PostingStatus};
