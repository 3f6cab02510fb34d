//! The pluggable storage contract consumed by the server core
//!
//! A backend owns all durable state: groups, articles, article-number
//! assignment, and authentication. One backend instance is shared across
//! every session, so implementations serialise access to their own state;
//! in particular number assignment in [`Backend::post`] must be atomic per
//! group.
//!
//! Operations report user-visible conditions as [`NntpError`] values
//! (wrapped in [`Error::Nntp`]); any other error closes the session.
//!
//! [`NntpError`]: crate::error::NntpError
//! [`Error::Nntp`]: crate::error::Error::Nntp

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Article, Group, NumberedArticle};

/// Storage and authority behind an NNTP server.
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Enumerate known groups; `max < 0` means unlimited. Order is up to
    /// the backend, the server does not sort.
    async fn list_groups(&self, max: i64) -> Result<Vec<Group>>;

    /// Look up one group by name. Missing groups are `411`.
    async fn get_group(&self, name: &str) -> Result<Group>;

    /// Fetch one article. `id` is either a decimal article number (in
    /// which case `group` is the selected group) or a `<message-id>`.
    /// Missing numeric articles are `423`, missing message-ids `430`.
    /// `group` is `None` for pure message-id lookups (IHAVE).
    async fn get_article(&self, group: Option<&Group>, id: &str) -> Result<Article>;

    /// Fetch the articles of `group` numbered within `from..=to`. The
    /// result may be empty; order is not mandated.
    async fn get_articles(&self, group: &Group, from: i64, to: i64) -> Result<Vec<NumberedArticle>>;

    /// Whether this backend accepts POST/IHAVE at all. Governs MODE
    /// replies and which capabilities are advertised.
    fn allow_post(&self) -> bool;

    /// Whether the session holding this backend is already authorised.
    fn authorized(&self) -> bool;

    /// Verify credentials. On success the backend may return a
    /// replacement that the session uses from then on (an authenticated
    /// view); `None` keeps the current backend. Rejected credentials are
    /// `452`.
    async fn authenticate(&self, user: &str, pass: &str) -> Result<Option<Arc<dyn Backend>>>;

    /// Accept a posted article, consuming its body to completion. The
    /// backend assigns group-local numbers and updates count/low/high
    /// atomically. Rejections are `441` (failed) or `435` (not wanted).
    async fn post(&self, article: Article) -> Result<()>;
}
