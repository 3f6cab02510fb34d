//! In-memory backend
//!
//! A self-contained [`Backend`] keeping everything in one mutex-guarded
//! store: articles keyed by message-id with a refcount per carrying
//! group, and per-group bounded queues of `(number, message-id)` pairs.
//! When a full group accepts a new article the oldest entry is evicted,
//! `low` advances, and the evicted article disappears once no group
//! carries it. Doubles as the test backend for the protocol suites.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::backend::Backend;
use crate::error::{NntpError, Result};
use crate::types::{Article, Group, Headers, NumberedArticle, PostingStatus};

const GROUP_CAPACITY: usize = 100;

#[derive(Debug)]
struct StoredArticle {
    headers: Headers,
    body: Vec<u8>,
    /// Number of groups currently carrying this article
    refcount: usize,
}

#[derive(Debug)]
struct GroupState {
    group: Group,
    /// `(number, message-id)` pairs, oldest first
    entries: VecDeque<(i64, String)>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Store {
    groups: BTreeMap<String, GroupState>,
    articles: HashMap<String, StoredArticle>,
}

impl Store {
    /// Drop one group's reference to an article, removing the article
    /// entirely when nothing carries it any more.
    fn release(&mut self, message_id: &str) {
        if let Some(stored) = self.articles.get_mut(message_id) {
            stored.refcount -= 1;
            if stored.refcount == 0 {
                debug!(%message_id, "last reference gone, dropping article");
                self.articles.remove(message_id);
            }
        }
    }
}

/// A shared in-memory article store.
#[derive(Debug)]
pub struct MemoryBackend {
    store: Arc<Mutex<Store>>,
    credentials: Option<(String, String)>,
    authorized: bool,
    allow_post: bool,
}

impl MemoryBackend {
    /// An empty store: posting allowed, no authentication required.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            credentials: None,
            authorized: true,
            allow_post: true,
        }
    }

    /// Require the given credentials: sessions start unauthorised and a
    /// matching AUTHINFO exchange swaps in an authorised view of the same
    /// store.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), pass.into()));
        self.authorized = false;
        self
    }

    /// Refuse POST/IHAVE.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.allow_post = false;
        self
    }

    /// Register a group. Articles can only be posted to registered
    /// groups.
    pub fn add_group(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        posting: PostingStatus,
    ) {
        let name = name.into();
        let mut group = Group::new(name.clone(), description);
        group.posting = posting;
        self.store().groups.insert(
            name,
            GroupState {
                group,
                entries: VecDeque::new(),
                capacity: GROUP_CAPACITY,
            },
        );
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn make_article(stored: &StoredArticle) -> Article {
    Article::buffered(stored.headers.clone(), stored.body.clone())
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_groups(&self, max: i64) -> Result<Vec<Group>> {
        let store = self.store();
        let mut groups: Vec<Group> = store.groups.values().map(|gs| gs.group.clone()).collect();
        if max >= 0 {
            groups.truncate(max as usize);
        }
        Ok(groups)
    }

    async fn get_group(&self, name: &str) -> Result<Group> {
        let store = self.store();
        store
            .groups
            .get(name)
            .map(|gs| gs.group.clone())
            .ok_or_else(|| NntpError::NO_SUCH_GROUP.into())
    }

    async fn get_article(&self, group: Option<&Group>, id: &str) -> Result<Article> {
        let store = self.store();
        if id.starts_with('<') {
            return store
                .articles
                .get(id)
                .map(make_article)
                .ok_or_else(|| NntpError::NO_SUCH_MESSAGE_ID.into());
        }
        let group = group.ok_or(NntpError::NO_GROUP_SELECTED)?;
        let number: i64 = id.parse().map_err(|_| NntpError::NO_SUCH_ARTICLE_NUMBER)?;
        let gs = store.groups.get(&group.name).ok_or(NntpError::NO_SUCH_GROUP)?;
        let message_id = gs
            .entries
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, m)| m)
            .ok_or(NntpError::NO_SUCH_ARTICLE_NUMBER)?;
        store
            .articles
            .get(message_id)
            .map(make_article)
            .ok_or_else(|| NntpError::NO_SUCH_ARTICLE_NUMBER.into())
    }

    async fn get_articles(&self, group: &Group, from: i64, to: i64) -> Result<Vec<NumberedArticle>> {
        let store = self.store();
        let gs = store.groups.get(&group.name).ok_or(NntpError::NO_SUCH_GROUP)?;
        let mut out = Vec::new();
        for (number, message_id) in &gs.entries {
            if *number < from || *number > to {
                continue;
            }
            if let Some(stored) = store.articles.get(message_id) {
                out.push(NumberedArticle {
                    number: *number,
                    article: make_article(stored),
                });
            }
        }
        Ok(out)
    }

    fn allow_post(&self) -> bool {
        self.allow_post
    }

    fn authorized(&self) -> bool {
        self.authorized
    }

    async fn authenticate(&self, user: &str, pass: &str) -> Result<Option<Arc<dyn Backend>>> {
        match &self.credentials {
            Some((u, p)) if u == user && p == pass => {
                debug!(user, "credentials accepted");
                Ok(Some(Arc::new(Self {
                    store: Arc::clone(&self.store),
                    credentials: self.credentials.clone(),
                    authorized: true,
                    allow_post: self.allow_post,
                })))
            }
            _ => Err(NntpError::AUTH_REJECTED.into()),
        }
    }

    async fn post(&self, mut article: Article) -> Result<()> {
        let mut body = Vec::new();
        article.body.read_to_end(&mut body).await?;

        let message_id = article
            .headers
            .get("Message-Id")
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .ok_or(NntpError::POSTING_FAILED)?;
        let newsgroups: Vec<String> = article
            .headers
            .get_all("Newsgroups")
            .flat_map(|v| v.split(','))
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();

        let mut store = self.store();
        if store.articles.contains_key(&message_id) {
            return Err(NntpError::POSTING_FAILED.into());
        }

        let mut refcount = 0;
        let mut evicted = Vec::new();
        for name in &newsgroups {
            let Some(gs) = store.groups.get_mut(name) else {
                continue;
            };
            let number = gs.group.high + 1;
            gs.group.high = number;
            gs.entries.push_back((number, message_id.clone()));
            if gs.entries.len() > gs.capacity {
                if let Some((_, old)) = gs.entries.pop_front() {
                    evicted.push(old);
                }
            }
            gs.group.low = gs.entries.front().map_or(number, |(n, _)| *n);
            gs.group.count = gs.entries.len() as i64;
            refcount += 1;
            debug!(group = %name, number, %message_id, "article placed");
        }
        if refcount == 0 {
            return Err(NntpError::POSTING_FAILED.into());
        }

        store.articles.insert(
            message_id,
            StoredArticle {
                headers: article.headers,
                body,
                refcount,
            },
        );
        for old in evicted {
            store.release(&old);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn backend() -> MemoryBackend {
        let b = MemoryBackend::new();
        b.add_group("misc.test", "More testing.", PostingStatus::Permitted);
        b.add_group("alt.test", "A test.", PostingStatus::NotPermitted);
        b
    }

    fn article(message_id: &str, groups: &str, body: &str) -> Article {
        let mut headers = Headers::new();
        headers.append("From", "poster@example.com");
        headers.append("Newsgroups", groups);
        headers.append("Message-Id", message_id);
        headers.append("Subject", "test");
        Article::buffered(headers, body.as_bytes().to_vec())
    }

    fn nntp_code(err: &Error) -> u16 {
        err.as_nntp().expect("expected protocol error").code
    }

    #[tokio::test]
    async fn test_get_group_miss() {
        let b = backend();
        let err = b.get_group("no.such").await.unwrap_err();
        assert_eq!(nntp_code(&err), 411);
    }

    #[tokio::test]
    async fn test_post_updates_group_counters() {
        let b = backend();
        b.post(article("<1@t>", "misc.test", "hello\r\n")).await.unwrap();
        b.post(article("<2@t>", "misc.test", "world\r\n")).await.unwrap();

        let g = b.get_group("misc.test").await.unwrap();
        assert_eq!((g.count, g.low, g.high), (2, 1, 2));

        // alt.test untouched
        let g = b.get_group("alt.test").await.unwrap();
        assert_eq!((g.count, g.low, g.high), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_get_article_by_message_id_and_number() {
        let b = backend();
        b.post(article("<1@t>", "misc.test", "hello\r\n")).await.unwrap();

        let mut a = b.get_article(None, "<1@t>").await.unwrap();
        let mut body = Vec::new();
        a.body.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"hello\r\n");

        let group = b.get_group("misc.test").await.unwrap();
        let a = b.get_article(Some(&group), "1").await.unwrap();
        assert_eq!(a.message_id(), Some("<1@t>"));

        let err = b.get_article(Some(&group), "99").await.unwrap_err();
        assert_eq!(nntp_code(&err), 423);
        let err = b.get_article(None, "<missing@t>").await.unwrap_err();
        assert_eq!(nntp_code(&err), 430);
    }

    #[tokio::test]
    async fn test_get_articles_range() {
        let b = backend();
        for i in 1..=5 {
            b.post(article(&format!("<{i}@t>"), "misc.test", "x\r\n"))
                .await
                .unwrap();
        }
        let group = b.get_group("misc.test").await.unwrap();

        let hits = b.get_articles(&group, 2, 4).await.unwrap();
        let numbers: Vec<i64> = hits.iter().map(|n| n.number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);

        assert!(b.get_articles(&group, 90, 95).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_message_id_rejected() {
        let b = backend();
        b.post(article("<dup@t>", "misc.test", "one\r\n")).await.unwrap();
        let err = b.post(article("<dup@t>", "misc.test", "two\r\n")).await.unwrap_err();
        assert_eq!(nntp_code(&err), 441);
    }

    #[tokio::test]
    async fn test_post_to_unknown_groups_only_fails() {
        let b = backend();
        let err = b.post(article("<x@t>", "no.such.group", "x\r\n")).await.unwrap_err();
        assert_eq!(nntp_code(&err), 441);
    }

    #[tokio::test]
    async fn test_missing_message_id_fails() {
        let b = backend();
        let mut headers = Headers::new();
        headers.append("Newsgroups", "misc.test");
        let err = b
            .post(Article::buffered(headers, b"x\r\n".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(nntp_code(&err), 441);
    }

    #[tokio::test]
    async fn test_cross_post_counts_in_both_groups() {
        let b = backend();
        b.post(article("<x@t>", "misc.test,alt.test", "x\r\n")).await.unwrap();

        assert_eq!(b.get_group("misc.test").await.unwrap().count, 1);
        assert_eq!(b.get_group("alt.test").await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_eviction_advances_low_and_drops_article() {
        let b = backend();
        b.store().groups.get_mut("misc.test").unwrap().capacity = 2;

        for i in 1..=3 {
            b.post(article(&format!("<{i}@t>"), "misc.test", "x\r\n"))
                .await
                .unwrap();
        }

        let g = b.get_group("misc.test").await.unwrap();
        assert_eq!((g.count, g.low, g.high), (2, 2, 3));

        // The evicted article is gone entirely
        let err = b.get_article(None, "<1@t>").await.unwrap_err();
        assert_eq!(nntp_code(&err), 430);
    }

    #[tokio::test]
    async fn test_authentication_swaps_in_authorized_view() {
        let b = MemoryBackend::new().with_credentials("reader", "secret");
        assert!(!b.authorized());

        let err = b.authenticate("reader", "wrong").await.unwrap_err();
        assert_eq!(nntp_code(&err), 452);

        let view = b
            .authenticate("reader", "secret")
            .await
            .unwrap()
            .expect("replacement backend");
        assert!(view.authorized());
    }

    #[tokio::test]
    async fn test_authenticated_view_shares_store() {
        let b = MemoryBackend::new().with_credentials("reader", "secret");
        b.add_group("misc.test", "", PostingStatus::Permitted);

        let view = b.authenticate("reader", "secret").await.unwrap().unwrap();
        view.post(article("<s@t>", "misc.test", "x\r\n")).await.unwrap();

        // Visible through the original handle too
        assert_eq!(b.get_group("misc.test").await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_list_groups_respects_max() {
        let b = backend();
        assert_eq!(b.list_groups(-1).await.unwrap().len(), 2);
        assert_eq!(b.list_groups(1).await.unwrap().len(), 1);
        assert_eq!(b.list_groups(0).await.unwrap().len(), 0);
    }
}
