//! Core NNTP data model: groups, headers, and articles
//!
//! Articles carry their body as a lazy, single-pass byte stream so the
//! server never has to materialise a large payload; backends fetching from
//! remote storage can hand back a reader that only does work when polled.

use std::fmt;

use tokio::io::AsyncRead;

/// Posting status of a newsgroup, displayed as a single ASCII character in
/// `LIST ACTIVE` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostingStatus {
    /// Status not known to the backend
    #[default]
    Unknown,
    /// Posting permitted (`y`)
    Permitted,
    /// Posting not permitted (`n`)
    NotPermitted,
    /// Postings are moderated (`m`)
    Moderated,
}

impl PostingStatus {
    /// The single-character wire form.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Unknown => '?',
            Self::Permitted => 'y',
            Self::NotPermitted => 'n',
            Self::Moderated => 'm',
        }
    }
}

impl fmt::Display for PostingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A usenet newsgroup.
///
/// `low`/`high` are the inclusive bounds of article numbers present.
/// These fields are owned by the backend; the core only reads them to
/// format responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub description: String,
    /// Number of articles currently visible in the group
    pub count: i64,
    /// Lowest article number present
    pub low: i64,
    /// Highest article number present
    pub high: i64,
    pub posting: PostingStatus,
}

impl Group {
    /// An empty group with the given name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            count: 0,
            low: 0,
            high: 0,
            posting: PostingStatus::Unknown,
        }
    }
}

/// An insertion-ordered, multi-valued header collection with canonicalised
/// field names (`message-id` is stored and looked up as `Message-Id`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical form of a header field name: each dash-separated word is
    /// capitalised. Names containing bytes outside the header token set
    /// are returned unchanged.
    #[must_use]
    pub fn canonical_key(name: &str) -> String {
        let valid = name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':');
        if !valid || name.is_empty() {
            return name.to_string();
        }
        let mut out = String::with_capacity(name.len());
        let mut upper = true;
        for c in name.chars() {
            if upper {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            upper = c == '-';
        }
        out
    }

    /// Append a value for a field, preserving insertion order.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((Self::canonical_key(name), value.into()));
    }

    /// Extend the most recently appended value (header folding).
    /// Returns false when there is no entry to extend.
    pub fn extend_last(&mut self, continuation: &str) -> bool {
        match self.entries.last_mut() {
            Some((_, value)) => {
                value.push(' ');
                value.push_str(continuation);
                true
            }
            None => false,
        }
    }

    /// First value recorded for the field, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let key = Self::canonical_key(name);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values recorded for the field, in insertion order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        let key = Self::canonical_key(name);
        self.entries
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every `(name, value)` pair in insertion order.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// One `(name, first value)` pair per distinct field, in first-seen
    /// order. This is the view HEAD and ARTICLE emit.
    pub fn first_values<'a>(&'a self) -> impl Iterator<Item = (&'a str, &'a str)> {
        let mut seen: Vec<&'a str> = Vec::new();
        self.entries.iter().filter_map(move |(k, v)| {
            if seen.contains(&k.as_str()) {
                None
            } else {
                seen.push(k.as_str());
                Some((k.as_str(), v.as_str()))
            }
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A lazy, single-pass article body stream.
pub type Body = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// A news article: headers plus a body stream and its declared size.
///
/// The body is consumed at most once. A handler that obtains an article
/// must drain or drop the body before reading the next command.
/// `bytes`/`lines` are only used to format OVER/XOVER output.
pub struct Article {
    pub headers: Headers,
    pub body: Body,
    /// Declared size of the body in bytes
    pub bytes: u64,
    /// Declared number of body lines
    pub lines: u64,
}

impl Article {
    pub fn new(headers: Headers, body: Body, bytes: u64, lines: u64) -> Self {
        Self {
            headers,
            body,
            bytes,
            lines,
        }
    }

    /// Build an article over an in-memory body, deriving `bytes`/`lines`
    /// from the buffer.
    pub fn buffered(headers: Headers, body: Vec<u8>) -> Self {
        let bytes = body.len() as u64;
        let lines = body.iter().filter(|&&b| b == b'\n').count() as u64;
        Self {
            headers,
            body: Box::new(std::io::Cursor::new(body)),
            bytes,
            lines,
        }
    }

    /// The `Message-Id` header, if present.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("Message-Id")
    }
}

impl fmt::Debug for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Article")
            .field("headers", &self.headers)
            .field("bytes", &self.bytes)
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}

/// An article paired with its number within a specific group.
#[derive(Debug)]
pub struct NumberedArticle {
    pub number: i64,
    pub article: Article,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posting_status_display() {
        assert_eq!(PostingStatus::Permitted.to_string(), "y");
        assert_eq!(PostingStatus::NotPermitted.to_string(), "n");
        assert_eq!(PostingStatus::Moderated.to_string(), "m");
        assert_eq!(PostingStatus::Unknown.to_string(), "?");
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(Headers::canonical_key("message-id"), "Message-Id");
        assert_eq!(Headers::canonical_key("SUBJECT"), "Subject");
        assert_eq!(Headers::canonical_key("x-no-archive"), "X-No-Archive");
        // Names with bytes outside the token set pass through untouched
        assert_eq!(Headers::canonical_key("weird header"), "weird header");
        assert_eq!(Headers::canonical_key(""), "");
    }

    #[test]
    fn test_headers_lookup_is_case_insensitive() {
        let mut h = Headers::new();
        h.append("From", "a@example.com");
        assert_eq!(h.get("from"), Some("a@example.com"));
        assert_eq!(h.get("FROM"), Some("a@example.com"));
        assert_eq!(h.get("Reply-To"), None);
    }

    #[test]
    fn test_headers_multi_value_order() {
        let mut h = Headers::new();
        h.append("Newsgroups", "misc.test");
        h.append("Subject", "hello");
        h.append("Newsgroups", "alt.test");

        let all: Vec<&str> = h.get_all("newsgroups").collect();
        assert_eq!(all, vec!["misc.test", "alt.test"]);

        // get() returns the first value only
        assert_eq!(h.get("Newsgroups"), Some("misc.test"));

        // iter() preserves insertion order across fields
        let names: Vec<&str> = h.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Newsgroups", "Subject", "Newsgroups"]);
    }

    #[test]
    fn test_headers_first_values_dedupes() {
        let mut h = Headers::new();
        h.append("Received", "hop1");
        h.append("Subject", "s");
        h.append("Received", "hop2");

        let pairs: Vec<(&str, &str)> = h.first_values().collect();
        assert_eq!(pairs, vec![("Received", "hop1"), ("Subject", "s")]);
    }

    #[test]
    fn test_headers_folding() {
        let mut h = Headers::new();
        assert!(!h.extend_last("orphan continuation"));
        h.append("Subject", "a very");
        assert!(h.extend_last("long subject"));
        assert_eq!(h.get("Subject"), Some("a very long subject"));
    }

    #[test]
    fn test_buffered_article_counts() {
        let mut h = Headers::new();
        h.append("Message-Id", "<x@y>");
        let a = Article::buffered(h, b"hello\r\nworld\r\n".to_vec());
        assert_eq!(a.bytes, 14);
        assert_eq!(a.lines, 2);
        assert_eq!(a.message_id(), Some("<x@y>"));
    }
}
