//! NNTP error taxonomy
//!
//! Protocol errors are flat `(code, reason)` values written back to the
//! client on a single line; everything else (I/O failures, backend
//! breakage) is fatal to the session. The dispatcher distinguishes the two
//! by variant tag, not by downcasting.

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// A coded NNTP protocol error.
///
/// Its display form is exactly the wire reply: `<code> <reason>`.
/// The associated constants cover the response codes the server core and
/// the stock backends produce; backends are free to construct others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NntpError {
    /// Three-digit NNTP status code
    pub code: u16,
    /// Human-readable reason, sent verbatim after the code
    pub reason: Cow<'static, str>,
}

impl NntpError {
    /// Requested group does not exist.
    pub const NO_SUCH_GROUP: Self = Self::new_static(411, "No such newsgroup");
    /// A command needed a selected group and none was selected.
    pub const NO_GROUP_SELECTED: Self = Self::new_static(412, "No newsgroup selected");
    /// A command needed a current article and none is available.
    pub const NO_CURRENT_ARTICLE: Self = Self::new_static(420, "Current article number is invalid");
    /// Numeric article lookup missed.
    pub const NO_SUCH_ARTICLE_NUMBER: Self = Self::new_static(423, "No article with that number");
    /// Message-id article lookup missed.
    pub const NO_SUCH_MESSAGE_ID: Self = Self::new_static(430, "No article with that message-id");
    /// IHAVE offer declined.
    pub const NOT_WANTED: Self = Self::new_static(435, "Article not wanted");
    /// POST attempted where posting is disabled.
    pub const POSTING_NOT_PERMITTED: Self = Self::new_static(440, "Posting not permitted");
    /// The backend refused or failed to store a posted article.
    pub const POSTING_FAILED: Self = Self::new_static(441, "Posting failed");
    /// Authorization required to proceed.
    pub const AUTH_REQUIRED: Self = Self::new_static(450, "Authorization required");
    /// Credentials were presented and rejected.
    pub const AUTH_REJECTED: Self = Self::new_static(452, "Authorization rejected");
    /// Command requires authentication that was not provided.
    pub const NOT_AUTHENTICATED: Self = Self::new_static(480, "Authentication required");
    /// Verb not recognised.
    pub const UNKNOWN_COMMAND: Self = Self::new_static(500, "Unknown command");
    /// Command line could not be parsed.
    pub const SYNTAX: Self = Self::new_static(501, "Syntax error");

    /// Build an error from a static reason, usable in `const` context.
    pub const fn new_static(code: u16, reason: &'static str) -> Self {
        Self {
            code,
            reason: Cow::Borrowed(reason),
        }
    }

    /// Build an error with a runtime reason (e.g. parsed from a peer reply).
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: Cow::Owned(reason.into()),
        }
    }
}

impl fmt::Display for NntpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

impl std::error::Error for NntpError {}

/// Unified error type for server handlers, backends, and the client.
///
/// The session loop replies and continues on [`Error::Nntp`]; every other
/// variant closes the connection without a reply.
#[derive(Debug, Error)]
pub enum Error {
    /// A protocol error to be written to the peer as `<code> <reason>`.
    #[error(transparent)]
    Nntp(#[from] NntpError),

    /// Transport failure; the session is considered corrupted.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A backend failed in a way that is not expressible on the wire.
    #[error("backend failure: {0}")]
    Backend(#[source] anyhow::Error),

    /// The peer sent a reply this library could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Wrap an arbitrary backend failure as session-fatal.
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        Self::Backend(err.into())
    }

    /// The protocol error carried by this value, if any.
    pub fn as_nntp(&self) -> Option<&NntpError> {
        match self {
            Self::Nntp(e) => Some(e),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_wire_form() {
        assert_eq!(NntpError::NO_SUCH_GROUP.to_string(), "411 No such newsgroup");
        assert_eq!(
            NntpError::NO_GROUP_SELECTED.to_string(),
            "412 No newsgroup selected"
        );
        assert_eq!(NntpError::UNKNOWN_COMMAND.to_string(), "500 Unknown command");
        assert_eq!(NntpError::SYNTAX.to_string(), "501 Syntax error");
    }

    #[test]
    fn test_sentinel_codes_match_taxonomy() {
        assert_eq!(NntpError::NO_SUCH_GROUP.code, 411);
        assert_eq!(NntpError::NO_GROUP_SELECTED.code, 412);
        assert_eq!(NntpError::NO_CURRENT_ARTICLE.code, 420);
        assert_eq!(NntpError::NO_SUCH_ARTICLE_NUMBER.code, 423);
        assert_eq!(NntpError::NO_SUCH_MESSAGE_ID.code, 430);
        assert_eq!(NntpError::NOT_WANTED.code, 435);
        assert_eq!(NntpError::POSTING_NOT_PERMITTED.code, 440);
        assert_eq!(NntpError::POSTING_FAILED.code, 441);
        assert_eq!(NntpError::AUTH_REQUIRED.code, 450);
        assert_eq!(NntpError::AUTH_REJECTED.code, 452);
        assert_eq!(NntpError::NOT_AUTHENTICATED.code, 480);
    }

    #[test]
    fn test_owned_reason() {
        let err = NntpError::new(502, format!("no permission for {}", "reader"));
        assert_eq!(err.to_string(), "502 no permission for reader");
    }

    #[test]
    fn test_as_nntp_classification() {
        let protocol: Error = NntpError::NOT_WANTED.into();
        assert_eq!(protocol.as_nntp(), Some(&NntpError::NOT_WANTED));

        let transport: Error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        assert!(transport.as_nntp().is_none());

        let fatal = Error::backend(anyhow::anyhow!("store exploded"));
        assert!(fatal.as_nntp().is_none());
    }
}
