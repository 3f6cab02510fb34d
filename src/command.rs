//! Command parsing
//!
//! Verbs are matched case-insensitively into a [`Command`] with an
//! `Unknown` fallback; the session dispatches on the enum. Arguments are
//! not interpreted here, they are forwarded to handlers verbatim.

/// A recognised NNTP verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Group,
    List,
    Head,
    Body,
    Article,
    Post,
    Ihave,
    Capabilities,
    Mode,
    Authinfo,
    Newgroups,
    Over,
    Xover,
    /// Anything else; dispatched to the default handler (`500`).
    Unknown,
}

impl Command {
    /// Case-insensitive verb lookup.
    #[must_use]
    pub fn parse(verb: &str) -> Self {
        match verb.to_ascii_lowercase().as_str() {
            "quit" => Self::Quit,
            "group" => Self::Group,
            "list" => Self::List,
            "head" => Self::Head,
            "body" => Self::Body,
            "article" => Self::Article,
            "post" => Self::Post,
            "ihave" => Self::Ihave,
            "capabilities" => Self::Capabilities,
            "mode" => Self::Mode,
            "authinfo" => Self::Authinfo,
            "newgroups" => Self::Newgroups,
            "over" => Self::Over,
            "xover" => Self::Xover,
            _ => Self::Unknown,
        }
    }
}

/// Parse an OVER/XOVER range spec into an inclusive `(low, high)` pair.
///
/// Grammar is `N`, `N-`, or `N-M`; an empty spec means everything. A part
/// that fails to parse defaults to `0` for the low bound and `i64::MAX`
/// for the high bound.
#[must_use]
pub fn parse_range(spec: &str) -> (i64, i64) {
    if spec.is_empty() {
        return (0, i64::MAX);
    }
    let mut parts = spec.split('-');
    let first = parts.next().unwrap_or("");
    match parts.next() {
        None => (0, first.parse().unwrap_or(i64::MAX)),
        Some(second) => (
            first.parse().unwrap_or(0),
            second.parse().unwrap_or(i64::MAX),
        ),
    }
}
