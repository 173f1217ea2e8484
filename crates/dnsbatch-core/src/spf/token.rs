//! SPF record tokenizer
//!
//! Each whitespace-delimited component is classified by the first entry of an
//! ordered pattern table that matches it. The `all` pattern is tried first so
//! that qualifier forms like `~all` never fall through to a mechanism pattern.
//!
//! Components that match no entry are dropped. This loses modifiers such as
//! `redirect=` and any mechanism syntax outside the table.

use once_cell::sync::Lazy;
use regex::Regex;

/// Classification of an SPF fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpfTokenKind {
    /// The `v=spf1` marker
    Version,
    /// A directive such as `include:example.com` or `-mx`
    Mechanism,
    /// The terminal `all` directive, with or without qualifier
    AllQualifier,
}

impl SpfTokenKind {
    /// Ordering weight used when a record is reassembled
    pub fn sort_key(&self) -> i8 {
        match self {
            SpfTokenKind::Version => -1,
            SpfTokenKind::Mechanism => 0,
            SpfTokenKind::AllQualifier => 1,
        }
    }
}

/// A classified fragment of an SPF record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpfToken {
    /// The fragment as written in the record
    pub content: String,
    /// What the fragment is
    pub kind: SpfTokenKind,
}

impl SpfToken {
    /// Create a token
    pub fn new(kind: SpfTokenKind, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind,
        }
    }

    /// Create a mechanism token
    pub fn mechanism(content: impl Into<String>) -> Self {
        Self::new(SpfTokenKind::Mechanism, content)
    }

    /// Ordering weight of this token
    pub fn sort_key(&self) -> i8 {
        self.kind.sort_key()
    }
}

// Priority order matters: first match wins.
static PATTERNS: Lazy<Vec<(Regex, SpfTokenKind)>> = Lazy::new(|| {
    [
        (r"(?i)^[-+?~]?all$", SpfTokenKind::AllQualifier),
        (r"(?i)^v=spf1$", SpfTokenKind::Version),
        (r"(?i)^[-+?~]?include:\S+$", SpfTokenKind::Mechanism),
        (r"(?i)^[-+?~]?ip4:\S+$", SpfTokenKind::Mechanism),
        (r"(?i)^[-+?~]?ip6:\S+$", SpfTokenKind::Mechanism),
        (
            r"(?i)^[-+?~]?a(:[^/\s]+)?(/\d{1,3})?(//\d{1,3})?$",
            SpfTokenKind::Mechanism,
        ),
        (
            r"(?i)^[-+?~]?mx(:[^/\s]+)?(/\d{1,3})?(//\d{1,3})?$",
            SpfTokenKind::Mechanism,
        ),
        (r"(?i)^[-+?~]?ptr(:\S+)?$", SpfTokenKind::Mechanism),
        (r"(?i)^[-+?~]?exists(:\S+)?$", SpfTokenKind::Mechanism),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).unwrap(), kind))
    .collect()
});

/// Classify a single component, `None` if no pattern matches
pub fn classify(component: &str) -> Option<SpfTokenKind> {
    PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(component))
        .map(|(_, kind)| *kind)
}

/// Remove one pair of surrounding double quotes, as TXT content is often stored
pub(crate) fn unquote(record: &str) -> &str {
    let trimmed = record.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
}

/// Split a record into classified tokens, in encounter order
pub fn parse(record: &str) -> Vec<SpfToken> {
    unquote(record)
        .split_whitespace()
        .filter_map(|component| match classify(component) {
            Some(kind) => Some(SpfToken::new(kind, component)),
            None => {
                tracing::debug!("Dropping unrecognised SPF component '{}'", component);
                None
            }
        })
        .collect()
}
