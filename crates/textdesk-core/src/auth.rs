//! Sender authorization
//!
//! The router only asks a yes/no question per sender. `AllowList` is the
//! built-in answer: a fixed set of phone numbers loaded from settings.

use async_trait::async_trait;
use std::collections::HashSet;

/// Decides whether a sender may talk to the agents.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns `true` if `sender` is allowed.
    async fn is_authorized(&self, sender: &str) -> bool;
}

/// Static allow-list of phone numbers.
///
/// Numbers are normalized to a leading `+` (if present) followed by digits,
/// so `+1 (555) 123-0000` and `+15551230000` are the same entry. An empty
/// list denies everyone.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    senders: HashSet<String>,
}

impl AllowList {
    /// Create an allow-list from already split entries.
    pub fn new<I, S>(senders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            senders: senders
                .into_iter()
                .map(|s| normalize_number(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a comma, semicolon or whitespace separated list.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .filter(|token| !token.is_empty()),
        )
    }

    /// Returns `true` if the normalized `sender` is on the list.
    #[must_use]
    pub fn contains(&self, sender: &str) -> bool {
        self.senders.contains(&normalize_number(sender))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Returns `true` if the list denies everyone.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[async_trait]
impl Authorizer for AllowList {
    async fn is_authorized(&self, sender: &str) -> bool {
        self.contains(sender)
    }
}

/// Keep a leading `+` and the digits, drop formatting characters.
#[must_use]
pub fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(char::is_ascii_digit));
    if out == "+" {
        out.clear();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_parsing() {
        // Comma
        let list = AllowList::parse("+15551230000,+15551230001");
        assert!(list.contains("+15551230000"));
        assert!(list.contains("+15551230001"));
        assert_eq!(list.len(), 2);

        // Semicolon, whitespace and mixed
        let list = AllowList::parse("+111; +222, +333 +444");
        assert_eq!(list.len(), 4);

        // Tokens without digits are dropped
        let list = AllowList::parse("abc, +777");
        assert!(list.contains("+777"));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_formatting_is_ignored() {
        let list = AllowList::new(["+1 (555) 123-0000"]);
        assert!(list.contains("+15551230000"));
        assert!(list.contains(" +1-555-123-0000 "));
        assert!(!list.contains("15551230000"));
    }

    #[tokio::test]
    async fn test_empty_list_denies_everyone() {
        let list = AllowList::parse("");
        assert!(list.is_empty());
        assert!(!list.is_authorized("+15551230000").await);
    }

    #[tokio::test]
    async fn test_authorizer_impl() {
        let list = AllowList::parse("+15551230000");
        assert!(list.is_authorized("+15551230000").await);
        assert!(!list.is_authorized("+15559999999").await);
    }
}
