//! Agent intent detection
//!
//! Decides from a message's text whether the sender is asking for a
//! specific agent. The router treats any hit as an explicit switch.

use crate::agent::AgentKind;

/// Maps inbound text to the agent it names, if any.
pub trait IntentClassifier: Send + Sync {
    /// Agent named by `text`, or `None` when no agent (or both) are named.
    fn classify(&self, text: &str) -> Option<AgentKind>;
}

impl<F> IntentClassifier for F
where
    F: Fn(&str) -> Option<AgentKind> + Send + Sync,
{
    fn classify(&self, text: &str) -> Option<AgentKind> {
        self(text)
    }
}

/// Case-insensitive whole-word keyword matcher.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    business: Vec<String>,
    coach: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(["percy"], ["coach"])
    }
}

impl KeywordClassifier {
    /// Create a classifier from keyword lists.
    pub fn new<B, C>(business: B, coach: C) -> Self
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            business: business.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
            coach: coach.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
        }
    }
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Option<AgentKind> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let names = |keywords: &[String]| keywords.iter().any(|k| words.contains(&k.as_str()));

        match (names(&self.business), names(&self.coach)) {
            (true, false) => Some(AgentKind::Business),
            (false, true) => Some(AgentKind::Coach),
            _ => None,
        }
    }
}
