//! Canned replies for a fixed set of phrases.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::error::AppError;

const DEFAULT_INTENTS: &[(&str, &str)] = &[
    ("hello", "Hello! How can I assist you today?"),
    (
        "how are you",
        "I'm just a bot, but I'm doing great! How about you?",
    ),
    ("what is your name", "I am your personal assistant Dollar."),
    ("goodbye", "Goodbye! Have a great day!"),
    ("thank you", "You're welcome!"),
    (
        "what's the weather",
        "Please provide your location, and I'll check the weather for you.",
    ),
    ("help", "Of course! What do you need help with?"),
    (
        "who are you",
        "I am your assistant Dollar ,I am created by Kaustubh Gautam.",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Canned(String),
    NoMatch,
}

/// Exact-match lookup table, frozen once built.
#[derive(Debug, Clone)]
pub struct IntentResolver {
    intents: HashMap<String, String>,
}

impl IntentResolver {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let intents = entries
            .into_iter()
            .map(|(phrase, reply)| (normalize(phrase.as_ref()), reply.into()))
            .collect();
        Self { intents }
    }

    /// Default table extended (and overridden) by a JSON object of
    /// `phrase -> reply` pairs.
    pub fn with_overrides(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path).map_err(|e| {
            AppError::Config(format!("cannot open intents file {}: {e}", path.display()))
        })?;
        let extra: HashMap<String, String> = serde_json::from_reader(file)?;

        let mut resolver = Self::default();
        for (phrase, reply) in extra {
            resolver.intents.insert(normalize(&phrase), reply);
        }
        Ok(resolver)
    }

    pub fn resolve(&self, text: &str) -> MatchResult {
        match self.intents.get(&normalize(text)) {
            Some(reply) => MatchResult::Canned(reply.clone()),
            None => MatchResult::NoMatch,
        }
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }
}

impl Default for IntentResolver {
    fn default() -> Self {
        Self::new(DEFAULT_INTENTS.iter().copied())
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
