//! Safety classification for user input and model output.
//!
//! The classifier is synchronous: it only inspects text and must never do IO.

/// Outcome of a safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Safe,
    Unsafe { reason: String },
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }
}

/// Decides whether a piece of text may pass through the pipeline.
pub trait SafetyClassifier: Send + Sync {
    fn classify(&self, text: &str) -> SafetyVerdict;
}

/// Phrases that indicate a risk of self-harm.
pub const DEFAULT_UNSAFE_PHRASES: &[&str] = &[
    "kill myself",
    "end it all",
    "hurt myself",
    "self harm",
    "self-harm",
    "suicide",
    "want to die",
    "cutting",
    "overdose",
];

/// Case-insensitive substring match against a phrase list.
#[derive(Debug, Clone)]
pub struct KeywordSafetyClassifier {
    phrases: Vec<String>,
}

impl KeywordSafetyClassifier {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

impl Default for KeywordSafetyClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_UNSAFE_PHRASES)
    }
}

impl SafetyClassifier for KeywordSafetyClassifier {
    fn classify(&self, text: &str) -> SafetyVerdict {
        let lowered = text.to_lowercase();
        match self.phrases.iter().find(|p| lowered.contains(p.as_str())) {
            Some(phrase) => SafetyVerdict::Unsafe {
                reason: format!("matched unsafe phrase '{phrase}'"),
            },
            None => SafetyVerdict::Safe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinary_text_is_safe() {
        let classifier = KeywordSafetyClassifier::default();
        assert!(classifier.classify("I had a rough day at school").is_safe());
        assert!(classifier.classify("I'm on a diet and studied all night").is_safe());
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let classifier = KeywordSafetyClassifier::default();
        let verdict = classifier.classify("Sometimes I want to END IT ALL");
        match verdict {
            SafetyVerdict::Unsafe { reason } => assert!(reason.contains("end it all")),
            SafetyVerdict::Safe => panic!("expected unsafe"),
        }
    }

    #[test]
    fn test_custom_phrases_ignore_blank_entries() {
        let classifier = KeywordSafetyClassifier::new(["  Forbidden ", ""]);
        assert!(!classifier.classify("this is forbidden").is_safe());
        assert!(classifier.classify("anything else").is_safe());
    }
}
