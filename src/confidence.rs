use crate::answer::Completion;
use std::fmt;

/// Answer returned in place of anything the gate rejects
pub const DATA_NOT_AVAILABLE: &str = "Data Not Available";

/// Phrases a model uses when the context does not hold the answer. Matched
/// case-insensitively anywhere in the answer, with typographic apostrophes
/// folded to `'`. Phrases are anchored to "context" or to the model itself so
/// that an answer which merely mentions missing detail is still accepted.
pub const INSUFFICIENT_CONTEXT_PHRASES: &[&str] = &[
    "context is insufficient",
    "insufficient context",
    "context does not contain",
    "context doesn't contain",
    "context does not provide",
    "context doesn't provide",
    "not mentioned in the context",
    "not provided in the context",
    "no information about this in the context",
    "context has no information",
    "i don't know",
    "i do not know",
    "cannot be determined",
    "unable to answer",
    "data not available",
];

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    Empty,
    TooShort { len: usize, min: usize },
    InsufficientContext(&'static str),
    LowConfidence { score: f32, min: f32 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "empty answer"),
            RejectReason::TooShort { len, min } => {
                write!(f, "answer has {} chars, minimum is {}", len, min)
            }
            RejectReason::InsufficientContext(phrase) => {
                write!(f, "model reported insufficient context (\"{}\")", phrase)
            }
            RejectReason::LowConfidence { score, min } => {
                write!(f, "confidence {:.3} below threshold {:.3}", score, min)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Accepted,
    Rejected(RejectReason),
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted)
    }
}

/// Decides whether a generated answer is trustworthy enough to return.
///
/// The policy: reject empty answers, answers shorter than `min_answer_chars`,
/// answers containing one of [`INSUFFICIENT_CONTEXT_PHRASES`], and, when the
/// model reports a confidence, answers scoring below `min_confidence`. With
/// the defaults the length check only catches empty answers and the score
/// check never fires.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceGate {
    pub min_answer_chars: usize,
    pub min_confidence: f32,
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        ConfidenceGate {
            min_answer_chars: 1,
            min_confidence: 0.0,
        }
    }
}

impl ConfidenceGate {
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn evaluate(&self, completion: &Completion) -> GateDecision {
        let answer = completion.text.trim();
        if answer.is_empty() {
            return GateDecision::Rejected(RejectReason::Empty);
        }

        let len = answer.chars().count();
        if len < self.min_answer_chars {
            return GateDecision::Rejected(RejectReason::TooShort {
                len,
                min: self.min_answer_chars,
            });
        }

        let lowered = answer
            .to_lowercase()
            .replace(|c: char| c == '\u{2019}' || c == '\u{2018}', "'");
        if let Some(phrase) = INSUFFICIENT_CONTEXT_PHRASES
            .iter()
            .copied()
            .find(|phrase| lowered.contains(phrase))
        {
            return GateDecision::Rejected(RejectReason::InsufficientContext(phrase));
        }

        if let Some(score) = completion.confidence {
            if score < self.min_confidence {
                return GateDecision::Rejected(RejectReason::LowConfidence {
                    score,
                    min: self.min_confidence,
                });
            }
        }

        GateDecision::Accepted
    }

    /// Final answer text: the model's answer if accepted, the sentinel otherwise
    pub fn apply(&self, completion: &Completion) -> (String, GateDecision) {
        let decision = self.evaluate(completion);
        let answer = match decision {
            GateDecision::Accepted => completion.text.trim().to_string(),
            GateDecision::Rejected(_) => DATA_NOT_AVAILABLE.to_string(),
        };
        (answer, decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_grounded_answer() {
        let gate = ConfidenceGate::default();
        let completion = Completion::from_text("The title is \"Annual Report 2023\".");
        assert_eq!(gate.evaluate(&completion), GateDecision::Accepted);
        assert_eq!(gate.apply(&completion).0, "The title is \"Annual Report 2023\".");
    }

    #[test]
    fn test_rejects_empty_answer() {
        let gate = ConfidenceGate::default();
        let (answer, decision) = gate.apply(&Completion::from_text("  \n"));
        assert_eq!(answer, DATA_NOT_AVAILABLE);
        assert_eq!(decision, GateDecision::Rejected(RejectReason::Empty));
    }

    #[test]
    fn test_rejects_insufficient_context() {
        let gate = ConfidenceGate::default();
        for text in [
            "The context is insufficient to answer this question.",
            "I don't know.",
            "The provided context does not contain information about revenue.",
            "I don\u{2019}t know.",
            "The context doesn\u{2019}t contain that information.",
        ] {
            let (answer, decision) = gate.apply(&Completion::from_text(text));
            assert_eq!(answer, DATA_NOT_AVAILABLE, "{text}");
            assert!(matches!(
                decision,
                GateDecision::Rejected(RejectReason::InsufficientContext(_))
            ));
        }
    }

    #[test]
    fn test_accepts_partly_grounded_answer() {
        let gate = ConfidenceGate::default();
        let completion = Completion::from_text(
            "The date is not given and there is no information about it here, but the title is Annual Report.",
        );
        assert!(gate.evaluate(&completion).is_accepted());
    }

    #[test]
    fn test_rejects_short_answers_when_configured() {
        let gate = ConfidenceGate {
            min_answer_chars: 5,
            ..ConfidenceGate::default()
        };
        assert!(!gate.evaluate(&Completion::from_text("no")).is_accepted());
        assert!(gate.evaluate(&Completion::from_text("Paris, France")).is_accepted());
    }

    #[test]
    fn test_confidence_threshold() {
        let gate = ConfidenceGate::default().with_min_confidence(0.6);
        let low = Completion {
            text: "Paris".to_string(),
            confidence: Some(0.3),
        };
        let high = Completion {
            text: "Paris".to_string(),
            confidence: Some(0.9),
        };
        assert!(matches!(
            gate.evaluate(&low),
            GateDecision::Rejected(RejectReason::LowConfidence { .. })
        ));
        assert!(gate.evaluate(&high).is_accepted());
        // no score reported: the threshold does not apply
        assert!(gate.evaluate(&Completion::from_text("Paris")).is_accepted());
    }

    #[test]
    fn test_decision_is_pure() {
        let gate = ConfidenceGate::default();
        let completion = Completion::from_text("It cannot be determined from the text.");
        let first = gate.evaluate(&completion);
        for _ in 0..10 {
            assert_eq!(gate.evaluate(&completion), first);
        }
    }
}
