//! Turning a classifier reply into an AI-likelihood estimate.
//!
//! The endpoint is a conversational model, not a trained detector, so the
//! score is a heuristic over the shape of its reply. It lives behind
//! [`ReplyScorer`] so a calibrated scorer can replace it without touching
//! the detection client.

use serde_json::Value;

use crate::models::AiDetectionResult;

pub trait ReplyScorer: Send + Sync {
    /// Scores the generated reply, `None` when the response carried none.
    fn score(&self, reply: Option<&str>) -> AiDetectionResult;
}

/// Reply length as a proxy: a long reply maps to a high probability, a short
/// one to a low probability, no reply to zero.
#[derive(Debug, Clone)]
pub struct ReplyLengthHeuristic {
    pub long_reply_words: usize,
    pub long_reply_probability: f64,
    pub short_reply_probability: f64,
}

impl Default for ReplyLengthHeuristic {
    fn default() -> Self {
        Self {
            long_reply_words: 10,
            long_reply_probability: 70.0,
            short_reply_probability: 30.0,
        }
    }
}

impl ReplyScorer for ReplyLengthHeuristic {
    fn score(&self, reply: Option<&str>) -> AiDetectionResult {
        match reply {
            Some(text) if !text.trim().is_empty() => {
                let words = text.split_whitespace().count();
                let p = if words > self.long_reply_words {
                    self.long_reply_probability
                } else {
                    self.short_reply_probability
                };
                AiDetectionResult::from_probability(p)
            }
            _ => AiDetectionResult::zero(),
        }
    }
}

/// Content of the first choice's message, if any.
pub fn reply_text(response: &Value) -> Option<&str> {
    response
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
}
