//! AI-likelihood detection against an external classification endpoint.
//!
//! Each extracted document becomes one task in a bounded worker pool
//! ([`Semaphore`] + [`JoinSet`]). A task truncates the text, skips the call
//! when too little text remains, and otherwise posts it to the endpoint
//! with its own retry loop.
//!
//! # Retry policy
//!
//! - HTTP 200 → decode and score
//! - HTTP 429 → sleep for `Retry-After` seconds (default: twice the base
//!   delay, capped at the request timeout) and re-issue; the attempt still counts
//! - any other status → fail immediately, no further attempts
//! - transport error (connect, timeout) → sleep `base_delay × attempt`, retry
//!
//! Running out of attempts is not fatal to the run: the document's outcome
//! is [`DetectionOutcome::Unavailable`] and it is left out of the scores.

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::DetectionConfig;
use crate::extract::ExtractedCorpus;
use crate::models::{file_name, AiDetectionResult};
use crate::scoring::{reply_text, ReplyLengthHeuristic, ReplyScorer};

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("classifier returned HTTP {0}")]
    Status(u16),
    #[error("invalid classifier response: {0}")]
    Decode(String),
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Per-document result of the detection stage.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Scored(AiDetectionResult),
    /// Too little text to classify; no request was made.
    TooShort,
    /// The classifier could not be reached or refused the request.
    Unavailable(String),
}

impl DetectionOutcome {
    /// The value reported for this document, if any. Short texts report an
    /// explicit zero; unavailable ones report nothing.
    pub fn result(&self) -> Option<AiDetectionResult> {
        match self {
            DetectionOutcome::Scored(r) => Some(*r),
            DetectionOutcome::TooShort => Some(AiDetectionResult::zero()),
            DetectionOutcome::Unavailable(_) => None,
        }
    }
}

/// Detection outcomes keyed by document path, independent of completion order.
#[derive(Debug, Clone, Default)]
pub struct DetectionResults {
    outcomes: BTreeMap<PathBuf, DetectionOutcome>,
}

impl DetectionResults {
    pub fn get(&self, path: &std::path::Path) -> Option<&DetectionOutcome> {
        self.outcomes.get(path)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Reportable results keyed by base file name.
    pub fn by_file_name(&self) -> BTreeMap<String, AiDetectionResult> {
        self.outcomes
            .iter()
            .filter_map(|(p, o)| o.result().map(|r| (file_name(p), r)))
            .collect()
    }

    pub fn unavailable(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DetectionOutcome::Unavailable(_)))
            .map(|(p, _)| file_name(p))
            .collect()
    }

    pub fn insert(&mut self, path: PathBuf, outcome: DetectionOutcome) {
        self.outcomes.insert(path, outcome);
    }
}

/// A successful classification and the number of attempts it took.
#[derive(Debug, Clone)]
pub struct Classified {
    pub response: Value,
    pub attempts: u32,
}

/// HTTP client for the classification endpoint with the retry policy above.
pub struct ClassifierClient {
    client: reqwest::Client,
    endpoint: String,
    host: String,
    api_key: String,
    max_attempts: u32,
    retry_delay: Duration,
    max_retry_after: Duration,
}

impl ClassifierClient {
    pub fn new(config: &DetectionConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            host: config.host_header(),
            api_key,
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_retry_after: Duration::from_secs(config.timeout_secs),
        })
    }

    pub async fn classify(&self, text: &str) -> Result<Classified, DetectionError> {
        let body = serde_json::json!({
            "messages": [{"role": "user", "content": text}],
            "web_access": false,
        });

        let mut last = String::from("no attempt made");

        for attempt in 1..=self.max_attempts {
            let resp = self
                .client
                .post(&self.endpoint)
                .header("Content-Type", "application/json")
                .header("X-RapidAPI-Key", &self.api_key)
                .header("X-RapidAPI-Host", &self.host)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::OK {
                        let response: Value = response
                            .json()
                            .await
                            .map_err(|e| DetectionError::Decode(e.to_string()))?;
                        return Ok(Classified { response, attempts: attempt });
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let wait = retry_after(
                            response
                                .headers()
                                .get(reqwest::header::RETRY_AFTER)
                                .and_then(|v| v.to_str().ok()),
                            self.retry_delay * 2,
                            self.max_retry_after,
                        );
                        last = format!("HTTP {}", status.as_u16());
                        if attempt < self.max_attempts {
                            warn!(attempt, retry_after_secs = wait.as_secs_f64(), "rate limited, retrying");
                            tokio::time::sleep(wait).await;
                        }
                        continue;
                    }

                    error!(status = status.as_u16(), "API error");
                    return Err(DetectionError::Status(status.as_u16()));
                }
                Err(e) => {
                    warn!(attempt, error = %e, "API request failed");
                    last = e.to_string();
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }

        error!(attempts = self.max_attempts, "max retries exceeded");
        Err(DetectionError::RetriesExhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}

/// Parses a `Retry-After` value in whole seconds, falling back to `default`.
/// The server's value never exceeds `max`.
pub fn retry_after(header: Option<&str>, default: Duration, max: Duration) -> Duration {
    let wait = header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default);
    if wait > max {
        warn!(
            requested_secs = wait.as_secs_f64(),
            capped_secs = max.as_secs_f64(),
            "Retry-After exceeds limit, capping"
        );
        return max;
    }
    wait
}

/// The detection stage: truncation, short-text skip, bounded fan-out, scoring.
pub struct AiDetector {
    client: Arc<ClassifierClient>,
    scorer: Arc<dyn ReplyScorer>,
    workers: usize,
    max_chars: usize,
    min_chars: usize,
}

impl AiDetector {
    pub fn new(config: &DetectionConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: Arc::new(ClassifierClient::new(config, api_key)?),
            scorer: Arc::new(ReplyLengthHeuristic::default()),
            workers: config.worker_count().max(1),
            max_chars: config.max_chars,
            min_chars: config.min_chars,
        })
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn ReplyScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// The text sent to the classifier, or `None` when it is too short.
    pub fn prepare_text(&self, text: &str) -> Option<String> {
        let truncated: String = text.chars().take(self.max_chars).collect();
        if truncated.trim().chars().count() < self.min_chars {
            None
        } else {
            Some(truncated)
        }
    }

    pub async fn detect_one(&self, name: &str, text: &str) -> DetectionOutcome {
        detect_text(&self.client, self.scorer.as_ref(), self.prepare_text(text), name).await
    }

    /// Classifies every document in `corpus` with at most `workers` in flight.
    pub async fn detect_all(&self, corpus: Arc<ExtractedCorpus>) -> DetectionResults {
        let mut results = DetectionResults::default();
        if corpus.is_empty() {
            warn!("no content for AI detection");
            return results;
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut join_set: JoinSet<(PathBuf, DetectionOutcome)> = JoinSet::new();

        for (path, text) in corpus.iter() {
            let path = path.to_path_buf();
            let prepared = self.prepare_text(text);
            let client = self.client.clone();
            let scorer = self.scorer.clone();
            let semaphore = semaphore.clone();

            join_set.spawn(async move {
                let name = file_name(&path);
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => detect_text(&client, scorer.as_ref(), prepared, &name).await,
                    Err(_) => DetectionOutcome::Unavailable("worker pool closed".to_string()),
                };
                (path, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((path, outcome)) => results.insert(path, outcome),
                Err(e) => error!(error = %e, "detection task failed"),
            }
        }

        for (path, _) in corpus.iter() {
            if results.get(path).is_none() {
                results.insert(
                    path.to_path_buf(),
                    DetectionOutcome::Unavailable("detection task failed".to_string()),
                );
            }
        }

        info!(
            scored = results.by_file_name().len(),
            unavailable = results.unavailable().len(),
            "AI detection completed"
        );
        results
    }
}

async fn detect_text(
    client: &ClassifierClient,
    scorer: &dyn ReplyScorer,
    prepared: Option<String>,
    name: &str,
) -> DetectionOutcome {
    let Some(text) = prepared else {
        warn!(file = %name, "text too short");
        return DetectionOutcome::TooShort;
    };

    match client.classify(&text).await {
        Ok(classified) => {
            let result = scorer.score(reply_text(&classified.response));
            debug!(
                file = %name,
                attempts = classified.attempts,
                ai_probability = result.ai_probability,
                "classified"
            );
            DetectionOutcome::Scored(result)
        }
        Err(e) => {
            warn!(file = %name, error = %e, "no classification result");
            DetectionOutcome::Unavailable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> AiDetector {
        let config = DetectionConfig {
            endpoint: "http://127.0.0.1:9/unused".into(),
            ..Default::default()
        };
        AiDetector::new(&config, "test-key".into()).unwrap()
    }

    #[test]
    fn retry_after_parses_seconds_or_falls_back() {
        let d = Duration::from_secs(4);
        let max = Duration::from_secs(30);
        assert_eq!(retry_after(Some("1"), d, max), Duration::from_secs(1));
        assert_eq!(retry_after(Some(" 7 "), d, max), Duration::from_secs(7));
        assert_eq!(retry_after(Some("soon"), d, max), d);
        assert_eq!(retry_after(None, d, max), d);
    }

    #[test]
    fn retry_after_is_capped() {
        let d = Duration::from_secs(4);
        let max = Duration::from_secs(30);
        assert_eq!(retry_after(Some("86400"), d, max), max);
        assert_eq!(retry_after(Some("30"), d, max), max);
        assert_eq!(retry_after(None, d, Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[test]
    fn short_text_is_not_prepared() {
        let d = detector();
        assert!(d.prepare_text("short").is_none());
        let padded = format!("   {}   ", "x".repeat(99));
        assert!(d.prepare_text(&padded).is_none());
        assert!(d.prepare_text(&"x".repeat(100)).is_some());
    }

    #[test]
    fn text_is_truncated_to_max_chars() {
        let d = detector();
        let long = "é".repeat(6000);
        let prepared = d.prepare_text(&long).unwrap();
        assert_eq!(prepared.chars().count(), 5000);
    }

    #[test]
    fn outcome_results_distinguish_unknown_from_zero() {
        assert_eq!(
            DetectionOutcome::TooShort.result(),
            Some(AiDetectionResult::zero())
        );
        assert_eq!(DetectionOutcome::Unavailable("x".into()).result(), None);

        let mut results = DetectionResults::default();
        results.insert("/b/a.pdf".into(), DetectionOutcome::TooShort);
        results.insert("/b/b.pdf".into(), DetectionOutcome::Unavailable("503".into()));
        assert_eq!(results.by_file_name().len(), 1);
        assert_eq!(results.unavailable(), vec!["b.pdf"]);
    }

    #[tokio::test]
    async fn short_text_makes_no_request() {
        // The endpoint is unroutable; a request would come back Unavailable.
        let d = detector();
        let outcome = d.detect_one("a.pdf", "too short to classify").await;
        assert_eq!(outcome, DetectionOutcome::TooShort);
    }
}
