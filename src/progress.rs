//! Analysis run progress reporting.
//!
//! A run moves through fixed phases, each with a completion percentage:
//! initializing (10), text extracted (30), similarity calculated (60),
//! AI detection completed (90), complete (100). A failed run reports 0 with
//! the error message. Progress is emitted on **stderr** so stdout stays
//! parseable for scripts.

use std::io::Write;

/// Phase of the analysis pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnalysisPhase {
    Initializing,
    Extracted,
    SimilarityCalculated,
    DetectionCompleted,
    Complete,
    Failed,
}

impl AnalysisPhase {
    pub fn percent(&self) -> u8 {
        match self {
            AnalysisPhase::Initializing => 10,
            AnalysisPhase::Extracted => 30,
            AnalysisPhase::SimilarityCalculated => 60,
            AnalysisPhase::DetectionCompleted => 90,
            AnalysisPhase::Complete => 100,
            AnalysisPhase::Failed => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisPhase::Initializing => "initializing",
            AnalysisPhase::Extracted => "extracted",
            AnalysisPhase::SimilarityCalculated => "similarity",
            AnalysisPhase::DetectionCompleted => "detection",
            AnalysisPhase::Complete => "complete",
            AnalysisPhase::Failed => "error",
        }
    }
}

/// A single progress event.
#[derive(Clone, Debug)]
pub struct AnalysisProgress {
    pub phase: AnalysisPhase,
    /// Documents handled so far in this phase, when meaningful.
    pub count: Option<u64>,
    pub message: String,
}

impl AnalysisProgress {
    pub fn new(phase: AnalysisPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            count: None,
            message: message.into(),
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

/// Reports run progress. Called from the analysis pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: AnalysisProgress);
}

/// Human-friendly progress on stderr: "[ 30%] extracted  Text extracted (12 files)".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: AnalysisProgress) {
        let mut line = format!(
            "[{:>3}%] {:<10} {}",
            event.phase.percent(),
            event.phase.label(),
            event.message
        );
        if let Some(n) = event.count {
            line.push_str(&format!(" ({} files)", format_number(n)));
        }
        line.push('\n');
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: AnalysisProgress) {
        let obj = serde_json::json!({
            "event": if event.phase == AnalysisPhase::Failed { "error" } else { "progress" },
            "phase": event.phase.label(),
            "percent": event.phase.percent(),
            "count": event.count,
            "message": event.message,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: AnalysisProgress) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn phases_have_increasing_percentages() {
        let order = [
            AnalysisPhase::Initializing,
            AnalysisPhase::Extracted,
            AnalysisPhase::SimilarityCalculated,
            AnalysisPhase::DetectionCompleted,
            AnalysisPhase::Complete,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
        assert_eq!(AnalysisPhase::Failed.percent(), 0);
    }
}
