//! Core data models shared by the analysis stages.
//!
//! Internal maps key documents by full path; everything that ends up in a
//! report uses base names only (see [`file_name`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Outcome of extracting text from one PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Success,
    Empty,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Success => "ok",
            ExtractionStatus::Empty => "empty",
            ExtractionStatus::Failed => "failed",
        }
    }
}

/// A PDF discovered in the batch directory.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    /// `None` when extraction failed or produced blank text.
    pub text: Option<String>,
    pub status: ExtractionStatus,
}

impl Document {
    pub fn name(&self) -> String {
        file_name(&self.path)
    }
}

/// Base name of a path, used for every file name that leaves the process.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarPair {
    pub file1: String,
    pub file2: String,
    pub similarity_score: f64,
}

/// The `similarity_analysis` block of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityAnalysis {
    pub similar_pairs: Vec<SimilarPair>,
    pub similarity_matrix: Vec<Vec<f64>>,
    pub file_names: Vec<String>,
    pub threshold: f64,
}

impl SimilarityAnalysis {
    pub fn empty(threshold: f64) -> Self {
        Self {
            similar_pairs: Vec::new(),
            similarity_matrix: Vec::new(),
            file_names: Vec::new(),
            threshold,
        }
    }
}

/// Per-document AI-likelihood estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiDetectionResult {
    /// Percentage in `[0, 100]`.
    pub ai_probability: f64,
    pub is_ai_generated: bool,
}

/// Probability above which a document is flagged as AI-generated.
pub const AI_VERDICT_THRESHOLD: f64 = 50.0;

impl AiDetectionResult {
    pub fn from_probability(ai_probability: f64) -> Self {
        Self {
            ai_probability,
            is_ai_generated: ai_probability > AI_VERDICT_THRESHOLD,
        }
    }

    pub fn zero() -> Self {
        Self::from_probability(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedFiles {
    pub total_found: usize,
    pub successfully_processed: usize,
    pub file_list: Vec<String>,
}

/// The persisted artifact of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub timestamp: String,
    pub analyzed_files: AnalyzedFiles,
    pub similarity_analysis: SimilarityAnalysis,
    pub ai_detection: BTreeMap<String, AiDetectionResult>,
    /// Documents whose classification could not be obtained. They are absent
    /// from `ai_detection` rather than reported as probability zero.
    #[serde(default)]
    pub ai_detection_unavailable: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialData {
    pub processed_files: usize,
    pub has_similarity: bool,
    pub ai_detection_results: usize,
}

/// Written instead of [`AnalysisReport`] when assembly or persistence fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub timestamp: String,
    pub error: String,
    pub partial_data: PartialData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_is_strictly_above_fifty() {
        assert!(!AiDetectionResult::from_probability(50.0).is_ai_generated);
        assert!(AiDetectionResult::from_probability(50.1).is_ai_generated);
        assert!(!AiDetectionResult::zero().is_ai_generated);
    }

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(file_name(Path::new("/tmp/batch/a.pdf")), "a.pdf");
        assert_eq!(file_name(Path::new("b.pdf")), "b.pdf");
    }
}
