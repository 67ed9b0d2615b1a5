//! Report assembly and persistence.
//!
//! A run produces exactly one artifact: the [`AnalysisReport`] at the
//! requested path, or, if assembling or writing it fails, an
//! [`ErrorReport`] next to it (`<name>_error.json`).

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::detection::DetectionResults;
use crate::extract::ExtractedCorpus;
use crate::models::{AnalysisReport, AnalyzedFiles, ErrorReport, PartialData, SimilarityAnalysis};
use crate::similarity::SimilarityEngine;

/// Everything one run has produced by the time the report is assembled.
pub struct ReportInputs<'a> {
    pub total_found: usize,
    pub corpus: &'a ExtractedCorpus,
    /// `None` when similarity was not computed earlier in this run.
    pub similarity: Option<&'a SimilarityAnalysis>,
    pub detections: &'a DetectionResults,
}

#[derive(Debug)]
pub enum ReportOutcome {
    Written {
        path: PathBuf,
        report: AnalysisReport,
    },
    Failed {
        /// `None` if the error artifact could not be written either.
        error_path: Option<PathBuf>,
        error: String,
    },
}

impl ReportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReportOutcome::Written { .. })
    }
}

pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `report.json` → `report_error.json`.
pub fn error_report_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "report".to_string());
    path.with_file_name(format!("{}_error.json", stem))
}

pub struct ReportAssembler {
    engine: SimilarityEngine,
}

impl ReportAssembler {
    pub fn new(engine: SimilarityEngine) -> Self {
        Self { engine }
    }

    pub fn assemble(&self, inputs: &ReportInputs<'_>) -> AnalysisReport {
        build_report(inputs, self.similarity_for(inputs))
    }

    fn similarity_for(&self, inputs: &ReportInputs<'_>) -> SimilarityAnalysis {
        match inputs.similarity {
            Some(analysis) => analysis.clone(),
            None => self.engine.analyze(inputs.corpus),
        }
    }

    /// Assembles and writes the report, falling back to the error artifact.
    pub fn generate(&self, inputs: &ReportInputs<'_>, path: &Path) -> ReportOutcome {
        let similarity = self.similarity_for(inputs);
        // An empty matrix means no vectorization happened in this run.
        let has_similarity = !similarity.similarity_matrix.is_empty();
        let report = build_report(inputs, similarity);
        match write_json(&report, path) {
            Ok(()) => {
                info!(path = %path.display(), "report generated");
                ReportOutcome::Written {
                    path: path.to_path_buf(),
                    report,
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(error = %message, "report generation failed");
                let error_report = ErrorReport {
                    timestamp: timestamp(),
                    error: message.clone(),
                    partial_data: PartialData {
                        processed_files: inputs.corpus.len(),
                        has_similarity,
                        ai_detection_results: report.ai_detection.len(),
                    },
                };
                let error_path = error_report_path(path);
                match write_json(&error_report, &error_path) {
                    Ok(()) => {
                        info!(path = %error_path.display(), "error report saved");
                        ReportOutcome::Failed {
                            error_path: Some(error_path),
                            error: message,
                        }
                    }
                    Err(e2) => {
                        error!(error = %format!("{:#}", e2), "error report could not be written");
                        ReportOutcome::Failed {
                            error_path: None,
                            error: message,
                        }
                    }
                }
            }
        }
    }
}

fn build_report(
    inputs: &ReportInputs<'_>,
    similarity_analysis: SimilarityAnalysis,
) -> AnalysisReport {
    AnalysisReport {
        timestamp: timestamp(),
        analyzed_files: AnalyzedFiles {
            total_found: inputs.total_found,
            successfully_processed: inputs.corpus.len(),
            file_list: inputs.corpus.file_names(),
        },
        similarity_analysis,
        ai_detection: inputs.detections.by_file_name(),
        ai_detection_unavailable: inputs.detections.unavailable(),
    }
}

/// Pretty-printed UTF-8 JSON, replacing any existing file.
pub fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionOutcome;
    use crate::models::AiDetectionResult;
    use crate::similarity::StopWords;

    fn assembler() -> ReportAssembler {
        ReportAssembler::new(SimilarityEngine::new(0.8, StopWords::English).unwrap())
    }

    #[test]
    fn error_path_replaces_extension() {
        assert_eq!(
            error_report_path(Path::new("/r/analysis_report.json")),
            PathBuf::from("/r/analysis_report_error.json")
        );
    }

    #[test]
    fn empty_batch_produces_zero_count_report() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("analysis_report.json");
        let corpus = ExtractedCorpus::default();
        let detections = DetectionResults::default();
        let outcome = assembler().generate(
            &ReportInputs {
                total_found: 0,
                corpus: &corpus,
                similarity: None,
                detections: &detections,
            },
            &path,
        );
        assert!(outcome.is_success());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["analyzed_files"]["total_found"], 0);
        assert_eq!(json["analyzed_files"]["successfully_processed"], 0);
        assert_eq!(json["similarity_analysis"]["similarity_matrix"], serde_json::json!([]));
        assert_eq!(json["similarity_analysis"]["threshold"], 0.8);
        assert_eq!(json["ai_detection"], serde_json::json!({}));
        assert!(!error_report_path(&path).exists());
    }

    #[test]
    fn detection_block_omits_unavailable_documents() {
        let corpus = ExtractedCorpus::from_texts(vec![
            ("/b/a.pdf", "rust ownership memory"),
            ("/b/b.pdf", "pasta garlic dinner"),
        ]);
        let mut detections = DetectionResults::default();
        detections.insert(
            "/b/a.pdf".into(),
            DetectionOutcome::Scored(AiDetectionResult::from_probability(70.0)),
        );
        detections.insert("/b/b.pdf".into(), DetectionOutcome::Unavailable("429".into()));

        let report = assembler().assemble(&ReportInputs {
            total_found: 3,
            corpus: &corpus,
            similarity: None,
            detections: &detections,
        });
        assert_eq!(report.analyzed_files.total_found, 3);
        assert_eq!(report.analyzed_files.file_list, vec!["a.pdf", "b.pdf"]);
        assert_eq!(report.ai_detection.len(), 1);
        assert!(report.ai_detection["a.pdf"].is_ai_generated);
        assert_eq!(report.ai_detection_unavailable, vec!["b.pdf"]);
        assert_eq!(report.similarity_analysis.similarity_matrix.len(), 2);
    }

    #[test]
    fn cached_similarity_is_reused() {
        let corpus = ExtractedCorpus::from_texts(vec![("/b/a.pdf", "rust ownership")]);
        let cached = SimilarityAnalysis {
            similar_pairs: vec![],
            similarity_matrix: vec![vec![1.0]],
            file_names: vec!["cached.pdf".into()],
            threshold: 0.42,
        };
        let detections = DetectionResults::default();
        let report = assembler().assemble(&ReportInputs {
            total_found: 1,
            corpus: &corpus,
            similarity: Some(&cached),
            detections: &detections,
        });
        assert_eq!(report.similarity_analysis, cached);
    }

    #[test]
    fn unwritable_path_yields_error_artifact_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        // A directory where the report file should go makes the write fail.
        let path = tmp.path().join("analysis_report.json");
        std::fs::create_dir(&path).unwrap();

        let corpus = ExtractedCorpus::from_texts(vec![
            ("/b/a.pdf", "rust ownership borrowing"),
            ("/b/b.pdf", "pasta garlic dinner"),
        ]);
        let mut detections = DetectionResults::default();
        detections.insert(
            "/b/a.pdf".into(),
            DetectionOutcome::Scored(AiDetectionResult::from_probability(70.0)),
        );
        detections.insert("/b/b.pdf".into(), DetectionOutcome::Unavailable("429".into()));
        let outcome = assembler().generate(
            &ReportInputs {
                total_found: 2,
                corpus: &corpus,
                similarity: None,
                detections: &detections,
            },
            &path,
        );

        let error_path = match outcome {
            ReportOutcome::Failed { error_path, .. } => error_path.unwrap(),
            other => panic!("expected failure, got {:?}", other),
        };
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&error_path).unwrap()).unwrap();
        assert!(json["error"].as_str().unwrap().contains("Failed to write report"));
        assert_eq!(json["partial_data"]["processed_files"], 2);
        // Similarity was computed during assembly even though none was cached.
        assert_eq!(json["partial_data"]["has_similarity"], true);
        // Only documents that appear in `ai_detection` are counted.
        assert_eq!(json["partial_data"]["ai_detection_results"], 1);
        assert!(path.is_dir());
    }

    #[test]
    fn error_artifact_for_empty_batch_has_no_similarity() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("analysis_report.json");
        std::fs::create_dir(&path).unwrap();

        let corpus = ExtractedCorpus::default();
        let detections = DetectionResults::default();
        let outcome = assembler().generate(
            &ReportInputs {
                total_found: 0,
                corpus: &corpus,
                similarity: None,
                detections: &detections,
            },
            &path,
        );
        assert!(!outcome.is_success());

        let json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(error_report_path(&path)).unwrap(),
        )
        .unwrap();
        assert_eq!(json["partial_data"]["has_similarity"], false);
        assert_eq!(json["partial_data"]["ai_detection_results"], 0);
    }
}
