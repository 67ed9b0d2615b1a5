//! One analysis run over a directory of PDFs.
//!
//! ```text
//! discover ──▶ extract ──┬──▶ similarity (blocking pool) ──┐
//!                        └──▶ AI detection (worker pool) ──┴──▶ report
//! ```
//!
//! Construction validates everything that can make a run impossible (input
//! directory, threshold, credential); after that, only failing to persist
//! the report makes a run fail, and even then an error artifact is written.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::detection::AiDetector;
use crate::extract::{discover_pdfs, extract_documents, ExtractedCorpus, PageTextSource, PdfPages};
use crate::models::{Document, SimilarityAnalysis};
use crate::progress::{AnalysisPhase, AnalysisProgress, NoProgress, ProgressReporter};
use crate::report::{ReportAssembler, ReportInputs, ReportOutcome};
use crate::similarity::SimilarityEngine;

/// Result of [`Analyzer::run`].
#[derive(Debug)]
pub struct RunOutcome {
    pub documents: Vec<Document>,
    pub report: ReportOutcome,
}

pub struct Analyzer {
    pdf_files: Vec<PathBuf>,
    engine: SimilarityEngine,
    detector: Arc<AiDetector>,
    source: Arc<dyn PageTextSource>,
    report_path: PathBuf,
    progress: Box<dyn ProgressReporter>,
}

impl Analyzer {
    /// Builds an analyzer reading the credential from the configured
    /// environment variable.
    pub fn new(folder: &Path, config: &Config) -> Result<Self> {
        let api_key = config.detection.api_key()?;
        Self::with_api_key(folder, config, api_key)
    }

    pub fn with_api_key(folder: &Path, config: &Config, api_key: String) -> Result<Self> {
        config.validate()?;
        if api_key.trim().is_empty() {
            bail!("API key required");
        }
        let engine = SimilarityEngine::from_config(&config.analysis)?;
        let pdf_files = discover_pdfs(folder)?;
        let detector = AiDetector::new(&config.detection, api_key)?;

        Ok(Self {
            pdf_files,
            engine,
            detector: Arc::new(detector),
            source: Arc::new(PdfPages),
            report_path: folder.join(&config.report.file_name),
            progress: Box::new(NoProgress),
        })
    }

    pub fn with_page_source(mut self, source: Arc<dyn PageTextSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_report_path(mut self, path: PathBuf) -> Self {
        self.report_path = path;
        self
    }

    pub fn pdf_files(&self) -> &[PathBuf] {
        &self.pdf_files
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    pub async fn run(&self) -> RunOutcome {
        self.progress.report(AnalysisProgress::new(
            AnalysisPhase::Initializing,
            "Initializing analysis",
        ));

        let documents = self.extract().await;
        let corpus = Arc::new(ExtractedCorpus::from_documents(&documents));
        self.progress.report(
            AnalysisProgress::new(AnalysisPhase::Extracted, "Text extracted")
                .with_count(corpus.len() as u64),
        );

        let (similarity, detections) = tokio::join!(
            self.similarity(corpus.clone()),
            self.detector.detect_all(corpus.clone())
        );
        // Both branches have finished; phases are reported in order.
        if similarity.is_some() {
            self.progress.report(AnalysisProgress::new(
                AnalysisPhase::SimilarityCalculated,
                "Similarity calculated",
            ));
        }
        self.progress.report(
            AnalysisProgress::new(AnalysisPhase::DetectionCompleted, "AI detection completed")
                .with_count(corpus.len() as u64),
        );

        let inputs = ReportInputs {
            total_found: self.pdf_files.len(),
            corpus: &corpus,
            similarity: similarity.as_ref(),
            detections: &detections,
        };
        let report = ReportAssembler::new(self.engine.clone()).generate(&inputs, &self.report_path);

        match &report {
            ReportOutcome::Written { path, .. } => {
                self.progress.report(AnalysisProgress::new(
                    AnalysisPhase::Complete,
                    format!("Report written to {}", path.display()),
                ));
            }
            ReportOutcome::Failed { error, .. } => {
                self.progress.report(AnalysisProgress::new(
                    AnalysisPhase::Failed,
                    format!("Analysis failed: {}", error),
                ));
            }
        }

        RunOutcome { documents, report }
    }

    async fn extract(&self) -> Vec<Document> {
        let source = self.source.clone();
        let paths = self.pdf_files.clone();
        match tokio::task::spawn_blocking(move || extract_documents(source.as_ref(), &paths)).await
        {
            Ok(documents) => documents,
            Err(e) => {
                error!(error = %e, "extraction task failed");
                Vec::new()
            }
        }
    }

    async fn similarity(&self, corpus: Arc<ExtractedCorpus>) -> Option<SimilarityAnalysis> {
        let engine = self.engine.clone();
        let result = tokio::task::spawn_blocking(move || engine.analyze(&corpus)).await;
        match result {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                error!(error = %e, "similarity task failed");
                None
            }
        }
    }
}

/// Similarity score of two files inside `folder`, vectorized over just the pair.
pub fn compare_files(
    folder: &Path,
    file1: &str,
    file2: &str,
    engine: &SimilarityEngine,
    source: &dyn PageTextSource,
) -> Result<f64> {
    let paths = [folder.join(file1), folder.join(file2)];
    for path in &paths {
        if !path.is_file() {
            bail!("File not found: {}", path.display());
        }
    }

    let documents = extract_documents(source, &paths);
    let texts: Vec<&str> = documents
        .iter()
        .map(|d| d.text.as_deref().unwrap_or(""))
        .collect();
    let score = engine
        .compare(texts[0], texts[1])
        .with_context(|| format!("Comparison failed for {} and {}", file1, file2))?;

    info!(file1, file2, score, "compared files");
    Ok(score)
}
