//! PDF discovery and per-document text extraction.
//!
//! Extraction is isolated per file: a PDF that cannot be opened or parsed
//! (including one that makes the parser panic) is recorded as
//! [`ExtractionStatus::Failed`] and the batch carries on. Documents whose
//! concatenated page text is blank are recorded as [`ExtractionStatus::Empty`].
//! Only successful documents enter the [`ExtractedCorpus`] used downstream.

use anyhow::{bail, Result};
use globset::{Glob, GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::models::{file_name, Document, ExtractionStatus};

/// Extraction error. Never propagated past [`extract_documents`].
#[derive(Debug)]
pub enum ExtractError {
    Io(String),
    Pdf(String),
    Panicked(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io(e) => write!(f, "failed to read file: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Panicked(e) => write!(f, "PDF parser panicked: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Produces the text of each page of a document, in page order.
///
/// A page without extractable text is an empty string, not an error.
pub trait PageTextSource: Send + Sync {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, ExtractError>;
}

/// [`PageTextSource`] backed by `pdf-extract`.
pub struct PdfPages;

impl PageTextSource for PdfPages {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
        extract_pdf_pages(&bytes)
    }
}

/// Extracts the text of an in-memory PDF.
///
/// `pdf-extract` emits pages in order with form feeds between them, so the
/// whole document comes back as a single entry. Panics inside the parser on
/// malformed input are reported as [`ExtractError::Panicked`].
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(vec![text]),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ExtractError::Panicked(msg))
        }
    }
}

/// Lists `*.pdf` files directly inside `dir` (non-recursive), sorted by path
/// so document ordering is stable across runs.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Invalid folder: {}", dir.display());
    }

    let matcher = pdf_matcher()?;
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if matcher.is_match(entry.file_name()) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();

    info!(count = files.len(), dir = %dir.display(), "found PDFs");
    Ok(files)
}

fn pdf_matcher() -> Result<GlobMatcher> {
    let glob: Glob = GlobBuilder::new("*.pdf").case_insensitive(true).build()?;
    Ok(glob.compile_matcher())
}

/// Extracts every file independently. The returned documents keep the
/// order of `paths`.
pub fn extract_documents(source: &dyn PageTextSource, paths: &[PathBuf]) -> Vec<Document> {
    if paths.is_empty() {
        warn!("no PDFs to process");
    }

    paths
        .iter()
        .map(|path| extract_document(source, path))
        .collect()
}

fn extract_document(source: &dyn PageTextSource, path: &Path) -> Document {
    let name = file_name(path);
    match source.page_texts(path) {
        Ok(pages) => {
            let text = pages.concat();
            if text.trim().is_empty() {
                warn!(file = %name, "no text");
                Document {
                    path: path.to_path_buf(),
                    text: None,
                    status: ExtractionStatus::Empty,
                }
            } else {
                info!(file = %name, pages = pages.len(), chars = text.chars().count(), "extracted text");
                Document {
                    path: path.to_path_buf(),
                    text: Some(text),
                    status: ExtractionStatus::Success,
                }
            }
        }
        Err(e) => {
            error!(file = %name, error = %e, "extraction failed");
            Document {
                path: path.to_path_buf(),
                text: None,
                status: ExtractionStatus::Failed,
            }
        }
    }
}

/// Successfully extracted documents, in extraction order.
///
/// This ordering indexes the similarity matrix and the report's file list,
/// so it is never re-sorted after construction.
#[derive(Debug, Clone, Default)]
pub struct ExtractedCorpus {
    entries: Vec<(PathBuf, String)>,
}

impl ExtractedCorpus {
    pub fn from_documents(documents: &[Document]) -> Self {
        let entries = documents
            .iter()
            .filter_map(|d| d.text.as_ref().map(|t| (d.path.clone(), t.clone())))
            .collect();
        Self { entries }
    }

    /// Builds a corpus directly from `(path, text)` pairs, skipping blank texts.
    pub fn from_texts<I, P, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let entries = items
            .into_iter()
            .map(|(p, s)| (p.into(), s.into()))
            .filter(|(_, s)| !s.trim().is_empty())
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.entries.iter().map(|(p, t)| (p.as_path(), t.as_str()))
    }

    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, t)| t.as_str()).collect()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.entries.iter().map(|(p, _)| file_name(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakePages(HashMap<PathBuf, Result<Vec<String>, String>>);

    impl PageTextSource for FakePages {
        fn page_texts(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
            match self.0.get(path) {
                Some(Ok(pages)) => Ok(pages.clone()),
                Some(Err(e)) => Err(ExtractError::Pdf(e.clone())),
                None => Err(ExtractError::Io("missing".into())),
            }
        }
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pdf_pages(b"not a pdf").unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Pdf(_) | ExtractError::Panicked(_)
        ));
    }

    #[test]
    fn pages_concatenate_in_order_and_failures_are_isolated() {
        let mut map = HashMap::new();
        map.insert(
            PathBuf::from("/b/one.pdf"),
            Ok(vec!["alpha ".into(), String::new(), "beta".into()]),
        );
        map.insert(PathBuf::from("/b/two.pdf"), Err("xref broken".into()));
        map.insert(PathBuf::from("/b/three.pdf"), Ok(vec!["  \n ".into()]));
        map.insert(PathBuf::from("/b/four.pdf"), Ok(vec!["gamma".into()]));
        let source = FakePages(map);

        let paths: Vec<PathBuf> = ["one", "two", "three", "four"]
            .iter()
            .map(|n| PathBuf::from(format!("/b/{}.pdf", n)))
            .collect();
        let docs = extract_documents(&source, &paths);

        assert_eq!(docs.len(), 4);
        assert_eq!(docs[0].text.as_deref(), Some("alpha beta"));
        assert_eq!(docs[1].status, ExtractionStatus::Failed);
        assert_eq!(docs[2].status, ExtractionStatus::Empty);
        assert!(docs[2].text.is_none());

        let corpus = ExtractedCorpus::from_documents(&docs);
        assert_eq!(corpus.file_names(), vec!["one.pdf", "four.pdf"]);
    }

    #[test]
    fn discover_lists_only_top_level_pdfs_sorted() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.pdf"), b"x").unwrap();
        std::fs::write(tmp.path().join("a.PDF"), b"x").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("nested").join("c.pdf"), b"x").unwrap();

        let found = discover_pdfs(tmp.path()).unwrap();
        let names: Vec<String> = found.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn discover_rejects_missing_directory() {
        assert!(discover_pdfs(Path::new("/definitely/not/here")).is_err());
    }
}
