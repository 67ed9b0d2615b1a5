//! TF-IDF vectorization and pairwise cosine similarity.
//!
//! The vectorizer follows the common scikit-learn defaults so scores are
//! comparable with other tooling:
//!
//! - tokens match `\b\w\w+\b` after lowercasing
//! - stop-words are dropped from the vocabulary
//! - term frequency is the raw count
//! - `idf(t) = ln((1 + n) / (1 + df(t))) + 1` (smoothed)
//! - rows are L2-normalized, so cosine similarity is a dot product
//!
//! The vocabulary is kept in a `BTreeMap` and every sum runs in a fixed
//! order, so the matrix for a given corpus is reproducible bit for bit.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::{error, info, warn};

use crate::config::{validate_threshold, AnalysisConfig};
use crate::extract::ExtractedCorpus;
use crate::models::{SimilarPair, SimilarityAnalysis};

#[derive(Debug, thiserror::Error)]
pub enum SimilarityError {
    #[error("empty vocabulary; documents contain only stop words or no word tokens")]
    EmptyVocabulary,
    #[error("comparison needs two documents")]
    NotEnoughDocuments,
    #[error("token pattern failed to compile: {0}")]
    Tokenizer(String),
}

/// Stop-word list applied while building the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopWords {
    English,
    None,
}

impl StopWords {
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "english" => Ok(StopWords::English),
            "none" => Ok(StopWords::None),
            other => anyhow::bail!(
                "Unknown stop-word language: '{}'. Must be english or none.",
                other
            ),
        }
    }

    fn contains(&self, token: &str) -> bool {
        match self {
            StopWords::English => english_stop_words().contains(token),
            StopWords::None => false,
        }
    }
}

fn token_pattern() -> Result<&'static Regex, SimilarityError> {
    static TOKEN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(r"\b\w\w+\b"))
        .as_ref()
        .map_err(|e| SimilarityError::Tokenizer(e.to_string()))
}

/// Lowercased word tokens of at least two characters, stop-words removed.
pub fn tokenize(text: &str, stop_words: StopWords) -> Result<Vec<String>, SimilarityError> {
    let re = token_pattern()?;
    let lowered = text.to_lowercase();
    Ok(re
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !stop_words.contains(t))
        .map(str::to_string)
        .collect())
}

/// Sparse L2-normalized TF-IDF row: `(term index, weight)` sorted by index.
type SparseRow = Vec<(usize, f64)>;

fn tfidf_rows(texts: &[&str], stop_words: StopWords) -> Result<Vec<SparseRow>, SimilarityError> {
    let tokenized = texts
        .iter()
        .map(|t| tokenize(t, stop_words))
        .collect::<Result<Vec<_>, _>>()?;

    let mut vocabulary: BTreeMap<&str, usize> = BTreeMap::new();
    for tokens in &tokenized {
        for token in tokens {
            vocabulary.entry(token.as_str()).or_insert(0);
        }
    }
    if vocabulary.is_empty() {
        return Err(SimilarityError::EmptyVocabulary);
    }
    for (index, slot) in vocabulary.values_mut().enumerate() {
        *slot = index;
    }

    let mut counts: Vec<BTreeMap<usize, f64>> = Vec::with_capacity(tokenized.len());
    let mut doc_freq = vec![0usize; vocabulary.len()];
    for tokens in &tokenized {
        let mut row: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokens {
            *row.entry(vocabulary[token.as_str()]).or_insert(0.0) += 1.0;
        }
        for &term in row.keys() {
            doc_freq[term] += 1;
        }
        counts.push(row);
    }

    let n = texts.len() as f64;
    let idf: Vec<f64> = doc_freq
        .iter()
        .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
        .collect();

    let rows = counts
        .into_iter()
        .map(|row| {
            let weighted: SparseRow = row.into_iter().map(|(t, tf)| (t, tf * idf[t])).collect();
            let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                weighted.into_iter().map(|(t, w)| (t, w / norm)).collect()
            } else {
                weighted
            }
        })
        .collect();
    Ok(rows)
}

fn sparse_dot(a: &SparseRow, b: &SparseRow) -> f64 {
    let (mut i, mut j, mut dot) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

/// Full cosine-similarity matrix over `texts`.
///
/// Symmetric, entries clamped to `[0, 1]`, diagonal exactly `1.0`.
pub fn similarity_matrix(
    texts: &[&str],
    stop_words: StopWords,
) -> Result<Vec<Vec<f64>>, SimilarityError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let rows = tfidf_rows(texts, stop_words)?;
    let n = rows.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let score = sparse_dot(&rows[i], &rows[j]).clamp(0.0, 1.0);
            matrix[i][j] = score;
            matrix[j][i] = score;
        }
    }
    Ok(matrix)
}

/// Pairs `(i, j)`, `i < j`, with `matrix[i][j] >= threshold`.
pub fn similar_pairs(matrix: &[Vec<f64>], names: &[String], threshold: f64) -> Vec<SimilarPair> {
    let mut pairs = Vec::new();
    for i in 0..matrix.len() {
        for j in (i + 1)..matrix.len() {
            if matrix[i][j] >= threshold {
                pairs.push(SimilarPair {
                    file1: names[i].clone(),
                    file2: names[j].clone(),
                    similarity_score: matrix[i][j],
                });
            }
        }
    }
    pairs
}

#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    threshold: f64,
    stop_words: StopWords,
}

impl SimilarityEngine {
    pub fn new(threshold: f64, stop_words: StopWords) -> anyhow::Result<Self> {
        validate_threshold(threshold)?;
        Ok(Self {
            threshold,
            stop_words,
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> anyhow::Result<Self> {
        Self::new(
            config.similarity_threshold,
            StopWords::parse(&config.stop_words)?,
        )
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn try_analyze(
        &self,
        corpus: &ExtractedCorpus,
    ) -> Result<SimilarityAnalysis, SimilarityError> {
        if corpus.is_empty() {
            return Ok(SimilarityAnalysis::empty(self.threshold));
        }
        let file_names = corpus.file_names();
        let matrix = similarity_matrix(&corpus.texts(), self.stop_words)?;
        let similar_pairs = similar_pairs(&matrix, &file_names, self.threshold);
        Ok(SimilarityAnalysis {
            similar_pairs,
            similarity_matrix: matrix,
            file_names,
            threshold: self.threshold,
        })
    }

    /// Like [`try_analyze`](Self::try_analyze), but a failure degrades to an
    /// empty analysis instead of aborting the run.
    pub fn analyze(&self, corpus: &ExtractedCorpus) -> SimilarityAnalysis {
        if corpus.is_empty() {
            warn!("no content for similarity analysis");
            return SimilarityAnalysis::empty(self.threshold);
        }
        match self.try_analyze(corpus) {
            Ok(analysis) => {
                info!(pairs = analysis.similar_pairs.len(), "found similar pairs");
                analysis
            }
            Err(e) => {
                error!(error = %e, "similarity calculation failed");
                SimilarityAnalysis::empty(self.threshold)
            }
        }
    }

    /// Similarity of two texts, vectorized over just those two.
    pub fn compare(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        let matrix = similarity_matrix(&[a, b], self.stop_words)?;
        matrix
            .first()
            .and_then(|row| row.get(1))
            .copied()
            .ok_or(SimilarityError::NotEnoughDocuments)
    }
}

fn english_stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| ENGLISH_STOP_WORDS.iter().copied().collect())
}

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into",
    "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd",
    "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover",
    "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither",
    "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
    "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
    "seeming", "seems", "serious", "several", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the",
    "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together",
    "too", "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up",
    "upon", "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when",
    "whence", "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon",
    "wherever", "whether", "which", "while", "whither", "who", "whoever", "whole", "whom",
    "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
    "yourself", "yourselves",
];
