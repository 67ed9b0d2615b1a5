//! # docsift
//!
//! Batch analysis of PDF documents: pairwise textual similarity and an
//! estimate of whether each document's text is machine-generated, written
//! out as one JSON report.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   extract   │──▶│  similarity  │──▶│              │
//! │ PDF → text  │   │ TF-IDF+cos   │   │    report    │
//! │             │──▶│  detection   │──▶│  JSON / err  │
//! └─────────────┘   │ worker pool  │   └──────────────┘
//!                   └──────────────┘
//! ```
//!
//! Similarity and detection both read the extracted corpus and run
//! concurrently; the report waits for both.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Documents, similarity and detection results, report shapes |
//! | [`extract`] | PDF discovery and per-document text extraction |
//! | [`similarity`] | TF-IDF vectors and the pairwise cosine matrix |
//! | [`scoring`] | Heuristic scoring of classifier replies |
//! | [`detection`] | Classification client, retry policy, worker pool |
//! | [`report`] | Report assembly and the error artifact |
//! | [`pipeline`] | A complete analysis run |
//! | [`progress`] | Run progress on stderr |

pub mod config;
pub mod detection;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod scoring;
pub mod similarity;
