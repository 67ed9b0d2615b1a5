//! # docsift CLI
//!
//! ```bash
//! docsift analyze ./batch --threshold 0.75
//! docsift extract ./batch
//! docsift compare ./batch a.pdf b.pdf
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsift analyze <dir>` | Extract, compare, classify, and write the JSON report |
//! | `docsift extract <dir>` | Show what text extraction yields, without network calls |
//! | `docsift compare <dir> <a> <b>` | Similarity score of two files |

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docsift::config::{self, Config};
use docsift::extract::{discover_pdfs, extract_documents, PdfPages};
use docsift::pipeline::{compare_files, Analyzer};
use docsift::progress::ProgressMode;
use docsift::report::ReportOutcome;
use docsift::similarity::SimilarityEngine;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// docsift: PDF batch similarity and AI-generated text estimation.
#[derive(Parser)]
#[command(name = "docsift", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "./config/docsift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis over a directory of PDFs.
    ///
    /// Requires the classifier credential in the environment variable named
    /// by `detection.api_key_env` (default `X_RAPIDAPI_KEY`).
    Analyze {
        /// Directory containing the PDFs.
        dir: PathBuf,

        /// Similarity threshold in [0, 1]; overrides `analysis.similarity_threshold`.
        #[arg(long)]
        threshold: Option<f64>,

        /// Maximum concurrent classification requests.
        #[arg(long)]
        workers: Option<usize>,

        /// Report path. Defaults to `<dir>/<report.file_name>`.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Extract text only and list the per-file status.
    Extract {
        dir: PathBuf,
    },

    /// Compare two files in a directory.
    Compare {
        dir: PathBuf,
        file1: String,
        file2: String,
    },
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = config.logging.file.as_ref().and_then(|path| {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let name = path.file_name()?;
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Failed to create log directory {}: {}", dir.display(), e);
            return None;
        }
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        let _ = LOG_GUARD.set(guard);
        Some(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;
    init_logging(&cfg);

    match cli.command {
        Commands::Analyze {
            dir,
            threshold,
            workers,
            output,
            progress,
        } => {
            if let Some(t) = threshold {
                cfg.analysis.similarity_threshold = t;
            }
            if let Some(w) = workers {
                cfg.detection.workers = Some(w);
            }
            run_analyze(&cfg, &dir, output, progress.unwrap_or_else(ProgressMode::default_for_tty))
                .await?;
        }
        Commands::Extract { dir } => run_extract(&dir)?,
        Commands::Compare { dir, file1, file2 } => {
            let engine = SimilarityEngine::from_config(&cfg.analysis)?;
            let score = compare_files(&dir, &file1, &file2, &engine, &PdfPages)?;
            println!("{}  {}  similarity: {:.4}", file1, file2, score);
        }
    }

    Ok(())
}

async fn run_analyze(
    cfg: &Config,
    dir: &Path,
    output: Option<PathBuf>,
    progress: ProgressMode,
) -> Result<()> {
    let mut analyzer = Analyzer::new(dir, cfg)?.with_progress(progress.reporter());
    if let Some(path) = output {
        analyzer = analyzer.with_report_path(path);
    }
    info!(files = analyzer.pdf_files().len(), report = %analyzer.report_path().display(), "starting analysis");

    let outcome = analyzer.run().await;
    match outcome.report {
        ReportOutcome::Written { path, report } => {
            println!("analyze {}", dir.display());
            println!("  files found: {}", report.analyzed_files.total_found);
            println!(
                "  successfully processed: {}",
                report.analyzed_files.successfully_processed
            );
            println!(
                "  similar pairs (>= {}): {}",
                report.similarity_analysis.threshold,
                report.similarity_analysis.similar_pairs.len()
            );
            for pair in &report.similarity_analysis.similar_pairs {
                println!(
                    "    {}  {}  {:.4}",
                    pair.file1, pair.file2, pair.similarity_score
                );
            }
            println!("  ai detection:");
            for (name, result) in &report.ai_detection {
                println!(
                    "    {}  {:.1}%  {}",
                    name,
                    result.ai_probability,
                    if result.is_ai_generated { "ai" } else { "human" }
                );
            }
            for name in &report.ai_detection_unavailable {
                println!("    {}  unavailable", name);
            }
            println!("  report: {}", path.display());
            println!("ok");
            Ok(())
        }
        ReportOutcome::Failed { error_path, error } => match error_path {
            Some(p) => bail!("Analysis failed: {} (error report: {})", error, p.display()),
            None => bail!("Analysis failed: {}", error),
        },
    }
}

fn run_extract(dir: &Path) -> Result<()> {
    let paths = discover_pdfs(dir)?;
    let documents = extract_documents(&PdfPages, &paths);
    let extracted = documents.iter().filter(|d| d.text.is_some()).count();

    println!("extract {}", dir.display());
    println!("  files found: {}", documents.len());
    println!("  extracted: {}", extracted);
    for doc in &documents {
        let chars = doc.text.as_ref().map(|t| t.chars().count()).unwrap_or(0);
        println!("    {}  {}  {} chars", doc.name(), doc.status.as_str(), chars);
    }
    Ok(())
}
