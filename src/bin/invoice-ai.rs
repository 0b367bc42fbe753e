//! CLI binary for invoice-ai.
//!
//! A thin shell over the library crate: maps flags to `PipelineConfig`,
//! runs the batch on a `BatchWorker`, polls it, prints rows and writes the
//! requested exports.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice_ai::{
    write_csv, write_json, write_sqlite, write_xlsx, BatchWorker, ExportError, InvoiceProcessor,
    PipelineConfig, ProcessedInvoice, ProviderCredentials, ResultRecord, WorkerEvent,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Longest edge of preview thumbnails.
const PREVIEW_SIZE: u32 = 500;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract fields and print them
  invoice-ai scan1.pdf scan2.png

  # Export everything that was extracted
  invoice-ai invoices/*.pdf --csv out.csv --xlsx out.xlsx --json out.json --db invoices.db

  # Save 500x500 previews next to the results
  invoice-ai invoices/*.pdf --preview-dir previews/

  # Add an edgequake-llm provider as the last link of both chains
  invoice-ai scan.pdf --llm-provider openai --llm-model gpt-4.1-nano

FALLBACK ORDER:
  OCR         deepseek (vision) → tesseract → puter → [--llm-provider]
              first text longer than --ocr-min-chars wins
  Extraction  deepseek → openrouter → [--llm-provider]
              first JSON object wins, else {"raw_text", "note"}

ENVIRONMENT VARIABLES:
  DEEPSEEK_API_KEY        DeepSeek API key (OCR + extraction)
  OPENROUTER_API_KEY      OpenRouter API key (extraction)
  DEEPSEEK_BASE_URL       Override the DeepSeek API root
  OPENROUTER_BASE_URL     Override the OpenRouter API root
  PUTER_BASE_URL          Override the Puter API root
  PDFIUM_LIB_PATH         Path to libpdfium (default: system library)
  RUST_LOG                Override log filtering

  A .env file in the working directory is read on startup.
"#;

/// Extract structured fields from scanned invoices with OCR and LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-ai",
    version,
    about = "Extract structured fields from scanned invoices with OCR and LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or image files to process, in order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Write all rows to a CSV file.
    #[arg(long, env = "INVOICE_AI_CSV")]
    csv: Option<PathBuf>,

    /// Write all rows to an Excel workbook.
    #[arg(long, env = "INVOICE_AI_XLSX")]
    xlsx: Option<PathBuf>,

    /// Write all rows to a JSON file.
    #[arg(long, env = "INVOICE_AI_JSON")]
    json: Option<PathBuf>,

    /// Append all rows to the `invoices` table of a SQLite database.
    #[arg(long, env = "INVOICE_AI_DB")]
    db: Option<PathBuf>,

    /// Save a thumbnail of each processed invoice into this directory.
    #[arg(long, env = "INVOICE_AI_PREVIEW_DIR")]
    preview_dir: Option<PathBuf>,

    /// How often to poll the worker queue, in milliseconds.
    #[arg(long, env = "INVOICE_AI_POLL_MS", default_value_t = 100,
          value_parser = clap::value_parser!(u64).range(1..=10_000))]
    poll_ms: u64,

    /// OCR text must be longer than this many characters to be accepted.
    #[arg(long, env = "INVOICE_AI_OCR_MIN_CHARS", default_value_t = 20)]
    ocr_min_chars: usize,

    /// Per-request timeout for network providers, in seconds.
    #[arg(long, env = "INVOICE_AI_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Extra edgequake-llm provider: openai, anthropic, gemini, ollama, …
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    llm_provider: Option<String>,

    /// Model for --llm-provider (default: gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    llm_model: Option<String>,

    /// Disable progress bar.
    #[arg(long, env = "INVOICE_AI_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_AI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE_AI_QUIET")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the feedback when active; keep library INFO logs
    // out of its way.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let processor =
        Arc::new(InvoiceProcessor::new(config).context("Failed to set up providers")?);

    if let Some(ref dir) = cli.preview_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create preview directory {:?}", dir))?;
    }

    // ── Run the batch ────────────────────────────────────────────────────
    let start = Instant::now();
    let bar = progress_bar(cli.files.len(), show_progress);
    let mut worker = BatchWorker::spawn(processor, cli.files.clone())
        .context("Failed to start background worker")?;

    let mut records: Vec<ResultRecord> = Vec::new();
    let mut failed = 0;
    while let Some(event) = worker.poll(Duration::from_millis(cli.poll_ms)) {
        match event {
            WorkerEvent::Processed(invoice) => {
                report_invoice(&bar, &invoice, cli.quiet);
                if let Some(ref dir) = cli.preview_dir {
                    save_preview(&bar, &invoice, dir);
                }
                records.extend(invoice.records());
                bar.inc(1);
            }
            WorkerEvent::Failed {
                file_name, error, ..
            } => {
                failed += 1;
                bar.suspend(|| {
                    eprintln!("  {} {}  {}", red("✗"), file_name, red(&error.to_string()))
                });
                bar.inc(1);
            }
            WorkerEvent::Finished { processed, failed } => {
                bar.finish_and_clear();
                if !cli.quiet {
                    eprintln!(
                        "{} {}/{} files processed  {}",
                        if failed == 0 { green("✔") } else { cyan("⚠") },
                        bold(&processed.to_string()),
                        processed + failed,
                        dim(&format!("{}ms", start.elapsed().as_millis())),
                    );
                }
            }
        }
    }
    worker.join().context("Background worker failed")?;

    // ── Exports ──────────────────────────────────────────────────────────
    if records.is_empty() {
        if cli.csv.is_some() || cli.xlsx.is_some() || cli.json.is_some() || cli.db.is_some() {
            eprintln!("{} No rows to export", cyan("⚠"));
        }
    } else {
        export(&cli, &records)?;
    }

    if failed > 0 && failed == cli.files.len() {
        anyhow::bail!("All {} files failed", failed);
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .credentials(ProviderCredentials::from_env())
        .ocr_min_chars(cli.ocr_min_chars)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref name) = cli.llm_provider {
        builder = builder.llm_provider_name(name.clone());
    }
    if let Some(ref model) = cli.llm_model {
        builder = builder.llm_model(model.clone());
    }

    builder.build().context("Invalid configuration")
}

fn progress_bar(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  \
         [{bar:42.green/238}] {pos:>3}/{len} files  \
         ⏱ {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Processing");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Print one invoice's rows to stdout.
fn report_invoice(bar: &ProgressBar, invoice: &ProcessedInvoice, quiet: bool) {
    bar.suspend(|| {
        if !quiet {
            let via = match (&invoice.ocr.provider, &invoice.extraction_provider) {
                (Some(o), Some(e)) => format!("ocr: {o}, extraction: {e}"),
                (None, Some(e)) => format!("no OCR text, extraction: {e}"),
                (Some(o), None) => format!("ocr: {o}, extraction failed"),
                (None, None) => "no OCR text, extraction failed".to_string(),
            };
            eprintln!(
                "  {} {}  {}",
                if invoice.extraction_provider.is_some() {
                    green("✓")
                } else {
                    cyan("⚠")
                },
                bold(&invoice.file_name),
                dim(&format!("{} · {}", invoice.language, via)),
            );
        }
        for row in &invoice.rows {
            println!(
                "{}\t{}\t{}\t{}",
                invoice.file_name, row.field, row.value, row.confidence
            );
        }
    });
}

fn save_preview(bar: &ProgressBar, invoice: &ProcessedInvoice, dir: &Path) {
    let stem = Path::new(&invoice.file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| invoice.file_name.clone());
    let path = dir.join(format!("{stem}.png"));
    if let Err(e) = invoice.thumbnail(PREVIEW_SIZE).save(&path) {
        bar.suspend(|| {
            eprintln!(
                "  {} preview {} not saved: {}",
                cyan("⚠"),
                path.display(),
                e
            )
        });
    }
}

type Exporter = fn(&[ResultRecord], &Path) -> Result<usize, ExportError>;

fn export(cli: &Cli, records: &[ResultRecord]) -> Result<()> {
    let targets: [(&Option<PathBuf>, &str, Exporter); 4] = [
        (&cli.csv, "CSV", write_csv),
        (&cli.xlsx, "Excel", write_xlsx),
        (&cli.json, "JSON", write_json),
        (&cli.db, "SQLite", write_sqlite),
    ];

    for (path, label, write) in targets {
        if let Some(path) = path {
            let n = write(records, path)
                .with_context(|| format!("{} export to {:?} failed", label, path))?;
            if !cli.quiet {
                eprintln!(
                    "{} {} rows  →  {}",
                    green("✔"),
                    n,
                    bold(&path.display().to_string())
                );
            }
        }
    }
    Ok(())
}
