//! CLI binary for saps-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one document and prints the terminal record.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use saps_extract::{
    resolve_service, BatchOutcome, DataOrigin, DirectorySink, DocumentRef, ExtractionConfig,
    ExtractionFieldSet, ExtractionPipeline, ExtractionProgressCallback, NoopSink, PersistenceSink,
    PipelineProgress, ProgressCallback, StaticImageSource,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner until the batch count is known, then a bar
/// with one log line per batch.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Listing page images…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} batches  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, batch_index: usize, total_batches: usize) {
        if self.bar.length() != Some(total_batches as u64) {
            self.activate_bar(total_batches);
        }
        self.bar.set_message(format!("batch {batch_index}"));
    }

    fn on_batch_complete(&self, outcome: &BatchOutcome, _progress: &PipelineProgress) {
        if outcome.success {
            let schema = outcome
                .schema
                .map(|s| format!("{s:?}").to_lowercase())
                .unwrap_or_default();
            self.bar.println(format!(
                "  {} Batch {:>2}/{:<2}  {}  {}  {}",
                green("✓"),
                outcome.batch_index,
                outcome.total_batches,
                dim(&format!("{:>3} pages", outcome.image_count)),
                dim(&format!("{schema:<6}")),
                dim(&format!("{:.1}s", outcome.duration_ms as f64 / 1000.0)),
            ));
        }
        self.bar.inc(1);
    }

    fn on_batch_error(&self, batch_index: usize, total_batches: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            let mut short: String = error.chars().take(79).collect();
            short.push('\u{2026}');
            short
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Batch {:>2}/{:<2}  {}",
            red("✗"),
            batch_index,
            total_batches,
            red(&msg),
        ));
    }

    fn on_complete(&self, record: &ExtractionFieldSet) {
        self.bar.finish_and_clear();
        match record.origin {
            DataOrigin::Extracted => eprintln!("{} Extraction complete", green("✔")),
            DataOrigin::Augmented => eprintln!(
                "{} Extraction partial; placeholder data used for {}",
                yellow("⚠"),
                record.synthesized_fields.join(", ")
            ),
            DataOrigin::Synthetic => eprintln!(
                "{} No usable data extracted; record is entirely placeholder data",
                red("✘")
            ),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Page images listed in a manifest (one URL per line)
  saps-extract --file kerelem.pdf --manifest pages.txt

  # Page images on the command line, no original upload at hand
  saps-extract --file-name kerelem.pdf --file-size 482113 \
      --image https://cdn.example.com/saps/p1.png \
      --image https://cdn.example.com/saps/p2.png

  # Keep batch logs, raw replies and the final record on disk
  saps-extract --file kerelem.pdf --manifest pages.txt --output-dir runs/

  # Another vision provider through edgequake-llm
  saps-extract --provider openai --model gpt-4.1 --file kerelem.pdf --manifest pages.txt

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       Anthropic API key (default service)
  ANTHROPIC_BASE_URL      Override the Messages API base URL
  EDGEQUAKE_LLM_PROVIDER  Provider used when ANTHROPIC_API_KEY is unset
  EDGEQUAKE_MODEL         Model ID for that provider
  RUST_LOG                Override the log filter
"#;

/// Extract structured farm data from a scanned SAPS application.
#[derive(Parser, Debug)]
#[command(
    name = "saps-extract",
    version,
    about = "Extract structured farm data from scanned SAPS subsidy documents using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// The original upload; supplies file name, size and signature.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Upload file name, when --file is not given.
    #[arg(long, required_unless_present = "file")]
    file_name: Option<String>,

    /// Upload size in bytes, when --file is not given.
    #[arg(long, required_unless_present = "file")]
    file_size: Option<u64>,

    /// Document identifier used for logs and output files.
    #[arg(long, env = "SAPS_DOCUMENT_ID")]
    document_id: Option<String>,

    /// Uploading user; seeds placeholder data.
    #[arg(long, env = "SAPS_USER_ID", default_value = "cli")]
    user_id: String,

    /// Page image URL (repeatable, in page order).
    #[arg(long = "image")]
    images: Vec<String>,

    /// Text file with one page image URL per line.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Page images per model call (1–100).
    #[arg(long, env = "SAPS_BATCH_SIZE", default_value_t = 20)]
    batch_size: usize,

    /// Vision model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Provider: anthropic (direct), or any edgequake-llm provider name.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Max output tokens per call.
    #[arg(long, env = "SAPS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries when the service reports overload.
    #[arg(long, env = "SAPS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call timeout in seconds (default scales with batch size).
    #[arg(long, env = "SAPS_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Stop submitting batches after this many seconds.
    #[arg(long, env = "SAPS_DEADLINE")]
    deadline: Option<u64>,

    /// Submit every batch even once all required fields are known.
    #[arg(long)]
    no_early_exit: bool,

    /// Write batch logs, raw replies and the record under this directory.
    #[arg(short, long, env = "SAPS_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Print the full ExtractionOutput instead of only the record.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SAPS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SAPS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SAPS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless verbose output was asked for.
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

    // ── Describe the document ────────────────────────────────────────────
    let doc = describe_document(&cli).await?;
    let mut urls = cli.images.clone();
    if let Some(ref path) = cli.manifest {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read manifest {:?}", path))?;
        urls.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from),
        );
    }
    let images = StaticImageSource::new().with_document(doc.id.clone(), urls);

    // ── Build pipeline ───────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let service = resolve_service(&config, cli.provider.as_deref())
        .context("No extraction service available")?;
    let sink: Arc<dyn PersistenceSink> = match cli.output_dir {
        Some(ref dir) => Arc::new(DirectorySink::new(dir)),
        None => Arc::new(NoopSink),
    };
    let pipeline = ExtractionPipeline::new(config, service, Arc::new(images), sink);

    // Ctrl-C stops after the batch in flight; the partial record is kept.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    // ── Run extraction ───────────────────────────────────────────────────
    let output = pipeline
        .process(&doc, &cancel)
        .await
        .context("Extraction failed")?;

    let json = if cli.json {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string_pretty(&output.record)
    }
    .context("Failed to serialise output")?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}").context("Failed to write to stdout")?;

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "   {}/{} batches  {} failed  {} skipped, {}ms total",
            stats.batches_submitted,
            stats.total_batches,
            stats.batches_failed,
            stats.batches_skipped,
            stats.total_duration_ms,
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
        if let Some(ref msg) = output.record.error_message {
            eprintln!("   {}", bold(msg));
        }
        if let Some(ref url) = output.response_artifact_url {
            eprintln!("   raw replies: {}", dim(url));
        }
    }

    Ok(())
}

/// Build the `DocumentRef` from `--file` or the explicit name and size.
async fn describe_document(cli: &Cli) -> Result<DocumentRef> {
    let (file_name, file_size, magic) = match cli.file {
        Some(ref path) => {
            let meta = tokio::fs::metadata(path)
                .await
                .with_context(|| format!("Failed to stat {:?}", path))?;
            let mut head = [0u8; 8];
            let mut f = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {:?}", path))?;
            let n = f.read(&mut head).await.context("Failed to read file header")?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (name, meta.len(), Some(head[..n].to_vec()))
        }
        None => (
            cli.file_name.clone().unwrap_or_default(),
            cli.file_size.unwrap_or_default(),
            None,
        ),
    };

    let id = cli.document_id.clone().unwrap_or_else(|| {
        file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| file_name.clone())
    });
    let mut doc = DocumentRef::new(id, cli.user_id.clone(), file_name, file_size);
    if let Some(magic) = magic {
        doc = doc.with_magic(&magic);
    }
    Ok(doc)
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .batch_size(cli.batch_size)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .early_exit(!cli.no_early_exit)
        .archive_raw_responses(cli.output_dir.is_some());

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(secs) = cli.deadline {
        builder = builder.deadline_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
