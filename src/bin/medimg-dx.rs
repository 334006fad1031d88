//! CLI binary for medimg-dx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, runs each input, and prints the reports. A failing
//! input prints an error and the session carries on with the next one.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use medimg_dx::{
    analyze_batch, inspect, AnalysisConfig, AnalysisProgressCallback, AnalysisReport, Analyzer,
    ImageSummary, MedImgError, ProgressCallback,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar for multi-input batches. Files finish out of order,
/// so every event prints its own line above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Analyzing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analyzing {total_files} images…"))
        ));
    }

    fn on_file_start(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, name: &str, report_len: usize) {
        self.bar.println(format!(
            "  {} {:<32}  {}",
            green("✓"),
            name,
            dim(&format!("{report_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, name: &str, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<32}  {}", red("✗"), name, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_files.saturating_sub(success_count);
        if failed == 0 {
            eprintln!(
                "{} {} images analyzed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images analyzed  ({} failed)",
                if failed == total_files { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze a DICOM file
  medimg-dx chest.dcm

  # Several images at once, JSON output
  medimg-dx --json knee.png wrist.jpg ct-slice.dcm > reports.json

  # Check what would be sent, without calling the model (no API key needed)
  medimg-dx --inspect-only scan.dcm

  # Interactive session: one path or URL per line, errors do not end it
  medimg-dx --interactive

  # Another provider / model
  medimg-dx --provider anthropic --model claude-sonnet-4-20250514 scan.png

NOTES:
  Only a lower-case `.dcm` suffix selects the DICOM decoder. `scan.DCM` is
  treated as a raster image and will fail to decode.

  DICOM pixel values are min-max stretched to 0–255. Window center/width
  tags are not applied.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (default provider, model gpt-4o)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter (e.g. medimg_dx=debug)
"#;

/// Analyze medical images with a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "medimg-dx",
    version,
    about = "Analyze medical images (PNG, JPEG, DICOM) with a Vision LLM",
    long_about = "Normalize medical images (PNG, JPEG, DICOM) into 8-bit RGB PNGs and ask a \
Vision Language Model for a structured, Markdown-formatted report. Supports OpenAI, Anthropic, \
Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image paths or HTTP/HTTPS URLs. Reads from stdin when empty.
    inputs: Vec<String>,

    /// LLM model ID (e.g. gpt-4o, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file replacing the system message.
    #[arg(long, env = "MEDIMG_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Path to a text file replacing the analysis instructions.
    #[arg(long, env = "MEDIMG_INSTRUCTIONS")]
    instructions: Option<PathBuf>,

    /// Max LLM output tokens per report.
    #[arg(long, env = "MEDIMG_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "MEDIMG_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Image detail hint: high, low, auto.
    #[arg(long, env = "MEDIMG_DETAIL", default_value = "high")]
    detail: String,

    /// Number of images analyzed at once.
    #[arg(short, long, env = "MEDIMG_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Output AnalysisReport JSON instead of Markdown.
    #[arg(long, env = "MEDIMG_JSON")]
    json: bool,

    /// Normalize only and print a summary; no model call.
    #[arg(long)]
    inspect_only: bool,

    /// Read inputs from stdin, one per line, until EOF.
    #[arg(short, long)]
    interactive: bool,

    /// Disable progress bar.
    #[arg(long, env = "MEDIMG_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MEDIMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except reports and errors.
    #[arg(short, long, env = "MEDIMG_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MEDIMG_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Per-image LLM call timeout in seconds (default: none).
    #[arg(long, env = "MEDIMG_API_TIMEOUT")]
    api_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.inputs.len() > 1;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let interactive = cli.interactive || cli.inputs.is_empty();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let mut failures = 0usize;
        let mut total = 0usize;
        for input in &cli.inputs {
            total += 1;
            if !run_inspect(&cli, input).await {
                failures += 1;
            }
        }
        if interactive {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                total += 1;
                if !run_inspect(&cli, input).await {
                    failures += 1;
                }
            }
        }
        return finish(total, failures);
    }

    // ── Build analyzer once; reused for every input ──────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let analyzer = Arc::new(Analyzer::new(config).context("Failed to set up the LLM provider")?);

    let mut total = 0usize;
    let mut failures = 0usize;

    // ── Batch mode ───────────────────────────────────────────────────────
    if !cli.inputs.is_empty() {
        let multi = cli.inputs.len() > 1;
        let results = analyze_batch(Arc::clone(&analyzer), cli.inputs.clone()).await;
        for (input, result) in results {
            total += 1;
            if !emit(&cli, &input, result, multi)? {
                failures += 1;
            }
        }
    }

    // ── Interactive session ──────────────────────────────────────────────
    if interactive {
        if !cli.quiet {
            eprintln!(
                "{} {}",
                cyan("◆"),
                bold("Enter an image path or URL per line (Ctrl-D to quit)")
            );
        }
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            total += 1;
            if !cli.quiet {
                eprintln!("{}", dim(&format!("Analyzing {input}…")));
            }
            let result = analyzer.analyze_input(input).await;
            if !emit(&cli, input, result, false)? {
                failures += 1;
            }
        }
    }

    finish(total, failures)
}

/// Non-zero exit only when every attempted input failed.
fn finish(total: usize, failures: usize) -> Result<()> {
    if total > 0 && failures == total {
        anyhow::bail!("all {total} inputs failed");
    }
    Ok(())
}

/// Print one result. Returns `false` when the input failed.
fn emit(
    cli: &Cli,
    input: &str,
    result: Result<AnalysisReport, MedImgError>,
    separate: bool,
) -> Result<bool> {
    match result {
        Ok(report) => {
            print_report(cli, &report, separate)?;
            Ok(true)
        }
        Err(e) => {
            print_error(input, &e);
            Ok(false)
        }
    }
}

fn print_report(cli: &Cli, report: &AnalysisReport, separate: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if cli.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
        return Ok(());
    }

    if !cli.quiet {
        eprintln!(
            "{} {} {}",
            green("✔"),
            bold(&report.name),
            dim(&format!(
                "{} {}x{}  {} tokens in / {} out  {}ms",
                report.source_kind,
                report.width,
                report.height,
                report.input_tokens,
                report.output_tokens,
                report.duration_ms
            )),
        );
    }
    writeln!(handle, "<!-- {} ({}) -->", report.name, report.source_kind)
        .context("Failed to write to stdout")?;
    handle
        .write_all(report.markdown.as_bytes())
        .context("Failed to write to stdout")?;
    if !report.markdown.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    if separate {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn print_error(input: &str, e: &MedImgError) {
    eprintln!("{} {} {}", red("✘"), bold(input), red(&format!("Error: {e}")));
}

/// Inspect one input; returns `false` on failure.
async fn run_inspect(cli: &Cli, input: &str) -> bool {
    match inspect(input, cli.download_timeout).await {
        Ok(summary) => {
            print_summary(cli, &summary);
            true
        }
        Err(e) => {
            print_error(input, &e);
            false
        }
    }
}

fn print_summary(cli: &Cli, summary: &ImageSummary) {
    if cli.json {
        match serde_json::to_string_pretty(summary) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{} Failed to serialise summary: {e}", red("✘")),
        }
    } else {
        println!("File:         {}", summary.name);
        println!("Type:         {}", summary.source_kind);
        println!("Dimensions:   {}x{} (RGB, 8-bit)", summary.width, summary.height);
        println!("PNG payload:  {} bytes", summary.png_bytes);
    }
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .image_detail(cli.detail.to_lowercase())
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.system_prompt {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(text);
    }
    if let Some(ref path) = cli.instructions {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {:?}", path))?;
        builder = builder.instructions(text);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
