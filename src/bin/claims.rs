//! CLI binary for edgequake-claims.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_claims::{
    write_json, ClaimPipeline, ClaimResponse, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, PromptSet, PromptTemplate, StageName,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

/// Terminal progress: a spinner whose message follows the run, plus one log
/// line per stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.bar.set_prefix("Classifying");
        self.bar.set_message(format!("{total_pages} pages"));
    }

    fn on_classified(&self, classified_pages: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{classified_pages} page assignments"))
        ));
        self.bar.set_prefix("Extracting");
    }

    fn on_stage_start(&self, stage: StageName) {
        self.bar.set_message(stage.to_string());
    }

    fn on_stage_skipped(&self, stage: StageName) {
        self.bar
            .println(format!("  {} {:<18} {}", dim("–"), stage, dim("no pages")));
    }

    fn on_stage_complete(&self, stage: StageName, present: bool) {
        let (mark, note) = if present {
            (green("✓"), dim("extracted"))
        } else {
            (cyan("⚠"), dim("absent"))
        };
        self.bar.println(format!("  {} {:<18} {}", mark, stage, note));
    }

    fn on_run_complete(&self, agents_executed: &[String]) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} stages extracted",
            green("✔"),
            bold(&agents_executed.len().to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process one claim (JSON to stdout)
  claims process claim.pdf --claim-id CLM-1001

  # Write the report to a file
  claims process claim.pdf -o report.json

  # Several claims at once; claim ids default to file stems
  claims process a.pdf b.pdf c.pdf --concurrency 2 -o reports.json

  # Use a specific model
  claims process --model gpt-4.1-mini --provider openai claim.pdf

  # Custom prompts (classifier.txt, identity.txt, discharge_summary.txt,
  # itemized_bill.txt; each must contain {pages})
  claims process --prompts-dir ./prompts claim.pdf

  # HTTP front door
  claims serve --addr 0.0.0.0:8000

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium; otherwise the system library is used

A .env file in the working directory is loaded before anything else.
"#;

/// Extract structured data from insurance-claim PDFs using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "claims",
    version,
    about = "Extract structured data from insurance-claim PDFs using LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CLAIMS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CLAIMS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one or more claim PDFs (paths or URLs) and print the report.
    Process(ProcessArgs),
    /// Run the HTTP front door.
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "CLAIMS_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "CLAIMS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "CLAIMS_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Characters of each page shown to the classifier.
    #[arg(long, env = "CLAIMS_PREVIEW_CHARS", default_value_t = 500)]
    preview_chars: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "CLAIMS_PASSWORD")]
    password: Option<String>,

    /// Directory with prompt overrides.
    #[arg(long, env = "CLAIMS_PROMPTS_DIR")]
    prompts_dir: Option<PathBuf>,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "CLAIMS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Documents processed concurrently.
    #[arg(short, long, env = "CLAIMS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Claim identifier. Defaults to the input's file stem.
    #[arg(long)]
    claim_id: Option<String>,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long, env = "CLAIMS_OUTPUT")]
    output: Option<PathBuf>,

    /// Disable progress spinner.
    #[arg(long, env = "CLAIMS_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "CLAIMS_ADDR", default_value = "0.0.0.0:8000")]
    addr: SocketAddr,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active; the
    // spinner provides the feedback that matters to the user.
    let show_progress = match &cli.command {
        // Concurrent runs would interleave on one spinner.
        Command::Process(args) => !cli.quiet && !args.no_progress && args.inputs.len() == 1,
        Command::Serve(_) => false,
    };
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

    match cli.command {
        Command::Process(args) => {
            let progress_cb: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
            } else {
                None
            };
            run_process(args, progress_cb, cli.quiet).await
        }
        Command::Serve(args) => {
            let config = build_config(&args.pipeline, None).await?;
            let pipeline = ClaimPipeline::from_config(config)
                .await
                .context("Failed to configure LLM provider")?;
            if !cli.quiet {
                eprintln!("{} Listening on {}", cyan("◆"), bold(&format!("http://{}", args.addr)));
            }
            edgequake_claims::server::serve(args.addr, Arc::new(pipeline))
                .await
                .context("Server failed")
        }
    }
}

async fn run_process(args: ProcessArgs, progress: Option<ProgressCallback>, quiet: bool) -> Result<()> {
    let config = build_config(&args.pipeline, progress).await?;
    let pipeline = ClaimPipeline::from_config(config)
        .await
        .context("Failed to configure LLM provider")?;

    let output: Value = if let [input] = args.inputs.as_slice() {
        let claim_id = args.claim_id.clone().unwrap_or_else(|| claim_id_for(input));
        let response = pipeline
            .process_claim(claim_id, input)
            .await
            .context("Processing failed")?;
        serde_json::to_value(&response).context("Failed to serialise report")?
    } else {
        if args.claim_id.is_some() {
            anyhow::bail!("--claim-id applies to a single input only");
        }
        let results = pipeline.process_batch(&args.inputs).await;
        let mut failed = 0usize;
        let mut entries = Vec::with_capacity(results.len());
        for (input, result) in args.inputs.iter().zip(results) {
            let claim_id = claim_id_for(input);
            match result {
                Ok(report) => {
                    let response = ClaimResponse::success(claim_id, report);
                    entries.push(serde_json::to_value(&response).context("Failed to serialise report")?);
                }
                Err(e) => {
                    failed += 1;
                    eprintln!("{} {}: {}", cyan("⚠"), input, e);
                    entries.push(json!({"claim_id": claim_id, "status": "error", "detail": e.to_string()}));
                }
            }
        }
        if !quiet {
            eprintln!(
                "{} {}/{} claims processed",
                green("✔"),
                entries.len() - failed,
                entries.len()
            );
        }
        Value::Array(entries)
    };

    match args.output {
        Some(ref path) => {
            write_json(&output, path).await.context("Failed to write report")?;
            if !quiet {
                eprintln!("   {}  →  {}", dim("report"), bold(&path.display().to_string()));
            }
        }
        None => {
            let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
            println!("{json}");
        }
    }

    Ok(())
}

/// Claim id derived from an input's file stem.
fn claim_id_for(input: &str) -> String {
    let last = input.rsplit('/').next().unwrap_or(input);
    Path::new(last)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "claim".to_string())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(args: &PipelineArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let prompts = match args.prompts_dir {
        Some(ref dir) => load_prompts(dir).await?,
        None => PromptSet::default(),
    };

    let mut builder = PipelineConfig::builder()
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .api_timeout_secs(args.api_timeout)
        .classifier_preview_chars(args.preview_chars)
        .download_timeout_secs(args.download_timeout)
        .concurrency(args.concurrency)
        .prompts(prompts);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = args.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Override default prompts with `<name>.txt` files found in `dir`.
async fn load_prompts(dir: &Path) -> Result<PromptSet> {
    let mut prompts = PromptSet::default();
    let slots = [
        ("classifier", &mut prompts.classifier),
        ("identity", &mut prompts.identity),
        ("discharge_summary", &mut prompts.discharge_summary),
        ("itemized_bill", &mut prompts.itemized_bill),
    ];
    for (name, slot) in slots {
        let path = dir.join(format!("{name}.txt"));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?;
            *slot = PromptTemplate::new(text);
        }
    }
    Ok(prompts)
}
