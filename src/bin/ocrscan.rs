//! CLI binary for ocr-scanner.
//!
//! A thin shim over the library crate: `process` runs the upload flow into
//! the persisted result store, the other subcommands read that store.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use ocr_scanner::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use ocr_scanner::store::default_state_path;
use ocr_scanner::{
    export_markdown, process_upload, render_document_html, write_output, FileStorage, FileUpload,
    FlowProgressCallback, FlowStage, ImageMatch, MathMlEngine, MistralClient, OcrConfig, OcrError,
    OcrResponse, PageView, ProgressCallback, ResultStore, UploadMode,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
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

/// Terminal progress: an indeterminate spinner labelled with the running
/// stage, plus one log line per finished stage. The vendor reports no
/// transfer progress, so there is no bar to fill.
struct CliProgressCallback {
    spinner: ProgressBar,
}

impl CliProgressCallback {
    fn new(file_name: &str) -> Arc<Self> {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        spinner.set_style(style);
        spinner.set_prefix("Preparing");
        spinner.set_message(file_name.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { spinner })
    }
}

impl FlowProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: FlowStage) {
        self.spinner.set_prefix(stage.label());
    }

    fn on_stage_complete(&self, stage: FlowStage, elapsed_ms: u64) {
        self.spinner.println(format!(
            "  {} {:<12} {}",
            green("✓"),
            stage.label(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_flow_complete(&self, page_count: usize) {
        self.spinner.finish_and_clear();
        eprintln!("{} {} pages recognised", green("✔"), bold(&page_count.to_string()));
    }

    fn on_flow_error(&self, stage: FlowStage, error: &str) {
        self.spinner.finish_and_clear();
        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(120) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };
        eprintln!("  {} {:<12} {}", red("✗"), stage.label(), red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise a scan and keep the result
  ocrscan process invoice.pdf

  # Send an image inline instead of uploading it first
  ocrscan process --mode inline receipt.png

  # Render page 2 as a standalone HTML file
  ocrscan show --page 2 --standalone -o page2.html

  # Step through the pages interactively
  ocrscan browse

  # All pages as Markdown, images embedded
  ocrscan export --embed-images -o result.md

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY     Mistral API key
  MISTRAL_BASE_URL    Override the API endpoint
  MISTRAL_OCR_MODEL   Override the OCR model
  OCRSCAN_STATE       Path of the persisted result state
  RUST_LOG            Log filter (e.g. ocr_scanner=debug)
"#;

/// Recognise documents with Mistral OCR and browse the result.
#[derive(Parser, Debug)]
#[command(
    name = "ocrscan",
    version,
    about = "Recognise PDFs and images with Mistral OCR and render the result",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path of the persisted result state.
    #[arg(long, global = true, env = "OCRSCAN_STATE")]
    state: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "OCRSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "OCRSCAN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a file, send it to the OCR service and store the result.
    Process(ProcessArgs),
    /// Render one page of the stored result.
    Show(ShowArgs),
    /// Page through the stored result interactively.
    Browse(BrowseArgs),
    /// Print every page's Markdown, joined by blank lines.
    Export(ExportArgs),
    /// Show the state of the result store.
    Status {
        /// Output the raw state as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Discard the stored result.
    Reset,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// PDF, JPEG or PNG file, at most 5 MB.
    file: PathBuf,

    /// Declared MIME type; guessed from the extension when omitted.
    #[arg(long)]
    mime_type: Option<String>,

    /// How the file reaches the service.
    #[arg(long, value_enum, default_value = "signed-url")]
    mode: ModeArg,

    /// Mistral API key.
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API base URL.
    #[arg(long, env = "MISTRAL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// OCR model ID.
    #[arg(long, env = "MISTRAL_OCR_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Lifetime of the signed URL in hours.
    #[arg(long, default_value_t = 24)]
    url_expiry: u32,

    /// Do not ask the service to return extracted images.
    #[arg(long)]
    no_images: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "OCRSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Print the OCR response as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// 1-based page number.
    #[arg(short, long, default_value_t = 1)]
    page: usize,

    #[arg(long, value_enum, default_value = "html")]
    format: FormatArg,

    /// How image references are matched to images.
    #[arg(long = "match", value_enum, default_value = "auto")]
    image_match: MatchArg,

    /// Wrap the HTML in a complete document.
    #[arg(long)]
    standalone: bool,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BrowseArgs {
    #[arg(long, value_enum, default_value = "markdown")]
    format: FormatArg,

    #[arg(long = "match", value_enum, default_value = "auto")]
    image_match: MatchArg,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Resolve image references to embedded data.
    #[arg(long)]
    embed_images: bool,

    #[arg(long = "match", value_enum, default_value = "auto")]
    image_match: MatchArg,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    SignedUrl,
    Inline,
}

impl From<ModeArg> for UploadMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::SignedUrl => UploadMode::SignedUrl,
            ModeArg::Inline => UploadMode::Inline,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MatchArg {
    Id,
    Index,
    Auto,
}

impl From<MatchArg> for ImageMatch {
    fn from(v: MatchArg) -> Self {
        match v {
            MatchArg::Id => ImageMatch::Id,
            MatchArg::Index => ImageMatch::Index,
            MatchArg::Auto => ImageMatch::Auto,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Html,
    Markdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers flow milestones, so INFO logs stay off while it runs.
    let spinner_active = matches!(
        &cli.command,
        Command::Process(args) if !args.no_progress && !args.json
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner_active {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let state_path = cli.state.clone().unwrap_or_else(default_state_path);
    let store = ResultStore::open(FileStorage::new(&state_path))
        .with_context(|| format!("Failed to open result store at {}", state_path.display()))?;

    match cli.command {
        Command::Process(ref args) => run_process(args, &store, spinner_active, cli.quiet).await,
        Command::Show(ref args) => run_show(args, &store).await,
        Command::Browse(ref args) => run_browse(args, &store).await,
        Command::Export(ref args) => run_export(args, &store).await,
        Command::Status { json } => run_status(&store, &state_path, json),
        Command::Reset => {
            store.reset().context("Failed to reset the result store")?;
            if !cli.quiet {
                eprintln!("{} Result store cleared", green("✔"));
            }
            Ok(())
        }
    }
}

async fn run_process(args: &ProcessArgs, store: &ResultStore, show_progress: bool, quiet: bool) -> Result<()> {
    let start = Instant::now();
    let upload = FileUpload::from_path(&args.file, args.mime_type.as_deref())
        .await
        .context("Cannot read input file")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new(&upload.candidate.name);
        Some(cb as Arc<dyn FlowProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress_cb)?;
    let client = MistralClient::new(&config).context("Cannot create the OCR client")?;

    let response = process_upload(&client, store, upload, &config)
        .await
        .context("OCR failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&response).context("Failed to serialise output")?;
        println!("{json}");
    } else if !quiet {
        eprintln!(
            "{}  {} pages  {}  {}ms",
            cyan("◆"),
            response.page_count(),
            dim(&response.model),
            start.elapsed().as_millis(),
        );
        eprintln!("   {} ocrscan show  /  ocrscan browse", dim("next:"));
    }
    Ok(())
}

/// Map CLI args to `OcrConfig`.
fn build_config(args: &ProcessArgs, progress: Option<ProgressCallback>) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .base_url(&args.base_url)
        .model(&args.model)
        .request_timeout_secs(args.timeout)
        .signed_url_expiry_hours(args.url_expiry)
        .include_image_base64(!args.no_images)
        .upload_mode(args.mode.into());

    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// The stored result, or a hint to run `process` first.
fn stored_result(store: &ResultStore) -> Result<OcrResponse> {
    let state = store.snapshot();
    if state.is_loading {
        eprintln!("{} A previous run is still marked as in progress", cyan("⚠"));
    }
    match state.data {
        Some(data) => Ok(data),
        None => match state.error {
            Some(e) => bail!("No stored result; the last run failed: {e}"),
            None => bail!("No stored result. Run `ocrscan process <FILE>` first."),
        },
    }
}

async fn run_show(args: &ShowArgs, store: &ResultStore) -> Result<()> {
    let response = stored_result(store)?;
    let total = response.page_count();
    if args.page == 0 || args.page > total {
        return Err(OcrError::PageOutOfRange { page: args.page, total }.into());
    }

    let mut view = PageView::new(&response, args.image_match.into());
    view.pager_mut().go_to(args.page - 1);
    let page = view
        .render(&MathMlEngine)
        .with_context(|| format!("Page {} has no content", args.page))?;

    let body = match args.format {
        FormatArg::Markdown => page.markdown,
        FormatArg::Html if args.standalone => render_document_html(&page.label, &page.html),
        FormatArg::Html => page.html,
    };
    emit(&body, args.output.as_ref()).await
}

async fn run_browse(args: &BrowseArgs, store: &ResultStore) -> Result<()> {
    let response = stored_result(store)?;
    let mut view = PageView::new(&response, args.image_match.into());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if let Some(page) = view.render(&MathMlEngine) {
            println!("{}", bold(&format!("── {} ──", page.label)));
            match args.format {
                FormatArg::Markdown => println!("{}", page.markdown),
                FormatArg::Html => println!("{}", page.html),
            }
        } else {
            println!("{}", dim("(result has no pages)"));
        }

        eprint!("{} ", dim("[n]ext [p]rev <page> [q]uit >"));
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let pager = view.pager_mut();
        match line.trim() {
            "" | "n" | "next" => {
                pager.next();
            }
            "p" | "prev" | "previous" => {
                pager.previous();
            }
            "q" | "quit" => break,
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 => {
                    pager.go_to(n - 1);
                }
                _ => eprintln!("{} unknown command '{}'", red("✗"), other),
            },
        }
    }
    Ok(())
}

async fn run_export(args: &ExportArgs, store: &ResultStore) -> Result<()> {
    let response = stored_result(store)?;
    let markdown = export_markdown(&response, args.embed_images, args.image_match.into());
    emit(&markdown, args.output.as_ref()).await
}

fn run_status(store: &ResultStore, state_path: &std::path::Path, json: bool) -> Result<()> {
    let state = store.snapshot();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&state).context("Failed to serialise state")?
        );
        return Ok(());
    }

    println!("State file:   {}", state_path.display());
    println!("Loading:      {}", state.is_loading);
    match state.error {
        Some(ref e) => println!("Error:        {}", red(e)),
        None => println!("Error:        -"),
    }
    match state.data {
        Some(ref data) => {
            println!("Pages:        {}", data.page_count());
            println!("Model:        {}", data.model);
            let images: usize = data.pages.iter().map(|p| p.images.len()).sum();
            println!("Images:       {}", images);
            if let Some(usage) = data.usage_info {
                if let Some(bytes) = usage.doc_size_bytes {
                    println!("Document:     {} bytes", bytes);
                }
            }
        }
        None => println!("Pages:        -"),
    }
    Ok(())
}

/// Write to `output` atomically, or to stdout with a trailing newline.
async fn emit(contents: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            write_output(path, contents)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{}  {}", green("✔"), bold(&path.display().to_string()));
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(contents.as_bytes())
                .context("Failed to write to stdout")?;
            // Ensure a trailing newline on stdout.
            if !contents.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}
