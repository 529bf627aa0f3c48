//! CLI command definitions, routing, and tracing setup.

use std::cell::Cell;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use contentimport_core::client::build_client;
use contentimport_core::local::LocalProcessor;
use contentimport_core::media::ImageRelocator;
use contentimport_core::presenter::{render_line, render_summary};
use contentimport_core::source::SourceResolver;
use contentimport_core::{
    HttpProcessor, ImportRunState, ImportSession, ProgressReporter, RecordProcessor,
};
use contentimport_shared::{
    AppConfig, ImportOptions, ImportResult, ImportStatus, expand_home, init_config, load_config,
    parse_endpoint,
};
use contentimport_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Bulk-import blog posts from JSON.
#[derive(Parser)]
#[command(
    name = "contentimport",
    version,
    about = "Bulk-import blog posts from a JSON file or URL.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where the JSON array comes from.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub(crate) struct SourceArgs {
    /// JSON file to read (`-` for stdin).
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// URL returning the JSON array.
    #[arg(long)]
    pub url: Option<String>,
}

impl SourceArgs {
    fn is_stdin(&self) -> bool {
        self.file.as_ref().is_some_and(|path| path.as_os_str() == "-")
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Load a source and list its records without importing.
    Preview {
        #[command(flatten)]
        source: SourceArgs,

        /// Fetch proxy endpoint (overrides config).
        #[arg(long)]
        fetch_endpoint: Option<String>,
    },

    /// Load a source and import it in chunks of 10.
    Import {
        #[command(flatten)]
        source: SourceArgs,

        /// Fetch proxy endpoint (overrides config).
        #[arg(long)]
        fetch_endpoint: Option<String>,

        /// Batch import endpoint (overrides config).
        #[arg(long, conflicts_with = "local")]
        endpoint: Option<String>,

        /// Import into the local database instead of a remote endpoint.
        #[arg(long)]
        local: bool,

        /// Local database path (overrides config).
        #[arg(long)]
        db: Option<String>,

        /// Update posts whose slug already exists instead of skipping them.
        #[arg(long)]
        no_skip_existing: bool,

        /// Keep image URLs as they are.
        #[arg(long)]
        no_upload_images: bool,

        /// Mark imported posts as published.
        #[arg(long)]
        publish: bool,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// List posts in the local database.
    List {
        /// Local database path (overrides config).
        #[arg(long)]
        db: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = ["contentimport", "contentimport_core", "contentimport_storage", "contentimport_shared"]
        .map(|target| format!("{target}={level}"))
        .join(",");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Preview {
            source,
            fetch_endpoint,
        } => cmd_preview(&source, fetch_endpoint.as_deref()).await,
        Command::Import {
            source,
            fetch_endpoint,
            endpoint,
            local,
            db,
            no_skip_existing,
            no_upload_images,
            publish,
            yes,
        } => {
            let config = load_config()?;
            let mut options = ImportOptions::from(&config.import);
            if no_skip_existing {
                options.skip_existing = false;
            }
            if no_upload_images {
                options.upload_images = false;
            }
            if publish {
                options.publish = true;
            }
            let target = if local {
                None
            } else {
                endpoint.or_else(|| config.endpoints.import_url.clone())
            };
            cmd_import(
                &config,
                &source,
                fetch_endpoint.as_deref(),
                target.as_deref(),
                db.as_deref(),
                options,
                yes,
            )
            .await
        }
        Command::List { db } => cmd_list(db.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Build a session and load the requested source into it.
async fn load_session(
    config: &AppConfig,
    source: &SourceArgs,
    fetch_endpoint: Option<&str>,
) -> Result<ImportSession> {
    let client = build_client(&config.http)?;
    let fetch_endpoint = fetch_endpoint
        .map(String::from)
        .or_else(|| config.endpoints.fetch_url.clone())
        .map(|raw| parse_endpoint("fetch endpoint", &raw))
        .transpose()?;

    let mut session = ImportSession::new(SourceResolver::new(client, fetch_endpoint));

    let count = match (&source.file, &source.url) {
        (Some(_), _) if source.is_stdin() => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            session.load_str(&text)?
        }
        (Some(path), _) => session.load_file(path).await?,
        (None, Some(url)) => session.load_url(url).await?,
        (None, None) => return Err(eyre!("pass --file or --url")),
    };

    info!(records = count, "source loaded");
    Ok(session)
}

async fn cmd_preview(source: &SourceArgs, fetch_endpoint: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let session = load_session(&config, source, fetch_endpoint).await?;
    print_preview(&session);
    Ok(())
}

fn print_preview(session: &ImportSession) {
    println!();
    println!("  {} records loaded", session.state().records().len());
    println!();
    for outcome in session.outcomes() {
        println!("  {}", render_line(&outcome));
    }
    println!();
}

/// Whether a prompt answer means yes.
fn confirmed(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask on the terminal before submitting `count` records to `target`.
async fn confirm_import(count: usize, target: &str) -> Result<bool> {
    eprint!("Import {count} records into {target}? [y/N] ");
    let mut answer = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut answer)
        .await?;
    Ok(confirmed(&answer))
}

async fn cmd_import(
    config: &AppConfig,
    source: &SourceArgs,
    fetch_endpoint: Option<&str>,
    endpoint: Option<&str>,
    db: Option<&str>,
    options: ImportOptions,
    yes: bool,
) -> Result<()> {
    if !yes && source.is_stdin() {
        return Err(eyre!("--yes is required when the source is read from stdin"));
    }

    let mut session = load_session(config, source, fetch_endpoint).await?;
    print_preview(&session);

    let endpoint = endpoint
        .map(|raw| parse_endpoint("import endpoint", raw))
        .transpose()?;
    let db_path = expand_home(db.unwrap_or(&config.storage.database_path))?;
    let target = match &endpoint {
        Some(url) => url.to_string(),
        None => db_path.display().to_string(),
    };

    let count = session.state().records().len();
    if !yes && !confirm_import(count, &target).await? {
        println!("  Import cancelled.");
        return Ok(());
    }

    match endpoint {
        Some(url) => {
            let processor = HttpProcessor::new(build_client(&config.http)?, url);
            info!(endpoint = %processor.endpoint(), "importing through remote endpoint");
            run_and_report(&mut session, &processor, &options).await
        }
        None => {
            let media_dir = expand_home(&config.storage.media_dir)?;
            info!(db = %db_path.display(), "importing into local database");

            let storage = Storage::open(&db_path).await?;
            let images = ImageRelocator::new(
                build_client(&config.http)?,
                media_dir,
                config.storage.public_base_url.clone(),
            )
            .with_max_bytes(config.storage.max_image_bytes);
            let processor = LocalProcessor::new(storage, images);
            run_and_report(&mut session, &processor, &options).await?;

            let stored = processor.storage().count_posts().await?;
            println!("  {stored} posts in {}", db_path.display());
            println!();
            Ok(())
        }
    }
}

/// Submit the session's records and print every outcome plus the summary.
async fn run_and_report<P: RecordProcessor>(
    session: &mut ImportSession,
    processor: &P,
    options: &ImportOptions,
) -> Result<()> {
    let reporter = CliProgress::new()?;
    session.submit(processor, options, &reporter).await?;

    println!();
    for outcome in session.outcomes() {
        println!("  {}", render_line(&outcome));
    }
    println!();

    let state = session.state();
    if let Some(summary) = state.summary() {
        println!("  Import complete.");
        println!("  {}", render_summary(summary));
        println!();
        return Ok(());
    }

    Err(eyre!(
        "import aborted at {}%: {}",
        state.progress(),
        state.error().unwrap_or("unknown error")
    ))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif percentage bar.
struct CliProgress {
    bar: ProgressBar,
    total_chunks: Cell<usize>,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")?
                .progress_chars("=> "),
        );
        Ok(Self {
            bar,
            total_chunks: Cell::new(0),
        })
    }
}

impl ProgressReporter for CliProgress {
    fn run_started(&self, total_records: usize, total_chunks: usize) {
        self.total_chunks.set(total_chunks);
        self.bar
            .set_message(format!("{total_records} records, {total_chunks} chunks"));
    }

    fn chunk_completed(&self, chunk: usize, progress: u8, results: &[ImportResult]) {
        for result in results.iter().filter(|r| r.status == ImportStatus::Error) {
            self.bar.println(format!(
                "  error    {}  {}",
                result.slug,
                result.message.as_deref().unwrap_or_default()
            ));
        }
        self.bar.set_position(u64::from(progress));
        self.bar
            .set_message(format!("chunk {}/{}", chunk + 1, self.total_chunks.get()));
    }

    fn run_finished(&self, state: &ImportRunState) {
        match state.error() {
            Some(error) => self.bar.abandon_with_message(error.to_string()),
            None => self.bar.finish_and_clear(),
        }
    }
}

async fn cmd_list(db: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let db_path = expand_home(db.unwrap_or(&config.storage.database_path))?;
    let storage = Storage::open_readonly(&db_path).await?;

    let posts = storage.list_posts().await?;
    let total = storage.count_posts().await?;
    println!();
    for post in &posts {
        let date = post
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".into());
        let flag = if post.published { "published" } else { "draft" };
        println!("  {date}  {:<9}  {}  {}", flag, post.slug, post.title);
    }
    println!();
    println!("  {total} posts");
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
