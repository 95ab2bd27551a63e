//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use civicmap_core::{
    FailureResponse, GeocodingRouter, MessageIngest, ProgressReporter, validate_message_text,
};
use civicmap_extraction::LlmExtractor;
use civicmap_geocoding::GoogleGeocoder;
use civicmap_shared::{
    AppConfig, CivicMapError, GeocodingMode, Message, MessageId, PipelineStage, expand_home,
    init_config, load_config, locality, read_api_key,
};
use civicmap_storage::{DocumentStore, MemoryStore, Storage};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Report, Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// civicmap: place civic announcements on the map.
#[derive(Parser)]
#[command(
    name = "civicmap",
    version,
    about = "Extract, geocode, and store the locations mentioned in civic announcements.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ingest an announcement and print the resulting message.
    Ingest {
        /// Announcement text (read from stdin when neither TEXT nor --file is given).
        text: Option<String>,

        /// Read the announcement from a file.
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Source label stored with the message.
        #[arg(short, long)]
        source: Option<String>,

        /// Geocoding strategy for this run: unified or specialized.
        #[arg(short, long)]
        mode: Option<GeocodingMode>,

        /// Message database path.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Keep the message in memory instead of writing it to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored messages, newest first.
    List {
        /// Message database path.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print a stored message as JSON.
    Show {
        /// Message ID.
        id: String,

        /// Message database path.
        #[arg(long)]
        db: Option<PathBuf>,
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

    let filter = match cli.verbose {
        0 => "civicmap=info",
        1 => "civicmap=debug",
        _ => "civicmap=trace",
    };

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
        Command::Ingest {
            text,
            file,
            source,
            mode,
            db,
            dry_run,
        } => {
            let options = IngestOptions {
                text,
                file,
                source,
                mode,
                db,
                dry_run,
            };
            cmd_ingest(options).await
        }
        Command::List { db } => cmd_list(db.as_deref()).await,
        Command::Show { id, db } => cmd_show(&id, db.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

struct IngestOptions {
    text: Option<String>,
    file: Option<PathBuf>,
    source: Option<String>,
    mode: Option<GeocodingMode>,
    db: Option<PathBuf>,
    dry_run: bool,
}

async fn cmd_ingest(options: IngestOptions) -> Result<()> {
    let config = load_config()?;

    let text = read_text(options.text, options.file.as_deref())?;
    validate_message_text(&text, config.defaults.max_message_length)
        .map_err(|e| failure_report(&e))?;

    let mode = options.mode.unwrap_or(config.geocoding.mode);
    let source = options
        .source
        .unwrap_or_else(|| config.defaults.source.clone());

    let store: Arc<dyn DocumentStore> = if options.dry_run {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(Storage::open(&resolve_db_path(&config, options.db.as_deref())?).await?)
    };

    let extractor = LlmExtractor::new(
        &config.extraction,
        read_api_key(&config.extraction.api_key_env)?,
    )?;
    let geocoder = Arc::new(GoogleGeocoder::new(
        &config.geocoding,
        locality(&config.defaults.locality)?,
        read_api_key(&config.geocoding.api_key_env)?,
    )?);
    let router = GeocodingRouter::from_mode(mode, geocoder.clone(), geocoder);
    let pipeline = MessageIngest::new(Arc::new(extractor), router, store);

    info!(%mode, source = %source, chars = text.chars().count(), "ingesting message");

    let reporter = CliProgress::new();
    let message = match pipeline.ingest(&text, &source, &reporter).await {
        Ok(message) => message,
        Err(e) => {
            reporter.fail();
            return Err(failure_report(&e));
        }
    };

    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}

fn read_text(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read '{}': {e}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| eyre!("cannot read stdin: {e}"))?;
    Ok(buf)
}

/// Turn a pipeline error into the report shown to the user.
fn failure_report(err: &CivicMapError) -> Report {
    let response = FailureResponse::from(err);
    let mut text = response.message;
    for label in &response.missing {
        text.push_str(&format!("\n  - {label}"));
    }
    if let Some(details) = response.details {
        text.push_str(&format!("\n  cause: {details}"));
    }
    eyre!(text)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn fail(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: PipelineStage) {
        let label = match stage {
            PipelineStage::Stored => "Extracting locations",
            PipelineStage::Extracted | PipelineStage::AddressesStored => "Geocoding addresses",
            PipelineStage::Geocoded | PipelineStage::GeocodingStored => "Assembling GeoJSON",
            PipelineStage::Assembled | PipelineStage::GeoJsonStored => "Saving",
            PipelineStage::Done => "Done",
        };
        self.spinner.set_message(label);
    }

    fn done(&self, _message: &Message) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// list / show
// ---------------------------------------------------------------------------

fn resolve_db_path(config: &AppConfig, db: Option<&Path>) -> Result<PathBuf> {
    match db {
        Some(path) => Ok(expand_home(&path.to_string_lossy())?),
        None => Ok(config.db_path()?),
    }
}

/// Open the database for reading, or `None` when nothing was stored yet.
async fn open_existing(db: Option<&Path>) -> Result<Option<Storage>> {
    let config = load_config()?;
    let path = resolve_db_path(&config, db)?;
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(Storage::open_readonly(&path).await?))
}

async fn cmd_list(db: Option<&Path>) -> Result<()> {
    let Some(storage) = open_existing(db).await? else {
        println!("No messages stored yet.");
        return Ok(());
    };

    let messages = storage.list().await?;
    if messages.is_empty() {
        println!("No messages stored yet.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20}  {:<16}  {:>8}",
        "ID", "CREATED", "STAGE", "FEATURES"
    );
    for message in &messages {
        println!(
            "{:<36}  {:<20}  {:<16}  {:>8}",
            message.id,
            message.created_at.format("%Y-%m-%d %H:%M:%S"),
            message.stage.as_str(),
            message.geo_json.as_ref().map_or(0, |g| g.len()),
        );
    }
    Ok(())
}

async fn cmd_show(id: &str, db: Option<&Path>) -> Result<()> {
    let id: MessageId = id
        .parse()
        .map_err(|e| eyre!("invalid message id '{id}': {e}"))?;

    let message = match open_existing(db).await? {
        Some(storage) => storage.get(&id).await?,
        None => None,
    };
    let message = message.ok_or_else(|| eyre!("message {id} not found"))?;

    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

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
