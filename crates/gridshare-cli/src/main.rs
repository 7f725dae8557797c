use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gridshare_common::telemetry::{self, TelemetryConfig};
use gridshare_common::{Config, FileStore, JsonBlobClient};
use gridshare_sync::{
    Document, DocumentSyncController, EditingSurface, Outcome, ReadinessGate, TracingNotifier,
};
use miette::{IntoDiagnostic, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

mod surface;

use surface::{FileSurface, PrintNavigator};

type Controller = DocumentSyncController<JsonBlobClient, FileSurface>;

#[derive(Parser)]
#[command(version, about = "gridshare - share spreadsheets through a JSON blob store", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to config file
    #[arg(long, env = "GRIDSHARE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Share a local document and print its link
    Share {
        /// JSON document to share
        file: PathBuf,
    },
    /// Fetch a shared document into a local file
    Open {
        /// Identifier of the shared document
        id: String,

        /// Where to write it (defaults to `<id>.json`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Push a local document to an existing share
    Update {
        id: String,
        file: PathBuf,
    },
    /// Remove a shared document from the store
    Delete { id: String },
    /// Edit a document with autosave while shared
    Edit {
        /// JSON document to edit (created blank if missing)
        file: PathBuf,

        /// Bind to this shared document, replacing the local file
        #[arg(long)]
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    telemetry::init(TelemetryConfig::from_env("gridshare"));

    let cli = Cli::parse();
    let config = load_config(cli.config).await?;

    match cli.command {
        Commands::Share { file } => {
            let surface = FileSurface::open(&file)?;
            let controller = build_controller(&config, surface, false)?;
            controller.share().await.into_result()?;
        }
        Commands::Open { id, output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{id}.json")));
            let controller = build_controller(&config, FileSurface::at(&output), false)?;
            controller.initialize(Some(&id)).await.into_result()?;
            println!("✓ Saved to {}", output.display());
        }
        Commands::Update { id, file } => {
            let local = FileSurface::open(&file)?.current_document();
            let surface = FileSurface::detached(Document::blank());
            let controller = build_controller(&config, surface.clone(), false)?;
            // Binding needs a successful read of the remote copy first.
            controller.initialize(Some(&id)).await.into_result()?;
            surface.replace_document(local);
            controller.update().await.into_result()?;
        }
        Commands::Delete { id } => {
            let surface = FileSurface::detached(Document::blank());
            let controller = build_controller(&config, surface, false)?;
            controller.initialize(Some(&id)).await.into_result()?;
            controller.delete().await.into_result()?;
        }
        Commands::Edit { file, id } => {
            edit_session(&config, file, id).await?;
        }
    }

    Ok(())
}

async fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if path.exists() {
        Config::load(&FileStore::new(&path)).await?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Config::default()
    };
    Ok(config.with_env_overrides()?)
}

fn build_controller(config: &Config, surface: FileSurface, autosave: bool) -> Result<Controller> {
    let store = JsonBlobClient::from_config(config)?;
    let period = if autosave {
        config.autosave_period()
    } else {
        None
    };
    Ok(DocumentSyncController::builder(store, surface)
        .navigator(Arc::new(PrintNavigator::new(config.clone())))
        .notifier(Arc::new(TracingNotifier))
        .gate(ReadinessGate::ready())
        .autosave_period(period)
        .build())
}

async fn edit_session(config: &Config, file: PathBuf, id: Option<String>) -> Result<()> {
    let existed = file.exists();
    let surface = if existed {
        FileSurface::open(&file)?
    } else {
        FileSurface::at(&file)
    };
    let controller = build_controller(config, surface.clone(), true)?;

    match id.as_deref() {
        Some(id) => {
            controller.initialize(Some(id)).await;
        }
        None if !existed => {
            controller.initialize(None).await;
        }
        None => {}
    }

    println!("Editing {}", file.display());
    println!("Commands: share, update, delete, export [path], status, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.into_diagnostic()?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let mut words = line.split_whitespace();
        let outcome = match words.next() {
            Some("share") => controller.share().await,
            Some("update") => controller.update().await,
            Some("delete") => controller.delete().await,
            Some("export") => {
                if let Some(path) = words.next() {
                    surface.set_export_path(path);
                }
                controller.export().await
            }
            Some("status") => {
                print_status(&controller);
                continue;
            }
            Some("quit" | "exit") => break,
            Some(other) => {
                println!("unknown command: {other}");
                continue;
            }
            None => continue,
        };
        if let Outcome::Skipped(reason) = outcome {
            println!("nothing to do ({reason:?})");
        }
    }

    controller.teardown();
    Ok(())
}

fn print_status(controller: &Controller) {
    match controller.identifier() {
        Some(id) => println!("shared as {id} ({})", controller.status()),
        None => println!("not shared ({})", controller.status()),
    }
    let actions = controller.actions();
    println!(
        "share: {:?}, update: {:?}, delete: {:?}, autosave: {}",
        actions.share,
        actions.update,
        actions.delete,
        if controller.autosave_active() { "on" } else { "off" }
    );
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gridshare")
        .join("config.json")
}

fn init_miette() {
    let hook = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }));
    if hook.is_err() {
        tracing::debug!("miette hook already installed");
    }
    miette::set_panic_hook();
}
