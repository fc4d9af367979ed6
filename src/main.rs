use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notedeck::app::App;
use notedeck::config::ClientConfig;
use notedeck::ingestion::{BatchReport, GenerationReport};
use notedeck::models::Document;
use notedeck::registry::by_recency;

#[derive(Parser)]
#[command(name = "ndk")]
#[command(about = "Turn notes into flashcard decks")]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "NOTEDECK_SERVER_URL")]
    server_url: Option<String>,

    /// Directory for the client database
    #[arg(long, global = true, env = "NOTEDECK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the session id, requesting one if none is stored
    Session,
    /// Upload documents, then generate flashcards from them
    Upload {
        /// Files to upload as one batch
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List decks, most recently studied first
    Decks,
    /// Mark a session's deck as studied now
    Study {
        /// Session id of the deck
        session: String,
    },
    /// List documents stored by the backend
    Files {
        /// Session id (defaults to the stored one)
        #[arg(short, long)]
        session: Option<String>,
    },
    /// List generated flashcards
    Cards {
        /// Session id (defaults to the stored one)
        #[arg(short, long)]
        session: Option<String>,
    },
}

/// Initialize tracing on stderr so stdout carries only command output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "notedeck=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.server_url {
        config = config.with_server_url(url);
    }
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    let app = App::open(config)?;

    match cli.command {
        Commands::Session => {
            let id = app.sessions.ensure_session().await?;
            println!("{}", id);
        }
        Commands::Upload { paths } => upload(&app, paths).await?,
        Commands::Decks => {
            let decks = by_recency(&app.registry.load());
            if decks.is_empty() {
                println!("No decks yet.");
            }
            for deck in decks {
                let studied = deck
                    .last_studied_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}  {}  {} cards, {} notes, studied {}",
                    deck.session_id, deck.title, deck.card_count, deck.note_count, studied
                );
            }
        }
        Commands::Study { session } => {
            let decks = app.registry.mark_studied(&session);
            match decks.iter().find(|deck| deck.session_id == session) {
                Some(deck) => println!("Studied {}", deck.title),
                None => println!("No deck for session {}", session),
            }
        }
        Commands::Files { session } => {
            let session = resolve_session(&app, session)?;
            for file in app.backend.list_files(&session).await? {
                println!(
                    "{}  {}  {}",
                    file.id,
                    file.filename,
                    file.content_type.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Cards { session } => {
            let session = resolve_session(&app, session)?;
            for card in app.backend.list_flashcards(&session).await? {
                println!("Q: {}\nA: {}\n", card.question, card.answer);
            }
        }
    }

    Ok(())
}

async fn upload(app: &App, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in &paths {
        let document = Document::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        documents.push(document);
    }

    let mut updates = app.controller.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            if let Some(message) = snapshot.message {
                eprintln!("[{}] {}", snapshot.phase.as_str(), message);
            }
        }
    });

    let controller = app.controller.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            controller.cancel();
        }
    });

    let report = app.controller.start_upload(documents).await;
    interrupt.abort();
    printer.abort();

    match report {
        Some(report) => print_report(&report),
        None => println!("Nothing to upload."),
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!("{}", report.message);
    match report.generation {
        Some(GenerationReport::Generated { ref deck, ref message }) => {
            println!("{}", message);
            println!("Deck: {} ({} cards)", deck.title, deck.card_count);
        }
        Some(GenerationReport::Failed { ref message }) => println!("{}", message),
        None => {}
    }
}

fn resolve_session(app: &App, session: Option<String>) -> anyhow::Result<String> {
    session
        .or_else(|| app.sessions.current())
        .context("No session yet; upload some documents first or pass --session")
}
