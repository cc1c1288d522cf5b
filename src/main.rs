//! libros-reader - EPUB reader core command line
//!
//! Inspects books, prepares chapters into the cache, and runs the reader
//! bridge over stdin/stdout with one JSON message per line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libros_reader::bridge::{HostAction, HostMessage, ReaderSession, SqliteProgressStore};
use libros_reader::chapter::EmbeddingMode;
use libros_reader::epub::BookLoader;
use libros_reader::{ChapterCache, Config};

#[derive(Parser)]
#[command(name = "libros-reader")]
#[command(version, about = "EPUB reader core", long_about = None)]
#[command(after_help = "EXAMPLES:
    libros-reader inspect book.epub        Show metadata, spine and TOC
    libros-reader prepare book.epub 3      Prepare the fourth chapter
    libros-reader read book.epub           Run the bridge over stdin/stdout")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print package metadata, spine and navigation as JSON
    Inspect {
        #[arg(value_name = "EPUB")]
        epub: PathBuf,
    },
    /// Prepare one chapter and print the cached artifact
    Prepare {
        #[arg(value_name = "EPUB")]
        epub: PathBuf,
        /// Spine index
        index: usize,
        /// Inline resources as data URIs
        #[arg(long)]
        inline: bool,
    },
    /// Host a reading session: surface messages on stdin, host messages on stdout
    Read {
        #[arg(value_name = "EPUB")]
        epub: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries bridge traffic
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "libros_reader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { epub } => inspect(epub).await,
        Command::Prepare {
            epub,
            index,
            inline,
        } => prepare(&config, epub, index, inline).await,
        Command::Read { epub } => read(&config, epub).await,
    }
}

async fn inspect(epub: PathBuf) -> Result<()> {
    let book = BookLoader::load_async(epub.clone())
        .await
        .with_context(|| format!("Failed to load {}", epub.display()))?;

    println!("{}", serde_json::to_string_pretty(&book)?);
    Ok(())
}

async fn prepare(config: &Config, epub: PathBuf, index: usize, inline: bool) -> Result<()> {
    let book = BookLoader::load_async(epub.clone())
        .await
        .with_context(|| format!("Failed to load {}", epub.display()))?;

    let href = book.spine_href(index).with_context(|| {
        format!(
            "Chapter index {} out of range (book has {} chapters)",
            index,
            book.chapter_count()
        )
    })?;

    let mode = if inline {
        EmbeddingMode::InlineDataUris
    } else {
        config.cache.embedding
    };
    let cache = ChapterCache::new(&config.cache.root, mode, Some(config.style.clone()));
    cache.register(&book).await;

    let artifact = cache
        .get(&book.book_id, href)
        .await
        .with_context(|| format!("Failed to prepare {}", href))?;

    println!("{}", serde_json::to_string_pretty(&artifact)?);
    Ok(())
}

async fn read(config: &Config, epub: PathBuf) -> Result<()> {
    let book = BookLoader::load_async(epub.clone())
        .await
        .with_context(|| format!("Failed to load {}", epub.display()))?;

    let store = SqliteProgressStore::connect(&config.database.url)
        .await
        .with_context(|| format!("Failed to open progress store {}", config.database.url))?;

    let cache = ChapterCache::new(
        &config.cache.root,
        config.cache.embedding,
        Some(config.style.clone()),
    );
    let mut session = ReaderSession::open(
        book,
        cache,
        Arc::new(store),
        &config.bridge,
        config.style.clone(),
    )
    .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                match session.handle_raw(&line, Instant::now()) {
                    Ok(actions) => {
                        for action in actions {
                            match action {
                                HostAction::Send(message) => send(&mut stdout, &message).await?,
                                other => tracing::info!(action = ?other, "Host action"),
                            }
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Ignoring surface message"),
                }
            }
            Some(event) = session.next_chapter_event() => {
                match event.load_message() {
                    Some(message) => send(&mut stdout, &message).await?,
                    None => tracing::warn!(index = event.index, "Chapter unavailable"),
                }
            }
        }
    }

    session.close().await;
    Ok(())
}

async fn send(stdout: &mut tokio::io::Stdout, message: &HostMessage) -> Result<()> {
    let mut line = message.encode()?;
    line.push('\n');
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
