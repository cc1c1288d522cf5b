//! Reading position persistence and the debounced saver in front of it

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Result;

/// Where the reader is within a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPosition {
    pub chapter_index: usize,
    pub chapter_href: String,
    /// First visible element id reported by the surface
    pub anchor_id: Option<String>,
    pub top: f64,
}

impl ReadingPosition {
    pub fn chapter_start(chapter_index: usize, chapter_href: impl Into<String>) -> Self {
        Self {
            chapter_index,
            chapter_href: chapter_href.into(),
            anchor_id: None,
            top: 0.0,
        }
    }
}

/// A library entry as supplied by the persistence store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub book_id: String,
    pub archive_path: String,
    pub title: String,
    pub author: String,
    pub position: Option<ReadingPosition>,
    pub updated_at: String,
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Insert or refresh a book's library fields, keeping its position
    async fn upsert_book(&self, record: &BookRecord) -> Result<()>;

    async fn load(&self, book_id: &str) -> Result<Option<BookRecord>>;

    async fn save_position(&self, book_id: &str, position: &ReadingPosition) -> Result<()>;
}

#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    book_id: String,
    archive_path: String,
    title: String,
    author: String,
    chapter_index: Option<i64>,
    chapter_href: Option<String>,
    anchor_id: Option<String>,
    scroll_top: Option<f64>,
    updated_at: String,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        let position = match (row.chapter_index, row.chapter_href) {
            (Some(index), Some(href)) => Some(ReadingPosition {
                chapter_index: index.max(0) as usize,
                chapter_href: href,
                anchor_id: row.anchor_id,
                top: row.scroll_top.unwrap_or(0.0),
            }),
            _ => None,
        };

        BookRecord {
            book_id: row.book_id,
            archive_path: row.archive_path,
            title: row.title,
            author: row.author,
            position,
            updated_at: row.updated_at,
        }
    }
}

/// SQLite-backed progress store
#[derive(Debug, Clone)]
pub struct SqliteProgressStore {
    pool: SqlitePool,
}

impl SqliteProgressStore {
    /// Connect (creating the database file if needed) and ensure the schema
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database; one connection so every query sees it
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                book_id TEXT PRIMARY KEY,
                archive_path TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                chapter_index INTEGER,
                chapter_href TEXT,
                anchor_id TEXT,
                scroll_top REAL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl ProgressStore for SqliteProgressStore {
    async fn upsert_book(&self, record: &BookRecord) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO books (book_id, archive_path, title, author, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(book_id) DO UPDATE SET
                archive_path = excluded.archive_path,
                title = excluded.title,
                author = excluded.author,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.book_id)
        .bind(&record.archive_path)
        .bind(&record.title)
        .bind(&record.author)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if let Some(position) = &record.position {
            self.save_position(&record.book_id, position).await?;
        }
        Ok(())
    }

    async fn load(&self, book_id: &str) -> Result<Option<BookRecord>> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT book_id, archive_path, title, author, chapter_index,
                   chapter_href, anchor_id, scroll_top, updated_at
            FROM books
            WHERE book_id = ?
            "#,
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(BookRecord::from))
    }

    async fn save_position(&self, book_id: &str, position: &ReadingPosition) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO books (book_id, chapter_index, chapter_href, anchor_id, scroll_top, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(book_id) DO UPDATE SET
                chapter_index = excluded.chapter_index,
                chapter_href = excluded.chapter_href,
                anchor_id = excluded.anchor_id,
                scroll_top = excluded.scroll_top,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(book_id)
        .bind(position.chapter_index as i64)
        .bind(&position.chapter_href)
        .bind(&position.anchor_id)
        .bind(position.top)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

enum SaverCommand {
    Save(ReadingPosition),
    Flush(oneshot::Sender<()>),
}

/// Trailing debouncer: requests inside the window collapse into one write
/// carrying the last position.
pub struct ProgressSaver {
    tx: mpsc::UnboundedSender<SaverCommand>,
    task: JoinHandle<()>,
}

impl ProgressSaver {
    pub fn spawn(store: Arc<dyn ProgressStore>, book_id: String, window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_saver(store, book_id, window, rx));
        Self { tx, task }
    }

    pub fn schedule(&self, position: ReadingPosition) {
        if self.tx.send(SaverCommand::Save(position)).is_err() {
            tracing::warn!("Progress saver stopped; dropping position");
        }
    }

    /// Write any pending position now
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(SaverCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Flush and stop the background task
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Progress saver task failed");
        }
    }
}

async fn run_saver(
    store: Arc<dyn ProgressStore>,
    book_id: String,
    window: Duration,
    mut rx: mpsc::UnboundedReceiver<SaverCommand>,
) {
    let mut pending: Option<ReadingPosition> = None;
    let sleep = tokio::time::sleep(window);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(SaverCommand::Save(position)) => {
                    pending = Some(position);
                    sleep.as_mut().reset(Instant::now() + window);
                }
                Some(SaverCommand::Flush(ack)) => {
                    write_pending(store.as_ref(), &book_id, &mut pending).await;
                    let _ = ack.send(());
                }
                None => {
                    write_pending(store.as_ref(), &book_id, &mut pending).await;
                    break;
                }
            },
            () = &mut sleep, if pending.is_some() => {
                write_pending(store.as_ref(), &book_id, &mut pending).await;
            }
        }
    }
}

async fn write_pending(store: &dyn ProgressStore, book_id: &str, pending: &mut Option<ReadingPosition>) {
    let Some(position) = pending.take() else {
        return;
    };

    match store.save_position(book_id, &position).await {
        Ok(()) => tracing::debug!(
            book_id,
            index = position.chapter_index,
            anchor = ?position.anchor_id,
            "Saved reading position"
        ),
        Err(e) => tracing::warn!(book_id, error = %e, "Failed to save reading position"),
    }
}
