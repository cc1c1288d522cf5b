//! Host side of the reader bridge for one open book
//!
//! A session consumes surface messages strictly in arrival order, drives the
//! chapter navigator and hands chapter preparation to the cache on the
//! blocking pool. Results come back through a channel tagged with the
//! navigation generation that requested them; a newer navigation aborts the
//! in-flight preparation and any late result it still delivers is dropped.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::message::{Geometry, HostMessage, SurfaceMessage};
use super::navigator::{ChapterNavigator, Transition};
use super::progress::{BookRecord, ProgressSaver, ProgressStore, ReadingPosition};
use crate::cache::ChapterCache;
use crate::chapter::embed::file_url;
use crate::chapter::{ChapterArtifact, StyleConfig};
use crate::config::BridgeConfig;
use crate::epub::{path, LoadedBook};
use crate::error::{ReaderError, Result};

/// What the host UI should do in response to a surface message
#[derive(Debug, Clone, PartialEq)]
pub enum HostAction {
    /// Forward to the rendering surface
    Send(HostMessage),
    ToggleChrome,
    ShowImage {
        src: String,
        geometry: Option<Geometry>,
    },
    OpenExternal {
        href: String,
    },
    /// Follow the finger during a horizontal drag
    Drag {
        delta_x: f64,
    },
    DragCancelled,
}

#[derive(Debug)]
pub enum ChapterOutcome {
    Ready(ChapterArtifact),
    Failed(ReaderError),
}

/// Completion of a chapter preparation
#[derive(Debug)]
pub struct ChapterEvent {
    pub generation: u64,
    pub index: usize,
    pub outcome: ChapterOutcome,
}

impl ChapterEvent {
    /// `loadChapter` for a ready chapter
    pub fn load_message(&self) -> Option<HostMessage> {
        match &self.outcome {
            ChapterOutcome::Ready(artifact) => Some(HostMessage::LoadChapter {
                index: self.index,
                url: file_url(&artifact.prepared_path),
            }),
            ChapterOutcome::Failed(_) => None,
        }
    }
}

pub struct ReaderSession {
    book: Arc<LoadedBook>,
    cache: ChapterCache,
    navigator: ChapterNavigator,
    saver: ProgressSaver,
    style: StyleConfig,
    /// Anchor to scroll to once the surface reports ready
    pending_anchor: Option<String>,
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<ChapterEvent>,
    events_rx: mpsc::UnboundedReceiver<ChapterEvent>,
}

impl ReaderSession {
    /// Open a book: register it with the cache and the store, restore the
    /// saved position and start preparing the current chapter.
    pub async fn open(
        book: LoadedBook,
        cache: ChapterCache,
        store: Arc<dyn ProgressStore>,
        bridge: &BridgeConfig,
        style: StyleConfig,
    ) -> Result<Self> {
        cache.register(&book).await;

        let saved = store
            .load(&book.book_id)
            .await?
            .and_then(|record| record.position);

        store
            .upsert_book(&BookRecord {
                book_id: book.book_id.clone(),
                archive_path: book.archive_path.to_string_lossy().into_owned(),
                title: book.package.metadata.title.clone(),
                author: book.package.metadata.author.clone(),
                position: None,
                updated_at: String::new(),
            })
            .await?;

        // Prefer the href; the spine may have changed since the save
        let (start, pending_anchor) = match saved {
            Some(position) => {
                let index = book
                    .spine_index_of(&position.chapter_href)
                    .unwrap_or(position.chapter_index);
                (index, position.anchor_id)
            }
            None => (0, None),
        };

        let navigator =
            ChapterNavigator::new(book.chapter_count(), start, bridge.swipe_debounce);
        let saver = ProgressSaver::spawn(store, book.book_id.clone(), bridge.progress_debounce);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::info!(
            book_id = %book.book_id,
            index = navigator.index(),
            restored = pending_anchor.is_some(),
            "Opened reader session"
        );

        let mut session = Self {
            book: Arc::new(book),
            cache,
            navigator,
            saver,
            style,
            pending_anchor,
            generation: 0,
            in_flight: None,
            events_tx,
            events_rx,
        };
        session.request_chapter(session.navigator.index());
        Ok(session)
    }

    pub fn book(&self) -> &LoadedBook {
        &self.book
    }

    pub fn current_index(&self) -> usize {
        self.navigator.index()
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    /// Replace the style; returns the message to push to the surface
    pub fn set_style(&mut self, style: StyleConfig) -> HostMessage {
        self.style = style;
        HostMessage::SetStyles {
            css: self.style.to_css(),
        }
    }

    /// Next chapter preparation result for the current navigation.
    ///
    /// Results of superseded navigations are skipped.
    pub async fn next_chapter_event(&mut self) -> Option<ChapterEvent> {
        loop {
            let event = self.events_rx.recv().await?;
            if event.generation == self.generation {
                self.in_flight = None;
                return Some(event);
            }
            tracing::debug!(
                index = event.index,
                generation = event.generation,
                "Dropping superseded chapter result"
            );
        }
    }

    /// Parse and handle one raw message from the surface
    pub fn handle_raw(&mut self, raw: &str, now: Instant) -> Result<Vec<HostAction>> {
        let message = SurfaceMessage::parse(raw)?;
        self.handle(message, now)
    }

    pub fn handle(&mut self, message: SurfaceMessage, now: Instant) -> Result<Vec<HostAction>> {
        let actions = match message {
            SurfaceMessage::BridgeReady => {
                let mut actions = vec![HostAction::Send(HostMessage::SetStyles {
                    css: self.style.to_css(),
                })];
                if let Some(id) = self.pending_anchor.take() {
                    actions.push(HostAction::Send(HostMessage::ScrollTo { id }));
                }
                actions
            }
            SurfaceMessage::Progress { id, top, .. } => {
                let index = self.navigator.index();
                if let Some(href) = self.book.spine_href(index) {
                    self.saver.schedule(ReadingPosition {
                        chapter_index: index,
                        chapter_href: href.to_string(),
                        anchor_id: Some(id),
                        top,
                    });
                }
                Vec::new()
            }
            SurfaceMessage::SwipeEnd { direction } => {
                let transition = self.navigator.on_swipe(direction, now);
                self.apply(transition);
                Vec::new()
            }
            SurfaceMessage::SwipeProgress { delta_x } => vec![HostAction::Drag { delta_x }],
            SurfaceMessage::SwipeCancel => vec![HostAction::DragCancelled],
            SurfaceMessage::Tap => vec![HostAction::ToggleChrome],
            SurfaceMessage::ImageClick { src, geometry, .. } => {
                vec![HostAction::ShowImage { src, geometry }]
            }
            SurfaceMessage::LinkClick { href } => self.follow_link(href)?,
        };
        Ok(actions)
    }

    /// Jump to a spine index
    pub fn go_to(&mut self, index: usize) -> Result<()> {
        let transition = self.navigator.go_to(index)?;
        self.apply(transition);
        Ok(())
    }

    /// Jump to the chapter targeted by a TOC entry
    pub fn go_to_toc(&mut self, toc_index: usize) -> Result<()> {
        let index = self.book.toc_spine_index(toc_index).ok_or_else(|| {
            ReaderError::NavigationOutOfRange {
                index: toc_index,
                count: self.book.navigation.len(),
            }
        })?;
        self.go_to(index)
    }

    /// Stop background work and write any pending position
    pub async fn close(mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.saver.shutdown().await;
    }

    fn follow_link(&mut self, href: String) -> Result<Vec<HostAction>> {
        let fragment = href
            .split_once('#')
            .map(|(_, fragment)| fragment.to_string())
            .filter(|fragment| !fragment.is_empty());

        if href.trim_start().starts_with('#') {
            return Ok(fragment
                .map(|id| vec![HostAction::Send(HostMessage::ScrollTo { id })])
                .unwrap_or_default());
        }
        if path::is_external(&href) {
            return Ok(vec![HostAction::OpenExternal { href }]);
        }

        let current = self.book.spine_href(self.navigator.index()).unwrap_or_default();
        let target = path::resolve(path::parent_dir(current), &href);

        match self.book.spine_index_of(&target) {
            Some(index) if index == self.navigator.index() => Ok(fragment
                .map(|id| vec![HostAction::Send(HostMessage::ScrollTo { id })])
                .unwrap_or_default()),
            Some(index) => {
                self.pending_anchor = fragment;
                self.go_to(index)?;
                Ok(Vec::new())
            }
            None => {
                tracing::warn!(href = %href, target = %target, "Link target is not in the spine");
                Ok(Vec::new())
            }
        }
    }

    fn apply(&mut self, transition: Transition) {
        let Transition::Moved { from, to } = transition else {
            return;
        };
        tracing::debug!(from, to, "Chapter navigation");

        self.request_chapter(to);
        if let Some(href) = self.book.spine_href(to) {
            self.saver
                .schedule(ReadingPosition::chapter_start(to, href));
        }
    }

    fn request_chapter(&mut self, index: usize) {
        let Some(href) = self.book.spine_href(index).map(str::to_string) else {
            return;
        };

        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.generation += 1;

        let generation = self.generation;
        let cache = self.cache.clone();
        let book_id = self.book.book_id.clone();
        let events = self.events_tx.clone();

        self.in_flight = Some(tokio::spawn(async move {
            let outcome = match cache.get(&book_id, &href).await {
                Ok(artifact) => ChapterOutcome::Ready(artifact),
                Err(e) => {
                    tracing::error!(book_id = %book_id, href = %href, error = %e, "Chapter preparation failed");
                    ChapterOutcome::Failed(e)
                }
            };
            let _ = events.send(ChapterEvent {
                generation,
                index,
                outcome,
            });
        }));
    }
}
