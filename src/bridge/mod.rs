//! Reader bridge
//!
//! The message protocol between the host and the rendering surface, the
//! gesture and navigation state machines on either side of it, and the
//! reading position persistence it drives.

pub mod gesture;
pub mod message;
pub mod navigator;
pub mod progress;
pub mod session;

pub use message::{Geometry, HostMessage, SurfaceMessage, SwipeDirection};
pub use navigator::{ChapterNavigator, Transition};
pub use progress::{BookRecord, ProgressSaver, ProgressStore, ReadingPosition, SqliteProgressStore};
pub use session::{ChapterEvent, ChapterOutcome, HostAction, ReaderSession};
