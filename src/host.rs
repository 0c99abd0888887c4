//! Host-side collaborators
//!
//! The session engine never builds UI or owns storage formats; it talks to
//! the host through these interfaces. Default implementations cover the
//! standalone binary: markdown files on disk, an in-memory editor buffer,
//! and tracing-backed notifications.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Severity of a user-facing status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Fire-and-forget UI feedback; must never block session logic
pub trait StatusReporter {
    /// Surface a human-readable message to the user
    fn notify(&self, message: &str, level: StatusLevel);
}

/// Routes status messages through tracing
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn notify(&self, message: &str, level: StatusLevel) {
        match level {
            StatusLevel::Info | StatusLevel::Success => tracing::info!("{message}"),
            StatusLevel::Warning => tracing::warn!("{message}"),
            StatusLevel::Error => tracing::error!("{message}"),
        }
    }
}

/// Session transcript storage
pub trait Persistence: Send + Sync {
    /// Write session content under `name`
    ///
    /// Collision-safe: if `name` already exists, a numeric suffix is
    /// appended before the extension.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    fn write_session(&self, name: &str, content: &str) -> Result<PathBuf>;
}

/// Writes session files under a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Persistence(format!("cannot create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Pick a non-colliding path for `name` inside the store
    fn available_path(&self, name: &str) -> PathBuf {
        let candidate = self.dir.join(name);
        if !candidate.exists() {
            return candidate;
        }

        let (stem, ext) = split_name(name);
        for n in 1.. {
            let candidate = if ext.is_empty() {
                self.dir.join(format!("{stem}-{n}"))
            } else {
                self.dir.join(format!("{stem}-{n}.{ext}"))
            };
            if !candidate.exists() {
                return candidate;
            }
        }
        unreachable!()
    }
}

impl Persistence for FileStore {
    fn write_session(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.available_path(name);
        std::fs::write(&path, content)
            .map_err(|e| Error::Persistence(format!("cannot write {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "session persisted");
        Ok(path)
    }
}

/// Split a file name into stem and extension
fn split_name(name: &str) -> (&str, &str) {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map_or((name, ""), |ext| {
            (&name[..name.len() - ext.len() - 1], ext)
        })
}

/// Text insertion target for dictation and single-turn conversations
pub trait NoteEditor {
    /// Insert text at the cursor, advancing it by the inserted length
    fn insert_at_cursor(&mut self, text: &str);

    /// Current cursor position (byte offset)
    fn cursor(&self) -> usize;

    /// Move the cursor
    fn set_cursor(&mut self, position: usize);
}

/// In-memory editor buffer
#[derive(Debug, Default)]
pub struct BufferEditor {
    text: String,
    cursor: usize,
}

impl BufferEditor {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Full buffer contents
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl NoteEditor for BufferEditor {
    fn insert_at_cursor(&mut self, text: &str) {
        let at = self.cursor.min(self.text.len());
        self.text.insert_str(at, text);
        self.cursor = at + text.len();
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, position: usize) {
        let mut position = position.min(self.text.len());
        // Land on a char boundary so insert_at_cursor cannot panic
        while !self.text.is_char_boundary(position) {
            position -= 1;
        }
        self.cursor = position;
    }
}
