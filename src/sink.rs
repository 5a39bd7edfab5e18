//! Writing rendered diagrams to files.
//!
//! Output files are never overwritten. Every write opens the target with
//! `create_new`, goes through a buffered writer and flushes before returning,
//! so a failure never leaves a half-written file behind.
//!
//! | Operation | Preconditions |
//! |-----------|---------------|
//! | [`DiagramResultSink::write_to_file`] | target absent |
//! | [`DiagramResultSink::write_derived`] | source present, target absent, source != target |
//! | [`DiagramResultSink::write_png_to_file`] | target absent |
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use mermaid_headless::sink::{DiagramResultSink, LocalFile, derive_target};
//! # use mermaid_headless::RenderedDiagram;
//!
//! # fn example(diagram: &RenderedDiagram) -> mermaid_headless::Result<()> {
//! let source = LocalFile::new("docs/flow.mmd");
//! let target = LocalFile::new(derive_target(Path::new("docs/flow.mmd"), "svg"));
//! DiagramResultSink::new().write_derived(diagram, &source, &target)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::renderer::RenderedDiagram;

// ============================================================================
// FileTarget
// ============================================================================

/// A place a diagram can be written to.
pub trait FileTarget {
    /// Returns `true` if something already exists at the target.
    fn exists(&self) -> bool;

    /// Returns the target path.
    fn path(&self) -> &Path;

    /// Creates the target and writes `text` to it.
    ///
    /// # Errors
    ///
    /// [`Error::FileConflict`] if the target appeared meanwhile, otherwise
    /// [`Error::Io`].
    fn write_text(&self, text: &str) -> Result<()> {
        self.write_bytes(text.as_bytes())
    }

    /// Creates the target and writes `bytes` to it.
    ///
    /// # Errors
    ///
    /// [`Error::FileConflict`] if the target appeared meanwhile, otherwise
    /// [`Error::Io`].
    fn write_bytes(&self, bytes: &[u8]) -> Result<()>;
}

// ============================================================================
// LocalFile
// ============================================================================

/// A file on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    /// Wraps a path.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FileTarget for LocalFile {
    #[inline]
    fn exists(&self) -> bool {
        self.path.exists()
    }

    #[inline]
    fn path(&self) -> &Path {
        &self.path
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                IoErrorKind::AlreadyExists => {
                    Error::file_conflict(&self.path, "target already exists")
                }
                _ => Error::Io(e),
            })?;

        let mut writer = BufWriter::new(file);
        let written = writer.write_all(bytes).and_then(|()| writer.flush());

        if let Err(e) = written {
            drop(writer);
            // The file is ours; leave nothing partial behind.
            let _ = fs::remove_file(&self.path);
            return Err(Error::Io(e));
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "File written");
        Ok(())
    }
}

// ============================================================================
// DiagramResultSink
// ============================================================================

/// Writes [`RenderedDiagram`]s to [`FileTarget`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagramResultSink;

impl DiagramResultSink {
    /// Creates a sink.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Writes the SVG to a target that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileConflict`] if the target exists.
    pub fn write_to_file(&self, result: &RenderedDiagram, target: &dyn FileTarget) -> Result<()> {
        ensure_absent(target)?;
        target.write_text(result.svg())?;
        info!(path = %target.path().display(), "SVG written");
        Ok(())
    }

    /// Writes the SVG next to the markup file it was rendered from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileConflict`] if the source is missing, equals the
    /// target, or the target exists.
    pub fn write_derived(
        &self,
        result: &RenderedDiagram,
        source: &dyn FileTarget,
        target: &dyn FileTarget,
    ) -> Result<()> {
        if !source.exists() {
            return Err(Error::file_conflict(source.path(), "source does not exist"));
        }
        if same_file(source.path(), target.path()) {
            return Err(Error::file_conflict(target.path(), "target is the source file"));
        }
        self.write_to_file(result, target)
    }

    /// Writes the PNG to a target that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileConflict`] if the target exists.
    pub fn write_png_to_file(
        &self,
        result: &RenderedDiagram,
        target: &dyn FileTarget,
    ) -> Result<()> {
        ensure_absent(target)?;
        target.write_bytes(result.png())?;
        info!(path = %target.path().display(), "PNG written");
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Replaces the extension of `source`: `diagram.mmd` becomes `diagram.svg`.
#[must_use]
pub fn derive_target(source: &Path, extension: &str) -> PathBuf {
    source.with_extension(extension.trim_start_matches('.'))
}

fn ensure_absent(target: &dyn FileTarget) -> Result<()> {
    if target.exists() {
        return Err(Error::file_conflict(target.path(), "target already exists"));
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.parent().map(Path::canonicalize)) {
        (Ok(a), Some(Ok(parent))) => b.file_name().is_some_and(|name| a == parent.join(name)),
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
