//! RIB file output.
//!
//! [`RibFile::finish`] is the only commit point: a file dropped before it is
//! finished is removed, so an interrupted frame never leaves a RIB that looks
//! complete.

use super::RibWriter;
use crate::util::{Error, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Byte sink of a RIB file, plain or gzip compressed.
pub enum FileSink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl FileSink {
    fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            Self::Gzip(gz) => gz.finish()?.flush(),
        }
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// A RIB file being written.
///
/// Dereferences to the [`RibWriter`] so it can be handed out as `&mut dyn Ri`.
pub struct RibFile {
    path: PathBuf,
    writer: Option<RibWriter<FileSink>>,
}

impl RibFile {
    /// Create (truncate) `path`, creating missing parent directories.
    pub fn create(path: impl AsRef<Path>, compress: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::output(&path, e))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::output(&path, e))?;
        let buf = BufWriter::with_capacity(1024 * 1024, file);
        let sink = if compress {
            FileSink::Gzip(GzEncoder::new(buf, Compression::default()))
        } else {
            FileSink::Plain(buf)
        };
        tracing::debug!(path = %path.display(), compress, "opened RIB");
        Ok(Self {
            path,
            writer: Some(RibWriter::new(sink)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close. Returns the path of the committed file.
    pub fn finish(mut self) -> Result<PathBuf> {
        if let Some(writer) = self.writer.take() {
            let sink = writer.into_inner()?;
            sink.finish().map_err(|e| Error::output(&self.path, e))?;
        }
        Ok(std::mem::take(&mut self.path))
    }
}

impl Deref for RibFile {
    type Target = RibWriter<FileSink>;

    fn deref(&self) -> &Self::Target {
        // Only `finish` takes the writer, and it consumes `self`.
        match &self.writer {
            Some(w) => w,
            None => unreachable!("RibFile used after finish"),
        }
    }
}

impl DerefMut for RibFile {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.writer {
            Some(w) => w,
            None => unreachable!("RibFile used after finish"),
        }
    }
}

impl Drop for RibFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            tracing::warn!(path = %self.path.display(), "removing unfinished RIB");
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
