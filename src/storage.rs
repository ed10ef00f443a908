use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::part::PartInfo;

/// Pluggable persistence for file-part payloads.
///
/// One `open` per accepted file part, zero or more `write`s, then exactly
/// one of `finalize`/`abort`. Both terminal calls consume the handle, so an
/// already-terminated handle cannot be touched again. Any `io::Error` is
/// fatal to the enclosing parse: earlier bytes are gone from the scanner
/// and cannot be replayed.
pub trait StorageEngine {
    /// In-flight upload state.
    type Handle;
    /// Backend-specific way to find the stored bytes again.
    type Locator;

    /// Starts persisting one file part.
    fn open(&mut self, part: &PartInfo) -> io::Result<Self::Handle>;

    /// Appends payload bytes. Each byte is delivered exactly once.
    fn write(&mut self, handle: &mut Self::Handle, chunk: &[u8]) -> io::Result<()>;

    /// Completes the upload, yielding its locator.
    fn finalize(&mut self, handle: Self::Handle) -> io::Result<Self::Locator>;

    /// Releases partial state. Must be safe to call on any open handle;
    /// never fails.
    fn abort(&mut self, handle: Self::Handle);
}

/// Buffers each file in memory; the locator is the buffer itself.
///
/// Simple over efficient. Suited to callers that immediately re-stream the
/// payload somewhere else.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStorage;

impl MemoryStorage {
    /// Creates a memory-backed engine.
    pub fn new() -> Self {
        Self
    }
}

impl StorageEngine for MemoryStorage {
    type Handle = BytesMut;
    type Locator = Bytes;

    fn open(&mut self, _part: &PartInfo) -> io::Result<Self::Handle> {
        Ok(BytesMut::new())
    }

    fn write(&mut self, handle: &mut Self::Handle, chunk: &[u8]) -> io::Result<()> {
        handle.extend_from_slice(chunk);
        Ok(())
    }

    fn finalize(&mut self, handle: Self::Handle) -> io::Result<Self::Locator> {
        Ok(handle.freeze())
    }

    fn abort(&mut self, handle: Self::Handle) {
        drop(handle);
    }
}

/// Writes each file into a destination directory under a unique name.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    dir: PathBuf,
    counter: u64,
}

/// An open file being written by [`DiskStorage`].
#[derive(Debug)]
pub struct DiskHandle {
    writer: BufWriter<fs::File>,
    path: PathBuf,
}

impl DiskStorage {
    /// Creates an engine targeting `dir`. The directory is created lazily
    /// on the first `open`; creation failure surfaces there.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: 0,
        }
    }

    /// Destination directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{field}-{counter}-{clock}[.{ext}]`: sanitized field name, an
    /// engine-monotonic counter and a clock component. `create_new` below
    /// still guards against collisions with pre-existing files.
    fn unique_name(&mut self, part: &PartInfo) -> String {
        self.counter += 1;
        let clock = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let stem = sanitize(part.name());
        let ext = part
            .filename()
            .and_then(|f| Path::new(f).extension())
            .and_then(|e| e.to_str());
        match ext {
            Some(ext) => format!("{}-{}-{:09}.{}", stem, self.counter, clock, sanitize(ext)),
            None => format!("{}-{}-{:09}", stem, self.counter, clock),
        }
    }
}

impl StorageEngine for DiskStorage {
    type Handle = DiskHandle;
    type Locator = PathBuf;

    fn open(&mut self, part: &PartInfo) -> io::Result<Self::Handle> {
        fs::create_dir_all(&self.dir)?;
        loop {
            let name = self.unique_name(part);
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    debug!(path = %path.display(), "upload target opened");
                    return Ok(DiskHandle {
                        writer: BufWriter::new(file),
                        path,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn write(&mut self, handle: &mut Self::Handle, chunk: &[u8]) -> io::Result<()> {
        handle.writer.write_all(chunk)
    }

    fn finalize(&mut self, handle: Self::Handle) -> io::Result<Self::Locator> {
        let DiskHandle { mut writer, path } = handle;
        if let Err(err) = writer.flush() {
            // A failed flush leaves nothing behind.
            drop(writer);
            let _ = fs::remove_file(&path);
            return Err(err);
        }
        Ok(path)
    }

    fn abort(&mut self, handle: Self::Handle) {
        let DiskHandle { writer, path } = handle;
        drop(writer);
        // Idempotent: a file that is already gone is fine.
        let _ = fs::remove_file(&path);
    }
}

fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "part".to_owned()
    } else {
        cleaned
    }
}
