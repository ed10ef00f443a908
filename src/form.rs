use std::fmt;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{Stream, TryStreamExt};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use http::HeaderMap;
use tracing::{debug, trace};

use crate::part::{FieldEntry, FileDescriptor, PartInfo, UploadResult};
use crate::state::{Event, Parser};
use crate::storage::{MemoryStorage, StorageEngine};
use crate::utils::{parse_content_disposition, parse_content_type, MAX_BOUNDARY_SIZE};
use crate::{BoxError, Error, Limits, Result};

/// Verdict of the caller-supplied part filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Store the part.
    Accept,
    /// Skip the part: its body is drained but nothing is stored and
    /// nothing reaches the result. Not an error.
    Reject,
}

/// What to do with a part whose `filename` is an empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyFilename {
    /// Keep it a file part with an unknown name.
    #[default]
    File,
    /// Demote it to a plain form field.
    Field,
}

type Filter = Box<dyn Fn(&PartInfo) -> FilterDecision + Send>;

/// Chunk-count bookkeeping for the limit checkpoints.
#[derive(Debug, Default)]
struct Counters {
    parts: usize,
    fields: usize,
    files: usize,
}

/// Destination for the part currently being parsed.
enum Sink<H> {
    Field { part: PartInfo, value: BytesMut },
    File { part: PartInfo, handle: H, written: usize },
    Skip,
}

/// A streaming `multipart/form-data` parse over one transport byte stream.
///
/// Drives transport bytes through the boundary scanner, the part state
/// machine, the configured limits and filter, and into a
/// [`StorageEngine`], producing an [`UploadResult`]. One `FormData` parses
/// one body; independent requests use independent instances.
///
/// The next transport chunk is only requested after the current chunk's
/// bytes are fully dispatched, so peak memory stays at one header block
/// plus one chunk plus the scanner's retained tail, regardless of body
/// size.
///
/// ```
/// use formpipe::{FormData, Limits};
/// use bytes::Bytes;
/// use std::convert::Infallible;
/// use futures_util::stream;
///
/// # async fn run() -> Result<(), formpipe::Error> {
/// let body = "--X\r\nContent-Disposition: form-data; name=\"greeting\"\r\n\r\nhi\r\n--X--\r\n";
/// let stream = stream::iter([Ok::<Bytes, Infallible>(Bytes::from(body))]);
///
/// let result = FormData::new(stream, "X")
///     .limits(Limits::default().parts(16))
///     .load()
///     .await?;
///
/// assert_eq!(result.first_field("greeting").unwrap().text(), "hi");
/// # Ok(())
/// # }
/// ```
pub struct FormData<T> {
    stream: T,
    boundary: String,
    limits: Limits,
    filter: Option<Filter>,
    empty_filename: EmptyFilename,
}

impl<T> FormData<T> {
    /// Creates a parse over `stream` with the boundary token from
    /// [`parse_boundary`](crate::parse_boundary).
    pub fn new(stream: T, boundary: impl Into<String>) -> Self {
        Self {
            stream,
            boundary: boundary.into(),
            limits: Limits::default(),
            filter: None,
            empty_filename: EmptyFilename::default(),
        }
    }

    /// Applies a limits snapshot.
    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Installs a per-part filter, invoked once per part after its headers
    /// are parsed and before any body byte is stored.
    #[must_use]
    pub fn filter(mut self, f: impl Fn(&PartInfo) -> FilterDecision + Send + 'static) -> Self {
        self.filter = Some(Box::new(f));
        self
    }

    /// Sets the empty-filename policy.
    #[must_use]
    pub fn empty_filename(mut self, policy: EmptyFilename) -> Self {
        self.empty_filename = policy;
        self
    }
}

impl<T> fmt::Debug for FormData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormData")
            .field("boundary", &self.boundary)
            .field("limits", &self.limits)
            .field("filter", &self.filter.is_some())
            .field("empty_filename", &self.empty_filename)
            .finish()
    }
}

impl<T, B, E> FormData<T>
where
    T: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: Into<Bytes>,
    E: Into<BoxError>,
{
    /// Parses the whole body, routing accepted file parts into `engine`.
    ///
    /// On any error the in-flight storage handle is aborted before the
    /// error is returned; the caller never sees a partial result.
    pub async fn store<S: StorageEngine>(
        mut self,
        engine: &mut S,
    ) -> Result<UploadResult<S::Locator>> {
        let mut sink = None;
        let mut result = UploadResult::new();

        match self.drive(engine, &mut sink, &mut result).await {
            Ok(()) => Ok(result),
            Err(err) => {
                if let Some(Sink::File { handle, part, .. }) = sink.take() {
                    debug!(name = part.name(), "aborting in-flight upload");
                    engine.abort(handle);
                }
                Err(err)
            }
        }
    }

    /// Parses the whole body, buffering files in memory.
    pub async fn load(self) -> Result<UploadResult<Bytes>> {
        let mut engine = MemoryStorage::new();
        self.store(&mut engine).await
    }

    async fn drive<S: StorageEngine>(
        &mut self,
        engine: &mut S,
        sink: &mut Option<Sink<S::Handle>>,
        result: &mut UploadResult<S::Locator>,
    ) -> Result<()> {
        if self.boundary.is_empty() || self.boundary.len() > MAX_BOUNDARY_SIZE {
            return Err(Error::MalformedBoundary);
        }

        let mut parser = Parser::new(&self.boundary, self.limits.header_size);
        let mut counters = Counters::default();

        loop {
            while let Some(event) = parser.next_event()? {
                match event {
                    Event::PartBegin(headers) => {
                        self.begin_part(engine, sink, &mut counters, headers)?;
                    }
                    Event::BodyChunk(data) => self.body_chunk(engine, sink, &data)?,
                    Event::PartEnd => end_part(engine, sink, result)?,
                    Event::Finished => return Ok(()),
                }
            }

            match self.stream.try_next().await {
                Ok(Some(chunk)) => {
                    let chunk = chunk.into();
                    trace!(len = chunk.len(), "transport chunk");
                    parser.push(&chunk);
                }
                Ok(None) => parser.set_eof(),
                Err(err) => return Err(Error::TransportAbort(Some(err.into()))),
            }
        }
    }

    /// New-part checkpoint: counts, name length, filter, storage open.
    fn begin_part<S: StorageEngine>(
        &self,
        engine: &mut S,
        sink: &mut Option<Sink<S::Handle>>,
        counters: &mut Counters,
        mut headers: HeaderMap,
    ) -> Result<()> {
        counters.parts += 1;
        if let Some(max) = self.limits.checked_parts(counters.parts) {
            return Err(Error::TooManyParts(max));
        }

        let disposition = headers
            .remove(CONTENT_DISPOSITION)
            .ok_or(Error::MalformedPart)?;
        let (name, mut filename) = parse_content_disposition(disposition.as_bytes())?;

        if let Some(max) = self.limits.checked_field_name_size(name.len()) {
            return Err(Error::FieldNameTooLong(max));
        }

        if self.empty_filename == EmptyFilename::Field && filename.as_deref() == Some("") {
            filename = None;
        }

        if filename.is_some() {
            counters.files += 1;
            if let Some(max) = self.limits.checked_files(counters.files) {
                return Err(Error::TooManyFiles(max));
            }
        } else {
            counters.fields += 1;
            if let Some(max) = self.limits.checked_fields(counters.fields) {
                return Err(Error::TooManyFields(max));
            }
        }

        let content_type = parse_content_type(headers.remove(CONTENT_TYPE).as_ref());
        let is_file = filename.is_some();
        let part = PartInfo::new(counters.parts - 1, name, filename, content_type, headers);

        if let Some(filter) = &self.filter {
            if filter(&part) == FilterDecision::Reject {
                debug!(name = part.name(), "part rejected by filter");
                *sink = Some(Sink::Skip);
                return Ok(());
            }
        }

        trace!(name = part.name(), is_file, "part accepted");
        *sink = Some(if is_file {
            let handle = engine.open(&part)?;
            Sink::File {
                part,
                handle,
                written: 0,
            }
        } else {
            Sink::Field {
                part,
                value: BytesMut::new(),
            }
        });

        Ok(())
    }

    /// Body checkpoint: the running size is checked before the chunk is
    /// accumulated or written, so nothing over the ceiling is persisted.
    fn body_chunk<S: StorageEngine>(
        &self,
        engine: &mut S,
        sink: &mut Option<Sink<S::Handle>>,
        data: &Bytes,
    ) -> Result<()> {
        match sink.as_mut() {
            Some(Sink::Field { value, .. }) => {
                if let Some(max) = self.limits.checked_field_size(value.len() + data.len()) {
                    return Err(Error::FieldValueTooLong(max));
                }
                value.extend_from_slice(data);
            }
            Some(Sink::File {
                handle, written, ..
            }) => {
                let next = *written + data.len();
                if let Some(max) = self.limits.checked_file_size(next) {
                    return Err(Error::FileTooLarge(max));
                }
                engine.write(handle, data)?;
                *written = next;
            }
            Some(Sink::Skip) => {}
            // Unreachable: the state machine only yields body chunks
            // between PartBegin and PartEnd.
            None => {}
        }
        Ok(())
    }
}

fn end_part<S: StorageEngine>(
    engine: &mut S,
    sink: &mut Option<Sink<S::Handle>>,
    result: &mut UploadResult<S::Locator>,
) -> Result<()> {
    match sink.take() {
        Some(Sink::Field { part, value }) => {
            trace!(name = part.name(), len = value.len(), "field complete");
            result.push_field(FieldEntry::new(part.name().to_owned(), value.freeze()));
        }
        Some(Sink::File {
            part,
            handle,
            written,
        }) => {
            let locator = engine.finalize(handle)?;
            trace!(name = part.name(), size = written, "file finalized");
            result.push_file(FileDescriptor::new(part, written as u64, locator));
        }
        Some(Sink::Skip) | None => {}
    }
    Ok(())
}
