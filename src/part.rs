use bytes::Bytes;
use http::HeaderMap;
use mime::Mime;

/// Metadata of one part, fixed once its header block is parsed.
#[derive(Debug, Clone)]
pub struct PartInfo {
    index: usize,
    name: String,
    filename: Option<String>,
    content_type: Option<Mime>,
    headers: HeaderMap,
}

impl PartInfo {
    pub(crate) fn new(
        index: usize,
        name: String,
        filename: Option<String>,
        content_type: Option<Mime>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            index,
            name,
            filename,
            content_type,
            headers,
        }
    }

    /// Zero-based arrival position within the body.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Form field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Original filename; `Some("")` is possible.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Declared media type, when the part carried a `Content-Type`.
    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    /// Remaining part headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// A non-file field and its raw value.
#[derive(Debug, Clone)]
pub struct FieldEntry {
    name: String,
    value: Bytes,
}

impl FieldEntry {
    pub(crate) fn new(name: String, value: Bytes) -> Self {
        Self { name, value }
    }

    /// Form field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw value bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Value as text, lossily decoded as UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Consumes the entry, returning the raw value.
    pub fn into_value(self) -> Bytes {
        self.value
    }
}

/// A finalized file part. Produced exactly once per accepted file, after
/// all of its body bytes reached the storage engine.
#[derive(Debug, Clone)]
pub struct FileDescriptor<L> {
    name: String,
    filename: Option<String>,
    content_type: Option<Mime>,
    size: u64,
    locator: L,
}

impl<L> FileDescriptor<L> {
    pub(crate) fn new(part: PartInfo, size: u64, locator: L) -> Self {
        Self {
            name: part.name,
            filename: part.filename,
            content_type: part.content_type,
            size,
            locator,
        }
    }

    /// Form field name the file arrived under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Original filename as sent by the client.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Declared media type.
    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    /// Final size in bytes; equals exactly what the storage engine received.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Storage-engine locator (buffer, path, object key, ...).
    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// Consumes the descriptor, returning the locator.
    pub fn into_locator(self) -> L {
        self.locator
    }
}

/// Everything a successful parse produced, in arrival order.
///
/// Field names are not unique; repeated names keep every occurrence.
#[derive(Debug)]
pub struct UploadResult<L> {
    fields: Vec<FieldEntry>,
    files: Vec<FileDescriptor<L>>,
}

impl<L> UploadResult<L> {
    pub(crate) fn new() -> Self {
        Self {
            fields: Vec::new(),
            files: Vec::new(),
        }
    }

    pub(crate) fn push_field(&mut self, field: FieldEntry) {
        self.fields.push(field);
    }

    pub(crate) fn push_file(&mut self, file: FileDescriptor<L>) {
        self.files.push(file);
    }

    /// All non-file fields, in arrival order.
    pub fn fields(&self) -> &[FieldEntry] {
        &self.fields
    }

    /// All finalized files, in arrival order.
    pub fn files(&self) -> &[FileDescriptor<L>] {
        &self.files
    }

    /// Values of every field with the given name, in arrival order.
    pub fn field_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldEntry> {
        self.fields.iter().filter(move |f| f.name() == name)
    }

    /// First field with the given name.
    pub fn first_field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Files uploaded under the given field name, in arrival order.
    pub fn files_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FileDescriptor<L>> {
        self.files.iter().filter(move |f| f.name() == name)
    }

    /// Number of non-file fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// True when nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }

    /// Consumes the result into its fields and files.
    pub fn into_parts(self) -> (Vec<FieldEntry>, Vec<FileDescriptor<L>>) {
        (self.fields, self.files)
    }
}
