use std::convert::Infallible;
use std::io;

use bytes::Bytes;
use futures_util::stream::{self, Iter};
use rand::Rng;

/// Builds a synthetic multipart body for a given boundary.
pub struct BodyBuilder {
    boundary: String,
    preamble: Vec<u8>,
    parts: Vec<u8>,
    epilogue: Vec<u8>,
}

impl BodyBuilder {
    pub fn new(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_owned(),
            preamble: Vec::new(),
            parts: Vec::new(),
            epilogue: Vec::new(),
        }
    }

    pub fn preamble(mut self, text: &[u8]) -> Self {
        self.preamble.extend_from_slice(text);
        self.preamble.extend_from_slice(b"\r\n");
        self
    }

    pub fn epilogue(mut self, text: &[u8]) -> Self {
        self.epilogue.extend_from_slice(text);
        self
    }

    pub fn field(self, name: &str, value: &[u8]) -> Self {
        self.part(name, None, None, value)
    }

    pub fn file(self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.part(name, Some(filename), Some(content_type), data)
    }

    pub fn part(
        mut self,
        name: &str,
        filename: Option<&str>,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Self {
        self.parts
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{name}\"");
        if let Some(filename) = filename {
            disposition.push_str(&format!("; filename=\"{filename}\""));
        }
        self.parts.extend_from_slice(disposition.as_bytes());
        self.parts.extend_from_slice(b"\r\n");
        if let Some(content_type) = content_type {
            self.parts
                .extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        self.parts.extend_from_slice(b"\r\n");
        self.parts.extend_from_slice(data);
        self.parts.extend_from_slice(b"\r\n");
        self
    }

    /// A part with a verbatim header block, for malformed inputs.
    pub fn raw_part(mut self, header_block: &str, data: &[u8]) -> Self {
        self.parts
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.parts.extend_from_slice(header_block.as_bytes());
        self.parts.extend_from_slice(b"\r\n\r\n");
        self.parts.extend_from_slice(data);
        self.parts.extend_from_slice(b"\r\n");
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut body = self.preamble;
        body.extend_from_slice(&self.parts);
        body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body.extend_from_slice(&self.epilogue);
        body
    }

    /// Body cut off before the closing boundary.
    pub fn build_truncated(self) -> Vec<u8> {
        let mut body = self.preamble;
        body.extend_from_slice(&self.parts);
        body.truncate(body.len().saturating_sub(2));
        body
    }
}

pub type ByteStream = Iter<std::vec::IntoIter<Result<Bytes, Infallible>>>;

/// Whole body in a single chunk.
pub fn one_chunk(body: Vec<u8>) -> ByteStream {
    chunked(body, usize::MAX)
}

/// Body split into fixed-size chunks.
pub fn chunked(body: Vec<u8>, size: usize) -> ByteStream {
    let size = size.min(body.len().max(1));
    let chunks: Vec<Result<Bytes, Infallible>> = body
        .chunks(size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    stream::iter(chunks)
}

/// Body split at random points.
pub fn random_chunks(body: Vec<u8>) -> ByteStream {
    let mut rng = rand::thread_rng();
    let mut chunks = Vec::new();
    let mut rest = &body[..];
    while !rest.is_empty() {
        let n = rng.gen_range(1..=rest.len());
        chunks.push(Ok(Bytes::copy_from_slice(&rest[..n])));
        rest = &rest[n..];
    }
    stream::iter(chunks)
}

/// Yields `prefix`, then fails like a dropped connection.
pub fn broken_after(prefix: Vec<u8>) -> Iter<std::vec::IntoIter<Result<Bytes, io::Error>>> {
    stream::iter(vec![
        Ok(Bytes::from(prefix)),
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer reset")),
    ])
}
