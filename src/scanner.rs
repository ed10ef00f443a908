use bytes::{Buf, Bytes, BytesMut};
use memchr::memmem;

use crate::utils::{CRLF, CRLF_CRLF, DASHES};
use crate::{Error, Result};

/// The two bytes following a delimiter decide what comes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delimiter {
    /// `\r\n`: another part follows.
    Part,
    /// `--`: closing delimiter, the body is complete.
    Final,
}

/// Outcome of scanning for body bytes.
#[derive(Debug)]
pub(crate) enum Body {
    /// Payload bytes that can no longer be part of a delimiter.
    Chunk(Bytes),
    /// The part's closing delimiter was consumed.
    Boundary,
    /// More input is needed.
    Wait,
}

/// Incremental delimiter matcher over an append-only buffer.
///
/// Chunks are appended as they arrive from the transport; between calls the
/// scanner retains at most `delimiter.len() + 2` unresolved trailing bytes,
/// so memory stays bounded regardless of body size.
pub(crate) struct Scanner {
    buffer: BytesMut,
    /// `\r\n--boundary`, built once.
    delimiter: Vec<u8>,
    eof: bool,
}

impl Scanner {
    pub(crate) fn new(boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(4 + boundary.len());
        delimiter.extend_from_slice(&CRLF);
        delimiter.extend_from_slice(&DASHES);
        delimiter.extend_from_slice(boundary.as_bytes());

        // Seeded with `\r\n` so a boundary at stream start matches the
        // same `\r\n--boundary` pattern as every later one.
        Self {
            buffer: BytesMut::from(&CRLF[..]),
            delimiter,
            eof: false,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    pub(crate) fn set_eof(&mut self) {
        self.eof = true;
    }

    pub(crate) fn eof(&self) -> bool {
        self.eof
    }

    /// Unresolved byte count, used for the header-block ceiling.
    pub(crate) fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// How many trailing bytes must be kept back: a partial delimiter plus
    /// the two classification bytes after it.
    fn retained(&self) -> usize {
        self.delimiter.len() + 2
    }

    /// Preamble scan: discards everything up to and including the first
    /// delimiter. Returns `false` when more input is needed.
    pub(crate) fn find_delimiter(&mut self) -> bool {
        match memmem::find(&self.buffer, &self.delimiter) {
            Some(n) => {
                self.buffer.advance(n + self.delimiter.len());
                true
            }
            None => {
                let keep = self.retained();
                if self.buffer.len() > keep {
                    let resolved = self.buffer.len() - keep;
                    self.buffer.advance(resolved);
                }
                false
            }
        }
    }

    /// Consumes the two bytes after a delimiter.
    pub(crate) fn classify_delimiter(&mut self) -> Option<Result<Delimiter>> {
        if self.buffer.len() < 2 {
            return None;
        }
        if self.buffer[..2] == CRLF {
            self.buffer.advance(2);
            Some(Ok(Delimiter::Part))
        } else if self.buffer[..2] == DASHES {
            self.buffer.advance(2);
            Some(Ok(Delimiter::Final))
        } else {
            Some(Err(Error::MalformedBoundary))
        }
    }

    /// Splits off a complete header block, terminator included.
    pub(crate) fn take_headers(&mut self) -> Option<Bytes> {
        memmem::find(&self.buffer, &CRLF_CRLF)
            .map(|n| self.buffer.split_to(n + CRLF_CRLF.len()).freeze())
    }

    /// Yields body bytes up to (exclusive) the next delimiter.
    pub(crate) fn take_body(&mut self) -> Body {
        match memmem::find(&self.buffer, &self.delimiter) {
            Some(0) => {
                self.buffer.advance(self.delimiter.len());
                Body::Boundary
            }
            Some(n) => Body::Chunk(self.buffer.split_to(n).freeze()),
            None => {
                let keep = self.retained();
                if self.buffer.len() > keep {
                    Body::Chunk(self.buffer.split_to(self.buffer.len() - keep).freeze())
                } else {
                    Body::Wait
                }
            }
        }
    }

    /// Epilogue bytes are never inspected.
    pub(crate) fn discard(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_body(scanner: &mut Scanner) -> (Vec<u8>, bool) {
        let mut out = Vec::new();
        loop {
            match scanner.take_body() {
                Body::Chunk(data) => out.extend_from_slice(&data),
                Body::Boundary => return (out, true),
                Body::Wait => return (out, false),
            }
        }
    }

    #[test]
    fn boundary_in_one_chunk() {
        let mut scanner = Scanner::new("X");
        scanner.push(b"--X\r\n");
        assert!(scanner.find_delimiter());
        assert_eq!(scanner.classify_delimiter().unwrap().unwrap(), Delimiter::Part);
    }

    #[test]
    fn boundary_split_across_pushes() {
        let mut scanner = Scanner::new("BOUND");
        scanner.push(b"hello\r\n--BO");
        assert!(!scanner.find_delimiter());
        scanner.push(b"UND\r\n");
        assert!(scanner.find_delimiter());
        assert_eq!(scanner.classify_delimiter().unwrap().unwrap(), Delimiter::Part);
    }

    #[test]
    fn body_until_boundary() {
        let mut scanner = Scanner::new("X");
        scanner.push(b"--X\r\n");
        assert!(scanner.find_delimiter());
        scanner.classify_delimiter().unwrap().unwrap();

        scanner.push(b"abcd\r\n--X--");
        let (body, hit) = drain_body(&mut scanner);
        assert_eq!(body, b"abcd");
        assert!(hit);
        assert_eq!(scanner.classify_delimiter().unwrap().unwrap(), Delimiter::Final);
    }

    #[test]
    fn retains_only_a_bounded_tail() {
        let mut scanner = Scanner::new("X");
        scanner.push(b"--X\r\n");
        assert!(scanner.find_delimiter());
        scanner.classify_delimiter().unwrap().unwrap();

        // A large body without a delimiter must be released, except for the
        // retained tail.
        scanner.push(&[b'a'; 4096]);
        let (body, hit) = drain_body(&mut scanner);
        assert!(!hit);
        assert_eq!(body.len(), 4096 - scanner.retained());
        assert!(scanner.buffered() <= scanner.retained());
    }

    #[test]
    fn single_byte_pushes() {
        let mut scanner = Scanner::new("X");
        let mut found = false;
        for b in b"junk\r\n--X\r\n" {
            scanner.push(&[*b]);
            if !found {
                found = scanner.find_delimiter();
            }
        }
        assert!(found);
        assert_eq!(scanner.classify_delimiter().unwrap().unwrap(), Delimiter::Part);
    }

    #[test]
    fn junk_after_delimiter_is_malformed() {
        let mut scanner = Scanner::new("X");
        scanner.push(b"--Xzz");
        assert!(scanner.find_delimiter());
        assert!(scanner.classify_delimiter().unwrap().is_err());
    }
}
