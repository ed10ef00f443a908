use bytes::Bytes;
use http::HeaderMap;
use tracing::trace;

use crate::scanner::{Body, Delimiter, Scanner};
use crate::utils::parse_part_headers;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    Delimiter,
    Headers,
    Body,
    Done,
}

/// One step of parser progress.
#[derive(Debug)]
pub(crate) enum Event {
    /// A part's header block is complete.
    PartBegin(HeaderMap),
    /// Resolved payload bytes for the current part.
    BodyChunk(Bytes),
    /// The current part's closing delimiter was consumed.
    PartEnd,
    /// The final boundary was seen; the epilogue is discarded.
    Finished,
}

/// Single-pass state machine over scanner output.
///
/// `Preamble → Delimiter → Headers → Body → (Delimiter | Done)`; failures
/// surface as `Err` from [`next_event`](Parser::next_event). Bytes before
/// the first boundary and after the final one are discarded.
pub(crate) struct Parser {
    scanner: Scanner,
    state: State,
    header_limit: Option<usize>,
}

impl Parser {
    pub(crate) fn new(boundary: &str, header_limit: Option<usize>) -> Self {
        Self {
            scanner: Scanner::new(boundary),
            state: State::Preamble,
            header_limit,
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        if self.state == State::Done {
            // epilogue
            return;
        }
        self.scanner.push(chunk);
    }

    pub(crate) fn set_eof(&mut self) {
        self.scanner.set_eof();
    }

    /// Pumps the machine; `Ok(None)` means more transport input is needed.
    pub(crate) fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            match self.state {
                State::Preamble => {
                    if self.scanner.find_delimiter() {
                        trace!("first boundary found");
                        self.state = State::Delimiter;
                    } else if self.scanner.eof() {
                        return Err(Error::TransportAbort(None));
                    } else {
                        return Ok(None);
                    }
                }
                State::Delimiter => match self.scanner.classify_delimiter() {
                    Some(Ok(Delimiter::Part)) => {
                        trace!("part follows");
                        self.state = State::Headers;
                    }
                    Some(Ok(Delimiter::Final)) => {
                        trace!("final boundary");
                        self.scanner.discard();
                        self.state = State::Done;
                        return Ok(Some(Event::Finished));
                    }
                    Some(Err(err)) => return Err(err),
                    None if self.scanner.eof() => return Err(Error::TransportAbort(None)),
                    None => return Ok(None),
                },
                State::Headers => match self.scanner.take_headers() {
                    Some(block) => {
                        if let Some(max) = self.header_limit.filter(|max| block.len() > *max) {
                            return Err(Error::HeaderTooLarge(max));
                        }
                        let headers = parse_part_headers(&block)?;
                        trace!(count = headers.len(), "part headers parsed");
                        self.state = State::Body;
                        return Ok(Some(Event::PartBegin(headers)));
                    }
                    None => {
                        // Everything buffered here is header bytes: the
                        // terminator has not been seen yet.
                        if let Some(max) = self
                            .header_limit
                            .filter(|max| self.scanner.buffered() > *max)
                        {
                            return Err(Error::HeaderTooLarge(max));
                        }
                        if self.scanner.eof() {
                            return Err(Error::TransportAbort(None));
                        }
                        return Ok(None);
                    }
                },
                State::Body => match self.scanner.take_body() {
                    Body::Chunk(data) => return Ok(Some(Event::BodyChunk(data))),
                    Body::Boundary => {
                        self.state = State::Delimiter;
                        return Ok(Some(Event::PartEnd));
                    }
                    Body::Wait => {
                        if self.scanner.eof() {
                            return Err(Error::TransportAbort(None));
                        }
                        return Ok(None);
                    }
                },
                State::Done => return Ok(None),
            }
        }
    }
}
