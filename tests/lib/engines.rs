use std::io;

use bytes::{Bytes, BytesMut};
use formpipe::{PartInfo, StorageEngine};

/// Memory-backed engine that records every call, for asserting on the
/// storage contract.
#[derive(Debug, Default)]
pub struct CountingStorage {
    pub opens: usize,
    pub writes: usize,
    pub finalizes: usize,
    pub aborts: usize,
    fail_from_write: Option<usize>,
}

impl CountingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the n-th `write` call (zero-based) and every one after it.
    pub fn failing_from_write(n: usize) -> Self {
        Self {
            fail_from_write: Some(n),
            ..Self::default()
        }
    }
}

impl StorageEngine for CountingStorage {
    type Handle = BytesMut;
    type Locator = Bytes;

    fn open(&mut self, _part: &PartInfo) -> io::Result<Self::Handle> {
        self.opens += 1;
        Ok(BytesMut::new())
    }

    fn write(&mut self, handle: &mut Self::Handle, chunk: &[u8]) -> io::Result<()> {
        if self.fail_from_write.is_some_and(|n| self.writes >= n) {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "disk full"));
        }
        self.writes += 1;
        handle.extend_from_slice(chunk);
        Ok(())
    }

    fn finalize(&mut self, handle: Self::Handle) -> io::Result<Self::Locator> {
        self.finalizes += 1;
        Ok(handle.freeze())
    }

    fn abort(&mut self, handle: Self::Handle) {
        self.aborts += 1;
        drop(handle);
    }
}
