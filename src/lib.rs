//! Streaming `multipart/form-data` ([rfc7578]) parsing with pluggable
//! storage.
//!
//! An incoming body is consumed chunk by chunk: boundaries are matched
//! incrementally, limits are enforced while bytes arrive, an optional
//! filter accepts or skips each part, file payloads stream into a
//! [`StorageEngine`], and the caller gets back an [`UploadResult`] mapping
//! field names to values and file descriptors.
//!
//! # Example
//!
//! ```
//! use std::convert::Infallible;
//!
//! use bytes::Bytes;
//! use futures_util::stream;
//!
//! use formpipe::{DiskStorage, Error, FilterDecision, FormData, Limits};
//!
//! # async fn run() -> Result<(), Error> {
//! let boundary = formpipe::parse_boundary(
//!     "multipart/form-data; boundary=\"----d74496d66958873e\"",
//! )?;
//!
//! let body = concat!(
//!     "------d74496d66958873e\r\n",
//!     "Content-Disposition: form-data; name=\"person\"\r\n",
//!     "\r\n",
//!     "anonymous\r\n",
//!     "------d74496d66958873e\r\n",
//!     "Content-Disposition: form-data; name=\"secret\"; filename=\"foo.txt\"\r\n",
//!     "Content-Type: text/plain\r\n",
//!     "\r\n",
//!     "contents of the file\r\n",
//!     "------d74496d66958873e--\r\n",
//! );
//! let stream = stream::iter([Ok::<Bytes, Infallible>(Bytes::from(body))]);
//!
//! let mut engine = DiskStorage::new("/tmp/uploads");
//! let result = FormData::new(stream, boundary)
//!     .limits(Limits::default().parts(32).file_size(10 * 1024 * 1024))
//!     .filter(|part| {
//!         if part.name() == "secret" || part.filename().is_none() {
//!             FilterDecision::Accept
//!         } else {
//!             FilterDecision::Reject
//!         }
//!     })
//!     .store(&mut engine)
//!     .await?;
//!
//! assert_eq!(result.first_field("person").unwrap().text(), "anonymous");
//! for file in result.files() {
//!     println!("{} -> {}", file.name(), file.locator().display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [rfc7578]: <https://tools.ietf.org/html/rfc7578>

#![forbid(unsafe_code)]
#![deny(nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod error;
mod form;
mod limits;
mod part;
mod scanner;
mod state;
mod storage;
mod utils;

pub use error::{BoxError, Error};

pub use form::{EmptyFilename, FilterDecision, FormData};

pub use limits::Limits;

pub use part::{FieldEntry, FileDescriptor, PartInfo, UploadResult};

pub use storage::{DiskHandle, DiskStorage, MemoryStorage, StorageEngine};

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// Extracts the boundary token from a request `Content-Type` value.
///
/// Fails with [`Error::MalformedBoundary`] unless the value is
/// `multipart/form-data` with a non-empty boundary of at most 70 bytes.
pub fn parse_boundary(content_type: &str) -> Result<String> {
    let m: mime::Mime = content_type.parse().map_err(|_| Error::MalformedBoundary)?;

    if !(m.type_() == mime::MULTIPART_FORM_DATA.type_()
        && m.subtype() == mime::MULTIPART_FORM_DATA.subtype())
    {
        return Err(Error::MalformedBoundary);
    }

    let boundary = m
        .get_param(mime::BOUNDARY)
        .map(|v| v.as_str().to_owned())
        .ok_or(Error::MalformedBoundary)?;

    if boundary.is_empty() || boundary.len() > utils::MAX_BOUNDARY_SIZE {
        return Err(Error::MalformedBoundary);
    }

    Ok(boundary)
}
