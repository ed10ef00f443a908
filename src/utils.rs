use http::header::{HeaderMap, HeaderName, HeaderValue};
use httparse::{parse_headers, Status, EMPTY_HEADER};

use crate::{Error, Result};

pub(crate) const MAX_HEADERS: usize = 16;
/// RFC 2046 5.1.1: a boundary is 1 to 70 characters.
pub(crate) const MAX_BOUNDARY_SIZE: usize = 70;
pub(crate) const DASHES: [u8; 2] = [b'-', b'-']; // `--`
pub(crate) const CRLF: [u8; 2] = [b'\r', b'\n']; // `\r\n`
pub(crate) const CRLF_CRLF: [u8; 4] = [b'\r', b'\n', b'\r', b'\n']; // `\r\n\r\n`

pub(crate) fn parse_content_type(header: Option<&HeaderValue>) -> Option<mime::Mime> {
    header
        .map(HeaderValue::to_str)
        .and_then(Result::ok)
        .map(str::parse)
        .and_then(Result::ok)
}

pub(crate) fn parse_part_headers(bytes: &[u8]) -> Result<HeaderMap> {
    let mut headers = [EMPTY_HEADER; MAX_HEADERS];
    match parse_headers(bytes, &mut headers) {
        Ok(Status::Complete((_, hs))) => {
            let mut header_map = HeaderMap::with_capacity(hs.len());
            for h in hs {
                header_map.append(
                    HeaderName::from_bytes(h.name.as_bytes()).map_err(|_| Error::MalformedPart)?,
                    HeaderValue::from_bytes(h.value).map_err(|_| Error::MalformedPart)?,
                );
            }
            Ok(header_map)
        }
        Ok(Status::Partial) | Err(_) => Err(Error::MalformedPart),
    }
}

/// Extracts `name` and `filename` from a `Content-Disposition` value.
///
/// `filename=""` is kept as `Some("")`; a missing or empty `name` is
/// rejected.
pub(crate) fn parse_content_disposition(hv: &[u8]) -> Result<(String, Option<String>)> {
    let mut rest = hv;

    let ty = match memchr::memchr(b';', rest) {
        Some(i) => {
            let ty = &rest[..i];
            rest = &rest[i + 1..];
            ty
        }
        None => {
            let ty = rest;
            rest = &[];
            ty
        }
    };
    if !ty.trim_ascii().eq_ignore_ascii_case(b"form-data") {
        return Err(Error::MalformedPart);
    }

    let mut name = None;
    let mut filename = None;

    while !rest.trim_ascii().is_empty() {
        let (key, value, tail) = next_param(rest)?;
        if key.eq_ignore_ascii_case(b"name") {
            name = Some(String::from_utf8_lossy(value).into_owned());
        } else if key.eq_ignore_ascii_case(b"filename") {
            filename = Some(String::from_utf8_lossy(value).into_owned());
        }
        rest = tail;
    }

    match name {
        Some(name) if !name.is_empty() => Ok((name, filename)),
        _ => Err(Error::MalformedPart),
    }
}

/// One `key=value` parameter; a quoted value may contain `;`.
fn next_param(input: &[u8]) -> Result<(&[u8], &[u8], &[u8])> {
    let eq = memchr::memchr(b'=', input).ok_or(Error::MalformedPart)?;
    let key = input[..eq].trim_ascii();
    let rest = &input[eq + 1..];

    if rest.first() == Some(&b'"') {
        let close = memchr::memchr(b'"', &rest[1..]).ok_or(Error::MalformedPart)?;
        let value = &rest[1..close + 1];
        let tail = &rest[close + 2..];
        match memchr::memchr(b';', tail) {
            Some(i) => Ok((key, value, &tail[i + 1..])),
            None => Ok((key, value, &[])),
        }
    } else {
        match memchr::memchr(b';', rest) {
            Some(i) => Ok((key, rest[..i].trim_ascii(), &rest[i + 1..])),
            None => Ok((key, rest.trim_ascii(), &[])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_field() {
        let (name, filename) = parse_content_disposition(br#"form-data; name="person""#).unwrap();
        assert_eq!(name, "person");
        assert_eq!(filename, None);
    }

    #[test]
    fn file_with_spaces_and_semicolon() {
        let (name, filename) =
            parse_content_disposition(br#"form-data; name="secret"; filename="foo; bar.txt""#)
                .unwrap();
        assert_eq!(name, "secret");
        assert_eq!(filename.as_deref(), Some("foo; bar.txt"));
    }

    #[test]
    fn empty_filename_is_kept() {
        let (name, filename) =
            parse_content_disposition(br#"form-data; name="upload"; filename="""#).unwrap();
        assert_eq!(name, "upload");
        assert_eq!(filename.as_deref(), Some(""));
    }

    #[test]
    fn unquoted_value() {
        let (name, filename) =
            parse_content_disposition(b"form-data; name=person; filename=a.txt").unwrap();
        assert_eq!(name, "person");
        assert_eq!(filename.as_deref(), Some("a.txt"));
    }

    #[test]
    fn utf8_names() {
        let (name, filename) =
            parse_content_disposition("form-data; name=\"你好\"; filename=\"你好.txt\"".as_bytes())
                .unwrap();
        assert_eq!(name, "你好");
        assert_eq!(filename.as_deref(), Some("你好.txt"));
    }

    #[test]
    fn missing_name_is_rejected() {
        assert!(parse_content_disposition(br#"form-data; filename="a.txt""#).is_err());
        assert!(parse_content_disposition(br#"form-data; name="""#).is_err());
        assert!(parse_content_disposition(br#"attachment; name="a""#).is_err());
    }

    #[test]
    fn part_headers() {
        let block = b"Content-Disposition: form-data; name=\"a\"\r\nContent-Type: text/plain\r\n\r\n";
        let headers = parse_part_headers(block).unwrap();
        assert_eq!(headers.len(), 2);
        assert!(headers.contains_key(http::header::CONTENT_DISPOSITION));
    }
}
