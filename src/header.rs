//! Header Reader and Header Field Extractor.
//!
//! The extractor functions are deliberately fragile in the same way the
//! paired origin expects: anchors are matched as exact, case-sensitive
//! ASCII literals at a fixed offset, not via a general HTTP/1.1 parser.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Maximum size of a header block, including the CRLFCRLF terminator.
pub const HEADER_BUF_CAP: usize = 4096;

/// Exact byte width of a `Last-Modified` value as produced by the origin.
pub const LAST_MODIFIED_LEN: usize = 29;

/// A fixed-capacity scratch buffer for one header block.
///
/// Reused across `read_header` calls within a connection; each call
/// re-zeroes it before reading.
pub struct HeaderBuf {
    buf: [u8; HEADER_BUF_CAP],
    len: usize,
}

impl HeaderBuf {
    pub fn new() -> Self {
        Self {
            buf: [0u8; HEADER_BUF_CAP],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Default for HeaderBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads one byte at a time from `stream` into `out` until CRLFCRLF is
/// seen, returning the total byte count including the terminator.
///
/// Fails if the stream closes or errors first, or if the header would
/// exceed [`HEADER_BUF_CAP`] before the terminator appears. One-byte
/// reads guarantee no body bytes are ever consumed into `out`.
pub async fn read_header<S>(stream: &mut S, out: &mut HeaderBuf) -> io::Result<usize>
where
    S: AsyncRead + Unpin,
{
    out.buf = [0u8; HEADER_BUF_CAP];
    out.len = 0;

    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before header terminator",
            ));
        }
        if out.len >= HEADER_BUF_CAP {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "header exceeds maximum size",
            ));
        }
        out.buf[out.len] = byte[0];
        out.len += 1;

        if out.len >= 4 && &out.buf[out.len - 4..out.len] == b"\r\n\r\n" {
            return Ok(out.len);
        }
    }
}

/// Returns the base-10 integer following the `Content-Length: ` anchor,
/// or 0 if the anchor is absent.
pub fn content_length(buf: &[u8]) -> u64 {
    find_anchor(buf, b"Content-Length: ")
        .and_then(parse_uint_prefix)
        .unwrap_or(0)
}

/// Returns the 29 bytes immediately following the `Last-Modified: `
/// anchor, or `None` if absent or truncated.
pub fn last_modified(buf: &[u8]) -> Option<[u8; LAST_MODIFIED_LEN]> {
    let start = find_anchor(buf, b"Last-Modified: ")?;
    let slice = buf.get(start..start + LAST_MODIFIED_LEN)?;
    let mut out = [0u8; LAST_MODIFIED_LEN];
    out.copy_from_slice(slice);
    Some(out)
}

/// Parses the request line (`METHOD /TARGET HTTP/1.1`) into the method
/// token and the target with its leading slash stripped.
pub fn parse_request_line(buf: &[u8]) -> Option<(String, String)> {
    let line = first_line(buf)?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?;
    let target = target.strip_prefix('/').unwrap_or(target).to_string();
    Some((method, target))
}

/// Parses the status line (`HTTP/1.1 CODE REASON`) into the status code.
pub fn parse_status_line(buf: &[u8]) -> Option<u16> {
    let line = first_line(buf)?;
    let mut parts = line.split_whitespace();
    parts.next()?;
    parts.next()?.parse().ok()
}

fn first_line(buf: &[u8]) -> Option<&str> {
    let end = buf.windows(2).position(|w| w == b"\r\n")?;
    std::str::from_utf8(&buf[..end]).ok()
}

fn find_anchor(buf: &[u8], anchor: &[u8]) -> Option<usize> {
    buf.windows(anchor.len())
        .position(|w| w == anchor)
        .map(|i| i + anchor.len())
}

fn parse_uint_prefix(buf: &[u8]) -> Option<u64> {
    let end = buf.iter().position(|b| !b.is_ascii_digit()).unwrap_or(buf.len());
    if end == 0 {
        return None;
    }
    std::str::from_utf8(&buf[..end]).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_until_crlfcrlf() {
        let data = b"GET /a HTTP/1.1\r\nHost: x\r\n\r\nBODYBODY".to_vec();
        let mut stream = BufReader::new(&data[..]);
        let mut buf = HeaderBuf::new();
        let n = read_header(&mut stream, &mut buf).await.unwrap();
        assert_eq!(n, "GET /a HTTP/1.1\r\nHost: x\r\n\r\n".len());
        assert!(buf.as_bytes().ends_with(b"\r\n\r\n"));
    }

    #[tokio::test]
    async fn fails_on_premature_close() {
        let data = b"GET /a HTTP/1.1\r\nHost: x".to_vec();
        let mut stream = BufReader::new(&data[..]);
        let mut buf = HeaderBuf::new();
        assert!(read_header(&mut stream, &mut buf).await.is_err());
    }

    #[tokio::test]
    async fn fails_on_oversized_header() {
        let mut data = Vec::new();
        data.extend_from_slice(b"GET / HTTP/1.1\r\n");
        data.extend(std::iter::repeat(b'x').take(HEADER_BUF_CAP + 10));
        let mut stream = BufReader::new(&data[..]);
        let mut buf = HeaderBuf::new();
        assert!(read_header(&mut stream, &mut buf).await.is_err());
    }

    #[test]
    fn content_length_present_and_absent() {
        assert_eq!(content_length(b"X: y\r\nContent-Length: 42\r\n\r\n"), 42);
        assert_eq!(content_length(b"X: y\r\n\r\n"), 0);
    }

    #[test]
    fn last_modified_exact_width() {
        let buf = b"Last-Modified: Mon, 01 Jan 2024 00:00:00 GMT\r\n\r\n";
        let got = last_modified(buf).unwrap();
        assert_eq!(&got[..], b"Mon, 01 Jan 2024 00:00:00 GMT");
    }

    #[test]
    fn last_modified_is_case_sensitive() {
        let buf = b"last-modified: Mon, 01 Jan 2024 00:00:00 GMT\r\n\r\n";
        assert!(last_modified(buf).is_none());
    }

    #[test]
    fn parses_request_line_strips_leading_slash() {
        let (method, target) = parse_request_line(b"GET /foo/bar HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(method, "GET");
        assert_eq!(target, "foo/bar");
    }

    #[test]
    fn parses_status_line() {
        assert_eq!(parse_status_line(b"HTTP/1.1 404 Not Found\r\n\r\n"), Some(404));
        assert_eq!(parse_status_line(b"HTTP/1.1 200 OK\r\n\r\n"), Some(200));
    }
}
