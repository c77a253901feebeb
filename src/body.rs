//! Body Collector and Body Relay.
//!
//! Both move exactly `n` bytes and treat `n == 0` as an immediate success
//! with no read at all.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CHUNK_CAP: usize = 4096;

/// Reads exactly `dst.len()` bytes from `stream` into `dst`.
pub async fn collect_body<S>(stream: &mut S, dst: &mut [u8]) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    let n = dst.len();
    let mut read = 0;
    while read < n {
        let chunk_end = (read + CHUNK_CAP).min(n);
        let got = stream.read(&mut dst[read..chunk_end]).await?;
        if got == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before body complete",
            ));
        }
        read += got;
    }
    Ok(())
}

/// Moves exactly `n` bytes from `src` to `dst`, reusing `scratch` as the
/// intermediate buffer.
pub async fn relay_body<R, W>(
    src: &mut R,
    dst: &mut W,
    scratch: &mut [u8],
    n: usize,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut moved = 0;
    while moved < n {
        let chunk = (n - moved).min(scratch.len());
        let got = src.read(&mut scratch[..chunk]).await?;
        if got == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-relay",
            ));
        }
        dst.write_all(&scratch[..got]).await?;
        moved += got;
    }
    Ok(())
}
