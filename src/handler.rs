//! Request handler / protocol state machine.
//!
//! One call to [`handle_connection`] serves one accepted client
//! connection end to end: it loops over requests on that connection,
//! classifying each into one of five arms (cacheable GET miss, cacheable
//! GET hit/revalidate, bypassed GET, PUT, HEAD) and orchestrating the
//! cache, the header/body primitives, and the upstream stream. It never
//! spawns or races with another connection - requests on a connection
//! are handled strictly one at a time.

use crate::body::{collect_body, relay_body};
use crate::cache::{Cache, CacheEntry, Key};
use crate::header::{self, HeaderBuf};
use bytes::Bytes;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

const SCRATCH_CAP: usize = 4096;

/// Drives the request/response loop for one client connection against
/// one shared upstream stream and the one process-wide cache.
///
/// Returns `Ok(())` when the client closed the connection cleanly or the
/// loop reached a natural end (e.g. a 400 from the origin); returns
/// `Err` on any I/O failure, which the caller treats as "close the
/// client connection".
pub async fn handle_connection<C, U>(
    client: &mut C,
    upstream: &mut U,
    cache: &mut Cache,
    max_file_size: usize,
    host_ip: &str,
) -> io::Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let mut req_buf = HeaderBuf::new();
    let mut resp_buf = HeaderBuf::new();
    let mut head_buf = HeaderBuf::new();
    let mut scratch = [0u8; SCRATCH_CAP];

    loop {
        // Step 1: read the next client request header. Failure here
        // (including a clean EOF) just ends the connection.
        let n = match header::read_header(client, &mut req_buf).await {
            Ok(n) => n,
            Err(_) => return Ok(()),
        };
        let request_header = req_buf.as_bytes()[..n].to_vec();

        let Some((method, target)) = header::parse_request_line(&request_header) else {
            return Ok(());
        };
        let request_content_length = header::content_length(&request_header) as usize;
        let key = Key::from_target(target.as_bytes());

        match method.as_str() {
            "GET" => {
                let cacheable = cache.cap() > 0 && request_content_length <= max_file_size;
                if !cacheable {
                    bypass_get(
                        client,
                        upstream,
                        cache,
                        &key,
                        &request_header,
                        request_content_length,
                        &mut resp_buf,
                        &mut scratch,
                    )
                    .await?;
                    continue;
                }

                if cache.lookup(&key).is_some() {
                    match handle_cache_hit(
                        client,
                        upstream,
                        cache,
                        &key,
                        &target,
                        &request_header,
                        host_ip,
                        &mut resp_buf,
                        &mut head_buf,
                        &mut scratch,
                    )
                    .await?
                    {
                        Flow::Continue => continue,
                        Flow::End => return Ok(()),
                    }
                } else {
                    match handle_cache_miss(
                        client,
                        upstream,
                        cache,
                        &key,
                        &target,
                        &request_header,
                        &mut resp_buf,
                        &mut scratch,
                    )
                    .await?
                    {
                        Flow::Continue => continue,
                        Flow::End => return Ok(()),
                    }
                }
            }
            "PUT" => {
                cache.remove(&key);
                upstream.write_all(&request_header).await?;
                relay_body(client, upstream, &mut scratch, request_content_length).await?;
                let n = header::read_header(upstream, &mut resp_buf).await?;
                client.write_all(&resp_buf.as_bytes()[..n]).await?;
                let resp_len = header::content_length(resp_buf.as_bytes()) as usize;
                relay_body(upstream, client, &mut scratch, resp_len).await?;
            }
            "HEAD" => {
                cache.remove(&key);
                upstream.write_all(&request_header).await?;
                relay_body(client, upstream, &mut scratch, request_content_length).await?;
                let n = header::read_header(upstream, &mut resp_buf).await?;
                client.write_all(&resp_buf.as_bytes()[..n]).await?;
                // HEAD responses carry no body.
            }
            _ => {
                // Unrecognized method: neither relayed nor answered;
                // the handler silently waits for the client's next request.
            }
        }
    }
}

enum Flow {
    Continue,
    End,
}

/// Arm C: non-cacheable GET (oversized target, or caching disabled).
///
/// Forwards only the response body to the client, not its header.
async fn bypass_get<C, U>(
    client: &mut C,
    upstream: &mut U,
    cache: &mut Cache,
    key: &Key,
    request_header: &[u8],
    request_content_length: usize,
    resp_buf: &mut HeaderBuf,
    scratch: &mut [u8],
) -> io::Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    cache.remove(key);
    upstream.write_all(request_header).await?;
    relay_body(client, upstream, scratch, request_content_length).await?;
    header::read_header(upstream, resp_buf).await?;
    let resp_len = header::content_length(resp_buf.as_bytes()) as usize;
    relay_body(upstream, client, scratch, resp_len).await
}

/// Arm A: cacheable GET, cache miss.
#[allow(clippy::too_many_arguments)]
async fn handle_cache_miss<C, U>(
    client: &mut C,
    upstream: &mut U,
    cache: &mut Cache,
    key: &Key,
    target: &str,
    request_header: &[u8],
    resp_buf: &mut HeaderBuf,
    scratch: &mut [u8],
) -> io::Result<Flow>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    upstream.write_all(request_header).await?;
    let n = header::read_header(upstream, resp_buf).await?;
    let header_bytes = resp_buf.as_bytes()[..n].to_vec();
    let status = header::parse_status_line(&header_bytes).unwrap_or(0);

    debug!(%target, "CACHE MISS");

    match status {
        404 => {
            client.write_all(&header_bytes).await?;
            let body_len = header::content_length(&header_bytes) as usize;
            relay_body(upstream, client, scratch, body_len).await?;
            Ok(Flow::Continue)
        }
        400 => {
            client.write_all(&header_bytes).await?;
            Ok(Flow::End)
        }
        _ => {
            let last_modified = header::last_modified(&header_bytes).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "origin response missing Last-Modified",
                )
            })?;
            let body_len = header::content_length(&header_bytes) as usize;
            let mut body = vec![0u8; body_len];

            client.write_all(&header_bytes).await?;
            collect_body(upstream, &mut body).await?;
            client.write_all(&body).await?;

            cache.touch_all();
            cache.admit(CacheEntry {
                key: *key,
                last_modified,
                body: Bytes::from(body),
                recency: 0,
            });
            info!(%target, "CACHED");
            Ok(Flow::Continue)
        }
    }
}

/// Arm B: cacheable GET, cache hit - revalidate with a synthesized HEAD.
#[allow(clippy::too_many_arguments)]
async fn handle_cache_hit<C, U>(
    client: &mut C,
    upstream: &mut U,
    cache: &mut Cache,
    key: &Key,
    target: &str,
    request_header: &[u8],
    host_ip: &str,
    resp_buf: &mut HeaderBuf,
    head_buf: &mut HeaderBuf,
    scratch: &mut [u8],
) -> io::Result<Flow>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let head_request = format!("HEAD /{target} HTTP/1.1\r\nHost: {host_ip}\r\n\r\n");
    upstream.write_all(head_request.as_bytes()).await?;

    let n = header::read_header(upstream, head_buf).await?;
    let head_header = head_buf.as_bytes()[..n].to_vec();
    let status = header::parse_status_line(&head_header).unwrap_or(0);
    let head_content_length = header::content_length(&head_header) as usize;

    match status {
        404 => {
            cache.remove(key);
            client.write_all(&head_header).await?;
            relay_body(upstream, client, scratch, head_content_length).await?;
            Ok(Flow::Continue)
        }
        400 => {
            cache.remove(key);
            client.write_all(&head_header).await?;
            relay_body(upstream, client, scratch, head_content_length).await?;
            Ok(Flow::End)
        }
        _ => {
            let fresh_last_modified = header::last_modified(&head_header).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "origin HEAD response missing Last-Modified",
                )
            })?;
            let cached_last_modified = cache
                .lookup(key)
                .expect("cache hit arm requires a present entry")
                .last_modified;

            if fresh_last_modified != cached_last_modified {
                debug!(%target, "CACHE STALE, refetching");
                upstream.write_all(request_header).await?;
                let n = header::read_header(upstream, resp_buf).await?;
                let header_bytes = resp_buf.as_bytes()[..n].to_vec();
                let body_len = header::content_length(&header_bytes) as usize;
                let mut body = vec![0u8; body_len];

                client.write_all(&header_bytes).await?;
                collect_body(upstream, &mut body).await?;
                client.write_all(&body).await?;

                cache.update(key, fresh_last_modified, Bytes::from(body));
            } else {
                debug!(%target, "CACHE HIT");
                let synthesized = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {head_content_length}\r\nHost: {host_ip}\r\n\r\n"
                );
                client.write_all(synthesized.as_bytes()).await?;
                let body = cache
                    .lookup(key)
                    .expect("cache hit arm requires a present entry")
                    .body
                    .clone();
                client.write_all(&body).await?;
            }

            cache.touch_entry(key);
            Ok(Flow::Continue)
        }
    }
}
