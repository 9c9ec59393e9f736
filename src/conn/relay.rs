use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::time::timeout;
use tracing::trace;

use crate::http::header;
use crate::http::response::parse_status_line;
use crate::range::{RangeSet, Splicer};
use crate::stats::Stats;

const READ_BUFFER_SIZE: usize = 1024;
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Client → origin: an opaque byte pump. Carries the request method, any
/// body (POST and beyond), with no range awareness and no stats
/// contribution — only bytes written toward the client count.
pub async fn pump_client_to_origin<R>(mut reader: R, mut writer: OwnedWriteHalf)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        let n = match timeout(READ_TIMEOUT, reader.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => n,
            Ok(Err(_)) => break,
        };
        if writer.write_all(&buf[..n]).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Origin → client: relays the status line and headers verbatim (rewriting
/// the status to `206` when the proxy is doing the ranging itself), then
/// delegates the body either to the splicer or to a plain pass-through
/// pump depending on whether ranging applies.
pub async fn pump_origin_to_client<R>(origin_read: R, mut client_write: OwnedWriteHalf, stats: Arc<Stats>, ranges: Option<RangeSet>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(origin_read);

    let status_line = match header::read_line(&mut reader).await {
        Ok(Some(line)) => line,
        _ => {
            let _ = client_write.shutdown().await;
            return;
        }
    };

    let status = parse_status_line(&status_line);
    let origin_is_authoritative = matches!(status, Some(ref s) if s.status == 206);
    let effective_ranges = if origin_is_authoritative { None } else { ranges };
    let splicing = effective_ranges.as_ref().is_some_and(|r| !r.is_empty());

    // Rewriting depends only on whether the proxy is doing the ranging, not
    // on whether the origin's status line happened to parse — an
    // unparseable line with `splicing` true would otherwise reach the
    // client unrewritten while the body behind it is spliced into partial
    // content, an internally inconsistent response.
    let out_status_line = if splicing {
        match &status {
            Some(s) => format!("{} 206 Partial Content", s.version),
            None => "HTTP/1.1 206 Partial Content".to_string(),
        }
    } else {
        status_line
    };

    if write_and_count(&mut client_write, out_status_line.as_bytes(), &stats).await.is_err() {
        return;
    }
    if write_and_count(&mut client_write, b"\r\n", &stats).await.is_err() {
        return;
    }

    if !relay_headers(&mut reader, &mut client_write, &stats).await {
        return;
    }

    if splicing {
        splice_body(&mut reader, &mut client_write, &stats, effective_ranges.unwrap()).await;
    } else {
        passthrough_body(&mut reader, &mut client_write, &stats).await;
    }

    let _ = client_write.shutdown().await;
}

/// Relays response headers up to the closing blank line. A header-read
/// timeout, EOF, or I/O error on the origin side ends the header block
/// early instead of aborting the response outright — the body relay that
/// follows still runs and gets its own chance to terminate normally,
/// consistent with an idle read timeout being ordinary termination rather
/// than an error. Only a failed write to the client is fatal here, since
/// there would be nothing left to send the rest of the response to.
async fn relay_headers<R: AsyncBufRead + Unpin>(reader: &mut R, client_write: &mut OwnedWriteHalf, stats: &Stats) -> bool {
    loop {
        let line = match timeout(READ_TIMEOUT, header::read_line(reader)).await {
            Ok(Ok(Some(line))) if !line.is_empty() => line,
            _ => break,
        };
        if write_and_count(client_write, line.as_bytes(), stats).await.is_err() {
            return false;
        }
        if write_and_count(client_write, b"\r\n", stats).await.is_err() {
            return false;
        }
    }
    write_and_count(client_write, b"\r\n", stats).await.is_ok()
}

async fn write_and_count(writer: &mut OwnedWriteHalf, data: &[u8], stats: &Stats) -> std::io::Result<()> {
    stats.add_bytes(data.len() as u64);
    writer.write_all(data).await
}

async fn passthrough_body<R: AsyncRead + Unpin>(reader: &mut R, writer: &mut OwnedWriteHalf, stats: &Stats) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        let n = match timeout(READ_TIMEOUT, reader.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => n,
            Ok(Err(_)) => break,
        };
        if write_and_count(writer, &buf[..n], stats).await.is_err() {
            break;
        }
    }
}

async fn splice_body<R: AsyncRead + Unpin>(reader: &mut R, writer: &mut OwnedWriteHalf, stats: &Stats, ranges: RangeSet) {
    let mut splicer = Splicer::new(ranges);
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        let n = match timeout(READ_TIMEOUT, reader.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => {
                let tail = splicer.finish();
                if !tail.is_empty() {
                    let _ = write_and_count(writer, &tail, stats).await;
                }
                break;
            }
            Ok(Ok(n)) => n,
            Ok(Err(_)) => {
                let tail = splicer.finish();
                if !tail.is_empty() {
                    let _ = write_and_count(writer, &tail, stats).await;
                }
                break;
            }
        };

        if splicer.is_done() {
            trace!("origin body drained past last requested range");
            continue;
        }

        let out = splicer.push_chunk(&buf[..n]);
        if !out.is_empty() && write_and_count(writer, &out, stats).await.is_err() {
            break;
        }
    }
}
