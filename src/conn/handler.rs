use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, Instrument};

use crate::admin;
use crate::conn::error::ConnError;
use crate::conn::relay;
use crate::http::{header, request};
use crate::range::RangeSet;
use crate::stats::Stats;

/// Drives one accepted connection end to end, then returns. Never
/// panics on bad client input — every parse failure maps to a `ConnError`
/// that the handler either answers with a response or silently closes on.
pub async fn handle_connection(client: TcpStream, peer_addr: SocketAddr, listen_addr: SocketAddr, stats: Arc<Stats>) {
    async move {
        if let Err(err) = run(client, listen_addr, &stats).await {
            debug!(%err, "connection closed");
        }
    }
    .instrument(tracing::debug_span!("conn", peer = %peer_addr))
    .await
}

async fn run(client: TcpStream, listen_addr: SocketAddr, stats: &Arc<Stats>) -> Result<(), ConnError> {
    let (client_read, mut client_write) = client.into_split();
    let mut client_read = BufReader::new(client_read);

    // 1. AwaitRequestLine
    let line = header::read_line(&mut client_read)
        .await
        .map_err(|_| ConnError::MalformedRequest)?
        .ok_or(ConnError::MalformedRequest)?;
    let req = request::parse_request_line(&line).ok_or(ConnError::MalformedRequest)?;

    let (path, query) = request::split_target(&req.target);

    // 2. MaybeAdmin
    if req.method.eq_ignore_ascii_case("GET") && path == "/stats" {
        let resp = admin::render_stats_response(stats);
        let _ = client_write.write_all(&resp).await;
        let _ = client_write.shutdown().await;
        return Ok(());
    }

    // 3. ParseQueryRange
    let query_ranges = query.and_then(|q| request::find_query_param(q, "range")).map(RangeSet::parse);

    // 4. ReadHeaders
    let headers = header::read_headers(&mut client_read)
        .await
        .map_err(|_| ConnError::MalformedRequest)?
        .ok_or(ConnError::MalformedRequest)?;
    let header_ranges = headers.get("range").map(RangeSet::parse);

    // 5. Reconcile
    let effective_ranges = match (&query_ranges, &header_ranges) {
        (Some(q), Some(h)) if q != h => {
            let _ = client_write.write_all(b"HTTP/1.1 416 Requested Range Not Satisfiable\r\n").await;
            let _ = client_write.shutdown().await;
            return Err(ConnError::RangeConflict);
        }
        _ => header_ranges.or(query_ranges),
    };
    let effective_ranges = effective_ranges.filter(|r| !r.is_empty());

    // 6. ValidateHost
    let host_header = headers.get("host").map(str::to_string);
    let (host, port) = match host_header {
        Some(ref v) => request::parse_host_header(v),
        None => return Err(ConnError::LoopDetected),
    };
    if is_self_loop(&host, port, listen_addr) {
        return Err(ConnError::LoopDetected);
    }

    // 7. DialOrigin
    let origin = TcpStream::connect((host.as_str(), port)).await.map_err(|_| ConnError::OriginUnreachable)?;
    let (origin_read, mut origin_write) = origin.into_split();

    // 8. ForwardRequestHeaders
    let mut header_block = format!("{} {} {}\r\n", req.method, req.target, req.version);
    for raw in &headers.raw {
        header_block.push_str(raw);
        header_block.push_str("\r\n");
    }
    header_block.push_str("\r\n");
    origin_write.write_all(header_block.as_bytes()).await.map_err(|_| ConnError::OriginUnreachable)?;

    // 9. Relay
    let relay_stats = Arc::clone(stats);
    let c2o = tokio::spawn(relay::pump_client_to_origin(client_read, origin_write));
    let o2c = tokio::spawn(relay::pump_origin_to_client(origin_read, client_write, relay_stats, effective_ranges));
    let _ = tokio::join!(c2o, o2c);

    // 10. Teardown happens inside each relay half as it returns.
    Ok(())
}

fn is_self_loop(host: &str, port: u16, listen_addr: SocketAddr) -> bool {
    if port != listen_addr.port() {
        return false;
    }
    if host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" {
        return true;
    }
    match host.parse::<std::net::IpAddr>() {
        Ok(ip) => ip == listen_addr.ip() || (listen_addr.ip().is_unspecified() && ip.is_loopback()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn detects_own_listen_endpoint() {
        assert!(is_self_loop("10.0.0.5", 8000, addr("10.0.0.5:8000")));
        assert!(!is_self_loop("10.0.0.5", 9000, addr("10.0.0.5:8000")));
        assert!(!is_self_loop("10.0.0.6", 8000, addr("10.0.0.5:8000")));
    }

    #[test]
    fn detects_localhost_aliases_against_wildcard_bind() {
        assert!(is_self_loop("localhost", 8000, addr("0.0.0.0:8000")));
        assert!(is_self_loop("127.0.0.1", 8000, addr("0.0.0.0:8000")));
        assert!(is_self_loop("127.0.0.1", 8000, addr("10.0.0.5:8000")));
    }

    #[test]
    fn unrelated_hosts_are_not_loops() {
        assert!(!is_self_loop("example.com", 8000, addr("0.0.0.0:8000")));
    }
}
