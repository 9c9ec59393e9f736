//! End-to-end scenarios against an in-process origin fixture, standing in
//! for the out-of-scope "origin HTTP server used in tests" collaborator.
//! Each test drives a real `TcpStream` pair through `handle_connection`
//! exactly as `main`'s accept loop would, rather than calling the splicer
//! or codec pieces directly.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::conn::handle_connection;
use crate::stats::Stats;

const BODY: &[u8] = b"<html><head><title>Hello</title></head><body><h1>Hello</h1></body></html>";

/// Spawns a canned-response origin on an ephemeral port. Each accepted
/// connection is drained of its request (up to the blank line) and then
/// answered with `response` verbatim before the socket is closed.
async fn spawn_origin(response: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            let response = response.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stream);
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line).await {
                        Ok(0) => return,
                        Ok(_) if line == "\r\n" || line == "\n" => break,
                        Ok(_) => {}
                        Err(_) => return,
                    }
                }
                let mut stream = reader.into_inner();
                let _ = stream.write_all(&response).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    addr
}

fn canned_200(body: &[u8]) -> Vec<u8> {
    let mut resp = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/html\r\n\r\n", body.len()).into_bytes();
    resp.extend_from_slice(body);
    resp
}

fn canned_206(body: &[u8]) -> Vec<u8> {
    let mut resp = format!(
        "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes 6-11/{}\r\nContent-Length: {}\r\n\r\n",
        BODY.len(),
        body.len()
    )
    .into_bytes();
    resp.extend_from_slice(body);
    resp
}

/// Drives one client request through a freshly accepted connection, sharing
/// `stats` across calls so scenario 8 can observe what earlier requests
/// accumulated.
async fn proxy_request(stats: &Arc<Stats>, origin: Option<SocketAddr>, target: &str, extra_headers: &str) -> Vec<u8> {
    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listen_addr = proxy_listener.local_addr().unwrap();

    let mut client = TcpStream::connect(listen_addr).await.unwrap();
    let (server_stream, peer_addr) = proxy_listener.accept().await.unwrap();
    tokio::spawn(handle_connection(server_stream, peer_addr, listen_addr, Arc::clone(stats)));

    let host_header = match origin {
        Some(addr) => format!("Host: {addr}\r\n"),
        None => String::new(),
    };
    let request = format!("GET {target} HTTP/1.1\r\n{host_header}{extra_headers}\r\n");
    client.write_all(request.as_bytes()).await.unwrap();
    client.shutdown().await.unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    response
}

/// Splits a raw response into `(status_line, body)` on the first blank
/// line. The `416` conflict response has no header block or body at
/// all — just the status line — so a missing separator yields an empty
/// body rather than panicking.
fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let text = String::from_utf8_lossy(raw);
    let status_line = text.lines().next().unwrap_or("").to_string();
    match text.find("\r\n\r\n") {
        Some(sep) => (status_line, raw[sep + 4..].to_vec()),
        None => (status_line, Vec::new()),
    }
}

#[tokio::test]
async fn scenario_1_plain_get_passes_body_through_unchanged() {
    let origin = spawn_origin(canned_200(BODY)).await;
    let stats = Arc::new(Stats::new());

    let raw = proxy_request(&stats, Some(origin), "/", "").await;
    let (status_line, body) = split_response(&raw);

    assert!(status_line.starts_with("HTTP/1.1 200"), "{status_line}");
    assert_eq!(body, BODY);
}

#[tokio::test]
async fn scenario_2_open_ended_range_header() {
    let origin = spawn_origin(canned_200(BODY)).await;
    let stats = Arc::new(Stats::new());

    let raw = proxy_request(&stats, Some(origin), "/", "Range: bytes=6-\r\n").await;
    let (status_line, body) = split_response(&raw);

    assert!(status_line.starts_with("HTTP/1.1 206"), "{status_line}");
    assert_eq!(body.len(), BODY.len() - 6);
    assert!(body.starts_with(b"<head>"));
}

#[tokio::test]
async fn scenario_3_tail_range() {
    let origin = spawn_origin(canned_200(BODY)).await;
    let stats = Arc::new(Stats::new());

    let raw = proxy_request(&stats, Some(origin), "/", "Range: bytes=-7\r\n").await;
    let (status_line, body) = split_response(&raw);

    assert!(status_line.starts_with("HTTP/1.1 206"), "{status_line}");
    assert_eq!(body, b"</html>");
}

#[tokio::test]
async fn scenario_4_single_bounded_range() {
    let origin = spawn_origin(canned_200(BODY)).await;
    let stats = Arc::new(Stats::new());

    let raw = proxy_request(&stats, Some(origin), "/", "Range: bytes=6-11\r\n").await;
    let (status_line, body) = split_response(&raw);

    assert!(status_line.starts_with("HTTP/1.1 206"), "{status_line}");
    assert_eq!(body, b"<head>");
}

#[tokio::test]
async fn scenario_5_multiple_bounded_ranges_concatenate_in_request_order() {
    let origin = spawn_origin(canned_200(BODY)).await;
    let stats = Arc::new(Stats::new());

    let raw = proxy_request(&stats, Some(origin), "/", "Range: bytes=6-11,19-23\r\n").await;
    let (status_line, body) = split_response(&raw);

    assert!(status_line.starts_with("HTTP/1.1 206"), "{status_line}");
    assert_eq!(body, b"<head>Hello");
}

#[tokio::test]
async fn scenario_6_query_range_matches_header_range_equivalent() {
    let origin = spawn_origin(canned_200(BODY)).await;
    let stats = Arc::new(Stats::new());

    let raw = proxy_request(&stats, Some(origin), "/?range=bytes=6-", "").await;
    let (status_line, body) = split_response(&raw);

    assert!(status_line.starts_with("HTTP/1.1 206"), "{status_line}");
    assert_eq!(body.len(), BODY.len() - 6);
    assert!(body.starts_with(b"<head>"));
}

#[tokio::test]
async fn scenario_7_conflicting_header_and_query_ranges_yield_416() {
    let origin = spawn_origin(canned_200(BODY)).await;
    let stats = Arc::new(Stats::new());

    let raw = proxy_request(&stats, Some(origin), "/?range=bytes=6-", "Range: bytes=7-\r\n").await;
    let (status_line, body) = split_response(&raw);

    assert!(status_line.starts_with("HTTP/1.1 416"), "{status_line}");
    assert!(body.is_empty());
}

#[tokio::test]
async fn scenario_8_stats_endpoint_reports_prior_traffic() {
    let origin = spawn_origin(canned_200(BODY)).await;
    let stats = Arc::new(Stats::new());

    let first = proxy_request(&stats, Some(origin), "/", "").await;
    assert!(split_response(&first).0.starts_with("HTTP/1.1 200"));

    let raw = proxy_request(&stats, None, "/stats", "").await;
    let (status_line, body) = split_response(&raw);
    let body = String::from_utf8(body).unwrap();

    assert!(status_line.starts_with("HTTP/1.1 200"), "{status_line}");
    let doc: serde_json::Value = serde_json::from_str(body.trim_end()).unwrap();
    assert!(doc["total_bytes_transferred"].as_u64().unwrap() > 0);
    assert!(doc["uptime"].is_object());
}

#[tokio::test]
async fn scenario_9_origin_authoritative_206_is_passed_through_verbatim() {
    let partial_body = &BODY[6..12];
    let origin = spawn_origin(canned_206(partial_body)).await;
    let stats = Arc::new(Stats::new());

    let raw = proxy_request(&stats, Some(origin), "/", "Range: bytes=6-11\r\n").await;
    let (status_line, body) = split_response(&raw);

    assert_eq!(status_line, "HTTP/1.1 206 Partial Content");
    assert_eq!(body, partial_body);
}
