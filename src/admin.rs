use crate::stats::Stats;

/// Renders the `GET /stats` response: `200 OK` with the JSON stats
/// document. This never touches `Stats` itself — admin responses are not
/// counted toward the total they report.
pub fn render_stats_response(stats: &Stats) -> Vec<u8> {
    let body = serde_json::to_vec(&stats.render()).expect("StatsDocument always serializes");

    let mut out = Vec::with_capacity(body.len() + 96);
    out.extend_from_slice(b"HTTP/1.1 200 OK\r\n");
    out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    out.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    out.extend_from_slice(&body);
    out.extend_from_slice(b"\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_carries_stats_json() {
        let stats = Stats::new();
        stats.add_bytes(128);
        let resp = render_stats_response(&stats);
        let text = String::from_utf8(resp).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains("\"total_bytes_transferred\":128"));
    }
}
