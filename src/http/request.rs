/// A parsed request line: `METHOD target HTTP/x.y`.
#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

/// Parses a request line into its three space-separated tokens. Anything
/// that doesn't have exactly three tokens is treated as malformed.
pub fn parse_request_line(line: &str) -> Option<RequestLine> {
    let mut parts = line.split(' ').filter(|s| !s.is_empty());
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let version = parts.next()?.to_string();
    if parts.next().is_some() {
        return None;
    }
    Some(RequestLine { method, target, version })
}

/// Splits a request target into its path and (optional) query string,
/// on the first `?`.
pub fn split_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

/// Finds a query parameter's raw value by key. Values are split on the
/// *first* `=` only, so a value that itself contains `=` (as `range`'s
/// `bytes=...` values do) survives intact.
pub fn find_query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == key {
            Some(v)
        } else {
            None
        }
    })
}

/// Splits a `Host` header value into hostname and port, defaulting to port
/// 80 when no `:port` suffix is present or the suffix doesn't parse.
pub fn parse_host_header(value: &str) -> (String, u16) {
    match value.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (value.to_string(), 80),
        },
        None => (value.to_string(), 80),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_request_line() {
        let rl = parse_request_line("GET /path?range=bytes=6- HTTP/1.1").unwrap();
        assert_eq!(rl.method, "GET");
        assert_eq!(rl.target, "/path?range=bytes=6-");
        assert_eq!(rl.version, "HTTP/1.1");
    }

    #[test]
    fn rejects_malformed_request_line() {
        assert!(parse_request_line("GET /path").is_none());
        assert!(parse_request_line("").is_none());
    }

    #[test]
    fn splits_target_on_first_question_mark() {
        assert_eq!(split_target("/stats"), ("/stats", None));
        assert_eq!(split_target("/a?range=bytes=1-2"), ("/a", Some("range=bytes=1-2")));
    }

    #[test]
    fn finds_query_param_tolerating_embedded_equals() {
        assert_eq!(find_query_param("range=bytes=6-11", "range"), Some("bytes=6-11"));
        assert_eq!(find_query_param("a=1&range=bytes=-5", "range"), Some("bytes=-5"));
        assert_eq!(find_query_param("a=1", "range"), None);
    }

    #[test]
    fn parses_host_with_and_without_port() {
        assert_eq!(parse_host_header("example.com:8080"), ("example.com".to_string(), 8080));
        assert_eq!(parse_host_header("example.com"), ("example.com".to_string(), 80));
        assert_eq!(parse_host_header("example.com:not-a-port"), ("example.com:not-a-port".to_string(), 80));
    }
}
