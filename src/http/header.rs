use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Reads one CRLF- or LF-terminated line, with the terminator stripped.
/// Returns `Ok(None)` on a clean EOF (zero bytes read) so callers can tell
/// "the peer closed" apart from "the peer sent an empty line".
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "non-utf8 header line"))
}

/// The header block of a request or response, kept as raw `Key: Value`
/// lines in receipt order so that forwarding can re-emit them verbatim
/// (case, spacing, duplicate keys — all preserved) rather than reconstruct
/// them from a parsed map.
#[derive(Debug, Clone, Default)]
pub struct HeaderList {
    pub raw: Vec<String>,
}

impl HeaderList {
    /// First value for a case-insensitively matched header name, trimmed.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.raw.iter().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            if k.trim().eq_ignore_ascii_case(name) {
                Some(v.trim())
            } else {
                None
            }
        })
    }
}

/// Reads header lines until the blank line that ends the block. A premature
/// EOF (connection closed mid-headers) yields `Ok(None)`.
pub async fn read_headers<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Option<HeaderList>> {
    let mut raw = Vec::new();
    loop {
        match read_line(reader).await? {
            None => return Ok(None),
            Some(line) if line.is_empty() => break,
            Some(line) => raw.push(line),
        }
    }
    Ok(Some(HeaderList { raw }))
}
