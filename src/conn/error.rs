use std::fmt;

/// Per-connection control-flow outcomes that end the state machine before
/// relaying ever starts. None of these are "errors" in the exceptional
/// sense — they're ordinary terminal states, so the handler only logs
/// them at `debug!`.
#[derive(Debug)]
pub enum ConnError {
    /// Request line or header block couldn't be parsed, or the client
    /// closed before sending a complete one.
    MalformedRequest,
    /// `Host` was absent, or resolves back to this proxy's own listen
    /// endpoint, or to a loopback alias of it.
    LoopDetected,
    /// Dialing the origin failed (refused, unreachable, DNS failure).
    OriginUnreachable,
    /// The `Range` header and `range` query parameter disagree.
    RangeConflict,
}

impl fmt::Display for ConnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnError::MalformedRequest => write!(f, "malformed request"),
            ConnError::LoopDetected => write!(f, "loop detected"),
            ConnError::OriginUnreachable => write!(f, "origin unreachable"),
            ConnError::RangeConflict => write!(f, "range header/query conflict"),
        }
    }
}

impl std::error::Error for ConnError {}
