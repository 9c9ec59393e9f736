use std::collections::VecDeque;

use ringbuffer::{AllocRingBuffer, RingBuffer};

use super::set::{Range, RangeSet};

/// Streaming range splicer: carves the byte ranges a client asked for out of
/// an origin response body the proxy reads as an opaque stream of chunks,
/// with no seeking and no buffering beyond what a tail range needs.
///
/// Ranges are served strictly in request order against a single forward pass
/// over the body. A range whose bytes have already scrolled past the current
/// read position (because an earlier, later-ordered range consumed them)
/// simply never completes, rather than attempting to rewind a TCP stream.
pub struct Splicer {
    absolute_pos: u64,
    pending: VecDeque<Range>,
    current: Option<Range>,
    tail_buffer: Option<AllocRingBuffer<u8>>,
    done: bool,
}

impl Splicer {
    pub fn new(ranges: RangeSet) -> Self {
        let mut pending: VecDeque<Range> = ranges.into_inner().into();
        let current = pending.pop_front();
        let tail_buffer = match current {
            Some(Range::Tail { n }) => Some(AllocRingBuffer::new(tail_capacity(n))),
            _ => None,
        };
        let done = current.is_none();
        Splicer { absolute_pos: 0, pending, current, tail_buffer, done }
    }

    /// True once every requested range has been fully emitted (or, for
    /// ranges that can never complete, once the caller should simply keep
    /// draining and discarding the rest of the origin body).
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feeds one chunk of origin body bytes and returns the bytes that
    /// should be written to the client for it, if any.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<u8> {
        let p = self.absolute_pos;
        let len = chunk.len() as u64;
        let chunk_end = p + len;

        if self.done || chunk.is_empty() {
            self.absolute_pos = chunk_end;
            return Vec::new();
        }

        let mut out = Vec::new();

        loop {
            let Some(range) = self.current else {
                self.done = true;
                break;
            };

            match range {
                Range::Tail { n } => {
                    self.buffer_tail(chunk, n);
                    break;
                }
                Range::Bounded { lo, hi: None } => {
                    if lo >= p && lo < chunk_end {
                        out.extend_from_slice(&chunk[(lo - p) as usize..]);
                        break;
                    } else if p >= lo {
                        out.extend_from_slice(chunk);
                        break;
                    } else {
                        // whole chunk precedes the range's start
                        break;
                    }
                }
                Range::Bounded { lo, hi: Some(hi) } => {
                    let lo_in_chunk = lo >= p && lo <= chunk_end;
                    let hi_in_chunk = hi >= p && hi <= chunk_end;

                    if lo_in_chunk && hi_in_chunk {
                        out.extend_from_slice(&chunk[(lo - p) as usize..(hi - p) as usize]);
                        self.advance_range();
                        if hi == chunk_end {
                            break;
                        }
                        continue;
                    } else if p >= lo && p <= hi && hi_in_chunk {
                        out.extend_from_slice(&chunk[..(hi - p) as usize]);
                        self.advance_range();
                        if hi == chunk_end {
                            break;
                        }
                        continue;
                    } else if lo_in_chunk && hi > chunk_end {
                        out.extend_from_slice(&chunk[(lo - p) as usize..]);
                        break;
                    } else if lo <= p && chunk_end <= hi {
                        out.extend_from_slice(chunk);
                        break;
                    } else {
                        // disjoint, either entirely before or entirely
                        // after this chunk; wait for the next one
                        break;
                    }
                }
            }
        }

        self.absolute_pos = chunk_end;
        out
    }

    /// Signals origin EOF. Returns any trailing bytes owed to the client —
    /// only a pending tail range produces output here, since every other
    /// range either completed mid-stream or can no longer be satisfied.
    pub fn finish(&mut self) -> Vec<u8> {
        let out = match self.current {
            Some(Range::Tail { .. }) => self.tail_buffer.take().map(|b| b.to_vec()).unwrap_or_default(),
            _ => Vec::new(),
        };
        self.current = None;
        self.done = true;
        out
    }

    fn advance_range(&mut self) {
        self.current = self.pending.pop_front();
        match self.current {
            Some(Range::Tail { n }) => self.tail_buffer = Some(AllocRingBuffer::new(tail_capacity(n))),
            _ => {}
        }
        if self.current.is_none() {
            self.done = true;
        }
    }

    fn buffer_tail(&mut self, chunk: &[u8], n: u64) {
        if n == 0 {
            return;
        }
        let buf = self.tail_buffer.get_or_insert_with(|| AllocRingBuffer::new(tail_capacity(n)));
        for &b in chunk {
            buf.push(b);
        }
    }
}

fn tail_capacity(n: u64) -> usize {
    n.max(1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splice_all(ranges: RangeSet, chunks: &[&[u8]]) -> Vec<u8> {
        let mut splicer = Splicer::new(ranges);
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(splicer.push_chunk(chunk));
        }
        out.extend(splicer.finish());
        out
    }

    #[test]
    fn single_range_within_one_chunk() {
        let body: &[u8] = b"abcdefghijklmn";
        let ranges = RangeSet::parse("bytes=6-11");
        assert_eq!(splice_all(ranges, &[body]), b"ghijkl");
    }

    #[test]
    fn out_of_order_ranges_preserve_request_order() {
        // spec example 3: R = [(6,12), (2,4)] over "abcdefghijklmn" yields
        // "ghijkl" followed by "cd", even though the second range's bytes
        // sit earlier in the body.
        let body: &[u8] = b"abcdefghijklmn";
        let ranges = RangeSet::parse("bytes=6-11,2-3");
        assert_eq!(splice_all(ranges, &[body]), b"ghijklcd");
    }

    #[test]
    fn open_ended_range() {
        let body: &[u8] = b"abcdefghij";
        let ranges = RangeSet::parse("bytes=6-");
        assert_eq!(splice_all(ranges, &[body]), b"ghij");
    }

    #[test]
    fn tail_range() {
        let body: &[u8] = b"abcdefghij";
        let ranges = RangeSet::parse("bytes=-3");
        assert_eq!(splice_all(ranges, &[body]), b"hij");
    }

    #[test]
    fn tail_range_shorter_than_body_seen_so_far() {
        let ranges = RangeSet::parse("bytes=-4");
        let chunks: [&[u8]; 3] = [b"ab", b"cd", b"ef"];
        assert_eq!(splice_all(ranges, &chunks), b"cdef");
    }

    #[test]
    fn range_spanning_a_chunk_boundary_is_unaffected_by_chunking() {
        let body = b"abcdefghijklmn".to_vec();
        let whole = splice_all(RangeSet::parse("bytes=3-9"), &[&body]);
        let split_a: &[u8] = &body[..5];
        let split_b: &[u8] = &body[5..];
        let chunked = splice_all(RangeSet::parse("bytes=3-9"), &[split_a, split_b]);
        assert_eq!(whole, chunked);
        assert_eq!(whole, b"defghij");
    }

    #[test]
    fn byte_by_byte_chunking_matches_single_chunk() {
        let body = b"abcdefghijklmn".to_vec();
        let whole = splice_all(RangeSet::parse("bytes=6-11,2-3"), &[&body]);
        let per_byte: Vec<&[u8]> = body.iter().map(std::slice::from_ref).collect();
        let chunked = splice_all(RangeSet::parse("bytes=6-11,2-3"), &per_byte);
        assert_eq!(whole, chunked);
    }

    #[test]
    fn range_past_end_of_body_emits_nothing() {
        let body: &[u8] = b"abc";
        let ranges = RangeSet::parse("bytes=10-20");
        assert_eq!(splice_all(ranges, &[body]), b"");
    }

    #[test]
    fn multiple_ranges_each_resolved_independently() {
        let body: &[u8] = b"0123456789";
        let ranges = RangeSet::parse("bytes=0-1,4-5,8-9");
        assert_eq!(splice_all(ranges, &[body]), b"014589");
    }
}
