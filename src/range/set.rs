use std::sync::LazyLock;

use regex::Regex;

/// A single byte range, already normalized to an exclusive upper bound.
///
/// `hi: None` means "open", i.e. runs to the end of whatever body it is
/// applied against. `Tail` is the `-N` form: the last `n` bytes, resolved
/// only once the body's end is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    Bounded { lo: u64, hi: Option<u64> },
    Tail { n: u64 },
}

/// An ordered list of ranges as written by the client, in request order.
/// Ranges are never merged or sorted: see spec example 3 for why order
/// matters to the output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet(Vec<Range>);

static RANGE_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d*)-(\d*)$").unwrap());

impl RangeSet {
    pub fn empty() -> Self {
        RangeSet(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Range> {
        self.0
    }

    /// Parses a `bytes=...` range-spec (the value of either a `Range` header
    /// or a `range` query parameter). Any malformed input, including an
    /// unrecognized unit or a tail range mixed with other ranges, yields an
    /// empty set; the caller's contract is that an empty set means "no
    /// ranging" rather than an error.
    pub fn parse(value: &str) -> RangeSet {
        let value = value.trim();
        let Some(spec) = value.strip_prefix("bytes=") else {
            return RangeSet::empty();
        };

        let mut ranges = Vec::new();
        for item in spec.split(',') {
            let item = item.trim();
            let Some(caps) = RANGE_ITEM.captures(item) else {
                return RangeSet::empty();
            };
            let lo_str = &caps[1];
            let hi_str = &caps[2];

            let range = match (lo_str, hi_str) {
                ("", "") => return RangeSet::empty(),
                ("", n) => match n.parse::<u64>() {
                    Ok(n) => Range::Tail { n },
                    Err(_) => return RangeSet::empty(),
                },
                (lo, "") => match lo.parse::<u64>() {
                    Ok(lo) => Range::Bounded { lo, hi: None },
                    Err(_) => return RangeSet::empty(),
                },
                (lo, hi) => {
                    let (lo, hi): (u64, u64) = match (lo.parse(), hi.parse()) {
                        (Ok(lo), Ok(hi)) => (lo, hi),
                        _ => return RangeSet::empty(),
                    };
                    if lo > hi {
                        return RangeSet::empty();
                    }
                    Range::Bounded { lo, hi: Some(hi + 1) }
                }
            };
            ranges.push(range);
        }

        if ranges.is_empty() {
            return RangeSet::empty();
        }

        let tail_count = ranges.iter().filter(|r| matches!(r, Range::Tail { .. })).count();
        let tail_is_sole_and_last = ranges.len() == 1 && matches!(ranges[0], Range::Tail { .. });
        if tail_count > 0 && !tail_is_sole_and_last {
            return RangeSet::empty();
        }

        RangeSet(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lo_hi() {
        let rs = RangeSet::parse("bytes=6-11");
        assert_eq!(rs.into_inner(), vec![Range::Bounded { lo: 6, hi: Some(12) }]);
    }

    #[test]
    fn parses_open_lo() {
        let rs = RangeSet::parse("bytes=6-");
        assert_eq!(rs.into_inner(), vec![Range::Bounded { lo: 6, hi: None }]);
    }

    #[test]
    fn parses_tail() {
        let rs = RangeSet::parse("bytes=-5");
        assert_eq!(rs.into_inner(), vec![Range::Tail { n: 5 }]);
    }

    #[test]
    fn parses_multiple_in_request_order() {
        let rs = RangeSet::parse("bytes=6-11,2-3");
        assert_eq!(
            rs.into_inner(),
            vec![
                Range::Bounded { lo: 6, hi: Some(12) },
                Range::Bounded { lo: 2, hi: Some(4) },
            ]
        );
    }

    #[test]
    fn rejects_missing_unit() {
        assert!(RangeSet::parse("6-11").is_empty());
    }

    #[test]
    fn rejects_empty_spec() {
        assert!(RangeSet::parse("bytes=-").is_empty());
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(RangeSet::parse("bytes=11-6").is_empty());
    }

    #[test]
    fn rejects_tail_combined_with_other_ranges() {
        assert!(RangeSet::parse("bytes=-5,6-11").is_empty());
        assert!(RangeSet::parse("bytes=6-11,-5").is_empty());
    }

    #[test]
    fn equality_is_used_for_header_query_reconciliation() {
        assert_eq!(RangeSet::parse("bytes=6-11"), RangeSet::parse("bytes=6-11"));
        assert_ne!(RangeSet::parse("bytes=6-11"), RangeSet::parse("bytes=6-12"));
    }
}
