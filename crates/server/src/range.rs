#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Lenient single-range parser. Returns `None` when the header is not a
/// byte range or the file is empty, in which case the full body is sent.
///
/// A missing or unparseable start is 0; a missing, unparseable or
/// out-of-bounds end is `size - 1`; a start past the end resets to 0. Only
/// the first range of a multi-range header is honoured.
pub fn parse_range_header(value: &str, size: u64) -> Option<ByteRange> {
    let range = value.trim().strip_prefix("bytes=")?;
    if size == 0 {
        return None;
    }
    let first = range.split(',').next().unwrap_or("");

    let (start_str, end_str) = first.split_once('-').unwrap_or((first, ""));
    let mut start = start_str.trim().parse::<u64>().unwrap_or(0);
    let end = match end_str.trim().parse::<u64>() {
        Ok(end) if end < size => end,
        _ => size - 1,
    };
    if start > end {
        start = 0;
    }
    Some(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::{parse_range_header, ByteRange};

    #[test]
    fn parses_closed_range() {
        let range = parse_range_header("bytes=0-99", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 99 });
        assert_eq!(range.content_length(), 100);
    }

    #[test]
    fn parses_open_ended_range() {
        let range = parse_range_header("bytes=500-", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 500, end: 999 });
    }

    #[test]
    fn clamps_end_overflow() {
        let range = parse_range_header("bytes=900-5000", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 900, end: 999 });
    }

    #[test]
    fn missing_start_defaults_to_zero() {
        let range = parse_range_header("bytes=-10", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 10 });
        let range = parse_range_header("bytes=abc-20", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 20 });
    }

    #[test]
    fn start_past_end_resets_to_zero() {
        let range = parse_range_header("bytes=50-10", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 10 });
        let range = parse_range_header("bytes=2000-", 1000).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 999 });
    }

    #[test]
    fn only_first_of_multiple_ranges_is_used() {
        let range = parse_range_header("bytes=0-1,2-3", 100).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 1 });
    }

    #[test]
    fn ignores_other_units_and_empty_files() {
        assert!(parse_range_header("items=0-1", 100).is_none());
        assert!(parse_range_header("bytes=0-1", 0).is_none());
    }
}
