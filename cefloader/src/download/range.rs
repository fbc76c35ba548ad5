//! Byte-range planning for parallel downloads.

use std::fmt;

/// An inclusive `[start, end]` byte range of a remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadRange {
    /// First byte offset (inclusive).
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

impl DownloadRange {
    /// Create a new range. `end` must not be less than `start`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(end >= start, "range end {} before start {}", end, start);
        Self { start, end }
    }

    /// Number of bytes covered by the range. Never zero.
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the HTTP `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for DownloadRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Split `content_length` bytes into `worker_count` contiguous ranges.
///
/// Every range has `content_length / worker_count` bytes except the last,
/// which absorbs the remainder. A worker count of zero is treated as one, and
/// when there are fewer bytes than workers each byte gets its own range.
/// An empty resource yields an empty plan.
pub fn plan_ranges(content_length: u64, worker_count: usize) -> Vec<DownloadRange> {
    if content_length == 0 {
        return Vec::new();
    }

    let workers = (worker_count.max(1) as u64).min(content_length);
    let chunk = content_length / workers;

    let mut ranges: Vec<DownloadRange> = (0..workers - 1)
        .map(|i| DownloadRange::new(i * chunk, (i + 1) * chunk - 1))
        .collect();

    let last_start = ranges.last().map(|r| r.end + 1).unwrap_or(0);
    ranges.push(DownloadRange::new(last_start, content_length - 1));

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_exact_cover(ranges: &[DownloadRange], length: u64) {
        assert_eq!(ranges.first().map(|r| r.start), Some(0));
        assert_eq!(ranges.last().map(|r| r.end), Some(length - 1));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start);
        }
        assert_eq!(ranges.iter().map(DownloadRange::byte_count).sum::<u64>(), length);
    }

    #[test]
    fn test_even_split() {
        let ranges = plan_ranges(100, 4);
        assert_eq!(
            ranges,
            vec![
                DownloadRange::new(0, 24),
                DownloadRange::new(25, 49),
                DownloadRange::new(50, 74),
                DownloadRange::new(75, 99),
            ]
        );
    }

    #[test]
    fn test_last_range_absorbs_remainder() {
        let ranges = plan_ranges(103, 4);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[3], DownloadRange::new(75, 102));
        assert_exact_cover(&ranges, 103);
    }

    #[test]
    fn test_single_worker() {
        assert_eq!(plan_ranges(10, 1), vec![DownloadRange::new(0, 9)]);
    }

    #[test]
    fn test_zero_workers_treated_as_one() {
        assert_eq!(plan_ranges(10, 0), vec![DownloadRange::new(0, 9)]);
    }

    #[test]
    fn test_fewer_bytes_than_workers() {
        let ranges = plan_ranges(3, 8);
        assert_eq!(ranges.len(), 3);
        assert_exact_cover(&ranges, 3);
    }

    #[test]
    fn test_empty_resource_has_no_plan() {
        assert!(plan_ranges(0, 4).is_empty());
    }

    #[test]
    fn test_header_value() {
        assert_eq!(DownloadRange::new(25, 49).header_value(), "bytes=25-49");
        assert_eq!(DownloadRange::new(25, 49).byte_count(), 25);
    }

    proptest! {
        #[test]
        fn prop_ranges_cover_content_exactly(workers in 1usize..64, extra in 0u64..1_000_000) {
            let length = workers as u64 + extra;
            let ranges = plan_ranges(length, workers);

            prop_assert_eq!(ranges.len(), workers);
            prop_assert_eq!(ranges[0].start, 0);
            prop_assert_eq!(ranges[ranges.len() - 1].end, length - 1);
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end + 1, pair[1].start);
            }
            let covered: u64 = ranges.iter().map(DownloadRange::byte_count).sum();
            prop_assert_eq!(covered, length);
            for range in &ranges {
                prop_assert!(range.start <= range.end);
            }
        }
    }
}
