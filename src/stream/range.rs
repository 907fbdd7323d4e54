//! HTTP `Range` header planning.
//!
//! Only single ranges are served. When a header names several ranges the
//! first satisfiable one wins and the rest are ignored; there is no
//! `multipart/byteranges` support.

use crate::content::ByteRange;

/// The decision of which byte window to serve for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePlan {
    /// No range requested: serve the whole body with 200
    Full,

    /// Serve a single sub-range with 206
    Partial(ByteRange),

    /// A range header was present but unusable; served as `Full`
    Unsatisfiable,
}

impl RangePlan {
    /// Plan a response for a body of `total_length` bytes.
    pub fn plan(total_length: u64, range_header: Option<&str>) -> Self {
        match range_header {
            None => RangePlan::Full,
            Some(header) => match parse_first_range(total_length, header) {
                Some(range) => RangePlan::Partial(range),
                None => RangePlan::Unsatisfiable,
            },
        }
    }

    /// The range to serve, if any. `Unsatisfiable` degrades to the full body.
    pub fn served_range(&self) -> Option<ByteRange> {
        match self {
            RangePlan::Partial(range) => Some(*range),
            RangePlan::Full | RangePlan::Unsatisfiable => None,
        }
    }
}

/// Parse a `bytes=` header and return the first satisfiable range.
///
/// Accepted specs are `a-b`, `a-` and `-n`. The end is clamped to the last
/// byte; specs starting past the end, with `start > end`, or with a suffix
/// longer than the body are skipped.
fn parse_first_range(total_length: u64, header: &str) -> Option<ByteRange> {
    let (unit, specs) = header.split_once('=')?;
    if unit.trim() != "bytes" || total_length == 0 {
        return None;
    }
    let last = total_length - 1;

    specs.split(',').find_map(|spec| {
        let (start, end) = spec.trim().split_once('-')?;
        let start = start.trim();
        let end = end.trim();

        let (start, end) = if start.is_empty() {
            let suffix: u64 = end.parse().ok()?;
            (total_length.checked_sub(suffix)?, last)
        } else {
            let start: u64 = start.parse().ok()?;
            let end = if end.is_empty() {
                last
            } else {
                end.parse::<u64>().ok()?.min(last)
            };
            (start, end)
        };

        (start <= end).then(|| ByteRange::new(start, end))
    })
}
