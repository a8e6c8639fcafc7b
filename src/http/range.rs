//! HTTP Range request parsing module
//!
//! Single byte-range support (RFC 7233) for static assets.

/// Parsed Range request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    /// Start byte position
    pub start: usize,
    /// End byte position, None means until end of file
    pub end: Option<usize>,
}

impl RangeRequest {
    /// Inclusive end position for a file of `file_size` bytes
    #[inline]
    pub fn end_position(&self, file_size: usize) -> usize {
        self.end.unwrap_or_else(|| file_size.saturating_sub(1))
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    Valid(RangeRequest),
    /// Respond 416
    NotSatisfiable,
    /// No Range header, or one we ignore (serve the full body)
    None,
}

/// Parse HTTP Range header (single range only, bytes unit)
///
/// Supported forms: `bytes=start-end`, `bytes=start-`, `bytes=-suffix`.
/// Multi-range and non-byte units are ignored.
///
/// ```
/// use rust_appserver::http::range::{parse_range_header, RangeParseResult};
///
/// assert!(matches!(parse_range_header(Some("bytes=0-99"), 1000), RangeParseResult::Valid(_)));
/// assert_eq!(parse_range_header(None, 1000), RangeParseResult::None);
/// ```
pub fn parse_range_header(range_header: Option<&str>, file_size: usize) -> RangeParseResult {
    let Some(spec) = range_header.and_then(|h| h.strip_prefix("bytes=")) else {
        return RangeParseResult::None;
    };
    if spec.contains(',') {
        return RangeParseResult::None;
    }
    let Some((start_str, end_str)) = spec.split_once('-') else {
        return RangeParseResult::None;
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if file_size == 0 {
        return RangeParseResult::NotSatisfiable;
    }

    if start_str.is_empty() {
        // Suffix range: "-500" means the last 500 bytes
        return match end_str.parse::<usize>() {
            Ok(0) => RangeParseResult::NotSatisfiable,
            Ok(suffix) => RangeParseResult::Valid(RangeRequest {
                start: file_size.saturating_sub(suffix),
                end: Some(file_size - 1),
            }),
            Err(_) => RangeParseResult::None,
        };
    }

    let Ok(start) = start_str.parse::<usize>() else {
        return RangeParseResult::None;
    };
    if start >= file_size {
        return RangeParseResult::NotSatisfiable;
    }

    if end_str.is_empty() {
        return RangeParseResult::Valid(RangeRequest { start, end: None });
    }
    match end_str.parse::<usize>() {
        Ok(end) if end < start => RangeParseResult::NotSatisfiable,
        Ok(end) => RangeParseResult::Valid(RangeRequest {
            start,
            end: Some(end.min(file_size - 1)),
        }),
        Err(_) => RangeParseResult::None,
    }
}
