//! HTTP Range header parsing for media streaming.
//!
//! Handles the standard `bytes=start-end` form where the end is optional.
//! A malformed numeric field downgrades the header to "absent" (serve the
//! whole file from byte 0) rather than a hard error; rejecting outright
//! would break players that send sloppy ranges. This mirrors the historic
//! behavior the consuming players were written against.

use axum::http::HeaderMap;

/// Serving window derived from a client's Range header.
///
/// `end` is inclusive; `None` means "to end of file". Offsets are relative
/// to the target file, not the torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeWindow {
    pub start: u64,
    pub end: Option<u64>,
}

impl RangeWindow {
    /// Resolves the window against the actual file size.
    ///
    /// Returns `(start, end)` with the end defaulted and clamped to the
    /// last byte, or `None` when the start lies beyond the file entirely
    /// (range not satisfiable).
    pub fn clamp(self, file_size: u64) -> Option<(u64, u64)> {
        if file_size == 0 || self.start >= file_size {
            return None;
        }
        let end = self
            .end
            .unwrap_or(file_size - 1)
            .min(file_size.saturating_sub(1));
        if end < self.start {
            return None;
        }
        Some((self.start, end))
    }
}

/// Parses the Range header out of a request's headers, if any.
pub fn extract_range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get("range").and_then(|value| value.to_str().ok())
}

/// Parses a Range header value into a [`RangeWindow`].
///
/// Missing header, missing `bytes=` prefix, or a malformed start field all
/// yield the whole-file window. A malformed end field keeps the start and
/// leaves the end open, matching the reference behavior.
pub fn parse_range_header(header: Option<&str>) -> RangeWindow {
    let Some(raw) = header else {
        return RangeWindow::default();
    };
    let Some(range_spec) = raw.strip_prefix("bytes=") else {
        return RangeWindow::default();
    };
    let Some((start_str, end_str)) = range_spec.split_once('-') else {
        return RangeWindow::default();
    };
    let Ok(start) = start_str.parse::<u64>() else {
        return RangeWindow::default();
    };

    let end = if end_str.is_empty() {
        None
    } else {
        end_str.parse::<u64>().ok()
    };

    RangeWindow { start, end }
}
