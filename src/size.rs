//! Approximate size checks against the rounded sizes shown on listing pages.

use log::debug;
use std::path::Path;

/// Tolerance shrink applied for every 1024 multiplier a unit suffix implies.
const TOLERANCE_STEP: f64 = 1.025;

/// A listing size converted to bytes, with the ratio it must be matched within.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedSize {
    pub bytes: f64,
    pub tolerance: f64,
}

/// Parses `"482"`, `"482K"`, `"1.2M"`, `"3Gb"` and similar.
///
/// Units are case-insensitive and anything after the unit letter is ignored.
pub fn parse_size(text: &str) -> Option<ExpectedSize> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(split);
    if number.is_empty() || !number.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let mut bytes: f64 = number.parse().ok()?;

    let steps = match suffix.chars().next().map(|c| c.to_ascii_uppercase()) {
        None => 0,
        Some('K') => 1,
        Some('M') => 2,
        Some('G') => 3,
        Some('T') => 4,
        Some(_) => return None,
    };

    let mut tolerance = 1.0;
    for _ in 0..steps {
        bytes *= 1024.0;
        tolerance /= TOLERANCE_STEP;
    }
    Some(ExpectedSize { bytes, tolerance })
}

/// Whether the file at `path` plausibly matches the advertised size.
///
/// A missing file, a missing reference size, or an unparseable size is never
/// considered correct.
pub fn is_correct_size(expected: Option<&str>, path: &Path) -> bool {
    let actual = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return false,
    };
    let Some(text) = expected.filter(|s| !s.trim().is_empty()) else {
        return false;
    };
    let Some(expected) = parse_size(text) else {
        debug!("Unrecognized size {:?} for {}", text, path.display());
        return false;
    };

    if actual == 0 {
        return expected.bytes == 0.0;
    }

    let mut ratio = expected.bytes / actual as f64;
    if ratio > 1.0 {
        ratio = 1.0 / ratio;
    }
    if ratio < expected.tolerance {
        debug!(
            "Size ratio {:.4} below tolerance {:.4} for {} (expected {} bytes, found {})",
            ratio,
            expected.tolerance,
            path.display(),
            expected.bytes,
            actual
        );
    }
    ratio >= expected.tolerance
}
