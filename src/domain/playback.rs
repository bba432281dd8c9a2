/// Default distance from the clip end at which playback counts as finished.
pub const END_TOLERANCE_MS: u64 = 30;

/// Whether `position_ms` is close enough to the end of a clip of
/// `duration_ms` to be treated as finished.
///
/// An unknown duration (0) never counts as finished.
#[must_use]
pub fn is_at_end(position_ms: u64, duration_ms: u64, tolerance_ms: u64) -> bool {
    duration_ms > 0 && position_ms.saturating_add(tolerance_ms) >= duration_ms
}
