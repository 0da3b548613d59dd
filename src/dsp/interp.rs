//! Index and interpolation helpers shared by the delay-based units.

/// Linear interpolation: `(1 - frac) * a + frac * b`.
#[inline]
pub fn lerp(a: f32, b: f32, frac: f32) -> f32 {
    a * (1.0 - frac) + b * frac
}

/// Split a non-negative delay into whole samples and the fractional rest.
///
/// For 441.3 samples this returns `(441, 0.3)`.
#[inline]
pub fn split_delay(delay: f32) -> (usize, f32) {
    let whole = delay.floor();
    (whole as usize, delay - whole)
}

/// Wrap a possibly negative index onto a ring of `len` slots.
#[inline]
pub fn wrap_index(index: isize, len: usize) -> usize {
    index.rem_euclid(len as isize) as usize
}

/// Wrap a delay into `[0, span)` by adding or subtracting whole spans.
///
/// Used by units whose delay drifts continuously: once the read head runs
/// off one end of the history it reappears at the other.
#[inline]
pub fn wrap_delay(delay: f32, span: f32) -> f32 {
    let wrapped = delay.rem_euclid(span);
    // rem_euclid can round up to exactly `span` for tiny negative inputs.
    if wrapped >= span {
        0.0
    } else {
        wrapped
    }
}
