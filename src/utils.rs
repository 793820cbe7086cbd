//! Small arithmetic helpers shared across the crate

/// Divides `value` by `divisor`, rounding up.
///
/// # Examples
/// ```
/// use memobj::utils::ceil_div;
///
/// assert_eq!(ceil_div(7, 4), 2);
/// assert_eq!(ceil_div(8, 4), 2);
/// assert_eq!(ceil_div(9, 4), 3);
/// assert_eq!(ceil_div(0, 4), 0);
/// ```
#[inline(always)]
pub const fn ceil_div(value: usize, divisor: usize) -> usize {
    debug_assert!(divisor > 0);
    (value + divisor - 1) / divisor
}
