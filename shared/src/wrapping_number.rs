use thiserror::Error;

/// Errors that can occur during wrapping number operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WrappingNumberError {
    /// The cycle length of a modular comparison was zero
    #[error("Wrapping comparison requires a non-zero cycle length")]
    EmptyCycle,
}

/// Returns whether or not a wrapping u16 is greater than another
/// sequence_greater_than(2,1) will return true
/// sequence_greater_than(1,2) will return false
/// sequence_greater_than(1,1) will return false
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= 32768)) || ((s1 < s2) && (s2 - s1 > 32768))
}

/// Returns whether or not a wrapping u16 is less than another
pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

/// Signed distance from `a` forward to `b` on the u16 circle
///
/// # Examples
/// ```
/// # use tessera_shared::wrapping_diff;
/// assert_eq!(wrapping_diff(1, 2), 1);
/// assert_eq!(wrapping_diff(2, 1), -1);
/// assert_eq!(wrapping_diff(65535, 0), 1);
/// assert_eq!(wrapping_diff(0, 65535), -1);
/// ```
pub fn wrapping_diff(a: u16, b: u16) -> i16 {
    b.wrapping_sub(a) as i16
}

/// Forward distance from `from` to `to` on a circle of `cycle` values.
///
/// Both values are reduced modulo `cycle` first, so callers can pass raw ids.
pub fn try_forward_distance(from: u32, to: u32, cycle: u32) -> Result<u32, WrappingNumberError> {
    if cycle == 0 {
        return Err(WrappingNumberError::EmptyCycle);
    }
    let from = from % cycle;
    let to = to % cycle;
    Ok((to + cycle - from) % cycle)
}

/// Half-window successor test on a circle of `cycle` values: `to` is accepted
/// when it lies between 1 and `window` steps ahead of `from`.
///
/// # Panics
///
/// Panics if `cycle` is zero.
pub fn is_forward_within(from: u32, to: u32, cycle: u32, window: u32) -> bool {
    let distance = try_forward_distance(from, to, cycle)
        .unwrap_or_else(|e| panic!("is_forward_within: {}", e));
    distance >= 1 && distance <= window
}
