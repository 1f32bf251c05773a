//! Exact rational durations.
//!
//! All note, rest and tuplet lengths are fractions of the unit note length.
//! Arithmetic never rounds; conversion to ticks truncates, and the tick
//! resolution pass picks a resolution at which that truncation is exact.
//! Every operation that can leave the `u32` range returns `None` instead.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Greatest common divisor. `gcd(0, 0)` is defined as 1 so that reducing a
/// zero-length duration never divides by zero.
pub fn gcd(a: u32, b: u32) -> u32 {
    let (mut a, mut b) = if b > a { (b, a) } else { (a, b) };
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    if a == 0 {
        1
    } else {
        a
    }
}

/// Least common multiple, `a / gcd(a, b) * b`, or `None` past `u32::MAX`.
pub fn checked_lcm(a: u32, b: u32) -> Option<u32> {
    (a / gcd(a, b)).checked_mul(b)
}

/// A duration as `numerator / denominator` of the unit length.
///
/// The stored pair is not necessarily in lowest terms (`Duration::new` keeps
/// what was written), but equality, hashing and display all use the reduced
/// value: `2/4 == 1/2`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Duration {
    pub numerator: u32,
    pub denominator: u32,
}

impl Duration {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Duration {
            numerator,
            denominator,
        }
    }

    pub fn unit() -> Self {
        Duration::new(1, 1)
    }

    pub fn zero() -> Self {
        Duration::new(0, 1)
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    /// The same value in lowest terms.
    pub fn reduced(&self) -> Self {
        let g = gcd(self.numerator, self.denominator);
        Duration::new(self.numerator / g, self.denominator / g)
    }

    /// `self + other`, reduced.
    pub fn checked_add(&self, other: Duration) -> Option<Self> {
        let num = self.numerator as u128 * other.denominator as u128
            + other.numerator as u128 * self.denominator as u128;
        let den = self.denominator as u128 * other.denominator as u128;
        Self::narrowed(num, den)
    }

    /// `self * (by_num / by_denom)`, reduced.
    pub fn checked_scale(&self, by_num: u32, by_denom: u32) -> Option<Self> {
        let num = self.numerator as u128 * by_num as u128;
        let den = self.denominator as u128 * by_denom as u128;
        Self::narrowed(num, den)
    }

    /// `self * other`, reduced.
    pub fn checked_times(&self, other: Duration) -> Option<Self> {
        self.checked_scale(other.numerator, other.denominator)
    }

    /// `ticks * numerator / denominator`, truncating.
    pub fn to_ticks(&self, ticks: u32) -> Option<u32> {
        self.to_ticks_wide(ticks as u64)
            .and_then(|t| u32::try_from(t).ok())
    }

    /// [`Duration::to_ticks`] over a `u64` tick count.
    pub fn to_ticks_wide(&self, ticks: u64) -> Option<u64> {
        if self.denominator == 0 {
            return Some(0);
        }
        let scaled = ticks as u128 * self.numerator as u128 / self.denominator as u128;
        u64::try_from(scaled).ok()
    }

    /// `num / den` in lowest terms, if both parts fit in `u32`.
    fn narrowed(num: u128, den: u128) -> Option<Self> {
        let g = gcd128(num, den);
        let numerator = u32::try_from(num / g).ok()?;
        let denominator = u32::try_from(den / g).ok()?;
        Some(Duration::new(numerator, denominator))
    }

    fn cross(&self, other: &Duration) -> (u64, u64) {
        (
            self.numerator as u64 * other.denominator as u64,
            other.numerator as u64 * self.denominator as u64,
        )
    }
}

fn gcd128(a: u128, b: u128) -> u128 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    if a == 0 {
        1
    } else {
        a
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::unit()
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = self.cross(other);
        a == b
    }
}

impl Eq for Duration {}

impl Hash for Duration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let r = self.reduced();
        r.numerator.hash(state);
        r.denominator.hash(state);
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.reduced();
        write!(f, "{}/{}", r.numerator, r.denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(12, 8), 4);
        assert_eq!(gcd(8, 12), 4);
        assert_eq!(gcd(7, 0), 7);
        assert_eq!(gcd(0, 0), 1);
    }

    #[test]
    fn test_lcm() {
        assert_eq!(checked_lcm(1, 2), Some(2));
        assert_eq!(checked_lcm(4, 6), Some(12));
        let folded = [2, 3, 4].into_iter().try_fold(1, checked_lcm);
        assert_eq!(folded, Some(12));
    }

    #[test]
    fn test_lcm_overflow() {
        assert_eq!(checked_lcm(65_536, 65_536), Some(65_536));
        assert_eq!(checked_lcm(65_536, 65_537), None);
        assert_eq!(checked_lcm(u32::MAX, 1), Some(u32::MAX));

        // eight primes whose product is past u32::MAX
        let primes = [7, 11, 13, 17, 19, 23, 29, 31];
        assert_eq!(primes.into_iter().try_fold(1, checked_lcm), None);
        assert_eq!(primes[..7].iter().copied().try_fold(1, checked_lcm), Some(215_656_441));
    }

    #[test]
    fn test_add_reduces() {
        let sum = Duration::new(1, 4).checked_add(Duration::new(1, 4)).unwrap();
        assert_eq!(sum.numerator, 1);
        assert_eq!(sum.denominator, 2);

        let sum = Duration::new(2, 3).checked_add(Duration::new(1, 3)).unwrap();
        assert_eq!((sum.numerator, sum.denominator), (1, 1));
    }

    #[test]
    fn test_add_zero_lengths() {
        let sum = Duration::zero().checked_add(Duration::zero()).unwrap();
        assert!(sum.is_zero());
        assert_eq!(sum.denominator, 1);
    }

    #[test]
    fn test_add_at_the_edge() {
        // the wide intermediate reduces back into range
        let half = Duration::new(u32::MAX / 2, u32::MAX);
        assert_eq!(half.checked_add(half), Some(Duration::new(u32::MAX - 1, u32::MAX)));

        let big = Duration::new(u32::MAX, 1);
        assert_eq!(big.checked_add(Duration::new(1, 1)), None);
        assert_eq!(
            Duration::new(1, 65_537).checked_add(Duration::new(1, 65_539)),
            None
        );
    }

    #[test]
    fn test_scale_reduces() {
        let scaled = Duration::new(1, 2).checked_scale(2, 3).unwrap();
        assert_eq!((scaled.numerator, scaled.denominator), (1, 3));
        assert_eq!(scaled.to_string(), "1/3");
    }

    #[test]
    fn test_scale_overflow() {
        let long = Duration::new(99_999, 1);
        assert_eq!(long.checked_times(long), None);
        assert_eq!(
            Duration::new(1, 65_536).checked_scale(1, 65_536),
            None
        );
        // the product only fits once reduced
        assert_eq!(
            Duration::new(100_000, 3).checked_scale(99_999, 100_000),
            Some(Duration::new(33_333, 1))
        );
    }

    #[test]
    fn test_equality_by_value() {
        assert_eq!(Duration::new(2, 4), Duration::new(1, 2));
        assert_ne!(Duration::new(3, 4), Duration::new(1, 1));
        assert_eq!(Duration::new(0, 1), Duration::new(0, 7));
    }

    #[test]
    fn test_hash_matches_equality() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(Duration::new(2, 4));
        assert!(set.contains(&Duration::new(1, 2)));
    }

    #[test]
    fn test_to_ticks() {
        assert_eq!(Duration::unit().to_ticks(480), Some(480));
        assert_eq!(Duration::new(3, 2).to_ticks(480), Some(720));
        assert_eq!(Duration::new(1, 3).to_ticks(12), Some(4));
        // truncation
        assert_eq!(Duration::new(1, 3).to_ticks(10), Some(3));
    }

    #[test]
    fn test_to_ticks_out_of_range() {
        assert_eq!(Duration::new(2, 1).to_ticks(u32::MAX), None);
        assert_eq!(Duration::new(2, 1).to_ticks_wide(u32::MAX as u64), Some(2 * u32::MAX as u64));
        assert_eq!(Duration::new(u32::MAX, 1).to_ticks_wide(u64::MAX), None);
    }
}
