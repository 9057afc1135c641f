//! Decimal digits of π and the digit-to-melody mapping
//!
//! [`DigitSource`] is the seam between the synthesis pipeline and wherever
//! digits come from. [`PiSpigot`] computes them with the Rabinowitz–Wagon
//! spigot and caches the longest prefix computed so far; [`FixedDigits`]
//! replays a given sequence (tests, custom sequences).

use std::sync::Mutex;
use tracing::debug;

/// Extra digits computed past the request; the spigot's final digits can be
/// held back by a run of nines
const GUARD_DIGITS: usize = 10;

/// Melody key for each decimal digit (C major from C4)
pub const DIGIT_TO_KEY: [&str; 10] = [
    "C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5", "D5", "E5",
];

/// Melody note for a digit, `None` for values outside `0..=9`
pub fn melody_key(digit: u8) -> Option<&'static str> {
    DIGIT_TO_KEY.get(digit as usize).copied()
}

/// Finite, deterministic supply of digits
pub trait DigitSource: Send + Sync {
    /// The first `count` digits after the decimal point
    fn digits(&self, count: usize) -> Vec<u8>;
}

/// π digits by spigot, with a memoized prefix
#[derive(Debug, Default)]
pub struct PiSpigot {
    cache: Mutex<Vec<u8>>,
}

impl PiSpigot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DigitSource for PiSpigot {
    fn digits(&self, count: usize) -> Vec<u8> {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if cache.len() < count {
            debug!("Computing {} digits of pi (cached {})", count, cache.len());
            *cache = spigot_fraction_digits(count);
        }

        cache[..count].to_vec()
    }
}

/// Digits of π after the decimal point, Rabinowitz–Wagon spigot
fn spigot_fraction_digits(count: usize) -> Vec<u8> {
    if count == 0 {
        return Vec::new();
    }

    // Integer part plus requested digits plus guard
    let n = count + 1 + GUARD_DIGITS;
    let len = 10 * n / 3 + 1;
    let mut a = vec![2u64; len];
    let mut out: Vec<u8> = Vec::with_capacity(n + 1);
    let mut nines = 0usize;
    let mut predigit = 0u64;

    for _ in 0..n {
        let mut q = 0u64;
        for i in (1..=len as u64).rev() {
            let idx = (i - 1) as usize;
            let x = 10 * a[idx] + q * i;
            a[idx] = x % (2 * i - 1);
            q = x / (2 * i - 1);
        }
        a[0] = q % 10;
        q /= 10;

        match q {
            9 => nines += 1,
            10 => {
                out.push((predigit + 1) as u8);
                out.extend(std::iter::repeat(0u8).take(nines));
                predigit = 0;
                nines = 0;
            }
            _ => {
                out.push(predigit as u8);
                predigit = q;
                if nines > 0 {
                    out.extend(std::iter::repeat(9u8).take(nines));
                    nines = 0;
                }
            }
        }
    }
    out.push(predigit as u8);

    // out = [0 placeholder, 3, 1, 4, 1, 5, ...]
    out.into_iter().skip(2).take(count).collect()
}

/// Replays a fixed digit sequence, truncated to the requested count
#[derive(Debug, Clone, Default)]
pub struct FixedDigits(pub Vec<u8>);

impl DigitSource for FixedDigits {
    fn digits(&self, count: usize) -> Vec<u8> {
        self.0.iter().copied().take(count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_digits() {
        let source = PiSpigot::new();
        assert_eq!(source.digits(10), vec![1, 4, 1, 5, 9, 2, 6, 5, 3, 5]);
    }

    #[test]
    fn test_zero_digits() {
        assert!(PiSpigot::new().digits(0).is_empty());
    }

    #[test]
    fn test_known_run_of_nines() {
        // Feynman point: six nines starting at the 762nd decimal place
        let digits = PiSpigot::new().digits(770);
        assert_eq!(digits.len(), 770);
        assert_eq!(&digits[761..767], &[9, 9, 9, 9, 9, 9]);
    }

    #[test]
    fn test_fifty_digits() {
        let expected = "14159265358979323846264338327950288419716939937510";
        let digits: String = PiSpigot::new()
            .digits(50)
            .iter()
            .map(|d| char::from(b'0' + d))
            .collect();
        assert_eq!(digits, expected);
    }

    #[test]
    fn test_cache_is_prefix_stable() {
        let source = PiSpigot::new();
        let long = source.digits(40);
        let short = source.digits(12);
        assert_eq!(&long[..12], &short[..]);
    }

    #[test]
    fn test_fixed_digits() {
        let source = FixedDigits(vec![3, 1, 4]);
        assert_eq!(source.digits(2), vec![3, 1]);
        assert_eq!(source.digits(10), vec![3, 1, 4]);
    }

    #[test]
    fn test_melody_key() {
        assert_eq!(melody_key(0), Some("C4"));
        assert_eq!(melody_key(1), Some("D4"));
        assert_eq!(melody_key(9), Some("E5"));
        assert_eq!(melody_key(10), None);
    }
}
