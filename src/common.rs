/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use serde::{Serialize, Deserialize};

pub const PS_PER_SECOND: u64 = 1_000_000_000_000;
pub const NS_PER_SECOND: u64 = 1_000_000_000;

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Clock period in nanoseconds, kept as an exact reduced fraction so that
/// periods derived from integer frequencies never accumulate rounding errors.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Period {
    num: u64,
    den: u64,
}

impl Period {
    fn reduced(num: u64, den: u64) -> Self {
        let g = gcd(num, den).max(1);
        Self { num: num / g, den: den / g }
    }

    pub fn from_ns(ns: u64) -> Self {
        Self { num: ns, den: 1 }
    }

    /// Period of a clock running at `hz`. `None` for a zero frequency.
    pub fn from_freq(hz: u64) -> Option<Self> {
        if hz == 0 {
            return None;
        }
        Some(Self::reduced(NS_PER_SECOND, hz))
    }

    pub fn numer(&self) -> u64 {
        self.num
    }

    pub fn denom(&self) -> u64 {
        self.den
    }

    pub fn as_ns_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Exact length in picoseconds, if the period is a whole number of them.
    pub fn as_whole_ps(&self) -> Option<u64> {
        let ps = self.num as u128 * 1000;
        (ps % self.den as u128 == 0).then(|| (ps / self.den as u128) as u64)
    }

    /// Period of the same clock multiplied by `mul` in frequency. `None` if
    /// the result is not representable.
    pub fn divided(&self, mul: u64) -> Option<Self> {
        let g = gcd(self.num, mul).max(1);
        let den = self.den.checked_mul(mul / g)?;
        Some(Self::reduced(self.num / g, den))
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.as_ns_f64())
    }
}

/// Parses a frequency given either as an integer (`100000000`) or in
/// scientific notation (`100e6`). Fractional hertz are rejected.
pub fn parse_frequency(s: &str) -> Result<u64, String> {
    if let Ok(hz) = s.trim().parse::<u64>() {
        return Ok(hz);
    }
    let hz: f64 = s.trim().parse()
        .map_err(|_| format!("\"{}\" is not a frequency", s))?;
    if !hz.is_finite() || hz < 0.0 || hz.fract() != 0.0 || hz >= u64::MAX as f64 {
        return Err(format!("\"{}\" is not a whole number of hertz", s));
    }
    Ok(hz as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_freq() {
        let p = Period::from_freq(125_000_000).unwrap();
        assert_eq!((p.numer(), p.denom()), (8, 1));
        assert_eq!(p.to_string(), "8.000");

        let p = Period::from_freq(3_000_000).unwrap();
        assert_eq!((p.numer(), p.denom()), (1000, 3));
        assert_eq!(p.as_whole_ps(), None);

        assert!(Period::from_freq(0).is_none());
    }

    #[test]
    fn test_period_divided() {
        let sys = Period::from_freq(100_000_000).unwrap();
        assert_eq!(sys.divided(4), Period::from_freq(400_000_000));
        assert_eq!(sys.divided(4).unwrap().as_whole_ps(), Some(2500));

        /* 1e9 / (2^64 - 1) reduces to 2e8 / 3689348814741910323 */
        let tiny = Period::from_freq(u64::MAX).unwrap();
        assert_eq!(tiny.divided(3), None);
    }

    #[test]
    fn test_parse_frequency() {
        assert_eq!(parse_frequency("100e6"), Ok(100_000_000));
        assert_eq!(parse_frequency("125000000"), Ok(125_000_000));
        assert!(parse_frequency("1.5").is_err());
        assert!(parse_frequency("fast").is_err());
        /* 2^64 does not fit */
        assert!(parse_frequency("18446744073709551616").is_err());
        assert!(parse_frequency("1.8446744073709552e19").is_err());
    }
}
