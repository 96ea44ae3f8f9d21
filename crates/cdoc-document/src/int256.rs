//! Signed 256-bit integers for `int256` attributes.
//!
//! Stored as 32 bytes of big-endian two's complement, which is also the leaf
//! encoding. Text form is plain decimal with an optional sign.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A signed 256-bit integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Int256([u8; 32]);

/// Error parsing an [`Int256`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Int256Error {
    /// Not a decimal integer.
    #[error("not a decimal integer: {0:?}")]
    Malformed(String),
    /// Outside `[-2^255, 2^255 - 1]`.
    #[error("value out of int256 range: {0}")]
    Overflow(String),
}

const MIN_MAGNITUDE: [u8; 32] = {
    let mut m = [0u8; 32];
    m[0] = 0x80;
    m
};

impl Int256 {
    /// Zero.
    pub const ZERO: Int256 = Int256([0; 32]);

    /// Wrap two's complement bytes.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Two's complement bytes.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Sign-extend an `i128`.
    pub fn from_i128(v: i128) -> Self {
        let mut bytes = if v < 0 { [0xff; 32] } else { [0; 32] };
        bytes[16..].copy_from_slice(&v.to_be_bytes());
        Self(bytes)
    }

    /// True for values below zero.
    pub fn is_negative(&self) -> bool {
        self.0[0] & 0x80 != 0
    }
}

fn negate(bytes: &mut [u8; 32]) {
    let mut carry = 1u16;
    for b in bytes.iter_mut().rev() {
        let v = u16::from(!*b) + carry;
        *b = (v & 0xff) as u8;
        carry = v >> 8;
    }
}

impl std::str::FromStr for Int256 {
    type Err = Int256Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Int256Error::Malformed(s.to_string()));
        }

        let mut magnitude = [0u8; 32];
        for d in digits.bytes() {
            let mut carry = u16::from(d - b'0');
            for b in magnitude.iter_mut().rev() {
                let v = u16::from(*b) * 10 + carry;
                *b = (v & 0xff) as u8;
                carry = v >> 8;
            }
            if carry != 0 {
                return Err(Int256Error::Overflow(s.to_string()));
            }
        }

        let top_bit = magnitude[0] & 0x80 != 0;
        if top_bit && !(negative && magnitude == MIN_MAGNITUDE) {
            return Err(Int256Error::Overflow(s.to_string()));
        }
        if negative {
            negate(&mut magnitude);
        }
        Ok(Self(magnitude))
    }
}

impl std::fmt::Display for Int256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut n = self.0;
        let negative = self.is_negative();
        if negative {
            negate(&mut n);
        }
        let mut digits = Vec::new();
        while n != [0u8; 32] {
            let mut rem = 0u16;
            for b in n.iter_mut() {
                let cur = (rem << 8) | u16::from(*b);
                *b = (cur / 10) as u8;
                rem = cur % 10;
            }
            digits.push(b'0' + rem as u8);
        }
        if digits.is_empty() {
            digits.push(b'0');
        }
        if negative {
            digits.push(b'-');
        }
        digits.reverse();
        f.write_str(&String::from_utf8_lossy(&digits))
    }
}

impl std::fmt::Debug for Int256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Int256({self})")
    }
}

impl Serialize for Int256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Int256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAX: &str =
        "57896044618658097711785492504343953926634992332820282019728792003956564819967";
    const MIN: &str =
        "-57896044618658097711785492504343953926634992332820282019728792003956564819968";

    #[test]
    fn test_small_values() {
        assert_eq!("0".parse::<Int256>().unwrap(), Int256::ZERO);
        assert_eq!("-1".parse::<Int256>().unwrap().to_be_bytes(), [0xff; 32]);
        assert_eq!("+42".parse::<Int256>().unwrap(), Int256::from_i128(42));
        assert_eq!(Int256::from_i128(-7).to_string(), "-7");
    }

    #[test]
    fn test_bounds() {
        let max: Int256 = MAX.parse().unwrap();
        assert_eq!(max.to_string(), MAX);
        assert!(!max.is_negative());
        let min: Int256 = MIN.parse().unwrap();
        assert_eq!(min.to_string(), MIN);
        assert!(min.is_negative());
    }

    #[test]
    fn test_overflow() {
        let above = "57896044618658097711785492504343953926634992332820282019728792003956564819968";
        assert!(matches!(above.parse::<Int256>(), Err(Int256Error::Overflow(_))));
        let below = "-57896044618658097711785492504343953926634992332820282019728792003956564819969";
        assert!(matches!(below.parse::<Int256>(), Err(Int256Error::Overflow(_))));
        let huge = "9".repeat(100);
        assert!(matches!(huge.parse::<Int256>(), Err(Int256Error::Overflow(_))));
    }

    #[test]
    fn test_malformed() {
        for bad in ["", "-", "12a", "1.5", "0x10"] {
            assert!(matches!(bad.parse::<Int256>(), Err(Int256Error::Malformed(_))), "{bad}");
        }
    }

    proptest! {
        #[test]
        fn decimal_text_matches_i128(v in any::<i128>()) {
            let parsed: Int256 = v.to_string().parse().unwrap();
            prop_assert_eq!(parsed, Int256::from_i128(v));
            prop_assert_eq!(parsed.to_string(), v.to_string());
        }
    }
}
