use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// An instruction pointer value.
///
/// Ordering and equality are by value, so a set of addresses is deduplicated
/// no matter how many solver calls produced the same value. Rendered as
/// lowercase hex with a `0x` prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u64);

impl Address {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for Address {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u64::from_str_radix(digits, 16).map(Address)
    }
}

/// Join addresses with commas, in iteration order.
pub fn join<'a, I: IntoIterator<Item = &'a Address>>(addrs: I) -> String {
    addrs
        .into_iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
