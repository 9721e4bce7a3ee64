//! Trading pairs and their precision metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A trading pair, e.g. BTC/USD. `base` is the asset being bought or sold,
/// `quote` is the asset prices are denominated in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair {
    pub base: String,
    pub quote: String,
}

impl Pair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self { base: base.into(), quote: quote.into() }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

// Serialized as "BASE/QUOTE" rather than a `{base, quote}` struct so a `Pair`
// can also be used as a serde map key (HashMap<Pair, _>` needs a string-like
// key in both JSON and YAML).
impl Serialize for Pair {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| serde::de::Error::custom(format!("invalid pair {s:?}, expected BASE/QUOTE")))?;
        Ok(Pair::new(base, quote))
    }
}

/// Decimal precision (number of fractional digits) for the two legs of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairInfo {
    pub base_precision: u32,
    pub quote_precision: u32,
}

impl PairInfo {
    pub fn new(base_precision: u32, quote_precision: u32) -> Self {
        Self { base_precision, quote_precision }
    }
}

impl Default for PairInfo {
    /// Matches the source system's default: whole-unit base, cent-precision quote.
    fn default() -> Self {
        Self { base_precision: 0, quote_precision: 2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_as_base_slash_quote() {
        let pair = Pair::new("BTC", "USD");
        assert_eq!(pair.to_string(), "BTC/USD");
    }

    #[test]
    fn default_pair_info_matches_source_defaults() {
        let info = PairInfo::default();
        assert_eq!(info.base_precision, 0);
        assert_eq!(info.quote_precision, 2);
    }
}
