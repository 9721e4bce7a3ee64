//! Exchange configuration: default/per-pair precision, per-symbol precision,
//! and the bid/ask spread parameter.
//!
//! This crate performs no file I/O and parses no config file format itself
//! (that is a host-application concern per the stated scope); `Config`
//! derives `serde::{Serialize, Deserialize}` purely so a host can embed it in
//! whatever format it already uses.

use crate::pair::{Pair, PairInfo};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_pair_info() -> PairInfo {
    PairInfo::default()
}

fn default_bid_ask_spread() -> Decimal {
    dec!(0.5)
}

fn default_symbol_precision() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_pair_info")]
    default_pair_info: PairInfo,
    #[serde(default = "default_bid_ask_spread")]
    bid_ask_spread: Decimal,
    #[serde(default = "default_symbol_precision")]
    default_symbol_precision: u32,
    #[serde(default)]
    pair_info: HashMap<Pair, PairInfo>,
    #[serde(default)]
    symbol_precision: HashMap<String, u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_pair_info: default_pair_info(),
            bid_ask_spread: default_bid_ask_spread(),
            default_symbol_precision: default_symbol_precision(),
            pair_info: HashMap::new(),
            symbol_precision: HashMap::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bid_ask_spread(&self) -> Decimal {
        self.bid_ask_spread
    }

    pub fn with_bid_ask_spread(mut self, spread: Decimal) -> Self {
        self.bid_ask_spread = spread;
        self
    }

    pub fn pair_info(&self, pair: &Pair) -> PairInfo {
        self.pair_info.get(pair).copied().unwrap_or(self.default_pair_info)
    }

    pub fn set_pair_info(&mut self, pair: Pair, info: PairInfo) {
        self.pair_info.insert(pair, info);
    }

    pub fn with_pair_info(mut self, pair: Pair, info: PairInfo) -> Self {
        self.set_pair_info(pair, info);
        self
    }

    /// Precision for a bare symbol (used for fees and loan interest/collateral
    /// amounts that aren't necessarily the base or quote of a specific pair).
    pub fn symbol_precision(&self, symbol: &str) -> u32 {
        self.symbol_precision.get(symbol).copied().unwrap_or(self.default_symbol_precision)
    }

    pub fn set_symbol_precision(&mut self, symbol: impl Into<String>, precision: u32) {
        self.symbol_precision.insert(symbol.into(), precision);
    }

    pub fn with_symbol_precision(mut self, symbol: impl Into<String>, precision: u32) -> Self {
        self.set_symbol_precision(symbol, precision);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_pair_falls_back_to_default_pair_info() {
        let config = Config::new();
        let pair = Pair::new("BTC", "USD");
        assert_eq!(config.pair_info(&pair), PairInfo::default());
    }

    #[test]
    fn set_pair_info_overrides_default() {
        let mut config = Config::new();
        let pair = Pair::new("BTC", "USD");
        config.set_pair_info(pair.clone(), PairInfo::new(8, 2));
        assert_eq!(config.pair_info(&pair), PairInfo::new(8, 2));

        let other = Pair::new("ETH", "USD");
        assert_eq!(config.pair_info(&other), PairInfo::default());
    }

    #[test]
    fn symbol_precision_falls_back_to_default() {
        let mut config = Config::new();
        assert_eq!(config.symbol_precision("USD"), 2);
        config.set_symbol_precision("USD", 4);
        assert_eq!(config.symbol_precision("USD"), 4);
        assert_eq!(config.symbol_precision("BTC"), 2);
    }

    #[test]
    fn roundtrips_through_json() {
        let config = Config::new().with_pair_info(Pair::new("BTC", "USD"), PairInfo::new(8, 2));
        let json = serde_json_like_roundtrip(&config);
        assert_eq!(json.pair_info(&Pair::new("BTC", "USD")), PairInfo::new(8, 2));
    }

    // Keeps this test independent of which serde data format a host chooses;
    // we only assert the Serialize/Deserialize impls are self-consistent.
    fn serde_json_like_roundtrip(config: &Config) -> Config {
        let encoded = serde_json::to_string(config).expect("serialize");
        serde_json::from_str(&encoded).expect("deserialize")
    }
}
