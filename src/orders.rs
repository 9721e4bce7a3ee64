//! Orders: the BUY/SELL request types and their per-bar fill mechanics.
//!
//! `get_balance_updates` is the pure-per-bar pricing/sizing decision; the
//! matching engine (`crate::engine`) owns rounding, fee application, and the
//! ledger transaction that actually commits a fill via `add_fill`.

use crate::bar::Bar;
use crate::container::OpenItem;
use crate::liquidity::LiquidityStrategy;
use crate::pair::Pair;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Buy,
    Sell,
}

impl Operation {
    pub(crate) fn base_sign(self) -> Decimal {
        match self {
            Operation::Buy => Decimal::ONE,
            Operation::Sell => -Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Open,
    Completed,
    Canceled,
}

/// The order subtypes this exchange accepts. `stop_hit` is mutated in place
/// by `get_balance_updates` once a bar satisfies the trigger condition; it is
/// not reset afterwards, so a Stop/StopLimit behaves as a plain Market/Limit
/// order from that point on.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderKind {
    Market,
    Limit { limit_price: Decimal },
    Stop { stop_price: Decimal, stop_hit: bool },
    StopLimit { stop_price: Decimal, limit_price: Decimal, stop_hit: bool },
}

/// A single (possibly partial) execution against a bar.
#[derive(Debug, Clone)]
pub struct Fill {
    pub when: SystemTime,
    pub balance_updates: HashMap<String, Decimal>,
    pub fees: HashMap<String, Decimal>,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: String,
    pub pair: Pair,
    pub operation: Operation,
    pub original_amount: Decimal,
    pub amount_filled: Decimal,
    pub state: OrderState,
    pub kind: OrderKind,
    pub fills: Vec<Fill>,
}

impl OpenItem for Order {
    fn is_open(&self) -> bool {
        self.state == OrderState::Open
    }
}

impl Order {
    pub fn new(id: String, pair: Pair, operation: Operation, original_amount: Decimal, kind: OrderKind) -> Self {
        Self {
            id,
            pair,
            operation,
            original_amount,
            amount_filled: Decimal::ZERO,
            state: OrderState::Open,
            kind,
            fills: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == OrderState::Open
    }

    pub fn remaining(&self) -> Decimal {
        self.original_amount - self.amount_filled
    }

    /// Computes the hypothetical (base, quote) balance movement this order
    /// would realize against `bar`, given the liquidity currently available
    /// to the pair. Returns an empty map when nothing would fill. Mutates
    /// `stop_hit` on trigger but never `state`/`amount_filled`/`fills`.
    pub fn get_balance_updates(&mut self, bar: &Bar, liquidity: &dyn LiquidityStrategy) -> HashMap<String, Decimal> {
        let remaining = self.remaining();
        if remaining <= Decimal::ZERO {
            return HashMap::new();
        }
        let operation = self.operation;

        let fill = match &mut self.kind {
            OrderKind::Market => market_fill(operation, remaining, bar, liquidity),
            OrderKind::Limit { limit_price } => limit_fill(operation, remaining, *limit_price, bar, liquidity),
            OrderKind::Stop { stop_price, stop_hit } => {
                stop_fill(operation, remaining, *stop_price, stop_hit, bar, liquidity)
            }
            OrderKind::StopLimit { stop_price, limit_price, stop_hit } => {
                stop_limit_fill(operation, remaining, *stop_price, *limit_price, stop_hit, bar, liquidity)
            }
        };

        match fill {
            Some((base_amount, fill_price)) if base_amount > Decimal::ZERO => {
                let signed_base = operation.base_sign() * base_amount;
                let mut updates = HashMap::with_capacity(2);
                updates.insert(self.pair.base.clone(), signed_base);
                updates.insert(self.pair.quote.clone(), -signed_base * fill_price);
                updates
            }
            _ => HashMap::new(),
        }
    }

    /// Commits a fill: accumulates `amount_filled` from the base leg of
    /// `balance_updates`, transitions to `Completed` once the full original
    /// amount has been filled, and appends the fill record.
    pub fn add_fill(&mut self, when: SystemTime, balance_updates: HashMap<String, Decimal>, fees: HashMap<String, Decimal>) {
        if let Some(base_amount) = balance_updates.get(&self.pair.base) {
            self.amount_filled += base_amount.abs();
        }
        if self.amount_filled >= self.original_amount {
            self.amount_filled = self.original_amount;
            self.state = OrderState::Completed;
        }
        self.fills.push(Fill { when, balance_updates, fees });
    }

    /// Called by the matching loop when a bar produced no fill. Market
    /// orders are only valid for the bar they were created ahead of; any
    /// other kind simply waits for a future bar.
    pub fn not_filled(&mut self) {
        if matches!(self.kind, OrderKind::Market) {
            self.state = OrderState::Canceled;
        }
    }

    pub fn cancel(&mut self) {
        self.state = OrderState::Canceled;
    }
}

fn market_fill(
    operation: Operation,
    remaining: Decimal,
    bar: &Bar,
    liquidity: &dyn LiquidityStrategy,
) -> Option<(Decimal, Decimal)> {
    let base_amount = remaining.min(liquidity.available_liquidity());
    if base_amount <= Decimal::ZERO {
        return None;
    }
    let signed = operation.base_sign() * base_amount;
    Some((base_amount, liquidity.calculate_price(signed, bar.open)))
}

fn limit_fill(
    operation: Operation,
    remaining: Decimal,
    limit_price: Decimal,
    bar: &Bar,
    liquidity: &dyn LiquidityStrategy,
) -> Option<(Decimal, Decimal)> {
    let touched = match operation {
        Operation::Buy => bar.low <= limit_price,
        Operation::Sell => bar.high >= limit_price,
    };
    if !touched {
        return None;
    }
    let base_amount = remaining.min(liquidity.available_liquidity());
    if base_amount <= Decimal::ZERO {
        return None;
    }
    // Never worse than the limit: this is the trader's price protection, so
    // liquidity impact (which would only ever move price against them) does
    // not apply to the limit leg.
    Some((base_amount, limit_price))
}

fn stop_fill(
    operation: Operation,
    remaining: Decimal,
    stop_price: Decimal,
    stop_hit: &mut bool,
    bar: &Bar,
    liquidity: &dyn LiquidityStrategy,
) -> Option<(Decimal, Decimal)> {
    if !*stop_hit {
        let triggered = match operation {
            Operation::Buy => bar.high >= stop_price,
            Operation::Sell => bar.low <= stop_price,
        };
        if !triggered {
            return None;
        }
        *stop_hit = true;
        let base_amount = remaining.min(liquidity.available_liquidity());
        if base_amount <= Decimal::ZERO {
            return None;
        }
        let trigger_price = match operation {
            Operation::Buy => stop_price.max(bar.open),
            Operation::Sell => stop_price.min(bar.open),
        };
        return Some((base_amount, trigger_price));
    }
    market_fill(operation, remaining, bar, liquidity)
}

fn stop_limit_fill(
    operation: Operation,
    remaining: Decimal,
    stop_price: Decimal,
    limit_price: Decimal,
    stop_hit: &mut bool,
    bar: &Bar,
    liquidity: &dyn LiquidityStrategy,
) -> Option<(Decimal, Decimal)> {
    if !*stop_hit {
        let triggered = match operation {
            Operation::Buy => bar.high >= stop_price,
            Operation::Sell => bar.low <= stop_price,
        };
        if !triggered {
            return None;
        }
        *stop_hit = true;
    }
    limit_fill(operation, remaining, limit_price, bar, liquidity)
}
