//! Per-bar matching: the heart of the simulation, described in full in the
//! module-level flow of [`crate::exchange::Exchange::on_bar_event`].
//!
//! Split from `exchange.rs` because the facade (request validation, balance
//! queries, loan glue) and the matching loop are different concerns that
//! happen to share one struct, the way the teacher keeps `engine/simulated.rs`
//! and `execution/simulated.rs` as separate files over one conceptual engine.

use crate::bar::BarEvent;
use crate::decimal::{round_half_even, round_up, truncate};
use crate::exchange::Exchange;
use crate::orders::OrderKind;
use crate::pair::{Pair, PairInfo};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

impl Exchange {
    /// Processes one bar for its pair: records it as the pair's last bar,
    /// resets that pair's liquidity budget, matches every open order for the
    /// pair in id-allocation order, then forwards the bar to subscribers.
    pub fn on_bar_event(&mut self, event: BarEvent) {
        let bar = event.bar;
        let pair = bar.pair.clone();
        self.last_bar.insert(pair.clone(), bar.clone());

        if !self.liquidity.contains_key(&pair) {
            let fresh = (self.liquidity_factory)();
            self.liquidity.insert(pair.clone(), fresh);
        }
        self.liquidity.get_mut(&pair).expect("just inserted").on_bar(&bar);

        let info = self.config.pair_info(&pair);
        let ids = self.orders.open_ids();
        for id in ids {
            self.match_one_order(&id, &pair, &info);
            self.orders.note_iteration();
        }

        if let Some(handlers) = self.subscribers.get_mut(&pair) {
            for handler in handlers {
                handler(&bar);
            }
        }
    }

    fn match_one_order(&mut self, id: &str, pair: &Pair, info: &PairInfo) {
        let bar = match self.last_bar.get(pair) {
            Some(bar) => bar.clone(),
            None => return,
        };

        let updates = {
            let Some(order) = self.orders.get_mut(id) else { return };
            if order.pair != *pair {
                return;
            }
            let liquidity = self.liquidity.get(pair).expect("liquidity strategy created in on_bar_event");
            let state_before = order.state;
            let updates = order.get_balance_updates(&bar, liquidity.as_ref());
            debug_assert_eq!(order.state, state_before, "get_balance_updates must not mutate order state");
            updates
        };

        if updates.is_empty() {
            self.settle_not_filled(id);
            return;
        }

        let rounded = round_fill(info, pair, updates);
        if !rounded.contains_key(&pair.base) || !rounded.contains_key(&pair.quote) {
            self.settle_not_filled(id);
            return;
        }

        let fees = {
            let order = self.orders.get(id).expect("checked above");
            round_fee(info, pair, self.fee_strategy.calculate_fees(order, &rounded))
        };
        let final_updates = combine(&rounded, &fees);

        let required: HashMap<String, Decimal> = final_updates
            .iter()
            .filter(|(_, amount)| **amount < Decimal::ZERO)
            .map(|(symbol, amount)| (symbol.clone(), -*amount))
            .collect();
        let headroom_ok = required.iter().all(|(symbol, amount)| {
            self.balances.available(symbol) + self.balances.hold_for_order(id, symbol) >= *amount
        });
        if !headroom_ok {
            self.settle_not_filled(id);
            return;
        }

        let base_amount = rounded.get(&pair.base).copied().unwrap_or(Decimal::ZERO).abs();
        self.liquidity.get_mut(pair).expect("liquidity strategy created in on_bar_event").take_liquidity(base_amount);

        // A Market order is valid for the single bar it was created ahead of:
        // any remainder left after that bar's fill — whether the fill was
        // partial or the order never filled at all — is canceled rather than
        // carried forward to the next bar. This extends the `not_filled`
        // cancellation rule to the partial-fill case for Market orders only.
        let remaining_after = {
            let order = self.orders.get_mut(id).expect("checked above");
            order.add_fill(bar.when, rounded.clone(), fees);
            let remaining = order.remaining();
            if remaining > Decimal::ZERO && matches!(order.kind, OrderKind::Market) {
                order.cancel();
                debug!(order_id = %id, pair = %pair, "market order canceled after partial fill, one bar expired");
            }
            remaining
        };

        let still_open = self.orders.get(id).expect("checked above").is_open();
        let new_hold = if remaining_after > Decimal::ZERO && still_open {
            let (operation, kind) = {
                let order = self.orders.get(id).expect("checked above");
                (order.operation, order.kind.clone())
            };
            Some(self.estimate_required_balances(pair, operation, remaining_after, &kind))
        } else {
            None
        };

        match self.balances.order_updated(id, &final_updates, new_hold.as_ref()) {
            Ok(()) => debug!(order_id = %id, pair = %pair, base = %base_amount, "order filled"),
            Err(err) => warn!(
                order_id = %id,
                pair = %pair,
                %err,
                "ledger rejected a fill whose headroom check had just passed; order and ledger may now disagree"
            ),
        }
    }

    /// Downgrades a bar with no fill: `not_filled()` cancels Market orders
    /// outright (valid for one bar only), in which case their holds are
    /// released; any other kind just waits for the next bar.
    fn settle_not_filled(&mut self, order_id: &str) {
        let Some(order) = self.orders.get_mut(order_id) else { return };
        order.not_filled();
        if !order.is_open() {
            let _ = self.balances.order_updated(order_id, &HashMap::new(), None);
            debug!(order_id = %order_id, "market order expired unfilled, holds released");
        } else {
            debug!(order_id = %order_id, "order did not fill this bar");
        }
    }
}

/// Rounds a balance-update map per §4.2: base truncated toward zero, quote
/// half-even, everything else untouched; zero entries are dropped. A fill
/// that rounds either leg to zero disappears from the map entirely, which is
/// how the caller recognizes the fill as abandoned.
pub(crate) fn round_fill(info: &PairInfo, pair: &Pair, updates: HashMap<String, Decimal>) -> HashMap<String, Decimal> {
    let mut out = HashMap::with_capacity(updates.len());
    for (symbol, amount) in updates {
        let rounded = if symbol == pair.base {
            truncate(amount, info.base_precision)
        } else if symbol == pair.quote {
            round_half_even(amount, info.quote_precision)
        } else {
            amount
        };
        if !rounded.is_zero() {
            out.insert(symbol, rounded);
        }
    }
    out
}

/// Rounds a fee map per §4.4: base/quote round up to their precision,
/// everything else is left unrounded; zero entries are dropped.
pub(crate) fn round_fee(info: &PairInfo, pair: &Pair, fees: HashMap<String, Decimal>) -> HashMap<String, Decimal> {
    let mut out = HashMap::with_capacity(fees.len());
    for (symbol, amount) in fees {
        let rounded = if symbol == pair.base {
            round_up(amount, info.base_precision)
        } else if symbol == pair.quote {
            round_up(amount, info.quote_precision)
        } else {
            amount
        };
        if !rounded.is_zero() {
            out.insert(symbol, rounded);
        }
    }
    out
}

/// Merges a balance-update map with a (non-negative) fee map: each fee is
/// subtracted from its symbol's entry, creating one if the fee lands on a
/// symbol the updates didn't already touch. Zero entries are dropped.
pub(crate) fn combine(updates: &HashMap<String, Decimal>, fees: &HashMap<String, Decimal>) -> HashMap<String, Decimal> {
    let mut out = updates.clone();
    for (symbol, fee) in fees {
        let entry = out.entry(symbol.clone()).or_insert(Decimal::ZERO);
        *entry -= *fee;
    }
    out.retain(|_, v| !v.is_zero());
    out
}
