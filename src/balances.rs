//! The balance ledger: per-symbol available/hold/borrowed accounting.
//!
//! Every mutating operation here is staged against a scratch copy of the
//! touched entries, validated, and only then committed — so a shortfall on
//! any symbol leaves the ledger exactly as it was before the call. This is
//! the "transactional update" design note from the specification: no
//! partially-applied balance change is ever observable.

use crate::error::{Error, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A symbol's reported balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub available: Decimal,
    pub hold: Decimal,
    pub borrowed: Decimal,
    /// Always zero at rest: interest is computed and deducted in a single
    /// step at `repay_loan` time, never accrued as a standing line item.
    pub interest: Decimal,
    pub total: Decimal,
}

#[derive(Default)]
pub struct AccountBalances {
    available: HashMap<String, Decimal>,
    borrowed: HashMap<String, Decimal>,
    hold: HashMap<(String, String), Decimal>,
}

impl AccountBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits a symbol's available balance directly (e.g. initial deposit
    /// when setting up a backtest). Not part of the exchange's public
    /// surface; used by test/setup code.
    pub fn deposit(&mut self, symbol: impl Into<String>, amount: Decimal) {
        let symbol = symbol.into();
        *self.available.entry(symbol).or_insert(Decimal::ZERO) += amount;
    }

    pub fn available(&self, symbol: &str) -> Decimal {
        self.available.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn borrowed(&self, symbol: &str) -> Decimal {
        self.borrowed.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    /// Sum of holds for `symbol` across every holder (order or loan).
    pub fn hold(&self, symbol: &str) -> Decimal {
        self.hold
            .iter()
            .filter(|((_, sym), _)| sym == symbol)
            .map(|(_, amt)| *amt)
            .sum()
    }

    pub fn hold_for(&self, holder_id: &str, symbol: &str) -> Decimal {
        self.hold.get(&(holder_id.to_string(), symbol.to_string())).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn hold_for_order(&self, order_id: &str, symbol: &str) -> Decimal {
        self.hold_for(order_id, symbol)
    }

    /// Every non-zero hold currently recorded against `holder_id`, keyed by
    /// symbol. Used to recover a loan's collateral map at repayment time
    /// without the loan itself having to remember it.
    pub fn holds_for(&self, holder_id: &str) -> HashMap<String, Decimal> {
        self.hold
            .iter()
            .filter(|((holder, _), amount)| holder == holder_id && !amount.is_zero())
            .map(|((_, symbol), amount)| (symbol.clone(), *amount))
            .collect()
    }

    /// Every symbol with a nonzero available, hold, or borrowed balance.
    pub fn symbols(&self) -> std::collections::HashSet<String> {
        let mut out: std::collections::HashSet<String> = self.available.keys().cloned().collect();
        out.extend(self.borrowed.keys().cloned());
        out.extend(self.hold.keys().map(|(_, symbol)| symbol.clone()));
        out
    }

    pub fn get_balance(&self, symbol: &str) -> Balance {
        let available = self.available(symbol);
        let hold = self.hold(symbol);
        let borrowed = self.borrowed(symbol);
        let interest = Decimal::ZERO;
        Balance { available, hold, borrowed, interest, total: available + hold - borrowed - interest }
    }

    /// Moves `required_holds[sym]` from available into a hold keyed by
    /// `holder_id`. All-or-nothing across every symbol touched.
    pub fn place_hold(&mut self, holder_id: &str, required_holds: &HashMap<String, Decimal>) -> Result<()> {
        self.stage_and_commit(|staged| {
            for (symbol, amount) in required_holds {
                if amount.is_zero() {
                    continue;
                }
                debit(staged, symbol, *amount)?;
            }
            Ok(())
        })?;
        for (symbol, amount) in required_holds {
            if amount.is_zero() {
                continue;
            }
            *self.available.entry(symbol.clone()).or_insert(Decimal::ZERO) -= *amount;
            *self.hold.entry((holder_id.to_string(), symbol.clone())).or_insert(Decimal::ZERO) += *amount;
        }
        Ok(())
    }

    /// Applies `balance_updates` to available, then either releases all
    /// holds for `holder_id` (when `new_hold` is `None`, i.e. the holder is
    /// no longer open) or rebalances the holder's hold to exactly
    /// `new_hold` (moving the difference between available and hold).
    pub fn order_accepted(&mut self, order_id: &str, required_holds: &HashMap<String, Decimal>) -> Result<()> {
        self.place_hold(order_id, required_holds)
    }

    pub fn order_updated(
        &mut self,
        order_id: &str,
        balance_updates: &HashMap<String, Decimal>,
        new_hold: Option<&HashMap<String, Decimal>>,
    ) -> Result<()> {
        // Symbols whose hold needs rebalancing: union of currently held
        // symbols and symbols in the target hold map (so dropping a symbol
        // to zero is handled too).
        let mut hold_symbols: Vec<String> = self
            .hold
            .keys()
            .filter(|(holder, _)| holder == order_id)
            .map(|(_, sym)| sym.clone())
            .collect();
        if let Some(target) = new_hold {
            for sym in target.keys() {
                if !hold_symbols.contains(sym) {
                    hold_symbols.push(sym.clone());
                }
            }
        }

        self.stage_and_commit(|staged| {
            for (symbol, amount) in balance_updates {
                debit(staged, symbol, -*amount)?;
            }
            for symbol in &hold_symbols {
                let current_hold = self.hold_for(order_id, symbol);
                let target_hold = match new_hold {
                    None => Decimal::ZERO,
                    Some(target) => target.get(symbol).copied().unwrap_or(Decimal::ZERO),
                };
                let delta = target_hold - current_hold;
                if delta.is_zero() {
                    continue;
                }
                debit(staged, symbol, delta)?;
            }
            Ok(())
        })?;

        for (symbol, amount) in balance_updates {
            *self.available.entry(symbol.clone()).or_insert(Decimal::ZERO) += *amount;
        }
        for symbol in &hold_symbols {
            let target_hold = match new_hold {
                None => Decimal::ZERO,
                Some(target) => target.get(symbol).copied().unwrap_or(Decimal::ZERO),
            };
            let delta = target_hold - self.hold_for(order_id, symbol);
            *self.available.entry(symbol.clone()).or_insert(Decimal::ZERO) -= delta;
            if target_hold.is_zero() {
                self.hold.remove(&(order_id.to_string(), symbol.clone()));
            } else {
                self.hold.insert((order_id.to_string(), symbol.clone()), target_hold);
            }
        }
        Ok(())
    }

    /// Credits `borrowed_amount` to `symbol`'s available and borrowed, and
    /// places `collateral` on hold keyed by `loan_id`. All-or-nothing.
    pub fn accept_loan(
        &mut self,
        loan_id: &str,
        symbol: &str,
        borrowed_amount: Decimal,
        collateral: &HashMap<String, Decimal>,
    ) -> Result<()> {
        self.stage_and_commit(|staged| {
            debit(staged, symbol, -borrowed_amount)?;
            for (csym, camt) in collateral {
                if camt.is_zero() {
                    continue;
                }
                debit(staged, csym, *camt)?;
            }
            Ok(())
        })?;

        *self.available.entry(symbol.to_string()).or_insert(Decimal::ZERO) += borrowed_amount;
        *self.borrowed.entry(symbol.to_string()).or_insert(Decimal::ZERO) += borrowed_amount;
        for (csym, camt) in collateral {
            if camt.is_zero() {
                continue;
            }
            *self.available.entry(csym.clone()).or_insert(Decimal::ZERO) -= *camt;
            *self.hold.entry((loan_id.to_string(), csym.clone())).or_insert(Decimal::ZERO) += *camt;
        }
        Ok(())
    }

    /// Debits `borrowed_amount` and `interest` from available, debits
    /// `borrowed_amount` from borrowed, and releases the loan's collateral
    /// hold. All-or-nothing: on any shortfall, nothing changes.
    pub fn repay_loan(
        &mut self,
        loan_id: &str,
        symbol: &str,
        borrowed_amount: Decimal,
        interest: &HashMap<String, Decimal>,
        collateral: &HashMap<String, Decimal>,
    ) -> Result<()> {
        self.stage_and_commit(|staged| {
            debit(staged, symbol, borrowed_amount)?;
            for (isym, iamt) in interest {
                if iamt.is_zero() {
                    continue;
                }
                debit(staged, isym, *iamt)?;
            }
            // Collateral release only increases available; cannot fail.
            let _ = collateral;
            Ok(())
        })?;

        *self.available.entry(symbol.to_string()).or_insert(Decimal::ZERO) -= borrowed_amount;
        *self.borrowed.entry(symbol.to_string()).or_insert(Decimal::ZERO) -= borrowed_amount;
        for (isym, iamt) in interest {
            *self.available.entry(isym.clone()).or_insert(Decimal::ZERO) -= *iamt;
        }
        for (csym, camt) in collateral {
            *self.available.entry(csym.clone()).or_insert(Decimal::ZERO) += *camt;
            self.hold.remove(&(loan_id.to_string(), csym.clone()));
        }
        Ok(())
    }

    /// Stages `f` against a scratch copy seeded from the symbols `f` itself
    /// touches (via `entry`), so validation never mutates `self`. `f` must
    /// be pure apart from writes into the staged map it's given.
    fn stage_and_commit(&self, f: impl FnOnce(&mut HashMap<String, Decimal>) -> Result<()>) -> Result<()> {
        let mut staged = self.available.clone();
        f(&mut staged)
    }
}

/// Subtracts `amount` from `staged[symbol]` (a negative `amount` credits it),
/// reporting the real pre-debit available balance and the real amount
/// requested if that would take the symbol negative.
fn debit(staged: &mut HashMap<String, Decimal>, symbol: &str, amount: Decimal) -> Result<()> {
    let available = staged.get(symbol).copied().unwrap_or(Decimal::ZERO);
    let updated = available - amount;
    if updated < Decimal::ZERO {
        return Err(Error::NotEnoughBalance { symbol: symbol.to_string(), required: amount, available });
    }
    staged.insert(symbol.to_string(), updated);
    Ok(())
}
