//! Margin loan subsystem: create, accrue interest, collateralize, repay.
//!
//! The interest/collateral policy is pluggable behind `LendingStrategy`; the
//! manager owns the loan registry and drives the ledger transactions, so a
//! strategy only ever needs read-only prices, never a reference back into
//! the manager itself.

use crate::balances::AccountBalances;
use crate::config::Config;
use crate::container::{ExchangeObjectContainer, OpenItem};
use crate::decimal::truncate;
use crate::error::{Error, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::SystemTime;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Loan {
    pub id: String,
    pub borrowed_symbol: String,
    pub borrowed_amount: Decimal,
    pub created_at: SystemTime,
    pub is_open: bool,
    /// Simple per-second interest rate, as decided by the lending strategy
    /// that created this loan. Unused by strategies that don't accrue
    /// interest this way.
    pub interest_rate_per_second: Decimal,
}

impl OpenItem for Loan {
    fn is_open(&self) -> bool {
        self.is_open
    }
}

pub trait LendingStrategy {
    /// Builds the `Loan` record; does not touch the ledger.
    fn create_loan(&self, id: String, symbol: &str, amount: Decimal, now: SystemTime) -> Result<Loan>;

    /// Interest owed as of `now`, keyed by the symbol it's payable in.
    fn calculate_interest(&self, loan: &Loan, now: SystemTime, prices: &HashMap<String, Decimal>) -> HashMap<String, Decimal>;

    /// Collateral required to back `amount` of `symbol`, keyed by the
    /// symbol the collateral is posted in.
    fn calculate_collateral(&self, symbol: &str, amount: Decimal, prices: &HashMap<String, Decimal>) -> HashMap<String, Decimal>;
}

/// Default strategy: lending is not offered at all.
pub struct NoLoans;

impl LendingStrategy for NoLoans {
    fn create_loan(&self, _id: String, _symbol: &str, _amount: Decimal, _now: SystemTime) -> Result<Loan> {
        Err(Error::not_supported("Lending is not supported"))
    }

    fn calculate_interest(&self, _loan: &Loan, _now: SystemTime, _prices: &HashMap<String, Decimal>) -> HashMap<String, Decimal> {
        HashMap::new()
    }

    fn calculate_collateral(&self, _symbol: &str, _amount: Decimal, _prices: &HashMap<String, Decimal>) -> HashMap<String, Decimal> {
        HashMap::new()
    }
}

/// A simple example strategy: collateral is a fixed multiple of the
/// borrowed notional (valued in `collateral_symbol` via `prices`), and
/// interest accrues linearly at `interest_rate_per_second` of the borrowed
/// amount, payable in the borrowed symbol itself. Shipped as a usable
/// reference implementation; most backtests are fine with `NoLoans`.
pub struct FixedCollateral {
    pub collateral_symbol: String,
    pub collateral_multiple: Decimal,
    pub interest_rate_per_second: Decimal,
}

impl LendingStrategy for FixedCollateral {
    fn create_loan(&self, id: String, symbol: &str, amount: Decimal, now: SystemTime) -> Result<Loan> {
        if amount <= Decimal::ZERO {
            return Err(Error::validation("loan amount must be positive"));
        }
        Ok(Loan {
            id,
            borrowed_symbol: symbol.to_string(),
            borrowed_amount: amount,
            created_at: now,
            is_open: true,
            interest_rate_per_second: self.interest_rate_per_second,
        })
    }

    fn calculate_interest(&self, loan: &Loan, now: SystemTime, _prices: &HashMap<String, Decimal>) -> HashMap<String, Decimal> {
        let elapsed = now.duration_since(loan.created_at).unwrap_or_default().as_secs();
        let interest = loan.borrowed_amount * loan.interest_rate_per_second * Decimal::from(elapsed);
        let mut out = HashMap::new();
        if !interest.is_zero() {
            out.insert(loan.borrowed_symbol.clone(), interest);
        }
        out
    }

    fn calculate_collateral(&self, symbol: &str, amount: Decimal, prices: &HashMap<String, Decimal>) -> HashMap<String, Decimal> {
        let mut out = HashMap::new();
        if symbol == self.collateral_symbol {
            out.insert(self.collateral_symbol.clone(), amount * self.collateral_multiple);
            return out;
        }
        let price = prices.get(symbol).copied().unwrap_or(Decimal::ZERO);
        let notional = amount * price * self.collateral_multiple;
        if !notional.is_zero() {
            out.insert(self.collateral_symbol.clone(), notional);
        }
        out
    }
}

/// Reported shape of a loan, as returned to strategy callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanInfo {
    pub id: String,
    pub is_open: bool,
    pub borrowed_symbol: String,
    pub borrowed_amount: Decimal,
}

impl From<&Loan> for LoanInfo {
    fn from(loan: &Loan) -> Self {
        Self {
            id: loan.id.clone(),
            is_open: loan.is_open,
            borrowed_symbol: loan.borrowed_symbol.clone(),
            borrowed_amount: loan.borrowed_amount,
        }
    }
}

pub struct LoanManager {
    strategy: Box<dyn LendingStrategy>,
    loans: ExchangeObjectContainer<Loan>,
}

impl LoanManager {
    pub fn new(strategy: Box<dyn LendingStrategy>) -> Self {
        Self { strategy, loans: ExchangeObjectContainer::new() }
    }

    pub fn get(&self, loan_id: &str) -> Option<&Loan> {
        self.loans.get(loan_id)
    }

    pub fn open_loans(&mut self) -> Vec<&Loan> {
        self.loans.get_open()
    }

    /// Delegates to the lending strategy to build the loan and price its
    /// collateral, then credits the ledger. The loan is only registered
    /// once the ledger transaction succeeds.
    pub fn create_loan(
        &mut self,
        ledger: &mut AccountBalances,
        symbol: &str,
        amount: Decimal,
        now: SystemTime,
        prices: &HashMap<String, Decimal>,
    ) -> Result<LoanInfo> {
        if amount <= Decimal::ZERO {
            return Err(Error::validation("loan amount must be positive"));
        }
        let id = Uuid::new_v4().to_string();
        let loan = self.strategy.create_loan(id.clone(), symbol, amount, now)?;
        let collateral = self.strategy.calculate_collateral(symbol, amount, prices);
        ledger.accept_loan(&id, symbol, amount, &collateral)?;
        let summary = LoanInfo::from(&loan);
        self.loans.add(id, loan);
        Ok(summary)
    }

    /// Computes interest as of `now`, truncates it to each symbol's
    /// configured precision, and atomically debits principal, interest, and
    /// releases collateral. The loan is only closed once that succeeds.
    pub fn repay_loan(
        &mut self,
        ledger: &mut AccountBalances,
        config: &Config,
        loan_id: &str,
        now: SystemTime,
        prices: &HashMap<String, Decimal>,
    ) -> Result<()> {
        let loan = self.loans.get(loan_id).ok_or_else(|| Error::loan_not_found(loan_id))?;
        if !loan.is_open {
            return Err(Error::illegal_state(format!("loan {loan_id} is already closed")));
        }

        let interest: HashMap<String, Decimal> = self
            .strategy
            .calculate_interest(loan, now, prices)
            .into_iter()
            .map(|(symbol, amount)| {
                let precision = config.symbol_precision(&symbol);
                (symbol, truncate(amount, precision))
            })
            .collect();
        let collateral = ledger.holds_for(loan_id);
        let (borrowed_symbol, borrowed_amount) = (loan.borrowed_symbol.clone(), loan.borrowed_amount);

        ledger.repay_loan(loan_id, &borrowed_symbol, borrowed_amount, &interest, &collateral)?;

        let loan = self.loans.get_mut(loan_id).expect("loan existed moments ago");
        loan.is_open = false;
        Ok(())
    }
}
