//! The public facade: request validation, order/loan lifecycle, balance and
//! configuration queries, and the registration points an external dispatcher
//! hooks into. The per-bar matching loop itself lives in `crate::engine`.

use crate::balances::{AccountBalances, Balance};
use crate::bar::Bar;
use crate::config::Config;
use crate::decimal::{round_half_even, truncate};
use crate::engine::{combine, round_fee};
use crate::error::{Error, Result};
use crate::fees::FeeStrategy;
use crate::liquidity::{LiquidityStrategy, VolumeShareImpact};
use crate::loans::{LendingStrategy, LoanInfo, LoanManager, NoLoans};
use crate::orders::{Fill, Operation, Order, OrderKind, OrderState};
use crate::pair::{Pair, PairInfo};
use crate::container::ExchangeObjectContainer;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::time::SystemTime;
use tracing::{debug, info};
use uuid::Uuid;

/// Returned by `create_*_order`: the id the caller should use for every
/// subsequent operation on this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanceledOrder {
    pub id: String,
}

/// A lightweight projection of an open order, for listing.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub id: String,
    pub operation: Operation,
    pub amount: Decimal,
    pub amount_filled: Decimal,
}

/// Full order state, including its fill history.
#[derive(Debug, Clone)]
pub struct OrderInfo {
    pub id: String,
    pub pair: Pair,
    pub operation: Operation,
    pub state: OrderState,
    pub original_amount: Decimal,
    pub amount_filled: Decimal,
    pub fills: Vec<Fill>,
}

/// Registration point for an external bar feed. Driving it (pulling bars in
/// chronological order and pushing them into `on_bar_event`) is the
/// dispatcher's job, not this crate's; `add_bar_source` only records which
/// sources a host intends to wire up for a pair.
pub trait BarSource {
    fn pair(&self) -> &Pair;
}

// Fields are `pub(crate)` rather than private: `engine.rs` defines a second
// inherent `impl Exchange` block for the matching loop and needs direct
// access to the same state this facade owns.
pub struct Exchange {
    pub(crate) config: Config,
    pub(crate) balances: AccountBalances,
    pub(crate) orders: ExchangeObjectContainer<Order>,
    pub(crate) last_bar: HashMap<Pair, Bar>,
    pub(crate) liquidity: HashMap<Pair, Box<dyn LiquidityStrategy>>,
    pub(crate) liquidity_factory: Box<dyn Fn() -> Box<dyn LiquidityStrategy>>,
    pub(crate) fee_strategy: Box<dyn FeeStrategy>,
    loans: LoanManager,
    pub(crate) subscribers: HashMap<Pair, Vec<Box<dyn FnMut(&Bar)>>>,
    bar_sources: Vec<Box<dyn BarSource>>,
}

impl Exchange {
    pub fn new(config: Config, fee_strategy: Box<dyn FeeStrategy>) -> Self {
        Self::with_lending_strategy(config, fee_strategy, Box::new(NoLoans))
    }

    pub fn with_lending_strategy(config: Config, fee_strategy: Box<dyn FeeStrategy>, lending_strategy: Box<dyn LendingStrategy>) -> Self {
        info!("exchange constructed");
        Self {
            config,
            balances: AccountBalances::new(),
            orders: ExchangeObjectContainer::new(),
            last_bar: HashMap::new(),
            liquidity: HashMap::new(),
            liquidity_factory: Box::new(|| Box::new(VolumeShareImpact::default())),
            fee_strategy,
            loans: LoanManager::new(lending_strategy),
            subscribers: HashMap::new(),
            bar_sources: Vec::new(),
        }
    }

    /// Overrides the per-pair liquidity model factory; each pair gets its
    /// own instance, created lazily on first bar.
    pub fn with_liquidity_factory(mut self, factory: impl Fn() -> Box<dyn LiquidityStrategy> + 'static) -> Self {
        self.liquidity_factory = Box::new(factory);
        self
    }

    /// Credits a symbol's available balance directly. Setup/test-harness
    /// only; there is no public "deposit" concept in the domain itself.
    pub fn deposit(&mut self, symbol: impl Into<String>, amount: Decimal) {
        self.balances.deposit(symbol, amount);
    }

    // -- configuration -----------------------------------------------------

    pub fn get_pair_info(&self, pair: &Pair) -> PairInfo {
        self.config.pair_info(pair)
    }

    pub fn set_pair_info(&mut self, pair: Pair, info: PairInfo) {
        debug!(pair = %pair, base_precision = info.base_precision, quote_precision = info.quote_precision, "pair info set");
        self.config.set_pair_info(pair, info);
    }

    pub fn set_symbol_precision(&mut self, symbol: impl Into<String>, precision: u32) {
        self.config.set_symbol_precision(symbol, precision);
    }

    // -- balances ------------------------------------------------------

    pub fn get_balance(&self, symbol: &str) -> Balance {
        self.balances.get_balance(symbol)
    }

    pub fn get_balances(&self) -> HashMap<String, Balance> {
        self.balances.symbols().into_iter().map(|symbol| (symbol.clone(), self.balances.get_balance(&symbol))).collect()
    }

    /// Midpoint-derived quote from the pair's last bar and the configured
    /// spread. `(None, None)` if no bar has been seen yet for this pair.
    pub fn get_bid_ask(&self, pair: &Pair) -> (Option<Decimal>, Option<Decimal>) {
        let Some(bar) = self.last_bar.get(pair) else {
            return (None, None);
        };
        let info = self.config.pair_info(pair);
        let half_spread = truncate(bar.close * self.config.bid_ask_spread() / dec!(100) / dec!(2), info.quote_precision);
        (Some(bar.close - half_spread), Some(bar.close + half_spread))
    }

    // -- orders --------------------------------------------------------

    pub fn create_market_order(&mut self, pair: Pair, operation: Operation, amount: Decimal) -> Result<CreatedOrder> {
        self.create_order_internal(pair, operation, amount, OrderKind::Market)
    }

    pub fn create_limit_order(&mut self, pair: Pair, operation: Operation, amount: Decimal, limit_price: Decimal) -> Result<CreatedOrder> {
        self.create_order_internal(pair, operation, amount, OrderKind::Limit { limit_price })
    }

    pub fn create_stop_order(&mut self, pair: Pair, operation: Operation, amount: Decimal, stop_price: Decimal) -> Result<CreatedOrder> {
        self.create_order_internal(pair, operation, amount, OrderKind::Stop { stop_price, stop_hit: false })
    }

    pub fn create_stop_limit_order(
        &mut self,
        pair: Pair,
        operation: Operation,
        amount: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Result<CreatedOrder> {
        self.create_order_internal(pair, operation, amount, OrderKind::StopLimit { stop_price, limit_price, stop_hit: false })
    }

    fn create_order_internal(&mut self, pair: Pair, operation: Operation, amount: Decimal, kind: OrderKind) -> Result<CreatedOrder> {
        self.validate_order(&pair, amount, &kind)?;
        let required_holds = self.estimate_required_balances(&pair, operation, amount, &kind);

        let id = Uuid::new_v4().to_string();
        match self.balances.order_accepted(&id, &required_holds) {
            Ok(()) => {
                let order = Order::new(id.clone(), pair.clone(), operation, amount, kind);
                self.orders.add(id.clone(), order);
                debug!(order_id = %id, pair = %pair, operation = ?operation, %amount, "order accepted");
                Ok(CreatedOrder { id })
            }
            Err(err) => {
                debug!(pair = %pair, operation = ?operation, %amount, %err, "order rejected: insufficient balance");
                Err(err)
            }
        }
    }

    fn validate_order(&self, pair: &Pair, amount: Decimal, kind: &OrderKind) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(Error::validation("order amount must be positive"));
        }
        let info = self.config.pair_info(pair);
        if truncate(amount, info.base_precision) != amount {
            return Err(Error::validation(format!("amount {amount} exceeds base precision {}", info.base_precision)));
        }

        let check_price = |label: &str, price: Decimal| -> Result<()> {
            if price <= Decimal::ZERO {
                return Err(Error::validation(format!("{label} price must be positive")));
            }
            if round_half_even(price, info.quote_precision) != price {
                return Err(Error::validation(format!("{label} price exceeds quote precision {}", info.quote_precision)));
            }
            Ok(())
        };

        match kind {
            OrderKind::Market => Ok(()),
            OrderKind::Limit { limit_price } => check_price("limit", *limit_price),
            OrderKind::Stop { stop_price, .. } => check_price("stop", *stop_price),
            OrderKind::StopLimit { stop_price, limit_price, .. } => {
                check_price("stop", *stop_price)?;
                check_price("limit", *limit_price)
            }
        }
    }

    /// Prices a hypothetical fill of `amount` via a throwaway, never-stored
    /// order, so the estimate reuses the exact same rounding/fee pipeline a
    /// real fill would go through. Used both to size the hold placed at
    /// order creation and to rebalance a still-open order's hold after a
    /// partial fill.
    pub(crate) fn estimate_required_balances(
        &self,
        pair: &Pair,
        operation: Operation,
        amount: Decimal,
        kind: &OrderKind,
    ) -> HashMap<String, Decimal> {
        let info = self.config.pair_info(pair);
        let price = self.estimate_price(pair, kind);
        let signed_base = operation.base_sign() * amount;

        let mut updates = HashMap::with_capacity(2);
        updates.insert(pair.base.clone(), truncate(signed_base, info.base_precision));
        if let Some(price) = price {
            updates.insert(pair.quote.clone(), round_half_even(-signed_base * price, info.quote_precision));
        }
        updates.retain(|_, v: &mut Decimal| !v.is_zero());

        let throwaway = Order::new("estimate".to_string(), pair.clone(), operation, amount, kind.clone());
        let fees = round_fee(&info, pair, self.fee_strategy.calculate_fees(&throwaway, &updates));
        let final_updates = combine(&updates, &fees);

        final_updates.into_iter().filter(|(_, amount)| *amount < Decimal::ZERO).map(|(symbol, amount)| (symbol, -amount)).collect()
    }

    fn estimate_price(&self, pair: &Pair, kind: &OrderKind) -> Option<Decimal> {
        match kind {
            OrderKind::Market => self.last_bar.get(pair).map(|bar| bar.close),
            OrderKind::Limit { limit_price } => Some(*limit_price),
            OrderKind::Stop { stop_price, .. } => Some(*stop_price),
            OrderKind::StopLimit { limit_price, .. } => Some(*limit_price),
        }
    }

    pub fn cancel_order(&mut self, order_id: &str) -> Result<CanceledOrder> {
        let order = self.orders.get_mut(order_id).ok_or_else(|| Error::order_not_found(order_id))?;
        if !order.is_open() {
            return Err(Error::illegal_state(format!("order {order_id} is not open")));
        }
        order.cancel();
        self.balances.order_updated(order_id, &HashMap::new(), None)?;
        self.orders.note_iteration();
        debug!(order_id = %order_id, "order canceled");
        Ok(CanceledOrder { id: order_id.to_string() })
    }

    pub fn get_order_info(&self, order_id: &str) -> Result<OrderInfo> {
        let order = self.orders.get(order_id).ok_or_else(|| Error::order_not_found(order_id))?;
        Ok(OrderInfo {
            id: order.id.clone(),
            pair: order.pair.clone(),
            operation: order.operation,
            state: order.state,
            original_amount: order.original_amount,
            amount_filled: order.amount_filled,
            fills: order.fills.clone(),
        })
    }

    pub fn get_open_orders(&mut self, pair: Option<&Pair>) -> Vec<OpenOrder> {
        self.orders
            .get_open()
            .into_iter()
            .filter(|order| pair.map(|p| &order.pair == p).unwrap_or(true))
            .map(|order| OpenOrder {
                id: order.id.clone(),
                operation: order.operation,
                amount: order.original_amount,
                amount_filled: order.amount_filled,
            })
            .collect()
    }

    // -- loans -----------------------------------------------------------

    /// Last-bar close price per base symbol, the only price source this
    /// crate has (no order book, no external price feed).
    fn prices(&self) -> HashMap<String, Decimal> {
        self.last_bar.values().map(|bar| (bar.pair.base.clone(), bar.close)).collect()
    }

    pub fn create_loan(&mut self, symbol: &str, amount: Decimal, now: SystemTime) -> Result<LoanInfo> {
        let prices = self.prices();
        let loan = self.loans.create_loan(&mut self.balances, symbol, amount, now, &prices)?;
        info!(loan_id = %loan.id, symbol, %amount, "loan created");
        Ok(loan)
    }

    pub fn repay_loan(&mut self, loan_id: &str, now: SystemTime) -> Result<()> {
        let prices = self.prices();
        self.loans.repay_loan(&mut self.balances, &self.config, loan_id, now, &prices)?;
        info!(loan_id, "loan repaid");
        Ok(())
    }

    pub fn get_loan(&self, loan_id: &str) -> Option<LoanInfo> {
        self.loans.get(loan_id).map(LoanInfo::from)
    }

    pub fn get_open_loans(&mut self) -> Vec<LoanInfo> {
        self.loans.open_loans().into_iter().map(LoanInfo::from).collect()
    }

    // -- bar event glue ----------------------------------------------------

    /// Registers a handler invoked with every bar this exchange processes
    /// for `pair`, after that bar's matching has completed.
    pub fn subscribe_to_bar_events(&mut self, pair: Pair, handler: impl FnMut(&Bar) + 'static) {
        self.subscribers.entry(pair).or_default().push(Box::new(handler));
    }

    /// Records a bar source a host intends to drive for its pair. This
    /// crate does not pull from it or schedule it: the chronological
    /// dispatch loop is the host's responsibility (see module docs).
    pub fn add_bar_source(&mut self, source: Box<dyn BarSource>) {
        self.bar_sources.push(source);
    }

    pub fn bar_sources(&self) -> &[Box<dyn BarSource>] {
        &self.bar_sources
    }
}
