//! barex - a deterministic backtesting exchange
//!
//! Simulates the execution of orders and margin loans against a
//! chronological stream of OHLCV bars, so a trading strategy can be
//! evaluated deterministically against historical data. The engine owns the
//! order lifecycle, the balance ledger (available/hold/borrowed), a
//! pluggable liquidity-impact model, a pluggable fee model, and the loan
//! accounting subsystem; everything else (the bar dispatcher, exchange
//! client adapters, a CLI, config-file parsing) is a host application's job.
//!
//! ## Modules
//! - `decimal`: rounding helpers (truncate, half-even, round-up) over `rust_decimal`
//! - `pair`, `bar`: the market-data shapes the engine consumes
//! - `config`: per-pair/per-symbol precision and the bid/ask spread parameter
//! - `error`: the crate-wide `Error` enum
//! - `container`: the generic open-item registry shared by orders and loans
//! - `balances`: the transactional balance ledger
//! - `orders`: order subtypes and their per-bar fill mechanics
//! - `liquidity`, `fees`: pluggable per-fill pricing strategies
//! - `loans`: margin loan creation, interest, and repayment
//! - `engine`: the per-bar matching loop
//! - `exchange`: the public facade strategies are expected to call

pub mod balances;
pub mod bar;
pub mod config;
pub mod container;
pub mod decimal;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod fees;
pub mod liquidity;
pub mod loans;
pub mod orders;
pub mod pair;

pub use bar::{Bar, BarEvent};
pub use config::Config;
pub use error::{Error, Result};
pub use exchange::{BarSource, CanceledOrder, CreatedOrder, Exchange, OpenOrder, OrderInfo};
pub use fees::{FeeStrategy, NoFee, Percentage};
pub use liquidity::{LiquidityStrategy, VolumeShareImpact};
pub use loans::{FixedCollateral, LendingStrategy, LoanInfo, NoLoans};
pub use orders::{Fill, Operation, OrderKind, OrderState};
pub use pair::{Pair, PairInfo};

/// Convenience import for strategy code driving an `Exchange`.
pub mod prelude {
    pub use crate::balances::Balance;
    pub use crate::{
        Bar, BarEvent, CanceledOrder, Config, CreatedOrder, Error, Exchange, FeeStrategy, Fill, LendingStrategy, LiquidityStrategy,
        LoanInfo, NoFee, NoLoans, Operation, OpenOrder, OrderInfo, OrderKind, OrderState, Pair, PairInfo, Percentage, Result,
        VolumeShareImpact,
    };
}
