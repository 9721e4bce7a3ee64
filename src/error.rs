//! Crate-wide error type.
//!
//! Every fallible public operation returns `Result<T, Error>` rather than an
//! opaque boxed error: callers are expected to match on the kind (e.g. treat
//! `NotEnoughBalance` as a retryable condition, `Validation` as a caller bug).

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors produced by the exchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid request, rejected before any state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// Insufficient available balance for the requested operation.
    #[error("not enough balance: need {required} {symbol}, have {available}")]
    NotEnoughBalance {
        symbol: String,
        required: Decimal,
        available: Decimal,
    },

    /// Order or loan id not known to the exchange.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Operation requires an open order/loan but the target is closed.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Operation not supported by the configured strategy.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Error::IllegalState(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Error::NotSupported(msg.into())
    }

    pub fn order_not_found(id: impl Into<String>) -> Self {
        Error::NotFound { kind: "order", id: id.into() }
    }

    pub fn loan_not_found(id: impl Into<String>) -> Self {
        Error::NotFound { kind: "loan", id: id.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
