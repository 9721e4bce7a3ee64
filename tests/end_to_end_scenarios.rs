//! End-to-end scenarios pinning the literal fill values from the
//! specification's test vectors, against the public `Exchange` facade.

use barex::{
    Bar, BarEvent, Config, Exchange, NoFee, Operation, OrderState, Pair, PairInfo, VolumeShareImpact,
};
use rust_decimal_macros::dec;
use std::time::{Duration, SystemTime};

/// Surfaces the crate's `tracing::debug!`/`warn!` events during `cargo test
/// -- --nocapture`, the way the teacher wires up `tracing-subscriber` for its
/// own integration tests rather than the library itself.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).with_test_writer().try_init();
}

fn btc_usd() -> Pair {
    Pair::new("BTC", "USD")
}

fn exchange(base_precision: u32, quote_precision: u32) -> Exchange {
    let config = Config::new().with_pair_info(btc_usd(), PairInfo::new(base_precision, quote_precision));
    Exchange::new(config, Box::new(NoFee))
}

fn bar_at(when: SystemTime, open: rust_decimal::Decimal, high: rust_decimal::Decimal, low: rust_decimal::Decimal, close: rust_decimal::Decimal, volume: rust_decimal::Decimal) -> BarEvent {
    BarEvent::new(Bar::new(btc_usd(), when, open, high, low, close, volume))
}

// S1 - Market buy, single bar fill, no fees.
#[test]
fn s1_market_buy_fills_in_one_bar() {
    init_tracing();
    let mut ex = exchange(8, 2);
    ex.deposit("USD", dec!(1000));
    let now = SystemTime::now();

    let created = ex.create_market_order(btc_usd(), Operation::Buy, dec!(1)).unwrap();
    ex.on_bar_event(bar_at(now, dec!(100), dec!(110), dec!(95), dec!(105), dec!(10)));

    assert_eq!(ex.get_balance("BTC").available, dec!(1));
    assert_eq!(ex.get_balance("USD").available, dec!(900));
    let info = ex.get_order_info(&created.id).unwrap();
    assert_eq!(info.state, OrderState::Completed);
    assert_eq!(info.fills.len(), 1);
    assert_eq!(info.fills[0].balance_updates.get("USD"), Some(&dec!(-100)));
}

// S2 - Limit buy not touched: stays open, funds held.
#[test]
fn s2_limit_buy_not_touched_stays_open_with_hold() {
    let mut ex = exchange(8, 2);
    ex.deposit("USD", dec!(1000));
    let now = SystemTime::now();

    let created = ex.create_limit_order(btc_usd(), Operation::Buy, dec!(1), dec!(97)).unwrap();
    assert_eq!(ex.get_balance("USD").available, dec!(903));
    assert_eq!(ex.get_balance("USD").hold, dec!(97));

    ex.on_bar_event(bar_at(now, dec!(100), dec!(110), dec!(98), dec!(105), dec!(10)));

    assert_eq!(ex.get_balance("BTC").available, dec!(0));
    assert_eq!(ex.get_balance("USD").available, dec!(903));
    let info = ex.get_order_info(&created.id).unwrap();
    assert_eq!(info.state, OrderState::Open);
}

// S3 - Limit buy touched on a later bar, fills at the limit price.
#[test]
fn s3_limit_buy_touched_fills_at_limit_price() {
    let mut ex = exchange(8, 2);
    ex.deposit("USD", dec!(1000));
    let t0 = SystemTime::now();
    let t1 = t0 + Duration::from_secs(60);

    let created = ex.create_limit_order(btc_usd(), Operation::Buy, dec!(1), dec!(97)).unwrap();
    ex.on_bar_event(bar_at(t0, dec!(100), dec!(110), dec!(98), dec!(105), dec!(10)));
    ex.on_bar_event(bar_at(t1, dec!(96), dec!(100), dec!(94), dec!(98), dec!(10)));

    assert_eq!(ex.get_balance("BTC").available, dec!(1));
    assert_eq!(ex.get_balance("USD").available, dec!(903));
    assert_eq!(ex.get_balance("USD").hold, dec!(0));
    let info = ex.get_order_info(&created.id).unwrap();
    assert_eq!(info.state, OrderState::Completed);
}

// S4 - Market order partially filled against a thin bar, then canceled.
#[test]
fn s4_market_order_canceled_after_partial_fill_on_thin_liquidity() {
    let config = Config::new().with_pair_info(btc_usd(), PairInfo::new(8, 2));
    let mut ex = Exchange::new(config, Box::new(NoFee))
        .with_liquidity_factory(|| Box::new(VolumeShareImpact::new(dec!(0.25), dec!(0))));
    ex.deposit("USD", dec!(1_000_000));
    let now = SystemTime::now();

    let created = ex.create_market_order(btc_usd(), Operation::Buy, dec!(1)).unwrap();
    ex.on_bar_event(bar_at(now, dec!(100), dec!(100), dec!(100), dec!(100), dec!(1)));

    let info = ex.get_order_info(&created.id).unwrap();
    assert_eq!(info.state, OrderState::Canceled);
    assert_eq!(info.amount_filled, dec!(0.25));
    assert_eq!(ex.get_balance("BTC").available, dec!(0.25));
    assert_eq!(ex.get_balance("USD").hold, dec!(0));
    assert_eq!(ex.get_balance("USD").available, dec!(1_000_000) - dec!(25));
    assert_eq!(ex.get_open_orders(None), Vec::new());
}

// S5 - Stop-limit triggers on bar 2 and fills in the same bar.
#[test]
fn s5_stop_limit_triggers_then_fills_same_bar() {
    let mut ex = exchange(8, 2);
    ex.deposit("USD", dec!(1000));
    let t0 = SystemTime::now();
    let t1 = t0 + Duration::from_secs(60);

    let created = ex
        .create_stop_limit_order(btc_usd(), Operation::Buy, dec!(1), dec!(105), dec!(106))
        .unwrap();

    ex.on_bar_event(bar_at(t0, dec!(100), dec!(104), dec!(99), dec!(102), dec!(10)));
    let mid = ex.get_order_info(&created.id).unwrap();
    assert_eq!(mid.state, OrderState::Open);
    assert!(mid.fills.is_empty());

    ex.on_bar_event(bar_at(t1, dec!(103), dec!(107), dec!(103), dec!(106), dec!(10)));

    assert_eq!(ex.get_balance("BTC").available, dec!(1));
    assert_eq!(ex.get_balance("USD").available, dec!(1000) - dec!(106));
    let info = ex.get_order_info(&created.id).unwrap();
    assert_eq!(info.state, OrderState::Completed);
}

// S6 - Cancel releases holds exactly, with no residue.
#[test]
fn s6_cancel_releases_holds_to_pre_creation_balances() {
    let mut ex = exchange(8, 2);
    ex.deposit("USD", dec!(1000));

    let created = ex.create_limit_order(btc_usd(), Operation::Buy, dec!(1), dec!(97)).unwrap();
    assert_eq!(ex.get_balance("USD").hold, dec!(97));

    ex.cancel_order(&created.id).unwrap();

    assert_eq!(ex.get_balance("USD").available, dec!(1000));
    assert_eq!(ex.get_balance("USD").hold, dec!(0));
    let info = ex.get_order_info(&created.id).unwrap();
    assert_eq!(info.state, OrderState::Canceled);

    // Round-trip law: canceling again is rejected and does not mutate.
    let err = ex.cancel_order(&created.id).unwrap_err();
    assert!(matches!(err, barex::Error::IllegalState(_)));
    assert_eq!(ex.get_balance("USD").available, dec!(1000));
}

#[test]
fn get_bid_ask_derives_from_last_bar_and_spread() {
    let config = Config::new().with_pair_info(btc_usd(), PairInfo::new(8, 2)).with_bid_ask_spread(dec!(1));
    let mut ex = Exchange::new(config, Box::new(NoFee));
    assert_eq!(ex.get_bid_ask(&btc_usd()), (None, None));

    ex.on_bar_event(bar_at(SystemTime::now(), dec!(100), dec!(105), dec!(95), dec!(100), dec!(10)));
    let (bid, ask) = ex.get_bid_ask(&btc_usd());
    // half_spread = truncate(100 * 1 / 100 / 2, 2) = 0.5
    assert_eq!(bid, Some(dec!(99.5)));
    assert_eq!(ask, Some(dec!(100.5)));
}
