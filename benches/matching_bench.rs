//! Matching-loop benchmarks.
//!
//! Times the per-bar matching path (`Exchange::on_bar_event`) with a
//! pair carrying a mix of open Market/Limit orders, the way the teacher's
//! own `engine_bench.rs` times its per-tick hot path. Not a regression
//! gate — the specification names no target latency for this crate.

use barex::{Bar, BarEvent, Config, Exchange, NoFee, Operation, Pair, PairInfo};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::SystemTime;

fn pair() -> Pair {
    Pair::new("BTC", "USD")
}

fn exchange_with_open_orders(n: usize) -> Exchange {
    let config = Config::new().with_pair_info(pair(), PairInfo::new(8, 2));
    let mut exchange = Exchange::new(config, Box::new(NoFee));
    exchange.deposit("USD", Decimal::from(1_000_000_000i64));

    for i in 0..n {
        // Spread limit prices below the bar's low so only a handful fill
        // on any single bar, keeping the loop's per-order overhead visible.
        let price = dec!(50) + Decimal::from(i as i64 % 40);
        exchange
            .create_limit_order(pair(), Operation::Buy, dec!(1), price)
            .expect("order accepted");
    }
    exchange
}

fn bar() -> BarEvent {
    BarEvent::new(Bar::new(pair(), SystemTime::now(), dec!(100), dec!(110), dec!(95), dec!(105), dec!(10)))
}

fn bench_on_bar_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching/on_bar_event");
    group.significance_level(0.01).sample_size(100);

    for size in [10usize, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || exchange_with_open_orders(size),
                |mut exchange| {
                    black_box(exchange.on_bar_event(bar()));
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_create_and_cancel(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching/create_and_cancel");
    group.significance_level(0.01).sample_size(1000);

    group.bench_function("create_limit_order", |b| {
        let config = Config::new().with_pair_info(pair(), PairInfo::new(8, 2));
        let mut exchange = Exchange::new(config, Box::new(NoFee));
        // Large enough that no realistic benchmark run exhausts it via holds.
        exchange.deposit("USD", Decimal::from(1_000_000_000_000_000i64));
        b.iter(|| {
            black_box(exchange.create_limit_order(pair(), Operation::Buy, dec!(1), dec!(97)).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_on_bar_event, bench_create_and_cancel);
criterion_main!(benches);
