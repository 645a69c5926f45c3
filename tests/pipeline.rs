//! End-to-end pipeline composition scenarios over the immediate strand.

mod common;

use common::{collect, init_test_logging, Collected};
use freshet::{
    filter, last_or_default, map, map_merge, merge, noop_subscriber, range, take, AdaptorExt as _,
    Context, Failure, LifterExt as _, MonotonicClock, ObservableExt as _, Starter as _,
    StarterExt as _, StrandFactory, SubscriberExt as _,
};

fn immediate_factory() -> StrandFactory {
    StrandFactory::immediate(MonotonicClock::handle())
}

#[test]
fn range_take_collects_the_prefix() {
    init_test_logging();
    let log = Collected::new();

    let lifetime = range(1, 5)
        .adapt(take(3))
        .subscribe(collect(&log))
        .start(&Context::immediate());

    assert_eq!(log.values(), vec![1, 2, 3]);
    assert_eq!(log.completes(), 1);
    assert!(log.errors().is_empty());
    assert!(lifetime.is_stopped());
    lifetime.join();
}

#[test]
fn range_filter_keeps_the_even_subsequence() {
    init_test_logging();
    let log = Collected::new();

    range(1, 10)
        .lift(filter(|v: &i64| v % 2 == 0))
        .subscribe(collect(&log))
        .start(&Context::immediate());

    assert_eq!(log.values(), vec![2, 4, 6, 8, 10]);
    assert_eq!(log.completes(), 1);
}

#[test]
fn filter_take_last_or_default_reduces_to_one_value() {
    init_test_logging();
    let log = Collected::new();

    range(1, 10)
        .lift(filter(|v: &i64| v % 2 == 0))
        .adapt(take(3))
        .lift(last_or_default(42))
        .subscribe(collect(&log))
        .start(&Context::immediate());

    assert_eq!(log.values(), vec![6]);
    assert_eq!(log.completes(), 1);
}

#[test]
fn last_or_default_on_an_empty_stream_yields_the_default() {
    init_test_logging();
    let log = Collected::new();

    range(10, 1)
        .lift(last_or_default(42))
        .subscribe(collect(&log))
        .start(&Context::immediate());

    assert_eq!(log.values(), vec![42]);
    assert_eq!(log.completes(), 1);
}

#[test]
fn merge_unions_all_inner_emissions() {
    init_test_logging();
    let log = Collected::new();

    range(0, 2)
        .lift(map(|x: i64| range(x * 10, x * 10 + 1)))
        .adapt(merge(immediate_factory()))
        .subscribe(collect(&log))
        .start(&Context::immediate());

    let mut values = log.values();
    values.sort_unstable();
    assert_eq!(values, vec![0, 1, 10, 11, 20, 21]);
    assert_eq!(log.completes(), 1);
}

#[test]
fn map_merge_matches_the_expanded_composition() {
    init_test_logging();
    let fused = Collected::new();
    let expanded = Collected::new();

    range(0, 2)
        .adapt(map_merge(immediate_factory(), |x: i64| {
            range(x * 10, x * 10 + 1)
        }))
        .subscribe(collect(&fused))
        .start(&Context::immediate());

    range(0, 2)
        .lift(map(|x: i64| range(x * 10, x * 10 + 1)))
        .adapt(merge(immediate_factory()))
        .subscribe(collect(&expanded))
        .start(&Context::immediate());

    let mut fused_values = fused.values();
    let mut expanded_values = expanded.values();
    fused_values.sort_unstable();
    expanded_values.sort_unstable();
    assert_eq!(fused_values, expanded_values);
    assert_eq!(fused.completes(), 1);
    assert_eq!(expanded.completes(), 1);
}

#[test]
fn lifter_composition_is_associative_over_the_pipe_table() {
    init_test_logging();
    let chained = Collected::new();
    let nested = Collected::new();

    // (filter . map) as one lifter
    range(1, 6)
        .lift(filter(|v: &i64| v % 2 == 1).then(map(|v: i64| v * v)))
        .subscribe(collect(&chained))
        .start(&Context::immediate());

    // the same stages lifted one at a time
    range(1, 6)
        .lift(filter(|v: &i64| v % 2 == 1))
        .lift(map(|v: i64| v * v))
        .subscribe(collect(&nested))
        .start(&Context::immediate());

    assert_eq!(chained.values(), vec![1, 9, 25]);
    assert_eq!(chained.values(), nested.values());
}

#[test]
fn adaptor_fused_to_a_subscriber_terminates_an_observable() {
    init_test_logging();
    let log = Collected::new();

    let terminator = take(2).fuse(collect(&log));
    range(5, 9)
        .terminate(terminator)
        .start(&Context::immediate());

    assert_eq!(log.values(), vec![5, 6]);
    assert_eq!(log.completes(), 1);
}

#[test]
fn lifter_applied_to_a_subscriber_is_a_subscriber() {
    init_test_logging();
    let log = Collected::new();

    range(1, 4)
        .subscribe(map(|v: i64| v + 100).apply(collect(&log)))
        .start(&Context::immediate());

    assert_eq!(log.values(), vec![101, 102, 103]);
}

#[test]
fn erased_stages_behave_like_concrete_ones() {
    init_test_logging();
    let log = Collected::new();

    let source = range(1, 10).into_dyn();
    let stage = filter(|v: &i64| v % 3 == 0).into_dyn();
    let sink = collect(&log).into_dyn();

    let lifetime = source
        .lift(stage)
        .adapt(take(2))
        .subscribe(sink)
        .into_dyn()
        .start(&Context::immediate());

    assert_eq!(log.values(), vec![3, 6]);
    assert_eq!(log.completes(), 1);
    assert!(lifetime.is_stopped());
}

#[test]
fn noop_subscriber_drives_a_pipeline_for_effects() {
    init_test_logging();
    let lifetime = range(1, 100)
        .subscribe(noop_subscriber::<i64, Failure>())
        .start(&Context::immediate());
    assert!(lifetime.is_stopped());
}

#[test]
fn stopping_the_returned_lifetime_halts_a_synchronous_producer() {
    init_test_logging();
    let log = Collected::new();
    let ctx = Context::immediate();

    // stop from within the sink after the third value
    let stopper = ctx.lifetime().clone();
    range(1, 1_000_000)
        .lift(map(move |v: i64| {
            if v == 3 {
                stopper.stop();
            }
            v
        }))
        .subscribe(collect(&log))
        .start(&ctx);

    assert!(log.values().len() <= 3);
    ctx.lifetime().join();
}

#[test]
fn payload_rides_the_context_into_subscribers() {
    init_test_logging();
    use freshet::{observer, FnSubscriber};
    use parking_lot::Mutex;
    use std::sync::Arc;

    let seen_tag = Arc::new(Mutex::new(None));
    let sink = seen_tag.clone();

    let subscriber = FnSubscriber::new(move |ctx: &Context| {
        *sink.lock() = ctx.payload::<String>().map(|tag| (*tag).clone());
        observer::from_fns::<i64, Failure, _, _, _>(
            ctx.lifetime().clone(),
            |_v| {},
            |_err| {},
            || {},
        )
    });

    range(1, 3)
        .subscribe(subscriber)
        .start(&Context::immediate().with_payload(String::from("trace-tag")));

    assert_eq!(seen_tag.lock().as_deref(), Some("trace-tag"));
}
