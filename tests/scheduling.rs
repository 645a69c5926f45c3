//! Timing and cancellation scenarios over run-loop and thread strands.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{collect, init_test_logging, Collected};
use freshet::{
    delay, intervals, observe_on, observer, range, take, Clock as _, Context, Failure,
    FnSubscriber, Lifetime, MonotonicClock, ObservableExt as _, Starter as _, StrandFactory,
};
use parking_lot::Mutex;

#[test]
fn intervals_emit_counts_with_a_period_floor() {
    init_test_logging();
    let clock = MonotonicClock::handle();
    let ctx = Context::root(StrandFactory::immediate(clock.clone()), clock.clone());
    let log: Collected<u64> = Collected::new();

    let started = clock.now();
    let lifetime = intervals(
        StrandFactory::thread(clock.clone()),
        clock.now(),
        Duration::from_millis(10),
    )
    .adapt(take(3))
    .subscribe(collect(&log))
    .start(&ctx);

    lifetime.join();
    let elapsed = clock.now().duration_since(started);

    assert_eq!(log.values(), vec![0, 1, 2]);
    assert_eq!(log.completes(), 1);
    assert!(
        elapsed >= Duration::from_millis(20),
        "third tick cannot arrive before two periods, got {elapsed:?}"
    );
}

#[test]
fn cancelling_an_interval_pipeline_stops_emission() {
    init_test_logging();
    let clock = MonotonicClock::handle();
    let ctx = Context::root(StrandFactory::immediate(clock.clone()), clock.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let subscriber = FnSubscriber::new({
        let seen = seen.clone();
        move |ctx: &Context| {
            let seen = seen.clone();
            observer::from_fns::<u64, Failure, _, _, _>(
                ctx.lifetime().clone(),
                move |count| seen.lock().push(count),
                |_err| {},
                || {},
            )
        }
    });

    let lifetime = intervals(
        StrandFactory::thread(clock.clone()),
        clock.now(),
        Duration::from_millis(10),
    )
    .subscribe(subscriber)
    .start(&ctx);

    // wait for at least one tick, then cancel
    for _ in 0..200 {
        if !seen.lock().is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(!seen.lock().is_empty(), "no tick observed before cancel");

    lifetime.stop();
    lifetime.join();

    let count_at_cancel = seen.lock().len();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(
        seen.lock().len(),
        count_at_cancel,
        "ticks continued after cancellation"
    );
}

/// A subscriber that records values and exposes the lifetime of the context
/// it was bound with, which for a relay operator is the relay's lifetime.
fn relay_probe(
    seen: &Arc<Mutex<Vec<u64>>>,
    relay: &Arc<Mutex<Option<Lifetime>>>,
) -> impl freshet::Subscriber<Value = u64, Error = Failure> {
    let seen = seen.clone();
    let relay = relay.clone();
    FnSubscriber::new(move |ctx: &Context| {
        *relay.lock() = Some(ctx.lifetime().clone());
        let seen = seen.clone();
        observer::from_fns::<u64, Failure, _, _, _>(
            ctx.lifetime().clone(),
            move |count| seen.lock().push(count),
            |_err| {},
            || {},
        )
    })
}

fn wait_for_stop(lifetime: &Lifetime) {
    for _ in 0..400 {
        if lifetime.is_stopped() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn cancelling_a_delay_pipeline_drains_and_stops_the_relay() {
    init_test_logging();
    let clock = MonotonicClock::handle();
    let ctx = Context::root(StrandFactory::immediate(clock.clone()), clock.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let relay = Arc::new(Mutex::new(None));

    let lifetime = intervals(
        StrandFactory::thread(clock.clone()),
        clock.now(),
        Duration::from_millis(10),
    )
    .lift(delay(
        StrandFactory::thread(clock.clone()),
        Duration::from_millis(20),
    ))
    .subscribe(relay_probe(&seen, &relay))
    .start(&ctx);

    for _ in 0..400 {
        if !seen.lock().is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(!seen.lock().is_empty(), "no value observed before cancel");

    lifetime.stop();
    lifetime.join();

    // the relay drains whatever was in flight, then shuts its strand down
    let relay = relay.lock().clone().expect("relay lifetime not captured");
    wait_for_stop(&relay);
    assert!(
        relay.is_stopped(),
        "delay relay kept running after cancellation"
    );
    relay.join();

    let drained = seen.lock().len();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(
        seen.lock().len(),
        drained,
        "values continued after the relay stopped"
    );
}

#[test]
fn cancelling_an_observe_on_pipeline_stops_the_relay() {
    init_test_logging();
    let clock = MonotonicClock::handle();
    let ctx = Context::root(StrandFactory::immediate(clock.clone()), clock.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let relay = Arc::new(Mutex::new(None));

    let lifetime = intervals(
        StrandFactory::thread(clock.clone()),
        clock.now(),
        Duration::from_millis(10),
    )
    .lift(observe_on(StrandFactory::thread(clock.clone())))
    .subscribe(relay_probe(&seen, &relay))
    .start(&ctx);

    for _ in 0..400 {
        if !seen.lock().is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(!seen.lock().is_empty(), "no value observed before cancel");

    lifetime.stop();
    lifetime.join();

    let relay = relay.lock().clone().expect("relay lifetime not captured");
    wait_for_stop(&relay);
    assert!(
        relay.is_stopped(),
        "observe_on relay kept running after cancellation"
    );
    relay.join();
}

#[test]
fn delayed_signals_respect_the_lower_bound() {
    init_test_logging();
    let clock = MonotonicClock::handle();
    let ctx = Context::root(StrandFactory::immediate(clock.clone()), clock.clone());

    let stamped = Arc::new(Mutex::new(Vec::new()));
    let subscriber = FnSubscriber::new({
        let stamped = stamped.clone();
        let clock = clock.clone();
        move |ctx: &Context| {
            let stamped = stamped.clone();
            let clock = clock.clone();
            observer::from_fns::<i64, Failure, _, _, _>(
                ctx.lifetime().clone(),
                move |v| stamped.lock().push((v, clock.now())),
                |_err| {},
                || {},
            )
        }
    });

    let sent_after = clock.now();
    range(1, 3)
        .lift(delay(
            StrandFactory::thread(clock.clone()),
            Duration::from_millis(25),
        ))
        .subscribe(subscriber)
        .start(&ctx);

    for _ in 0..400 {
        if stamped.lock().len() == 3 {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }

    let stamped = stamped.lock();
    assert_eq!(
        stamped.iter().map(|(v, _)| *v).collect::<Vec<_>>(),
        vec![1, 2, 3],
        "delay must preserve per-strand ordering"
    );
    for (_, at) in stamped.iter() {
        assert!(*at >= sent_after + Duration::from_millis(25));
    }
}

#[test]
fn interval_counts_line_up_with_their_schedule() {
    init_test_logging();
    let clock = MonotonicClock::handle();
    let ctx = Context::root(StrandFactory::immediate(clock.clone()), clock.clone());
    let log: Collected<u64> = Collected::new();

    let lifetime = intervals(
        StrandFactory::thread(clock.clone()),
        clock.now() + Duration::from_millis(5),
        Duration::from_millis(8),
    )
    .adapt(take(4))
    .subscribe(collect(&log))
    .start(&ctx);

    lifetime.join();
    assert_eq!(log.values(), vec![0, 1, 2, 3]);
    assert_eq!(log.completes(), 1);
}

#[test]
fn merge_multiplexes_thread_strand_inners_onto_one_strand() {
    init_test_logging();
    let clock = MonotonicClock::handle();
    let ctx = Context::root(StrandFactory::immediate(clock.clone()), clock.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let completed = Arc::new(Mutex::new(false));

    let subscriber = FnSubscriber::new({
        let seen = seen.clone();
        let completed = completed.clone();
        move |ctx: &Context| {
            let seen = seen.clone();
            let completed = completed.clone();
            observer::from_fns::<i64, Failure, _, _, _>(
                ctx.lifetime().clone(),
                move |v| seen.lock().push((v, std::thread::current().id())),
                |_err| {},
                move || *completed.lock() = true,
            )
        }
    });

    freshet::range(0, 2)
        .lift(freshet::map(|x: i64| range(x * 100, x * 100 + 2)))
        .adapt(freshet::merge(StrandFactory::thread(clock.clone())))
        .subscribe(subscriber)
        .start(&ctx);

    for _ in 0..400 {
        if *completed.lock() {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(*completed.lock(), "merge never completed");

    let recorded = seen.lock().clone();
    let mut values: Vec<i64> = recorded.iter().map(|(v, _)| *v).collect();
    values.sort_unstable();
    assert_eq!(values, vec![0, 1, 2, 100, 101, 102, 200, 201, 202]);

    // one destination strand means one delivery thread, and not this one
    let mut threads: Vec<_> = recorded.iter().map(|(_, t)| *t).collect();
    threads.dedup();
    assert_eq!(threads.len(), 1, "values were delivered on multiple strands");
    assert_ne!(threads[0], std::thread::current().id());
}
