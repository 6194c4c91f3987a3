use proptest::prelude::*;
use signalkit_core::{
    Callback, CallbackIdentity, ChannelId, EventBus, Signature, SubscribeFlags, Value,
};
use std::sync::{Arc, Weak};

use super::support::{names, new_log, witness, record, test_bus, Log};

/// Free callback that logs `name` and then runs `then` against the bus
fn relay<F>(name: &'static str, log: &Log, bus: &Arc<EventBus>, then: F) -> Callback
where
    F: Fn(&EventBus) + Send + Sync + 'static,
{
    let log = log.clone();
    let bus: Weak<EventBus> = Arc::downgrade(bus);
    Callback::free(name, Signature::new(), move |args: &[Value]| {
        log.lock().push((name.to_string(), args.to_vec()));
        if let Some(bus) = bus.upgrade() {
            then(&bus);
        }
    })
}

#[test]
fn test_one_shot_in_the_middle_does_not_skip_neighbours() {
    let (bus, _) = test_bus();
    let log = new_log();
    let first = witness("L1", &log);
    let second = witness("L2", &log);
    let third = witness("L3", &log);
    let tick = ChannelId::from("Tick");

    bus.listen(
        &tick,
        record(&first, "on_tick", Signature::new()),
        SubscribeFlags::NONE,
        vec![],
    );
    bus.listen(
        &tick,
        record(&second, "on_tick", Signature::new()),
        SubscribeFlags::ONE_SHOT,
        vec![],
    );
    bus.listen(
        &tick,
        record(&third, "on_tick", Signature::new()),
        SubscribeFlags::NONE,
        vec![],
    );

    bus.dispatch(&tick, vec![]);
    assert_eq!(names(&log), vec!["L3", "L2", "L1"]);
    assert_eq!(bus.listener_count(&tick), 2);

    log.lock().clear();
    bus.dispatch(&tick, vec![]);
    assert_eq!(names(&log), vec!["L3", "L1"]);
}

#[test]
fn test_nested_dispatch_runs_after_current_dispatch() {
    let (bus, sink) = test_bus();
    let log = new_log();
    let plain = witness("plain", &log);
    let watcher = witness("watcher", &log);
    let healer = witness("healer", &log);

    bus.listen(
        "Tick",
        record(&plain, "on_tick", Signature::new()),
        SubscribeFlags::NONE,
        vec![],
    );
    bus.listen(
        "Tick",
        relay("relay", &log, &bus, |bus| {
            bus.dispatch("Healed", vec![Value::from(5)]);
            assert!(bus.is_draining());
            assert_eq!(bus.pending_commands(), 1);
        }),
        SubscribeFlags::NONE,
        vec![],
    );
    bus.watch(
        "Tick",
        record(&watcher, "seen", Signature::new()),
        SubscribeFlags::NONE,
        vec![],
    );
    bus.listen(
        "Healed",
        record(
            &healer,
            "on_healed",
            Signature::new().param("amount", signalkit_core::ValueType::Int),
        ),
        SubscribeFlags::NONE,
        vec![],
    );

    bus.dispatch("Tick", vec![]);

    assert_eq!(names(&log), vec!["relay", "plain", "watcher", "healer"]);
    assert!(!bus.is_draining());
    assert_eq!(bus.pending_commands(), 0);
    assert!(sink.is_empty());
}

#[test]
fn test_listen_during_dispatch_applies_afterwards() {
    let (bus, _) = test_bus();
    let log = new_log();
    let late = witness("late", &log);
    let tick = ChannelId::from("Tick");

    let late_handle = late.clone();
    bus.listen(
        &tick,
        relay("joiner", &log, &bus, move |bus| {
            bus.listen(
                "Tick",
                record(&late_handle, "on_tick", Signature::new()),
                SubscribeFlags::NONE,
                vec![],
            );
        }),
        SubscribeFlags::ONE_SHOT,
        vec![],
    );

    bus.dispatch(&tick, vec![]);
    assert_eq!(names(&log), vec!["joiner"]);
    assert_eq!(bus.listener_count(&tick), 1);

    bus.dispatch(&tick, vec![]);
    assert_eq!(names(&log), vec!["joiner", "late"]);
}

#[test]
fn test_forget_during_dispatch_applies_afterwards() {
    let (bus, _) = test_bus();
    let log = new_log();
    let victim = witness("victim", &log);
    let tick = ChannelId::from("Tick");

    let target = CallbackIdentity::method(&victim, "on_tick");
    bus.listen(
        &tick,
        record(&victim, "on_tick", Signature::new()),
        SubscribeFlags::NONE,
        vec![],
    );
    bus.listen(
        &tick,
        relay("remover", &log, &bus, move |bus| bus.forget("Tick", target.clone())),
        SubscribeFlags::NONE,
        vec![],
    );

    // The forget is queued, so the victim still hears this dispatch
    bus.dispatch(&tick, vec![]);
    assert_eq!(names(&log), vec!["remover", "victim"]);

    bus.dispatch(&tick, vec![]);
    assert_eq!(names(&log), vec!["remover", "victim", "remover"]);
}

#[test]
fn test_listener_forgetting_itself() {
    let (bus, sink) = test_bus();
    let log = new_log();
    let tick = ChannelId::from("Tick");

    bus.listen(
        &tick,
        relay("self", &log, &bus, |bus| bus.forget("Tick", CallbackIdentity::free("self"))),
        SubscribeFlags::NONE,
        vec![],
    );

    bus.dispatch(&tick, vec![]);
    bus.dispatch(&tick, vec![]);
    assert_eq!(names(&log), vec!["self"]);
    assert_eq!(bus.listener_count(&tick), 0);
    assert!(sink.is_empty());
}

#[test]
fn test_dispatch_chain_keeps_fifo_order() {
    let (bus, _) = test_bus();
    let log = new_log();

    bus.listen(
        "Tick",
        relay("tick", &log, &bus, |bus| {
            bus.dispatch("Healed", vec![Value::from(1)]);
            bus.dispatch("Damaged", vec![Value::from(2), Value::from("b")]);
        }),
        SubscribeFlags::ONE_SHOT,
        vec![],
    );
    let healed = witness("healed", &log);
    let damaged = witness("damaged", &log);
    bus.watch(
        "Healed",
        record(&healed, "seen", Signature::new()),
        SubscribeFlags::NONE,
        vec![],
    );
    bus.watch(
        "Damaged",
        record(&damaged, "seen", Signature::new()),
        SubscribeFlags::NONE,
        vec![],
    );

    bus.dispatch("Tick", vec![]);
    assert_eq!(names(&log), vec!["tick", "healed", "damaged"]);
}

proptest! {
    #[test]
    fn prop_every_listener_runs_once_per_dispatch(
        one_shots in prop::collection::vec(any::<bool>(), 1..12)
    ) {
        let (bus, _) = test_bus();
        let log = new_log();
        let tick = ChannelId::from("Tick");

        let witnesses: Vec<_> = (0..one_shots.len())
            .map(|index| witness(&format!("L{index}"), &log))
            .collect();
        for (target, one_shot) in witnesses.iter().zip(&one_shots) {
            let flags = if *one_shot { SubscribeFlags::ONE_SHOT } else { SubscribeFlags::NONE };
            bus.listen(
                &tick,
                record(target, "on_tick", Signature::new()),
                flags,
                vec![],
            );
        }

        bus.dispatch(&tick, vec![]);
        let expected: Vec<String> = (0..one_shots.len())
            .rev()
            .map(|index| format!("L{index}"))
            .collect();
        prop_assert_eq!(names(&log), expected);

        let survivors = one_shots.iter().filter(|one_shot| !**one_shot).count();
        prop_assert_eq!(bus.listener_count(&tick), survivors);

        log.lock().clear();
        bus.dispatch(&tick, vec![]);
        let expected: Vec<String> = one_shots
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, one_shot)| !**one_shot)
            .map(|(index, _)| format!("L{index}"))
            .collect();
        prop_assert_eq!(names(&log), expected);
    }
}
