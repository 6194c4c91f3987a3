use parking_lot::Mutex;
use signalkit_core::{
    BusError, ChannelId, DeferredCall, Scheduler, Signature, SubscribeFlags, Target, Value,
    ValueType,
};
use std::sync::Arc;

use super::support::{damage_params, names, new_log, witness, record, test_bus};

#[test]
fn test_dispatch_reaches_every_listener_once() {
    let (bus, sink) = test_bus();
    let log = new_log();
    let hud = witness("hud", &log);
    let audio = witness("audio", &log);
    let stats = witness("stats", &log);

    bus.listen(
        "Damaged",
        record(&hud, "on_damaged", damage_params()),
        SubscribeFlags::NONE,
        vec![],
    );
    bus.listen(
        "Damaged",
        record(&audio, "on_damaged", damage_params()),
        SubscribeFlags::NONE,
        vec![],
    );
    bus.listen(
        "Damaged",
        record(&stats, "on_damaged", damage_params().param("slot", ValueType::Int)),
        SubscribeFlags::NONE,
        vec![Value::from(7)],
    );

    bus.dispatch("Damaged", vec![Value::from(5), Value::from("trap")]);

    let mut calls = log.lock().clone();
    calls.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        calls,
        vec![
            ("audio".to_string(), vec![Value::from(5), Value::from("trap")]),
            ("hud".to_string(), vec![Value::from(5), Value::from("trap")]),
            (
                "stats".to_string(),
                vec![Value::from(5), Value::from("trap"), Value::from(7)]
            ),
        ]
    );
    assert!(sink.is_empty());
}

#[test]
fn test_one_shot_listener_is_removed() {
    let (bus, _) = test_bus();
    let log = new_log();
    let once = witness("once", &log);
    let always = witness("always", &log);
    let damaged = ChannelId::from("Damaged");

    bus.listen(
        &damaged,
        record(&once, "on_damaged", damage_params()),
        SubscribeFlags::ONE_SHOT,
        vec![],
    );
    bus.listen(
        &damaged,
        record(&always, "on_damaged", damage_params()),
        SubscribeFlags::NONE,
        vec![],
    );

    bus.dispatch(&damaged, vec![Value::from(1), Value::from("a")]);
    assert_eq!(bus.listener_count(&damaged), 1);

    bus.dispatch(&damaged, vec![Value::from(2), Value::from("b")]);
    assert_eq!(names(&log), vec!["always", "once", "always"]);
}

#[test]
fn test_watcher_receives_only_bound_arguments() {
    let (bus, sink) = test_bus();
    let log = new_log();
    let hud = witness("hud", &log);
    let blinker = witness("blinker", &log);

    bus.watch(
        "Damaged",
        record(&blinker, "blink", Signature::new().param("tag", ValueType::Str)),
        SubscribeFlags::NONE,
        vec![Value::from("x")],
    );
    bus.listen(
        "Damaged",
        record(&hud, "on_damaged", damage_params()),
        SubscribeFlags::NONE,
        vec![],
    );

    bus.dispatch("Damaged", vec![Value::from(3), Value::from("spikes")]);

    // Listeners first, then watchers
    assert_eq!(
        log.lock().clone(),
        vec![
            ("hud".to_string(), vec![Value::from(3), Value::from("spikes")]),
            ("blinker".to_string(), vec![Value::from("x")]),
        ]
    );
    assert!(sink.is_empty());
}

#[test]
fn test_watcher_is_not_checked_against_channel_signature() {
    let (bus, sink) = test_bus();
    let log = new_log();
    let counter = witness("counter", &log);
    let damaged = ChannelId::from("Damaged");

    bus.watch(
        &damaged,
        record(&counter, "count", Signature::new()),
        SubscribeFlags::NONE,
        vec![],
    );
    assert_eq!(bus.watcher_count(&damaged), 1);

    bus.dispatch(&damaged, vec![Value::from(3), Value::from("spikes")]);
    assert_eq!(log.lock().clone(), vec![("counter".to_string(), vec![])]);
    assert!(sink.is_empty());
}

#[test]
fn test_listen_with_too_many_params_is_rejected() {
    let (bus, sink) = test_bus();
    let log = new_log();
    let hud = witness("hud", &log);
    let damaged = ChannelId::from("Damaged");

    bus.listen(
        &damaged,
        record(
            &hud,
            "on_damaged",
            damage_params().param("critical", ValueType::Bool),
        ),
        SubscribeFlags::NONE,
        vec![],
    );

    assert_eq!(bus.listener_count(&damaged), 0);
    let reports = sink.drain();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_parameter_mismatch());
    assert_eq!(reports[0].channel(), &damaged);

    bus.dispatch(&damaged, vec![Value::from(1), Value::from("a")]);
    assert!(log.lock().is_empty());
}

#[test]
fn test_listen_with_wrong_type_is_rejected() {
    let (bus, sink) = test_bus();
    let log = new_log();
    let hud = witness("hud", &log);

    bus.listen(
        "Healed",
        record(&hud, "on_healed", Signature::new().param("amount", ValueType::Str)),
        SubscribeFlags::NONE,
        vec![],
    );

    assert_eq!(bus.listener_count(&ChannelId::from("Healed")), 0);
    match sink.drain().as_slice() {
        [BusError::ParameterMismatch { entry, .. }] => assert_eq!(entry, "on_healed"),
        other => panic!("unexpected reports: {other:?}"),
    }
}

#[test]
fn test_bad_dispatch_arguments_skip_listener_only() {
    let (bus, sink) = test_bus();
    let log = new_log();
    let hud = witness("hud", &log);
    let watcher = witness("watcher", &log);

    bus.listen(
        "Healed",
        record(
            &hud,
            "on_healed",
            Signature::new().param("amount", ValueType::Int),
        ),
        SubscribeFlags::ONE_SHOT,
        vec![],
    );
    bus.watch(
        "Healed",
        record(&watcher, "seen", Signature::new()),
        SubscribeFlags::NONE,
        vec![],
    );

    bus.dispatch("Healed", vec![Value::from("lots")]);

    // Listener rejected the call and stays subscribed; the watcher still ran
    assert_eq!(names(&log), vec!["watcher"]);
    assert_eq!(bus.listener_count(&ChannelId::from("Healed")), 1);
    assert_eq!(sink.len(), 1);
    assert!(sink.reports()[0].is_parameter_mismatch());
}

struct Animator {
    clips: Mutex<Vec<String>>,
}

impl Target for Animator {
    fn accepts_deferred(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct FrameQueue {
    calls: Mutex<Vec<DeferredCall>>,
}

impl Scheduler for FrameQueue {
    fn defer(&self, call: DeferredCall) {
        self.calls.lock().push(call);
    }
}

impl FrameQueue {
    fn run(&self) -> usize {
        let calls: Vec<DeferredCall> = self.calls.lock().drain(..).collect();
        let count = calls.len();
        for call in calls {
            call();
        }
        count
    }
}

fn play(animator: &Arc<Animator>) -> signalkit_core::Callback {
    signalkit_core::Callback::method(
        animator,
        "play",
        Signature::new().param("clip", ValueType::Str),
        |animator: &Animator, args: &[Value]| {
            if let Some(clip) = args.first().and_then(Value::as_str) {
                animator.clips.lock().push(clip.to_string());
            }
        },
    )
}

#[test]
fn test_deferred_watcher_runs_on_host_schedule() {
    let (bus, _) = test_bus();
    let frames = Arc::new(FrameQueue::default());
    bus.set_scheduler(frames.clone());

    let animator = Arc::new(Animator {
        clips: Mutex::new(Vec::new()),
    });
    bus.watch(
        "Damaged",
        play(&animator),
        SubscribeFlags::DEFERRED,
        vec![Value::from("flinch")],
    );

    bus.dispatch("Damaged", vec![Value::from(1), Value::from("a")]);
    assert!(animator.clips.lock().is_empty());

    assert_eq!(frames.run(), 1);
    assert_eq!(*animator.clips.lock(), vec!["flinch"]);
}

#[test]
fn test_deferred_without_scheduler_runs_inline() {
    let (bus, _) = test_bus();
    let animator = Arc::new(Animator {
        clips: Mutex::new(Vec::new()),
    });
    bus.watch(
        "Tick",
        play(&animator),
        SubscribeFlags::DEFERRED,
        vec![Value::from("idle")],
    );

    bus.dispatch("Tick", vec![]);
    assert_eq!(*animator.clips.lock(), vec!["idle"]);
}

#[test]
fn test_animation_player_pattern() {
    let (bus, sink) = test_bus();
    let animator = Arc::new(Animator {
        clips: Mutex::new(Vec::new()),
    });

    // Set up: one clip per trigger channel
    bus.watch(
        "Damaged",
        play(&animator),
        SubscribeFlags::NONE,
        vec![Value::from("hurt")],
    );
    bus.watch(
        "Healed",
        play(&animator),
        SubscribeFlags::NONE,
        vec![Value::from("glow")],
    );

    bus.dispatch("Healed", vec![Value::from(10)]);
    bus.dispatch("Damaged", vec![Value::from(4), Value::from("trap")]);

    // Tear down
    let identity = signalkit_core::CallbackIdentity::method(&animator, "play");
    bus.forget("Damaged", identity.clone());
    bus.forget("Healed", identity);

    bus.dispatch("Damaged", vec![Value::from(4), Value::from("trap")]);
    assert_eq!(*animator.clips.lock(), vec!["glow", "hurt"]);
    assert_eq!(bus.watcher_count(&ChannelId::from("Damaged")), 0);
    assert!(sink.is_empty());
}
