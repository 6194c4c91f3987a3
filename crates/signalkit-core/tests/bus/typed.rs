use parking_lot::Mutex;
use signalkit_core::{
    BusError, Callback, Channel, ChannelId, EventBus, RecordingSink, ShapeError, Signature,
    SubscribeFlags, Target, Value, ValueType,
};
use std::sync::Arc;

signalkit_core::channel! {
    /// A goal was scored
    pub Scored in "Match": "A goal was scored" => (u32, String)
}

signalkit_core::channel! {
    pub Whistle in "Match" => ()
}

#[derive(Default)]
struct Scoreboard {
    home: Mutex<Vec<(u32, String)>>,
    whistles: Mutex<usize>,
}

impl Target for Scoreboard {}

fn typed_bus() -> (EventBus, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let bus = EventBus::with_sink(Default::default(), sink.clone());
    bus.register::<Scored>();
    bus.register::<Whistle>();
    (bus, sink)
}

#[test]
fn test_typed_channel_round_trip() {
    let (bus, sink) = typed_bus();
    let board = Arc::new(Scoreboard::default());

    bus.listen(
        Scored::id(),
        Callback::typed::<Scored, _, _>(&board, "on_scored", |board, (points, by)| {
            board.home.lock().push((points, by));
        }),
        SubscribeFlags::NONE,
        vec![],
    );
    bus.listen(
        Whistle::id(),
        Callback::typed::<Whistle, _, _>(&board, "on_whistle", |board, ()| {
            *board.whistles.lock() += 1;
        }),
        SubscribeFlags::ONE_SHOT,
        vec![],
    );

    bus.emit::<Scored>((3, "striker".to_string()));
    bus.emit::<Whistle>(());
    bus.emit::<Whistle>(());

    assert_eq!(*board.home.lock(), vec![(3, "striker".to_string())]);
    assert_eq!(*board.whistles.lock(), 1);
    assert!(sink.is_empty());
}

#[test]
fn test_typed_channel_metadata() {
    let (bus, _) = typed_bus();

    assert_eq!(bus.list_categories(), vec!["Match"]);
    assert_eq!(bus.list_channel_names("Match"), vec!["Scored", "Whistle"]);
    assert_eq!(bus.describe_channel(&Scored::id()), "A goal was scored");

    let descriptor = bus.channel(&Scored::id()).expect("registered");
    assert_eq!(descriptor.signature.params()[0].ty, ValueType::Int);
    assert_eq!(descriptor.signature.params()[1].ty, ValueType::Str);
}

#[test]
fn test_dynamic_listener_on_typed_channel() {
    let (bus, sink) = typed_bus();
    let board = Arc::new(Scoreboard::default());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let ticker_seen = seen.clone();
    bus.listen(
        "Scored",
        Callback::free(
            "ticker",
            Signature::new()
                .param("points", ValueType::Float)
                .param("by", ValueType::Any),
            move |args: &[Value]| ticker_seen.lock().push(args.to_vec()),
        ),
        SubscribeFlags::NONE,
        vec![],
    );
    // Wrong shape for a typed channel is still caught at listen time
    bus.listen(
        Scored::id(),
        Callback::method(
            &board,
            "broken",
            Signature::new().param("points", ValueType::Str),
            |_: &Scoreboard, _| {},
        ),
        SubscribeFlags::NONE,
        vec![],
    );

    bus.emit::<Scored>((1, "keeper".to_string()));

    assert_eq!(
        *seen.lock(),
        vec![vec![Value::Int(1), Value::Str("keeper".to_string())]]
    );
    assert_eq!(bus.listener_count(&ChannelId::from("Scored")), 1);
    assert_eq!(sink.len(), 1);
    assert!(sink.reports()[0].is_parameter_mismatch());
}

#[test]
fn test_undecodable_arguments_keep_one_shot() {
    let (bus, sink) = typed_bus();
    let board = Arc::new(Scoreboard::default());

    bus.listen(
        Scored::id(),
        Callback::typed::<Scored, _, _>(&board, "on_scored", |board, (points, by)| {
            board.home.lock().push((points, by));
        }),
        SubscribeFlags::ONE_SHOT,
        vec![],
    );

    // An int passes the shape check but has no u32 form
    bus.dispatch("Scored", vec![Value::from(-1), Value::from("own goal")]);

    assert!(board.home.lock().is_empty());
    assert_eq!(bus.listener_count(&Scored::id()), 1);
    assert_eq!(sink.len(), 1);
    assert!(matches!(
        &sink.reports()[0],
        BusError::ParameterMismatch {
            reason: ShapeError::Undecodable { .. },
            ..
        }
    ));

    bus.emit::<Scored>((2, "winger".to_string()));

    assert_eq!(*board.home.lock(), vec![(2, "winger".to_string())]);
    assert_eq!(bus.listener_count(&Scored::id()), 0);
    assert_eq!(sink.len(), 1);
}
