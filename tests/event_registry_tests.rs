//! Event registry behavior: registration bookkeeping, short-circuit on
//! executing, and full notification on executed.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use databus::{
    BusError, Command, CommandBus, CommandEvent, CommandExecutor, EventRegistry,
    ExecutionContext, Result, Scope,
};

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct Notify {
    result: Option<u64>,
}

impl Command for Notify {
    type Output = u64;
}

#[derive(Default)]
struct NotifyExecutor;

#[async_trait]
impl CommandExecutor<Notify> for NotifyExecutor {
    fn name(&self) -> &'static str {
        "notify_executor"
    }

    async fn execute(&self, _ctx: &ExecutionContext, command: &mut Notify) -> Result<()> {
        command.result = Some(1);
        Ok(())
    }
}

struct Subscriber {
    recorder: Recorder,
    label: &'static str,
    veto: bool,
}

impl Subscriber {
    fn passing(recorder: &Recorder, label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            recorder: recorder.clone(),
            label,
            veto: false,
        })
    }

    fn vetoing(recorder: &Recorder, label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            recorder: recorder.clone(),
            label,
            veto: true,
        })
    }
}

impl CommandEvent<Notify> for Subscriber {
    fn name(&self) -> &'static str {
        self.label
    }

    fn on_executing(&self, _ctx: &ExecutionContext, _command: &mut Notify) -> bool {
        self.recorder.push(format!("executing:{}", self.label));
        !self.veto
    }

    fn on_executed(&self, _ctx: &ExecutionContext, _command: &mut Notify, fault: Option<&BusError>) {
        let outcome = if fault.is_some() { "fault" } else { "ok" };
        self.recorder
            .push(format!("executed:{}:{}", self.label, outcome));
    }
}

fn bus_with_events(events: &Arc<EventRegistry>) -> CommandBus {
    CommandBus::builder()
        .events(Arc::clone(events))
        .register::<Notify, _>(NotifyExecutor)
        .build()
}

#[test]
fn test_registration_bookkeeping() {
    let registry = EventRegistry::new();
    let recorder = Recorder::default();

    let first = Subscriber::passing(&recorder, "first");
    let second = Subscriber::passing(&recorder, "second");

    registry.register::<Notify>(first.clone());
    registry.register::<Notify>(second.clone());
    assert_eq!(registry.subscriber_count::<Notify>(), 2);

    assert!(registry.unregister::<Notify>(&(first.clone() as Arc<dyn CommandEvent<Notify>>)));
    assert_eq!(registry.subscriber_count::<Notify>(), 1);

    // Unregistering twice is a no-op.
    assert!(!registry.unregister::<Notify>(&(first as Arc<dyn CommandEvent<Notify>>)));

    assert_eq!(registry.unregister_all::<Notify>(), 1);
    assert_eq!(registry.subscriber_count::<Notify>(), 0);
}

#[tokio::test]
async fn test_zero_subscribers_is_normal() {
    let events = Arc::new(EventRegistry::new());
    let bus = bus_with_events(&events);

    let done = bus
        .dispatch(&Scope::new(), Notify { result: None })
        .await
        .unwrap();
    assert_eq!(done.result, Some(1));
}

#[tokio::test]
async fn test_subscribers_run_in_registration_order() {
    let events = Arc::new(EventRegistry::new());
    let recorder = Recorder::default();

    events.register::<Notify>(Subscriber::passing(&recorder, "first"));
    events.register::<Notify>(Subscriber::passing(&recorder, "second"));

    let bus = bus_with_events(&events);
    let _ = bus
        .dispatch(&Scope::new(), Notify { result: None })
        .await
        .unwrap();

    assert_eq!(
        recorder.entries(),
        vec![
            "executing:first",
            "executing:second",
            "executed:first:ok",
            "executed:second:ok",
        ]
    );
}

#[tokio::test]
async fn test_executing_stops_at_first_veto_but_executed_notifies_all() {
    let events = Arc::new(EventRegistry::new());
    let recorder = Recorder::default();

    events.register::<Notify>(Subscriber::vetoing(&recorder, "first"));
    events.register::<Notify>(Subscriber::passing(&recorder, "second"));

    let bus = bus_with_events(&events);
    let done = bus
        .dispatch(&Scope::new(), Notify { result: None })
        .await
        .unwrap();

    // Vetoed: the executor never wrote the result slot.
    assert_eq!(done.result, None);
    assert_eq!(
        recorder.entries(),
        vec![
            "executing:first",
            "executed:first:ok",
            "executed:second:ok",
        ]
    );
}

#[tokio::test]
async fn test_unregistered_subscriber_no_longer_notified() {
    let events = Arc::new(EventRegistry::new());
    let recorder = Recorder::default();

    let transient = Subscriber::passing(&recorder, "transient");
    events.register::<Notify>(transient.clone());
    events.register::<Notify>(Subscriber::passing(&recorder, "stable"));
    events.unregister::<Notify>(&(transient as Arc<dyn CommandEvent<Notify>>));

    let bus = bus_with_events(&events);
    let _ = bus
        .dispatch(&Scope::new(), Notify { result: None })
        .await
        .unwrap();

    assert_eq!(
        recorder.entries(),
        vec!["executing:stable", "executed:stable:ok"]
    );
}
