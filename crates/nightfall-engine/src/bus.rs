//! In-process event bus.
//!
//! Every user-visible occurrence in a match is published here. Observers
//! either register a synchronous handler per channel, which runs during
//! `publish`, or take a [`broadcast`] receiver from [`EventBus::stream`].
//! The bus keeps a bounded history for late readers.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};

use nightfall_protocol::{EventChannel, EventMetadata, GameEvent, ParticipantId, Team};
use tokio::sync::broadcast;
use tracing::{error, trace, warn};

use crate::ObserverError;

/// Synchronous per-channel observer.
pub type EventHandler = Arc<dyn Fn(&GameEvent) -> Result<(), ObserverError> + Send + Sync>;

/// Returned by [`EventBus::on`]; pass it to [`EventBus::off`] to remove
/// the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Events kept for [`EventBus::history`].
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Default `limit` for history queries.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

const STREAM_CAPACITY: usize = 256;

struct BusInner {
    handlers: HashMap<EventChannel, Vec<(HandlerId, EventHandler)>>,
    subscribers: HashMap<EventChannel, BTreeSet<ParticipantId>>,
    history: VecDeque<GameEvent>,
    capacity: usize,
    next_seq: u64,
    next_handler: u64,
}

/// Fan-out of [`GameEvent`]s to handlers, a broadcast stream, and history.
///
/// Handlers are called outside the bus lock, so a handler may publish or
/// query history without deadlocking. A handler that returns an error or
/// panics is logged and skipped; the others still run.
pub struct EventBus {
    inner: Mutex<BusInner>,
    stream: broadcast::Sender<GameEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("EventBus")
            .field("history", &inner.history.len())
            .field("capacity", &inner.capacity)
            .field("next_seq", &inner.next_seq)
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// A bus that keeps at most `capacity` events of history.
    pub fn with_capacity(capacity: usize) -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            inner: Mutex::new(BusInner {
                handlers: HashMap::new(),
                subscribers: HashMap::new(),
                history: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
                capacity,
                next_seq: 1,
                next_handler: 1,
            }),
            stream,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- observers ----------------------------------------------------------

    /// Registers `handler` for events on `channel`.
    pub fn on<F>(&self, channel: EventChannel, handler: F) -> HandlerId
    where
        F: Fn(&GameEvent) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        let mut inner = self.lock();
        let id = HandlerId(inner.next_handler);
        inner.next_handler += 1;
        inner
            .handlers
            .entry(channel)
            .or_default()
            .push((id, handler));
        id
    }

    pub fn off(&self, channel: EventChannel, id: HandlerId) -> bool {
        let mut inner = self.lock();
        let Some(handlers) = inner.handlers.get_mut(&channel) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        handlers.len() != before
    }

    /// A receiver for every event published from now on.
    pub fn stream(&self) -> broadcast::Receiver<GameEvent> {
        self.stream.subscribe()
    }

    // -- subscriptions ------------------------------------------------------

    /// Adds `participant` to the default recipients of `channel`.
    pub fn subscribe(&self, channel: EventChannel, participant: ParticipantId) -> bool {
        self.lock()
            .subscribers
            .entry(channel)
            .or_default()
            .insert(participant)
    }

    pub fn unsubscribe(&self, channel: EventChannel, participant: &ParticipantId) -> bool {
        self.lock()
            .subscribers
            .get_mut(&channel)
            .is_some_and(|s| s.remove(participant))
    }

    pub fn subscribers(&self, channel: EventChannel) -> Vec<ParticipantId> {
        self.lock()
            .subscribers
            .get(&channel)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    // -- publishing ---------------------------------------------------------

    /// Publishes an event and returns it with its sequence number.
    ///
    /// `recipients` defaults to the channel's subscribers.
    pub fn publish(
        &self,
        channel: EventChannel,
        message: impl Into<String>,
        recipients: Option<Vec<ParticipantId>>,
        metadata: Option<EventMetadata>,
    ) -> GameEvent {
        let (event, handlers) = {
            let mut inner = self.lock();
            let recipients = recipients.unwrap_or_else(|| {
                inner
                    .subscribers
                    .get(&channel)
                    .map(|s| s.iter().cloned().collect())
                    .unwrap_or_default()
            });
            let event = GameEvent {
                seq: inner.next_seq,
                channel,
                message: message.into(),
                recipients,
                metadata,
            };
            inner.next_seq += 1;

            if inner.capacity > 0 {
                while inner.history.len() >= inner.capacity {
                    inner.history.pop_front();
                }
                inner.history.push_back(event.clone());
            }

            let handlers: Vec<EventHandler> = inner
                .handlers
                .get(&channel)
                .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default();
            (event, handlers)
        };

        trace!(seq = event.seq, %channel, message = %event.message, "event published");

        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(seq = event.seq, %channel, error = %e, "event handler failed"),
                Err(_) => error!(seq = event.seq, %channel, "event handler panicked"),
            }
        }

        // No receivers is the normal case.
        let _ = self.stream.send(event.clone());
        event
    }

    /// Publishes `message` on the private channel to one participant.
    pub fn send_private(&self, message: impl Into<String>, recipient: &ParticipantId) -> GameEvent {
        self.publish(
            EventChannel::Private,
            message,
            Some(vec![recipient.clone()]),
            None,
        )
    }

    /// Publishes `message` on `team`'s channel to `members`.
    pub fn send_team(
        &self,
        message: impl Into<String>,
        team: Team,
        members: Vec<ParticipantId>,
    ) -> GameEvent {
        self.publish(EventChannel::Team(team), message, Some(members), None)
    }

    // -- history ------------------------------------------------------------

    /// The most recent `limit` events, oldest first, optionally filtered
    /// by channel and by recipient.
    pub fn history(
        &self,
        channel: Option<EventChannel>,
        recipient: Option<&ParticipantId>,
        limit: usize,
    ) -> Vec<GameEvent> {
        let inner = self.lock();
        let mut matching: Vec<GameEvent> = inner
            .history
            .iter()
            .rev()
            .filter(|e| channel.is_none_or(|c| e.channel == c))
            .filter(|e| recipient.is_none_or(|r| e.is_addressed_to(r)))
            .take(limit)
            .cloned()
            .collect();
        matching.reverse();
        matching
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// Drops the history. Sequence numbers keep counting.
    pub fn clear_history(&self) {
        self.lock().history.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nightfall_protocol::Phase;

    use super::*;

    fn counter(bus: &EventBus, channel: EventChannel) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        bus.on(channel, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        count
    }

    #[test]
    fn test_publish_assigns_increasing_seq() {
        let bus = EventBus::new();
        let a = bus.publish(EventChannel::System, "one", None, None);
        let b = bus.publish(EventChannel::Vote, "two", None, None);
        assert_eq!(a.seq, 1);
        assert_eq!(b.seq, 2);
    }

    #[test]
    fn test_handlers_only_see_their_channel() {
        let bus = EventBus::new();
        let system = counter(&bus, EventChannel::System);
        let votes = counter(&bus, EventChannel::Vote);

        bus.publish(EventChannel::System, "a", None, None);
        bus.publish(EventChannel::System, "b", None, None);
        bus.publish(EventChannel::Vote, "c", None, None);

        assert_eq!(system.load(Ordering::SeqCst), 2);
        assert_eq!(votes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_and_panicking_handlers_are_isolated() {
        let bus = EventBus::new();
        bus.on(EventChannel::System, |_| Err(ObserverError("nope".into())));
        bus.on(EventChannel::System, |_| panic!("observer bug"));
        let after = counter(&bus, EventChannel::System);

        let event = bus.publish(EventChannel::System, "still delivered", None, None);

        assert_eq!(event.seq, 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert_eq!(bus.history_len(), 1);
    }

    #[test]
    fn test_off_removes_handler() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let id = bus.on(EventChannel::Exile, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(EventChannel::Exile, "x", None, None);
        assert!(bus.off(EventChannel::Exile, id));
        assert!(!bus.off(EventChannel::Exile, id));
        bus.publish(EventChannel::Exile, "y", None, None);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_publish_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.on(EventChannel::Vote, move |e| {
            inner.publish(EventChannel::System, format!("echo {}", e.message), None, None);
            Ok(())
        });

        bus.publish(EventChannel::Vote, "p1 votes p2", None, None);

        let echoed = bus.history(Some(EventChannel::System), None, 10);
        assert_eq!(echoed.len(), 1);
        assert_eq!(echoed[0].message, "echo p1 votes p2");
    }

    #[test]
    fn test_subscribers_are_default_recipients() {
        let bus = EventBus::new();
        assert!(bus.subscribe(EventChannel::System, "p1".into()));
        assert!(!bus.subscribe(EventChannel::System, "p1".into()));
        bus.subscribe(EventChannel::System, "p2".into());

        let event = bus.publish(EventChannel::System, "hello", None, None);
        assert_eq!(event.recipients, [ParticipantId::from("p1"), ParticipantId::from("p2")]);

        assert!(bus.unsubscribe(EventChannel::System, &"p1".into()));
        let event = bus.publish(EventChannel::System, "again", None, None);
        assert_eq!(event.recipients, [ParticipantId::from("p2")]);

        let explicit = bus.publish(EventChannel::System, "to p9", Some(vec!["p9".into()]), None);
        assert_eq!(explicit.recipients, [ParticipantId::from("p9")]);
    }

    #[test]
    fn test_private_and_team_channels() {
        let bus = EventBus::new();
        let private = bus.send_private("p3 => wolf (wolf)", &"seer".into());
        assert_eq!(private.channel, EventChannel::Private);
        assert!(private.is_addressed_to(&"seer".into()));

        let team = bus.send_team("w1 has fallen", Team::Wolf, vec!["w2".into(), "w3".into()]);
        assert_eq!(team.channel.name(), "team_wolf");
        assert_eq!(team.recipients.len(), 2);
    }

    #[test]
    fn test_history_is_bounded_and_filterable() {
        let bus = EventBus::with_capacity(3);
        for i in 0..5 {
            bus.publish(EventChannel::System, format!("e{i}"), None, None);
        }
        bus.send_private("secret", &"p1".into());

        let all = bus.history(None, None, DEFAULT_HISTORY_LIMIT);
        let messages: Vec<_> = all.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["e3", "e4", "secret"]);

        let for_p1 = bus.history(None, Some(&"p1".into()), 10);
        assert_eq!(for_p1.len(), 1);

        let last_system = bus.history(Some(EventChannel::System), None, 1);
        assert_eq!(last_system[0].message, "e4");

        bus.clear_history();
        assert_eq!(bus.history_len(), 0);
        assert_eq!(bus.publish(EventChannel::System, "next", None, None).seq, 7);
    }

    #[tokio::test]
    async fn test_stream_receives_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.stream();
        let meta = EventMetadata::phase_change(Phase::Night, 1, 5_000);
        bus.publish(EventChannel::PhaseChange, "Entering night", None, Some(meta.clone()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.channel, EventChannel::PhaseChange);
        assert_eq!(event.metadata, Some(meta));
    }
}
