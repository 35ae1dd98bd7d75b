//! Aggregate root wrapper that tracks uncommitted events.

use std::ops::Deref;

use event_store::{EventEnvelope, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Wraps an aggregate and records the events raised against it since it
/// was last persisted.
///
/// The root is the unit the repository loads and saves: replay rebuilds
/// the wrapped state from stored envelopes, commands raise new events
/// through [`AggregateRoot::raise`], and a save drains the uncommitted
/// buffer into the event store.
#[derive(Debug)]
pub struct AggregateRoot<A: Aggregate> {
    state: A,
    uncommitted: Vec<A::Event>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Creates a root around a fresh, uninitialized aggregate.
    pub fn new() -> Self {
        Self {
            state: A::default(),
            uncommitted: Vec::new(),
        }
    }

    /// Rebuilds an aggregate by replaying stored event envelopes.
    ///
    /// Envelopes carrying an event type the aggregate does not recognize
    /// (see [`DomainEvent::event_types`]) are skipped with a warning while
    /// still advancing the version, so streams written by newer code
    /// revisions remain loadable. A payload that fails to decode for a
    /// recognized type is a hard error.
    pub fn load_from_history(envelopes: Vec<EventEnvelope>) -> Result<Self, DomainError> {
        let known = A::Event::event_types();
        let mut state = A::default();

        for envelope in envelopes {
            if !known.contains(&envelope.event_type.as_str()) {
                tracing::warn!(
                    aggregate_type = A::aggregate_type(),
                    aggregate_id = %envelope.aggregate_id,
                    event_type = %envelope.event_type,
                    version = envelope.version.as_i64(),
                    "skipping unrecognized event type during replay"
                );
                state.set_version(envelope.version);
                continue;
            }

            let event: A::Event = serde_json::from_value(envelope.payload)?;
            state.apply(event);
            state.set_version(envelope.version);
        }

        Ok(Self {
            state,
            uncommitted: Vec::new(),
        })
    }

    /// Returns the wrapped aggregate state.
    pub fn state(&self) -> &A {
        &self.state
    }

    /// Applies an event to the aggregate and records it as uncommitted.
    pub fn raise(&mut self, event: A::Event) {
        self.state.apply(event.clone());
        self.state.set_version(self.state.version().next());
        self.uncommitted.push(event);
    }

    /// Applies a batch of events in order, recording each as uncommitted.
    pub fn raise_all(&mut self, events: impl IntoIterator<Item = A::Event>) {
        for event in events {
            self.raise(event);
        }
    }

    /// Returns the events raised since the last save.
    pub fn uncommitted_events(&self) -> &[A::Event] {
        &self.uncommitted
    }

    /// Returns true if any events are waiting to be persisted.
    pub fn has_uncommitted_events(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// Clears the uncommitted buffer after a successful save.
    pub fn mark_events_committed(&mut self) {
        self.uncommitted.clear();
    }

    /// The version the event store is expected to hold for this aggregate,
    /// i.e. the current version minus the events not yet persisted.
    pub fn committed_version(&self) -> Version {
        Version::new(self.state.version().as_i64() - self.uncommitted.len() as i64)
    }
}

impl<A: Aggregate> Default for AggregateRoot<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only access to the wrapped aggregate's query methods.
impl<A: Aggregate> Deref for AggregateRoot<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Started { id: AggregateId },
        Incremented { by: i32 },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Started { .. } => "CounterStarted",
                CounterEvent::Incremented { .. } => "CounterIncremented",
            }
        }

        fn event_types() -> &'static [&'static str] {
            &["CounterStarted", "CounterIncremented"]
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        id: Option<AggregateId>,
        total: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter error")]
    struct CounterError;

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Started { id } => self.id = Some(id),
                CounterEvent::Incremented { by } => self.total += by,
            }
        }
    }

    fn envelope(
        aggregate_id: AggregateId,
        version: i64,
        event_type: &str,
        payload: serde_json::Value,
    ) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Counter")
            .event_type(event_type)
            .version(Version::new(version))
            .payload_raw(payload)
            .build()
    }

    #[test]
    fn test_raise_applies_and_buffers() {
        let mut root: AggregateRoot<Counter> = AggregateRoot::new();
        let id = AggregateId::new();

        root.raise(CounterEvent::Started { id });
        root.raise(CounterEvent::Incremented { by: 3 });

        assert_eq!(root.id(), Some(id));
        assert_eq!(root.total, 3);
        assert_eq!(root.version(), Version::new(2));
        assert_eq!(root.uncommitted_events().len(), 2);
        assert_eq!(root.committed_version(), Version::initial());
    }

    #[test]
    fn test_mark_events_committed_clears_buffer() {
        let mut root: AggregateRoot<Counter> = AggregateRoot::new();
        root.raise(CounterEvent::Started {
            id: AggregateId::new(),
        });

        root.mark_events_committed();

        assert!(!root.has_uncommitted_events());
        assert_eq!(root.version(), Version::first());
        assert_eq!(root.committed_version(), Version::first());
    }

    #[test]
    fn test_load_from_history_replays_state() {
        let id = AggregateId::new();
        let envelopes = vec![
            envelope(
                id,
                1,
                "CounterStarted",
                serde_json::json!({"Started": {"id": id}}),
            ),
            envelope(
                id,
                2,
                "CounterIncremented",
                serde_json::json!({"Incremented": {"by": 5}}),
            ),
        ];

        let root: AggregateRoot<Counter> = AggregateRoot::load_from_history(envelopes).unwrap();

        assert_eq!(root.id(), Some(id));
        assert_eq!(root.total, 5);
        assert_eq!(root.version(), Version::new(2));
        assert!(!root.has_uncommitted_events());
    }

    #[test]
    fn test_load_skips_unknown_event_types() {
        let id = AggregateId::new();
        let envelopes = vec![
            envelope(
                id,
                1,
                "CounterStarted",
                serde_json::json!({"Started": {"id": id}}),
            ),
            envelope(
                id,
                2,
                "CounterRenamed",
                serde_json::json!({"Renamed": {"name": "other"}}),
            ),
            envelope(
                id,
                3,
                "CounterIncremented",
                serde_json::json!({"Incremented": {"by": 7}}),
            ),
        ];

        let root: AggregateRoot<Counter> = AggregateRoot::load_from_history(envelopes).unwrap();

        // The unknown event contributes nothing to state but still
        // advances the version.
        assert_eq!(root.total, 7);
        assert_eq!(root.version(), Version::new(3));
    }

    #[test]
    fn test_load_fails_on_corrupt_known_payload() {
        let id = AggregateId::new();
        let envelopes = vec![envelope(
            id,
            1,
            "CounterIncremented",
            serde_json::json!({"Incremented": {"by": "not a number"}}),
        )];

        let result: Result<AggregateRoot<Counter>, _> = AggregateRoot::load_from_history(envelopes);
        assert!(matches!(result, Err(DomainError::Serialization(_))));
    }
}
