//! Repository for loading and saving event-sourced aggregates.

use std::marker::PhantomData;

use common::{AggregateId, CorrelationId};
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;
use crate::root::AggregateRoot;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate root after applying and persisting the new events.
    pub aggregate: AggregateRoot<A>,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Repository mediating between aggregates and the event store.
///
/// The repository is responsible for:
/// 1. Loading the aggregate root by replaying its stored events
/// 2. Executing the command to produce events
/// 3. Persisting the events with optimistic concurrency control
pub struct AggregateRepository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> AggregateRepository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new repository backed by the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate root from the event store.
    ///
    /// If no events exist, returns a root around a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<AggregateRoot<A>, DomainError> {
        let envelopes = self.store.events_for_aggregate(aggregate_id).await?;
        AggregateRoot::load_from_history(envelopes)
    }

    /// Loads an aggregate root, returning None if it doesn't exist.
    pub async fn load_existing(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Option<AggregateRoot<A>>, DomainError> {
        let root = self.load(aggregate_id).await?;
        if root.id().is_some() {
            Ok(Some(root))
        } else {
            Ok(None)
        }
    }

    /// Persists the root's uncommitted events.
    ///
    /// The expected store version is the root's version minus the events
    /// still in the uncommitted buffer, so a concurrent writer that got in
    /// first surfaces as [`event_store::EventStoreError::ConcurrencyConflict`].
    /// On success the buffer is cleared.
    pub async fn save(
        &self,
        aggregate_id: AggregateId,
        root: &mut AggregateRoot<A>,
        correlation_id: Option<CorrelationId>,
    ) -> Result<Version, DomainError> {
        if !root.has_uncommitted_events() {
            return Ok(root.version());
        }

        let expected = root.committed_version();
        let envelopes = Self::build_envelopes(
            aggregate_id,
            expected,
            root.uncommitted_events(),
            correlation_id,
        )?;

        let options = if expected == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(expected)
        };

        let new_version = self.store.append(envelopes, options).await?;
        root.mark_events_committed();

        Ok(new_version)
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        correlation_id: Option<CorrelationId>,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut root = self.load(aggregate_id).await?;

        let events = command_fn(root.state())?;

        if events.is_empty() {
            let new_version = root.version();
            return Ok(CommandResult {
                aggregate: root,
                events: vec![],
                new_version,
            });
        }

        root.raise_all(events.iter().cloned());
        let new_version = self.save(aggregate_id, &mut root, correlation_id).await?;

        Ok(CommandResult {
            aggregate: root,
            events,
            new_version,
        })
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
        correlation_id: Option<CorrelationId>,
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let mut builder = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?;
            if let Some(correlation_id) = &correlation_id {
                builder = builder.correlation_id(correlation_id.clone());
            }
            envelopes.push(builder.build());
        }

        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{EventStoreError, InMemoryEventStore};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Created { name: String },
        Updated { value: i32 },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestCreated",
                TestEvent::Updated { .. } => "TestUpdated",
            }
        }

        fn event_types() -> &'static [&'static str] {
            &["TestCreated", "TestUpdated"]
        }
    }

    #[derive(Debug, Default, Clone)]
    struct TestAggregate {
        id: Option<AggregateId>,
        name: String,
        value: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("invalid value: {0}")]
        InvalidValue(i32),
    }

    impl Aggregate for TestAggregate {
        type Event = TestEvent;
        type Error = TestError;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
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
                TestEvent::Created { name } => {
                    if self.id.is_none() {
                        self.id = Some(AggregateId::new());
                    }
                    self.name = name;
                }
                TestEvent::Updated { value } => {
                    self.value = value;
                }
            }
        }
    }

    impl From<TestError> for DomainError {
        fn from(e: TestError) -> Self {
            DomainError::AggregateNotFound {
                aggregate_type: "TestAggregate",
                aggregate_id: format!("{:?}", e),
            }
        }
    }

    #[tokio::test]
    async fn test_execute_creates_aggregate() {
        let store = InMemoryEventStore::new();
        let repository: AggregateRepository<_, TestAggregate> = AggregateRepository::new(store);
        let aggregate_id = AggregateId::new();

        let result = repository
            .execute(aggregate_id, None, |_agg| {
                Ok(vec![TestEvent::Created {
                    name: "Test".to_string(),
                }])
            })
            .await
            .unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_version, Version::first());
        assert!(result.aggregate.id().is_some());
        assert_eq!(result.aggregate.name, "Test");
        assert!(!result.aggregate.has_uncommitted_events());
    }

    #[tokio::test]
    async fn test_execute_updates_aggregate() {
        let store = InMemoryEventStore::new();
        let repository: AggregateRepository<_, TestAggregate> = AggregateRepository::new(store);
        let aggregate_id = AggregateId::new();

        repository
            .execute(aggregate_id, None, |_| {
                Ok(vec![TestEvent::Created {
                    name: "Test".to_string(),
                }])
            })
            .await
            .unwrap();

        let result = repository
            .execute(aggregate_id, None, |_| {
                Ok(vec![TestEvent::Updated { value: 42 }])
            })
            .await
            .unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.value, 42);
    }

    #[tokio::test]
    async fn test_execute_returns_error_on_invalid_command() {
        let store = InMemoryEventStore::new();
        let repository: AggregateRepository<_, TestAggregate> = AggregateRepository::new(store);
        let aggregate_id = AggregateId::new();

        let result = repository
            .execute(aggregate_id, None, |_| Err(TestError::InvalidValue(-1)))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_existing_returns_none_for_new() {
        let store = InMemoryEventStore::new();
        let repository: AggregateRepository<_, TestAggregate> = AggregateRepository::new(store);
        let aggregate_id = AggregateId::new();

        let result = repository.load_existing(aggregate_id).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_load_existing_returns_some_for_existing() {
        let store = InMemoryEventStore::new();
        let repository: AggregateRepository<_, TestAggregate> = AggregateRepository::new(store);
        let aggregate_id = AggregateId::new();

        repository
            .execute(aggregate_id, None, |_| {
                Ok(vec![TestEvent::Created {
                    name: "Test".to_string(),
                }])
            })
            .await
            .unwrap();

        let result = repository.load_existing(aggregate_id).await.unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().name, "Test");
    }

    #[tokio::test]
    async fn test_empty_events_returns_without_persisting() {
        let store = InMemoryEventStore::new();
        let repository: AggregateRepository<_, TestAggregate> =
            AggregateRepository::new(store.clone());
        let aggregate_id = AggregateId::new();

        let result = repository
            .execute(aggregate_id, None, |_| Ok(vec![]))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_stale_root_save_conflicts_until_reload() {
        let store = InMemoryEventStore::new();
        let repository: AggregateRepository<_, TestAggregate> =
            AggregateRepository::new(store.clone());
        let aggregate_id = AggregateId::new();

        repository
            .execute(aggregate_id, None, |_| {
                Ok(vec![TestEvent::Created {
                    name: "Test".to_string(),
                }])
            })
            .await
            .unwrap();

        // Two sessions load the same version.
        let mut first = repository.load(aggregate_id).await.unwrap();
        let mut second = repository.load(aggregate_id).await.unwrap();

        first.raise(TestEvent::Updated { value: 1 });
        repository
            .save(aggregate_id, &mut first, None)
            .await
            .unwrap();

        // The loser's save reports the conflict with both versions.
        second.raise(TestEvent::Updated { value: 2 });
        let err = repository
            .save(aggregate_id, &mut second, None)
            .await
            .unwrap_err();
        match err {
            DomainError::EventStore(EventStoreError::ConcurrencyConflict {
                expected,
                actual,
                ..
            }) => {
                assert_eq!(expected, Version::first());
                assert_eq!(actual, Version::new(2));
            }
            other => panic!("expected concurrency conflict, got {other:?}"),
        }

        // After a reload the same change goes through.
        let mut reloaded = repository.load(aggregate_id).await.unwrap();
        reloaded.raise(TestEvent::Updated { value: 2 });
        let version = repository
            .save(aggregate_id, &mut reloaded, None)
            .await
            .unwrap();
        assert_eq!(version, Version::new(3));
    }

    #[tokio::test]
    async fn test_correlation_id_stamped_on_envelopes() {
        let store = InMemoryEventStore::new();
        let repository: AggregateRepository<_, TestAggregate> =
            AggregateRepository::new(store.clone());
        let aggregate_id = AggregateId::new();
        let correlation = CorrelationId::from_string("order-batch-17");

        repository
            .execute(aggregate_id, Some(correlation.clone()), |_| {
                Ok(vec![TestEvent::Created {
                    name: "Test".to_string(),
                }])
            })
            .await
            .unwrap();

        let envelopes = store.events_for_aggregate(aggregate_id).await.unwrap();
        assert_eq!(envelopes[0].correlation_id, Some(correlation));
    }

    #[tokio::test]
    async fn test_reloaded_state_matches_live_state() {
        let store = InMemoryEventStore::new();
        let repository: AggregateRepository<_, TestAggregate> = AggregateRepository::new(store);
        let aggregate_id = AggregateId::new();

        repository
            .execute(aggregate_id, None, |_| {
                Ok(vec![
                    TestEvent::Created {
                        name: "Test".to_string(),
                    },
                    TestEvent::Updated { value: 7 },
                ])
            })
            .await
            .unwrap();
        let live = repository
            .execute(aggregate_id, None, |_| {
                Ok(vec![TestEvent::Updated { value: 11 }])
            })
            .await
            .unwrap();

        let reloaded = repository.load(aggregate_id).await.unwrap();
        assert_eq!(reloaded.name, live.aggregate.name);
        assert_eq!(reloaded.value, live.aggregate.value);
        assert_eq!(reloaded.version(), live.aggregate.version());
    }
}
