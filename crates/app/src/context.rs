//! Dependency wiring with an explicit lifecycle.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use domain::{InventoryService, OrderService};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use saga::{
    InMemoryNotificationService, InMemoryPaymentGateway, InMemorySagaRepository,
    InMemoryShippingProvider, NotificationService, PaymentGateway, PostgresSagaRepository,
    SagaOrchestrator, SagaRepository, SagaServices, ShippingProvider, handler_registry,
};

use crate::config::AppConfig;
use crate::error::AppError;

/// Everything the application needs, wired once and passed around by
/// reference. There is no global state; dropping the context (after
/// [`AppContext::shutdown`]) tears the system down.
pub struct AppContext<S: EventStore + Clone + 'static, R: SagaRepository + 'static> {
    pub store: S,
    pub orders: Arc<OrderService<S>>,
    pub inventory: Arc<InventoryService<S>>,
    pub orchestrator: Arc<SagaOrchestrator<R>>,
}

impl<S: EventStore + Clone + 'static, R: SagaRepository + 'static> AppContext<S, R> {
    /// Wires a context over the given store, saga repository, and
    /// collaborators.
    pub fn with_store(
        store: S,
        repository: Arc<R>,
        payments: Arc<dyn PaymentGateway>,
        shipping: Arc<dyn ShippingProvider>,
        notifications: Arc<dyn NotificationService>,
        config: &AppConfig,
    ) -> Self {
        let orders = Arc::new(OrderService::new(store.clone()));
        let inventory = Arc::new(InventoryService::new(store.clone()));

        let registry = handler_registry(SagaServices {
            orders: Arc::clone(&orders),
            inventory: Arc::clone(&inventory),
            payments,
            shipping,
            notifications,
            reservation_ttl: config.reservation_ttl(),
        });
        let orchestrator = Arc::new(SagaOrchestrator::with_max_concurrent(
            repository,
            Arc::new(registry),
            config.saga_max_concurrent,
        ));

        Self {
            store,
            orders,
            inventory,
            orchestrator,
        }
    }

    /// Stops in-flight sagas and waits for their tasks to finish.
    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
    }
}

impl AppContext<InMemoryEventStore, InMemorySagaRepository> {
    /// Wires a fully in-memory context with fake collaborators.
    pub fn in_memory(config: &AppConfig) -> Self {
        Self::with_store(
            InMemoryEventStore::new(),
            Arc::new(InMemorySagaRepository::new()),
            Arc::new(InMemoryPaymentGateway::new()),
            Arc::new(InMemoryShippingProvider::new()),
            Arc::new(InMemoryNotificationService::new()),
            config,
        )
    }
}

impl AppContext<PostgresEventStore, PostgresSagaRepository> {
    /// Connects to Postgres, runs migrations, and wires a durable context.
    pub async fn connect_postgres(
        config: &AppConfig,
        payments: Arc<dyn PaymentGateway>,
        shipping: Arc<dyn ShippingProvider>,
        notifications: Arc<dyn NotificationService>,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        let store = PostgresEventStore::new(pool.clone());
        store.run_migrations().await?;
        let repository = Arc::new(PostgresSagaRepository::new(pool));

        Ok(Self::with_store(
            store,
            repository,
            payments,
            shipping,
            notifications,
            config,
        ))
    }
}
