//! PostgreSQL saga repository integration tests
//!
//! These tests share a single PostgreSQL container and truncate the
//! saga_instances table between tests, so they are marked `#[serial]`.

use std::sync::Arc;

use chrono::Duration;
use common::CorrelationId;
use saga::{
    PostgresSagaRepository, SagaId, SagaInstance, SagaKind, SagaRepository, SagaStatus, StepStatus,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/002_create_saga_instances_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh repository with its own pool and a cleared table
async fn get_test_repository() -> PostgresSagaRepository {
    let info = get_container_info().await;

    // Create a fresh pool for each test to avoid connection issues
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE saga_instances")
        .execute(&pool)
        .await
        .unwrap();

    PostgresSagaRepository::new(pool)
}

fn fulfillment_saga(correlation: &str) -> SagaInstance {
    SagaInstance::new(
        SagaKind::OrderFulfillment,
        CorrelationId::from_string(correlation),
        serde_json::json!({"order_id": "o-1", "amount_cents": 2500}),
    )
}

fn saga_with_status(kind: SagaKind, correlation: &str, status: SagaStatus) -> SagaInstance {
    let mut saga = SagaInstance::new(
        kind,
        CorrelationId::from_string(correlation),
        serde_json::Value::Null,
    );
    saga.status = status;
    saga
}

#[tokio::test]
#[serial]
async fn save_and_get_round_trip() {
    let repo = get_test_repository().await;
    let saga = fulfillment_saga("order-1");

    repo.save(&saga).await.unwrap();

    let fetched = repo.get(saga.saga_id).await.unwrap().unwrap();
    assert_eq!(fetched.saga_id, saga.saga_id);
    assert_eq!(fetched.kind, SagaKind::OrderFulfillment);
    assert_eq!(fetched.status, SagaStatus::Running);
    assert_eq!(fetched.correlation_id, saga.correlation_id);
    assert_eq!(fetched.context, saga.context);
    assert_eq!(fetched.current_step_index, 0);
    assert!(fetched.error_message.is_none());

    // The step plan travels inside the row as JSONB and survives intact
    assert_eq!(fetched.steps, saga.steps);
}

#[tokio::test]
#[serial]
async fn get_missing_saga_returns_none() {
    let repo = get_test_repository().await;
    assert!(repo.get(SagaId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn save_upserts_the_whole_row() {
    let repo = get_test_repository().await;
    let mut saga = fulfillment_saga("order-2");
    repo.save(&saga).await.unwrap();

    if let Some(step) = saga.current_step_mut() {
        step.mark_running();
        step.mark_completed(serde_json::json!({"payment_id": "PAY-0001"}));
    }
    saga.advance();
    saga.append_error("shipment window missed");
    saga.mark_compensating();
    repo.save(&saga).await.unwrap();

    let fetched = repo.get(saga.saga_id).await.unwrap().unwrap();
    assert_eq!(fetched.status, SagaStatus::Compensating);
    assert_eq!(fetched.current_step_index, 1);
    assert_eq!(fetched.steps[0].status, StepStatus::Completed);
    assert_eq!(
        fetched.steps[0].output.as_ref().unwrap()["payment_id"],
        serde_json::json!("PAY-0001")
    );
    assert_eq!(
        fetched.error_message.as_deref(),
        Some("shipment window missed")
    );

    // Still one row
    let stats = repo.statistics().await.unwrap();
    assert_eq!(stats.total, 1);
}

#[tokio::test]
#[serial]
async fn find_by_correlation_returns_sagas_in_start_order() {
    let repo = get_test_repository().await;

    let mut fulfillment = fulfillment_saga("order-3");
    fulfillment.started_at -= Duration::seconds(5);
    fulfillment.status = SagaStatus::Completed;
    repo.save(&fulfillment).await.unwrap();

    let cancellation = saga_with_status(SagaKind::OrderCancellation, "order-3", SagaStatus::Running);
    repo.save(&cancellation).await.unwrap();

    let unrelated = fulfillment_saga("order-4");
    repo.save(&unrelated).await.unwrap();

    let found = repo
        .find_by_correlation(&CorrelationId::from_string("order-3"))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].saga_id, fulfillment.saga_id);
    assert_eq!(found[0].kind, SagaKind::OrderFulfillment);
    assert_eq!(found[1].saga_id, cancellation.saga_id);
    assert_eq!(found[1].kind, SagaKind::OrderCancellation);
}

#[tokio::test]
#[serial]
async fn listings_split_active_from_needing_attention() {
    let repo = get_test_repository().await;

    let running = saga_with_status(SagaKind::OrderFulfillment, "o-r", SagaStatus::Running);
    let compensating =
        saga_with_status(SagaKind::OrderFulfillment, "o-cg", SagaStatus::Compensating);
    let completed = saga_with_status(SagaKind::OrderFulfillment, "o-ok", SagaStatus::Completed);
    let failed = saga_with_status(SagaKind::OrderCancellation, "o-f", SagaStatus::Failed);
    let compensated =
        saga_with_status(SagaKind::OrderFulfillment, "o-cd", SagaStatus::Compensated);
    let stuck = saga_with_status(
        SagaKind::OrderCancellation,
        "o-s",
        SagaStatus::CompensationFailed,
    );
    for saga in [&running, &compensating, &completed, &failed, &compensated, &stuck] {
        repo.save(saga).await.unwrap();
    }

    let active: Vec<SagaId> = repo
        .list_running()
        .await
        .unwrap()
        .into_iter()
        .map(|saga| saga.saga_id)
        .collect();
    assert_eq!(active.len(), 2);
    assert!(active.contains(&running.saga_id));
    assert!(active.contains(&compensating.saga_id));

    // A cleanly compensated saga is a resolved outcome, not an operator problem
    let attention: Vec<SagaId> = repo
        .list_failed()
        .await
        .unwrap()
        .into_iter()
        .map(|saga| saga.saga_id)
        .collect();
    assert_eq!(attention.len(), 3);
    assert!(attention.contains(&failed.saga_id));
    assert!(attention.contains(&compensating.saga_id));
    assert!(attention.contains(&stuck.saga_id));
    assert!(!attention.contains(&compensated.saga_id));
}

#[tokio::test]
#[serial]
async fn statistics_group_by_status_and_kind() {
    let repo = get_test_repository().await;

    for status in [
        SagaStatus::Completed,
        SagaStatus::Completed,
        SagaStatus::Failed,
    ] {
        repo.save(&saga_with_status(SagaKind::OrderFulfillment, "o-x", status))
            .await
            .unwrap();
    }
    repo.save(&saga_with_status(
        SagaKind::OrderCancellation,
        "o-y",
        SagaStatus::Running,
    ))
    .await
    .unwrap();

    let stats = repo.statistics().await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.count_for_status("COMPLETED"), 2);
    assert_eq!(stats.count_for_status("FAILED"), 1);
    assert_eq!(stats.count_for_status("RUNNING"), 1);
    assert_eq!(stats.count_for_kind("order_fulfillment"), 3);
    assert_eq!(stats.count_for_kind("order_cancellation"), 1);
}

#[tokio::test]
#[serial]
async fn delete_reports_whether_the_row_existed() {
    let repo = get_test_repository().await;
    let saga = fulfillment_saga("order-5");
    repo.save(&saga).await.unwrap();

    assert!(repo.delete(saga.saga_id).await.unwrap());
    assert!(repo.get(saga.saga_id).await.unwrap().is_none());
    assert!(!repo.delete(saga.saga_id).await.unwrap());
}
