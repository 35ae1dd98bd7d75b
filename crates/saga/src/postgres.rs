use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::CorrelationId;

use crate::error::{Result, SagaError};
use crate::instance::{SagaId, SagaInstance, SagaKind};
use crate::repository::{SagaRepository, SagaStatistics};
use crate::state::SagaStatus;
use crate::step::SagaStep;

const SAGA_COLUMNS: &str = "saga_id, kind, status, correlation_id, context, steps, \
     current_step_index, error_message, started_at, updated_at";

/// PostgreSQL-backed saga repository.
///
/// One row per saga; the step plan travels inside the row as JSONB and the
/// whole row is rewritten on every save.
#[derive(Clone)]
pub struct PostgresSagaRepository {
    pool: PgPool,
}

impl PostgresSagaRepository {
    /// Creates a new PostgreSQL saga repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_saga(row: PgRow) -> Result<SagaInstance> {
        let kind: SagaKind = row
            .try_get::<String, _>("kind")?
            .parse()
            .map_err(SagaError::Repository)?;
        let status: SagaStatus = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(SagaError::Repository)?;
        let steps: Vec<SagaStep> = serde_json::from_value(row.try_get("steps")?)?;

        Ok(SagaInstance {
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            kind,
            status,
            correlation_id: CorrelationId::from_string(
                row.try_get::<String, _>("correlation_id")?,
            ),
            context: row.try_get("context")?,
            steps,
            current_step_index: row.try_get::<i32, _>("current_step_index")? as usize,
            error_message: row.try_get("error_message")?,
            started_at: row.try_get("started_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn list_with_statuses(&self, statuses: &[SagaStatus]) -> Result<Vec<SagaInstance>> {
        let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM saga_instances WHERE status = ANY($1) ORDER BY started_at ASC",
        ))
        .bind(&names)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_saga).collect()
    }
}

#[async_trait]
impl SagaRepository for PostgresSagaRepository {
    async fn save(&self, saga: &SagaInstance) -> Result<()> {
        let steps_json = serde_json::to_value(&saga.steps)?;

        sqlx::query(
            r#"
            INSERT INTO saga_instances
                (saga_id, kind, status, correlation_id, context, steps,
                 current_step_index, error_message, started_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (saga_id) DO UPDATE SET
                status = EXCLUDED.status,
                context = EXCLUDED.context,
                steps = EXCLUDED.steps,
                current_step_index = EXCLUDED.current_step_index,
                error_message = EXCLUDED.error_message,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(saga.saga_id.as_uuid())
        .bind(saga.kind.as_str())
        .bind(saga.status.as_str())
        .bind(saga.correlation_id.as_str())
        .bind(&saga.context)
        .bind(steps_json)
        .bind(saga.current_step_index as i32)
        .bind(&saga.error_message)
        .bind(saga.started_at)
        .bind(saga.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, saga_id: SagaId) -> Result<Option<SagaInstance>> {
        let row = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM saga_instances WHERE saga_id = $1",
        ))
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_saga).transpose()
    }

    async fn find_by_correlation(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Vec<SagaInstance>> {
        let rows = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM saga_instances WHERE correlation_id = $1 ORDER BY started_at ASC",
        ))
        .bind(correlation_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_saga).collect()
    }

    async fn list_running(&self) -> Result<Vec<SagaInstance>> {
        self.list_with_statuses(&[SagaStatus::Running, SagaStatus::Compensating])
            .await
    }

    async fn list_failed(&self) -> Result<Vec<SagaInstance>> {
        self.list_with_statuses(&[
            SagaStatus::Failed,
            SagaStatus::Compensating,
            SagaStatus::CompensationFailed,
        ])
        .await
    }

    async fn statistics(&self) -> Result<SagaStatistics> {
        let mut stats = SagaStatistics::default();

        let by_status =
            sqlx::query("SELECT status, COUNT(*) AS count FROM saga_instances GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        for row in by_status {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            stats.total += count as u64;
            stats.by_status.insert(status, count as u64);
        }

        let by_kind =
            sqlx::query("SELECT kind, COUNT(*) AS count FROM saga_instances GROUP BY kind")
                .fetch_all(&self.pool)
                .await?;
        for row in by_kind {
            let kind: String = row.try_get("kind")?;
            let count: i64 = row.try_get("count")?;
            stats.by_kind.insert(kind, count as u64);
        }

        Ok(stats)
    }

    async fn delete(&self, saga_id: SagaId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saga_instances WHERE saga_id = $1")
            .bind(saga_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
