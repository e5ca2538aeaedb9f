use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::{
    DefinitionId, DefinitionQuery, EventId, EventQuery, JsonObject, Result, SagaDefinition,
    SagaEvent, SagaId, SagaQuery, SagaStatistics, SagaStatus, SagaStep, SagaTransaction,
    SagaTransition, SagaType, StepId, StepStatus, StoreError,
    model::StepTemplate,
    store::SagaStore,
};

const DEFINITION_COLUMNS: &str = "id, name, saga_type, description, steps, timeout_seconds, \
     max_retries, retry_delay_seconds, version, is_active, created_at, updated_at";

const SAGA_COLUMNS: &str = "id, saga_type, status, user_id, correlation_id, input_data, \
     context_data, result_data, created_at, updated_at, started_at, completed_at, timeout_at, \
     retry_count, max_retries, retry_delay_seconds, error_message";

const STEP_COLUMNS: &str = "id, saga_id, step_name, step_type, step_order, status, service_name, \
     service_endpoint, http_method, request_data, response_data, compensation_service, \
     compensation_endpoint, compensation_method, compensation_data, created_at, started_at, \
     completed_at, failed_at, error_message, retry_count, max_retries";

const EVENT_COLUMNS: &str = "seq, id, saga_id, step_id, event_type, payload, message, created_at";

/// PostgreSQL-backed saga store.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn get_u32(row: &PgRow, column: &str) -> Result<u32> {
        let value: i32 = row.try_get(column)?;
        u32::try_from(value)
            .map_err(|_| StoreError::Corrupt(format!("negative value {value} in {column}")))
    }

    fn get_parsed<T>(row: &PgRow, column: &str) -> Result<T>
    where
        T: std::str::FromStr<Err = StoreError>,
    {
        row.try_get::<String, _>(column)?.parse()
    }

    fn row_to_definition(row: PgRow) -> Result<SagaDefinition> {
        let steps: Json<Vec<StepTemplate>> = row.try_get("steps")?;
        Ok(SagaDefinition {
            id: DefinitionId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            saga_type: Self::get_parsed(&row, "saga_type")?,
            description: row.try_get("description")?,
            steps: steps.0,
            timeout_seconds: Self::get_u32(&row, "timeout_seconds")?,
            max_retries: Self::get_u32(&row, "max_retries")?,
            retry_delay_seconds: Self::get_u32(&row, "retry_delay_seconds")?,
            version: row.try_get("version")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_saga(row: PgRow) -> Result<SagaTransaction> {
        let input: Json<JsonObject> = row.try_get("input_data")?;
        let context: Json<JsonObject> = row.try_get("context_data")?;
        Ok(SagaTransaction {
            id: SagaId::from_uuid(row.try_get::<Uuid, _>("id")?),
            saga_type: Self::get_parsed(&row, "saga_type")?,
            status: Self::get_parsed(&row, "status")?,
            user_id: row.try_get("user_id")?,
            correlation_id: row.try_get("correlation_id")?,
            input_data: input.0,
            context_data: context.0,
            result_data: row.try_get("result_data")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            timeout_at: row.try_get("timeout_at")?,
            retry_count: Self::get_u32(&row, "retry_count")?,
            max_retries: Self::get_u32(&row, "max_retries")?,
            retry_delay_seconds: Self::get_u32(&row, "retry_delay_seconds")?,
            error_message: row.try_get("error_message")?,
        })
    }

    fn row_to_step(row: PgRow) -> Result<SagaStep> {
        Ok(SagaStep {
            id: StepId::from_uuid(row.try_get::<Uuid, _>("id")?),
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            step_name: row.try_get("step_name")?,
            step_type: Self::get_parsed(&row, "step_type")?,
            step_order: Self::get_u32(&row, "step_order")?,
            status: Self::get_parsed(&row, "status")?,
            service_name: row.try_get("service_name")?,
            service_endpoint: row.try_get("service_endpoint")?,
            http_method: Self::get_parsed(&row, "http_method")?,
            request_data: row.try_get("request_data")?,
            response_data: row.try_get("response_data")?,
            compensation_service: row.try_get("compensation_service")?,
            compensation_endpoint: row.try_get("compensation_endpoint")?,
            compensation_method: Self::get_parsed(&row, "compensation_method")?,
            compensation_data: row.try_get("compensation_data")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            failed_at: row.try_get("failed_at")?,
            error_message: row.try_get("error_message")?,
            retry_count: Self::get_u32(&row, "retry_count")?,
            max_retries: Self::get_u32(&row, "max_retries")?,
        })
    }

    fn row_to_event(row: PgRow) -> Result<SagaEvent> {
        Ok(SagaEvent {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            step_id: row.try_get::<Option<Uuid>, _>("step_id")?.map(StepId::from_uuid),
            event_type: Self::get_parsed(&row, "event_type")?,
            payload: row.try_get("payload")?,
            message: row.try_get("message")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn saga_exists(&self, id: SagaId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM saga_transactions WHERE id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn step_exists(&self, id: StepId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM saga_steps WHERE id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Appends the WHERE clause for a saga query, returning the number of parameters used.
    fn push_saga_filters(sql: &mut String, query: &SagaQuery) -> usize {
        let mut param_count = 0;
        sql.push_str(" WHERE 1=1");
        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.saga_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND saga_type = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        param_count
    }
}

fn i32_of(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    #[tracing::instrument(skip(self, definition), fields(name = %definition.name))]
    async fn save_definition(&self, definition: SagaDefinition) -> Result<SagaDefinition> {
        let mut tx = self.pool.begin().await?;

        if definition.is_active {
            sqlx::query(
                "UPDATE saga_definitions SET is_active = FALSE, updated_at = NOW() \
                 WHERE saga_type = $1 AND is_active",
            )
            .bind(definition.saga_type.as_str())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO saga_definitions (id, name, saga_type, description, steps, timeout_seconds,
                max_retries, retry_delay_seconds, version, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(definition.id.as_uuid())
        .bind(&definition.name)
        .bind(definition.saga_type.as_str())
        .bind(&definition.description)
        .bind(Json(&definition.steps))
        .bind(i32_of(definition.timeout_seconds))
        .bind(i32_of(definition.max_retries))
        .bind(i32_of(definition.retry_delay_seconds))
        .bind(&definition.version)
        .bind(definition.is_active)
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_definition_version")
            {
                return StoreError::DuplicateDefinition {
                    name: definition.name.clone(),
                    version: definition.version.clone(),
                };
            }
            StoreError::Database(e)
        })?;

        tx.commit().await?;
        Ok(definition)
    }

    async fn get_definition(&self, id: DefinitionId) -> Result<Option<SagaDefinition>> {
        let row = sqlx::query(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM saga_definitions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_definition).transpose()
    }

    async fn active_definition(&self, saga_type: SagaType) -> Result<Option<SagaDefinition>> {
        let row = sqlx::query(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM saga_definitions WHERE saga_type = $1 AND is_active"
        ))
        .bind(saga_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_definition).transpose()
    }

    async fn list_definitions(&self, query: DefinitionQuery) -> Result<Vec<SagaDefinition>> {
        let mut sql = format!("SELECT {DEFINITION_COLUMNS} FROM saga_definitions WHERE 1=1");
        let mut param_count = 0;
        if query.saga_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND saga_type = ${param_count}"));
        }
        if query.is_active.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND is_active = ${param_count}"));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(saga_type) = query.saga_type {
            sqlx_query = sqlx_query.bind(saga_type.as_str());
        }
        if let Some(is_active) = query.is_active {
            sqlx_query = sqlx_query.bind(is_active);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_definition).collect()
    }

    #[tracing::instrument(skip(self, saga, steps, event), fields(saga_id = %saga.id))]
    async fn create_saga(
        &self,
        saga: SagaTransaction,
        steps: Vec<SagaStep>,
        event: SagaEvent,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO saga_transactions (id, saga_type, status, user_id, correlation_id,
                input_data, context_data, result_data, created_at, updated_at, started_at,
                completed_at, timeout_at, retry_count, max_retries, retry_delay_seconds, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(saga.id.as_uuid())
        .bind(saga.saga_type.as_str())
        .bind(saga.status.as_str())
        .bind(saga.user_id)
        .bind(&saga.correlation_id)
        .bind(Json(&saga.input_data))
        .bind(Json(&saga.context_data))
        .bind(&saga.result_data)
        .bind(saga.created_at)
        .bind(saga.updated_at)
        .bind(saga.started_at)
        .bind(saga.completed_at)
        .bind(saga.timeout_at)
        .bind(i32_of(saga.retry_count))
        .bind(i32_of(saga.max_retries))
        .bind(i32_of(saga.retry_delay_seconds))
        .bind(&saga.error_message)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_correlation_id")
            {
                return StoreError::DuplicateCorrelationId(saga.correlation_id.clone());
            }
            StoreError::Database(e)
        })?;

        for step in &steps {
            sqlx::query(&format!(
                "INSERT INTO saga_steps ({STEP_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
                 $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)"
            ))
            .bind(step.id.as_uuid())
            .bind(step.saga_id.as_uuid())
            .bind(&step.step_name)
            .bind(step.step_type.as_str())
            .bind(i32_of(step.step_order))
            .bind(step.status.as_str())
            .bind(&step.service_name)
            .bind(&step.service_endpoint)
            .bind(step.http_method.as_str())
            .bind(&step.request_data)
            .bind(&step.response_data)
            .bind(&step.compensation_service)
            .bind(&step.compensation_endpoint)
            .bind(step.compensation_method.as_str())
            .bind(&step.compensation_data)
            .bind(step.created_at)
            .bind(step.started_at)
            .bind(step.completed_at)
            .bind(step.failed_at)
            .bind(&step.error_message)
            .bind(i32_of(step.retry_count))
            .bind(i32_of(step.max_retries))
            .execute(&mut *tx)
            .await?;
        }

        insert_event(&mut *tx, &event).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_saga(&self, id: SagaId) -> Result<Option<SagaTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM saga_transactions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_saga).transpose()
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<SagaTransaction>> {
        let row = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM saga_transactions WHERE correlation_id = $1"
        ))
        .bind(correlation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_saga).transpose()
    }

    async fn list_sagas(&self, query: SagaQuery) -> Result<Vec<SagaTransaction>> {
        let mut sql = format!("SELECT {SAGA_COLUMNS} FROM saga_transactions");
        let mut param_count = Self::push_saga_filters(&mut sql, &query);
        sql.push_str(" ORDER BY created_at DESC");
        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id);
        }
        if let Some(saga_type) = query.saga_type {
            sqlx_query = sqlx_query.bind(saga_type.as_str());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_saga).collect()
    }

    async fn count_sagas(&self, query: SagaQuery) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM saga_transactions");
        Self::push_saga_filters(&mut sql, &query);

        let mut sqlx_query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id);
        }
        if let Some(saga_type) = query.saga_type {
            sqlx_query = sqlx_query.bind(saga_type.as_str());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }

        let count = sqlx_query.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn transition_saga(
        &self,
        id: SagaId,
        transition: SagaTransition,
    ) -> Result<Option<SagaTransaction>> {
        let from: Vec<String> = transition.from.iter().map(|s| s.as_str().to_string()).collect();

        let row = sqlx::query(&format!(
            r#"
            UPDATE saga_transactions SET
                status = $2,
                updated_at = NOW(),
                started_at = CASE WHEN $2 = 'in_progress' THEN COALESCE(started_at, NOW()) ELSE started_at END,
                completed_at = CASE WHEN $3 THEN NOW() WHEN $2 = 'pending' THEN NULL ELSE completed_at END,
                error_message = CASE WHEN $4::TEXT IS NOT NULL THEN $4 WHEN $5 THEN NULL ELSE error_message END,
                result_data = COALESCE($6, result_data),
                retry_count = retry_count + CASE WHEN $7 THEN 1 ELSE 0 END,
                timeout_at = COALESCE($9, timeout_at)
            WHERE id = $1 AND status = ANY($8)
            RETURNING {SAGA_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(transition.to.as_str())
        .bind(transition.to.is_terminal())
        .bind(&transition.error_message)
        .bind(transition.clear_error)
        .bind(&transition.result_data)
        .bind(transition.increment_retry)
        .bind(from)
        .bind(transition.timeout_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_saga(row).map(Some),
            None if self.saga_exists(id).await? => Ok(None),
            None => Err(StoreError::SagaNotFound(id)),
        }
    }

    async fn merge_context(&self, id: SagaId, patch: JsonObject) -> Result<SagaTransaction> {
        let row = sqlx::query(&format!(
            "UPDATE saga_transactions SET context_data = context_data || $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {SAGA_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(Json(&patch))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_saga)
            .transpose()?
            .ok_or(StoreError::SagaNotFound(id))
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<SagaTransaction>> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE saga_transactions SET
                status = 'timeout',
                updated_at = $1,
                completed_at = $1,
                error_message = 'Saga timed out'
            WHERE status IN ('pending', 'in_progress') AND timeout_at < $1
            RETURNING {SAGA_COLUMNS}
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_saga).collect()
    }

    async fn statistics(&self) -> Result<SagaStatistics> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM saga_transactions GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = SagaStatistics::default();
        for row in rows {
            let status: SagaStatus = Self::get_parsed(&row, "status")?;
            let count: i64 = row.try_get("count")?;
            stats.record(status, count.max(0) as u64);
        }
        Ok(stats)
    }

    async fn steps_for_saga(&self, saga_id: SagaId) -> Result<Vec<SagaStep>> {
        let rows = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM saga_steps WHERE saga_id = $1 ORDER BY step_order ASC"
        ))
        .bind(saga_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_step).collect()
    }

    async fn get_step(&self, id: StepId) -> Result<Option<SagaStep>> {
        let row = sqlx::query(&format!("SELECT {STEP_COLUMNS} FROM saga_steps WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_step).transpose()
    }

    async fn update_step(&self, step: &SagaStep) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE saga_steps SET
                status = $2,
                request_data = $3,
                response_data = $4,
                started_at = $5,
                completed_at = $6,
                failed_at = $7,
                error_message = $8,
                retry_count = $9,
                max_retries = $10
            WHERE id = $1
            "#,
        )
        .bind(step.id.as_uuid())
        .bind(step.status.as_str())
        .bind(&step.request_data)
        .bind(&step.response_data)
        .bind(step.started_at)
        .bind(step.completed_at)
        .bind(step.failed_at)
        .bind(&step.error_message)
        .bind(i32_of(step.retry_count))
        .bind(i32_of(step.max_retries))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StepNotFound(step.id));
        }
        Ok(())
    }

    async fn claim_step_for_retry(&self, id: StepId) -> Result<Option<SagaStep>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE saga_steps SET
                status = 'pending',
                retry_count = retry_count + 1,
                error_message = NULL
            WHERE id = $1 AND status = 'failed' AND retry_count < max_retries
            RETURNING {STEP_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_step(row).map(Some),
            None if self.step_exists(id).await? => Ok(None),
            None => Err(StoreError::StepNotFound(id)),
        }
    }

    async fn retryable_steps(&self, now: DateTime<Utc>) -> Result<Vec<SagaStep>> {
        let rows = sqlx::query(
            r#"
            SELECT s.* FROM saga_steps s
            JOIN saga_transactions t ON t.id = s.saga_id
            WHERE s.status = 'failed'
              AND s.retry_count < s.max_retries
              AND t.status = 'in_progress'
              AND (s.failed_at IS NULL
                   OR s.failed_at + make_interval(secs => t.retry_delay_seconds) <= $1)
            ORDER BY s.failed_at ASC NULLS FIRST, s.step_order ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_step).collect()
    }

    async fn reset_steps(&self, saga_id: SagaId, from: &[StepStatus]) -> Result<u64> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE saga_steps SET
                status = 'pending',
                error_message = NULL,
                started_at = NULL,
                completed_at = NULL,
                failed_at = NULL
            WHERE saga_id = $1 AND status = ANY($2)
            "#,
        )
        .bind(saga_id.as_uuid())
        .bind(from)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn append_event(&self, event: SagaEvent) -> Result<()> {
        insert_event(&self.pool, &event).await
    }

    async fn events_for_saga(&self, saga_id: SagaId) -> Result<Vec<SagaEvent>> {
        self.query_events(EventQuery::for_saga(saga_id)).await
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<SagaEvent>> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM saga_events WHERE 1=1");
        let mut param_count = 0;
        if query.saga_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND saga_id = ${param_count}"));
        }
        if query.event_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ${param_count}"));
        }

        // The most recent N, still returned oldest first.
        if query.limit.is_some() {
            param_count += 1;
            sql = format!(
                "SELECT * FROM ({sql} ORDER BY seq DESC LIMIT ${param_count}) latest ORDER BY seq ASC"
            );
        } else {
            sql.push_str(" ORDER BY seq ASC");
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(saga_id) = query.saga_id {
            sqlx_query = sqlx_query.bind(saga_id.as_uuid());
        }
        if let Some(event_type) = query.event_type {
            sqlx_query = sqlx_query.bind(event_type.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }
}

async fn insert_event<'e, E>(executor: E, event: &SagaEvent) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO saga_events (id, saga_id, step_id, event_type, payload, message, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event.id.as_uuid())
    .bind(event.saga_id.as_uuid())
    .bind(event.step_id.map(|id| id.as_uuid()))
    .bind(event.event_type.as_str())
    .bind(&event.payload)
    .bind(&event.message)
    .bind(event.created_at)
    .execute(executor)
    .await?;
    Ok(())
}
