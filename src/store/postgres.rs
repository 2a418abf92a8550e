use super::{fingerprint, InsightStore};
use crate::error::AggregatorError;
use crate::models::{AuditRecord, PromptInference, RawDocument};
use crate::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

pub struct PostgresInsightStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

fn db_error(context: &str) -> impl Fn(sqlx::Error) -> AggregatorError + '_ {
    move |e| AggregatorError::PersistenceFailure(format!("{}: {}", context, e))
}

impl PostgresInsightStore {
    /// Pool is created now; connections open on first use
    pub fn connect_lazy(url: &str) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(5).connect_lazy(url)?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        let pool = &self.pool;

        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS ticker_inferences (
                      ticker TEXT PRIMARY KEY,
                      stock_performance TEXT NOT NULL,
                      financial_health TEXT NOT NULL,
                      news_summary TEXT NOT NULL,
                      company_desc TEXT NOT NULL,
                      technical_analysis TEXT NOT NULL,
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS raw_documents (
                      fingerprint TEXT PRIMARY KEY,
                      category TEXT NOT NULL,
                      ticker TEXT NOT NULL,
                      result TEXT NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS audit_records (
                      audit_id UUID PRIMARY KEY,
                      ticker TEXT NOT NULL,
                      recorded_at TIMESTAMPTZ NOT NULL,
                      execution_time_ms BIGINT NOT NULL,
                      request_ip TEXT NOT NULL,
                      event_sequence TEXT[] NOT NULL
                    );
                    "#,
                )
                .execute(pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(db_error("Failed to initialize insight store schema"))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl InsightStore for PostgresInsightStore {
    async fn upsert_inference(&self, inference: &PromptInference) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO ticker_inferences
              (ticker, stock_performance, financial_health, news_summary, company_desc, technical_analysis, updated_at)
            VALUES
              ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (ticker) DO UPDATE SET
              stock_performance = EXCLUDED.stock_performance,
              financial_health = EXCLUDED.financial_health,
              news_summary = EXCLUDED.news_summary,
              company_desc = EXCLUDED.company_desc,
              technical_analysis = EXCLUDED.technical_analysis,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&inference.ticker)
        .bind(&inference.stock_performance)
        .bind(&inference.financial_health)
        .bind(&inference.news_summary)
        .bind(&inference.company_desc)
        .bind(&inference.technical_analysis)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to upsert ticker inference"))?;

        Ok(())
    }

    async fn find_inference(&self, ticker: &str) -> Result<Option<PromptInference>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT ticker, stock_performance, financial_health, news_summary, company_desc, technical_analysis
            FROM ticker_inferences
            WHERE ticker = $1
            "#,
        )
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load ticker inference"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(PromptInference {
            ticker: row.try_get("ticker").unwrap_or_else(|_| ticker.to_string()),
            stock_performance: row.try_get("stock_performance").unwrap_or_default(),
            financial_health: row.try_get("financial_health").unwrap_or_default(),
            news_summary: row.try_get("news_summary").unwrap_or_default(),
            company_desc: row.try_get("company_desc").unwrap_or_default(),
            technical_analysis: row.try_get("technical_analysis").unwrap_or_default(),
        }))
    }

    async fn insert_raw_if_absent(&self, doc: &RawDocument) -> Result<bool> {
        self.ensure_schema().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO raw_documents (fingerprint, category, ticker, result)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (fingerprint) DO NOTHING
            "#,
        )
        .bind(fingerprint(&doc.output))
        .bind(doc.category.tag())
        .bind(&doc.ticker)
        .bind(&doc.output.result)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert raw document"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_audit(&self, record: &AuditRecord) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO audit_records
              (audit_id, ticker, recorded_at, execution_time_ms, request_ip, event_sequence)
            VALUES
              ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.audit_id)
        .bind(&record.ticker)
        .bind(record.timestamp)
        .bind(i64::try_from(record.execution_time_ms).unwrap_or(i64::MAX))
        .bind(&record.request_ip)
        .bind(&record.event_sequence)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert audit record"))?;

        Ok(())
    }

    async fn close(&self) {
        info!("Closing insight store pool");
        self.pool.close().await;
    }
}
