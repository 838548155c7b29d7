use super::{DeferredEvent, DeferredEventStore};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use walletmetrics_analytics::TrackedEvent;
use walletmetrics_preferences::StoreConfig;

static DB_FILE_NAME: &str = "deferred.db";

/// Deferred events persisted in a SQLite database.
///
/// Events are stored as JSON, ordered by an auto-incremented id.
pub struct SqliteDeferredStore {
    pool: SqlitePool,
}

impl SqliteDeferredStore {
    pub async fn new(config: &StoreConfig) -> Result<Self, anyhow::Error> {
        let db = Self {
            pool: config.connect(DB_FILE_NAME).await?,
        };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"create table if not exists deferred_events (
                    id integer primary key autoincrement,
                    event text not null
                )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn decode(row: &SqliteRow) -> Result<DeferredEvent, anyhow::Error> {
    let id = row.get::<i64, _>("id");
    let event = serde_json::from_str(row.get::<&str, _>("event"))
        .with_context(|| format!("Failed to decode deferred event {id}"))?;
    Ok(DeferredEvent { id, event })
}

#[async_trait]
impl DeferredEventStore for SqliteDeferredStore {
    async fn enqueue(&self, event: TrackedEvent) -> anyhow::Result<()> {
        let json = serde_json::to_string(&event)?;

        sqlx::query(r#"insert into deferred_events (event) values ($1)"#)
            .bind(json)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn pending(&self) -> anyhow::Result<Vec<DeferredEvent>> {
        sqlx::query(r#"select id, event from deferred_events order by id"#)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(decode)
            .collect()
    }

    async fn acknowledge(&self, id: i64) -> anyhow::Result<()> {
        sqlx::query(r#"delete from deferred_events where id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn len(&self) -> anyhow::Result<usize> {
        let count = sqlx::query(r#"select count(*) as count from deferred_events"#)
            .fetch_one(&self.pool)
            .await?
            .get::<i64, _>("count");

        Ok(count as usize)
    }
}
