use crate::{PreferenceStore, StoreConfig};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

static DB_FILE_NAME: &str = "preferences.db";

/// Preferences persisted in a SQLite database.
pub struct SqlitePreferences {
    pool: SqlitePool,
}

impl SqlitePreferences {
    pub async fn new(config: &StoreConfig) -> Result<Self, anyhow::Error> {
        let db = Self {
            pool: config.connect(DB_FILE_NAME).await?,
        };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"create table if not exists preferences (
                    key text primary key,
                    value integer not null
                )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Run a trivial query, to check the database is reachable.
    pub async fn ping(&self) -> Result<(), anyhow::Error> {
        sqlx::query("select 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for SqlitePreferences {
    async fn get(&self, key: &str) -> anyhow::Result<Option<bool>> {
        Ok(sqlx::query(r#"select value from preferences where key = $1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get::<bool, _>("value")))
    }

    async fn set(&self, key: &str, value: bool) -> anyhow::Result<()> {
        log::debug!("Setting preference {key} = {value}");

        sqlx::query(r#"insert or replace into preferences (key, value) values ($1, $2)"#)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::METRICS_OPT_IN;
    use tempdir::TempDir;

    fn memory() -> StoreConfig {
        StoreConfig {
            in_memory: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn absent_by_default() -> Result<(), anyhow::Error> {
        let db = SqlitePreferences::new(&memory()).await?;
        assert_eq!(db.get(METRICS_OPT_IN).await?, None);
        db.ping().await?;
        Ok(())
    }

    #[tokio::test]
    async fn replace_value() -> Result<(), anyhow::Error> {
        let db = SqlitePreferences::new(&memory()).await?;

        db.set(METRICS_OPT_IN, false).await?;
        assert_eq!(db.get(METRICS_OPT_IN).await?, Some(false));

        db.set(METRICS_OPT_IN, true).await?;
        assert_eq!(db.get(METRICS_OPT_IN).await?, Some(true));

        db.set("other", false).await?;
        assert_eq!(db.get(METRICS_OPT_IN).await?, Some(true));
        assert_eq!(db.get("other").await?, Some(false));

        Ok(())
    }

    #[tokio::test]
    async fn survives_reopen() -> Result<(), anyhow::Error> {
        let dir = TempDir::new("preferences")?;
        let config = StoreConfig {
            data_dir: dir.path().to_path_buf(),
            in_memory: false,
        };

        {
            let db = SqlitePreferences::new(&config).await?;
            db.set(METRICS_OPT_IN, true).await?;
            db.pool.close().await;
        }

        let db = SqlitePreferences::new(&config).await?;
        assert_eq!(db.get(METRICS_OPT_IN).await?, Some(true));

        Ok(())
    }
}
