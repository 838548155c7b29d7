use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_DATA_DIR: &str = ".walletmetrics";

/// Where the local stores keep their data.
#[derive(Clone, Debug, clap::Args)]
#[command(rename_all_env = "SCREAMING_SNAKE_CASE", next_help_heading = "Local storage")]
pub struct StoreConfig {
    /// Directory holding the preference and deferred event databases
    #[arg(long, env, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Keep everything in memory, nothing survives a restart
    #[arg(long, env)]
    pub in_memory: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.into(),
            in_memory: false,
        }
    }
}

impl StoreConfig {
    /// Connect to the database file `name` inside the data directory.
    pub async fn connect(&self, name: &str) -> anyhow::Result<SqlitePool> {
        if self.in_memory {
            return connect_memory().await;
        }

        std::fs::create_dir_all(&self.data_dir)?;
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::default()
                .filename(self.data_dir.join(name))
                .create_if_missing(true),
        )
        .await?;

        Ok(pool)
    }
}

/// Connect to a private in-memory database.
///
/// Every connection to `:memory:` opens a new database, so the pool is limited to a single
/// connection which is never recycled.
async fn connect_memory() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(SqliteConnectOptions::from_str(":memory:")?)
        .await?;

    Ok(pool)
}
