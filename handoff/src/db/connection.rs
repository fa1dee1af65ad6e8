use libsql::{Builder, Connection};
use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::Result;

use super::schema;

/// SQLite pragmas applied to every freshly opened database.
#[derive(Debug, Clone)]
struct Pragmas {
    busy_timeout_ms: u64,
    journal_mode: &'static str,
    synchronous: &'static str,
}

impl Pragmas {
    fn from_env() -> Self {
        let busy_timeout_ms = std::env::var("DATABASE_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5000);
        let journal_mode = normalize_journal_mode(
            &std::env::var("DATABASE_JOURNAL_MODE").unwrap_or_else(|_| "WAL".to_string()),
        );
        let synchronous = normalize_synchronous(
            &std::env::var("DATABASE_SYNCHRONOUS").unwrap_or_else(|_| "NORMAL".to_string()),
        );

        Self {
            busy_timeout_ms,
            journal_mode,
            synchronous,
        }
    }

    /// Per-connection settings. SQLite forgets these when a connection closes.
    fn connection_statements(&self) -> [(&'static str, String); 2] {
        [
            (
                "busy_timeout",
                format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms),
            ),
            (
                "synchronous",
                format!("PRAGMA synchronous = {}", self.synchronous),
            ),
        ]
    }

    fn journal_statement(&self) -> String {
        format!("PRAGMA journal_mode = {}", self.journal_mode)
    }
}

/// Handle to the libsql database holding help requests and learned answers.
#[derive(Clone)]
pub struct Database {
    pub(crate) db: Arc<libsql::Database>,
    pragmas: Pragmas,
    local: bool,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let db = open(config).await?;

        let database = Self {
            db: Arc::new(db),
            pragmas: Pragmas::from_env(),
            local: is_local(&config.url) || config.local_path.is_some(),
        };
        database.configure().await;
        database.init_schema().await?;

        Ok(database)
    }

    /// Opens a connection with the busy timeout and synchronous mode applied,
    /// so overlapping writers wait for the lock instead of failing.
    pub async fn connect(&self) -> Result<Connection> {
        let conn = self.db.connect()?;
        if self.local {
            for (name, sql) in self.pragmas.connection_statements() {
                if let Err(error) = conn.execute_batch(&sql).await {
                    tracing::warn!(pragma = name, error = %error, "Failed to apply SQLite pragma");
                }
            }
        }
        Ok(conn)
    }

    /// Journal mode is stored in the database file, so it is set once.
    /// Remote databases reject it; the failure is only logged.
    async fn configure(&self) {
        if !self.local {
            return;
        }
        let conn = match self.connect().await {
            Ok(conn) => conn,
            Err(error) => {
                tracing::warn!(error = %error, "Could not open connection to apply pragmas");
                return;
            }
        };

        if let Err(error) = conn.execute_batch(&self.pragmas.journal_statement()).await {
            tracing::warn!(pragma = "journal_mode", error = %error, "Failed to apply SQLite pragma");
        }
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.connect().await?;
        schema::init_schema(&conn).await
    }

    /// Cheap round trip used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.connect().await?;
        let mut rows = conn.query("SELECT 1", ()).await?;
        rows.next().await?;
        Ok(())
    }

    pub async fn sync(&self) -> Result<()> {
        if let Ok(sync) = self.db.sync().await {
            tracing::info!("Database synced: {:?}", sync);
        }
        Ok(())
    }
}

fn is_local(url: &str) -> bool {
    !(url.starts_with("libsql://") || url.starts_with("https://"))
}

async fn open(config: &DatabaseConfig) -> Result<libsql::Database> {
    let url = config.url.as_str();
    let token = config.auth_token.clone().unwrap_or_default();

    let db = if !is_local(url) {
        match config.local_path {
            Some(ref local_path) => {
                Builder::new_remote_replica(local_path, url.to_string(), token)
                    .build()
                    .await?
            }
            None => Builder::new_remote(url.to_string(), token).build().await?,
        }
    } else if url == ":memory:" {
        Builder::new_local(":memory:").build().await?
    } else {
        let path = url.strip_prefix("file:").unwrap_or(url);
        Builder::new_local(path).build().await?
    };

    Ok(db)
}

fn normalize_journal_mode(value: &str) -> &'static str {
    match value.trim().to_uppercase().as_str() {
        "DELETE" => "DELETE",
        "TRUNCATE" => "TRUNCATE",
        "PERSIST" => "PERSIST",
        "MEMORY" => "MEMORY",
        "OFF" => "OFF",
        _ => "WAL",
    }
}

fn normalize_synchronous(value: &str) -> &'static str {
    match value.trim().to_uppercase().as_str() {
        "OFF" => "OFF",
        "FULL" => "FULL",
        "EXTRA" => "EXTRA",
        _ => "NORMAL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_pragma_values_fall_back() {
        assert_eq!(normalize_journal_mode("wal"), "WAL");
        assert_eq!(normalize_journal_mode("bogus"), "WAL");
        assert_eq!(normalize_synchronous(" full "), "FULL");
        assert_eq!(normalize_synchronous(""), "NORMAL");
    }

    #[tokio::test]
    async fn test_file_database_initializes_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("handoff.db");
        let config = DatabaseConfig {
            url: format!("file:{}", path.display()),
            auth_token: None,
            local_path: None,
        };

        let db = Database::new(&config).await.unwrap();
        db.ping().await.unwrap();

        let conn = db.connect().await.unwrap();
        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                (),
            )
            .await
            .unwrap();
        let mut tables = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            tables.push(row.get::<String>(0).unwrap());
        }
        assert!(tables.contains(&"help_requests".to_string()));
        assert!(tables.contains(&"knowledge_base".to_string()));
    }

    #[tokio::test]
    async fn test_every_connection_gets_busy_timeout() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("file:{}", dir.path().join("pragmas.db").display()),
            auth_token: None,
            local_path: None,
        };
        let db = Database::new(&config).await.unwrap();
        let expected = Pragmas::from_env().busy_timeout_ms as i64;

        for _ in 0..2 {
            let conn = db.connect().await.unwrap();
            let mut rows = conn.query("PRAGMA busy_timeout", ()).await.unwrap();
            let row = rows.next().await.unwrap().unwrap();
            assert_eq!(row.get::<i64>(0).unwrap(), expected);
        }
    }
}
