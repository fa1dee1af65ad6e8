// Common test utilities for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use tempfile::TempDir;

use handoff::api::{create_router, AppState};
use handoff::clock::Clock;
use handoff::config::{Config, DashboardConfig, DatabaseConfig, LifecycleConfig, ServerConfig};
use handoff::db::{Database, DatabaseBackend, LibSqlBackend};

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub const WAIT: Duration = Duration::from_secs(10);

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_allowed_origins: Vec::new(),
        },
        database: DatabaseConfig {
            url: format!("file:{}", dir.path().join("handoff.db").display()),
            auth_token: None,
            local_path: None,
        },
        lifecycle: LifecycleConfig::default(),
        dashboard: DashboardConfig::default(),
    }
}

/// Backend state over a fresh file database.
pub async fn backend(clock: Arc<dyn Clock>) -> (AppState, TempDir) {
    init_test_logger();
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);
    let raw_db = Database::new(&config.database).await.expect("database");
    let db: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(raw_db));
    (AppState::new(config, db, clock), dir)
}

/// Serves the v1 API on an ephemeral port and returns its base URL.
pub async fn spawn_server(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = create_router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

// Re-export commonly used crates for convenience
pub use serial_test::serial;
pub use tempfile;
pub use wiremock;
