use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use handoff::api::{create_router, AppState};
use handoff::clock::SystemClock;
use handoff::config::Config;
use handoff::dashboard::{Dashboard, DashboardEvent, HttpResolveClient, ResolveAction};
use handoff::db::{Database, DatabaseBackend, LibSqlBackend};
use handoff::live::HttpSource;

#[derive(Parser)]
#[command(name = "handoff")]
#[command(about = "Human-in-the-loop escalation service and supervisor console")]
struct Args {
    /// Emit logs as JSON lines
    #[arg(long, env = "HANDOFF_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the backend: v1 API plus the timeout sweeper (default)
    Serve,
    /// Run the supervisor console against a backend
    Dashboard {
        /// Overrides HANDOFF_BACKEND_URL
        #[arg(long)]
        backend_url: Option<String>,
    },
    /// Submit one answer and exit
    Resolve {
        request_id: String,
        answer: String,
        /// Overrides HANDOFF_BACKEND_URL
        #[arg(long)]
        backend_url: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "handoff=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing(args.log_json);

    let config = Config::from_env();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Dashboard { backend_url } => {
            let url = backend_url.unwrap_or_else(|| config.dashboard.backend_url.clone());
            run_dashboard(config, &url).await
        }
        Command::Resolve {
            request_id,
            answer,
            backend_url,
        } => {
            let url = backend_url.unwrap_or_else(|| config.dashboard.backend_url.clone());
            let client = HttpResolveClient::new(&url, config.dashboard.submit_timeout())?;
            client.resolve(&request_id, &answer).await?;
            println!("Resolved {request_id}");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Initializing database...");
    let raw_db = Database::new(&config.database).await?;
    let db: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(raw_db));

    let state = AppState::new(config.clone(), db, Arc::new(SystemClock));

    let cancel_token = CancellationToken::new();

    tracing::info!(
        "Starting timeout sweeper... (timeout={}s, interval={}s)",
        config.lifecycle.request_timeout_secs,
        state.sweeper.interval_secs()
    );
    let sweeper = state.sweeper.clone();
    let token = cancel_token.child_token();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Timeout sweeper shutting down...");
                    break;
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_secs(sweeper.interval_secs())) => {
                    if let Err(e) = sweeper.run_once().await {
                        tracing::error!("Timeout sweeper error: {}", e);
                    }
                }
            }
        }
    });

    if config.database.local_path.is_some() {
        let db = state.db.clone();
        let token = cancel_token.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(tokio::time::Duration::from_secs(60)) => {
                        if let Err(e) = db.sync().await {
                            tracing::warn!("Replica sync failed: {}", e);
                        }
                    }
                }
            }
        });
    }

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Handoff starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  API docs:     http://{}/api/v1/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/api/v1/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn run_dashboard(config: Config, backend_url: &str) -> anyhow::Result<()> {
    let submit_timeout = config.dashboard.submit_timeout();
    let source = Arc::new(HttpSource::new(
        backend_url,
        config.dashboard.poll_interval(),
        submit_timeout,
    )?);
    let action: Arc<dyn ResolveAction> =
        Arc::new(HttpResolveClient::new(backend_url, submit_timeout)?);

    tracing::info!(backend = %backend_url, "Connecting dashboard");
    let mut dashboard = Dashboard::open(
        source.clone(),
        source,
        action,
        Arc::new(SystemClock),
        config.lifecycle.request_timeout(),
        handoff::dashboard::DEFAULT_TICK,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_frame = String::new();
    let mut status_line = String::from("Type `<request id> <answer>` and press enter to submit.");

    loop {
        tokio::select! {
            event = dashboard.next_event() => {
                if event == DashboardEvent::Closed {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                status_line = submit_line(&dashboard, &line).await;
            }
            _ = tokio::signal::ctrl_c() => break,
        }

        let frame = format!("{}{}\n", dashboard.render(), status_line);
        if frame != last_frame {
            print!("\x1b[2J\x1b[H{frame}");
            last_frame = frame;
        }
    }

    dashboard.shutdown();
    tracing::info!("Dashboard closed");
    Ok(())
}

async fn submit_line(dashboard: &Dashboard, line: &str) -> String {
    let line = line.trim();
    if line.is_empty() {
        return String::new();
    }
    let (request_id, answer) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    match dashboard.submit(request_id, answer).await {
        Ok(()) => format!("Submitted answer for {request_id}."),
        Err(e) if e.is_user_correctable() => format!("{request_id}: {e}. Edit and resubmit."),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Submission failed");
            format!("Could not submit answer for {request_id}: {e}")
        }
    }
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}
