use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use prior_auth::config::AppConfig;
use prior_auth::error::AppError;
use prior_auth::telemetry;
use prior_auth::workflows::authorizations::{
    authorization_router, start_evaluation_workers, AuditEvent, AuditLogger, AuditOutcome,
    AuthorizationWorkflow, CriteriaLibrary, InMemoryAuthorizationRepository, Notifier,
    NotifyError, StatusChangeNotice, WorkflowSettings,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Prior Authorization Workflow Service",
    about = "Run the prior authorization workflow engine from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect clinical criteria rule sets
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Load and validate a criteria rules file
    Check(RulesCheckArgs),
}

#[derive(Args, Debug)]
struct RulesCheckArgs {
    /// Path to the JSON rules file
    #[arg(long)]
    path: PathBuf,
}

/// Notification sink for deployments without a portal adapter; emits the
/// notice into the structured log stream.
#[derive(Default)]
struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: StatusChangeNotice) -> Result<(), NotifyError> {
        info!(
            id = %notice.authorization_id,
            from = notice.old_status.label(),
            to = notice.new_status.label(),
            reason = %notice.reason,
            "status change notification"
        );
        Ok(())
    }
}

/// Audit sink writing the trail through tracing until the compliance log
/// store is wired in.
#[derive(Default)]
struct LogAuditLogger;

impl AuditLogger for LogAuditLogger {
    fn record(&self, event: AuditEvent) {
        match &event.outcome {
            AuditOutcome::Success => info!(
                id = %event.authorization_id,
                action = %event.action,
                actor = %event.actor,
                "audit"
            ),
            AuditOutcome::Failure { cause } => info!(
                id = %event.authorization_id,
                action = %event.action,
                actor = %event.actor,
                %cause,
                "audit failure"
            ),
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Rules {
            command: RulesCommand::Check(args),
        } => run_rules_check(args),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let criteria = match &config.workflow.rules_path {
        Some(path) => CriteriaLibrary::from_path(path)?,
        None => CriteriaLibrary::standard(),
    };
    info!(rule_sets = criteria.len(), "criteria library loaded");

    let settings = WorkflowSettings {
        max_write_retries: config.workflow.max_write_retries,
        evaluation_queue_depth: config.workflow.evaluation_queue_depth,
        ..WorkflowSettings::default()
    };
    let workflow = Arc::new(AuthorizationWorkflow::new(
        Arc::new(InMemoryAuthorizationRepository::new()),
        Arc::new(LogNotifier),
        Arc::new(LogAuditLogger),
        Arc::new(criteria),
        config.workflow.list_cache_ttl(),
        settings,
    ));
    start_evaluation_workers(&workflow, config.workflow.evaluation_workers);

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(authorization_router(workflow))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "prior authorization workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_rules_check(args: RulesCheckArgs) -> Result<(), AppError> {
    let library = CriteriaLibrary::from_path(&args.path)?;
    println!(
        "Rules file {} is valid: {} rule-set key(s) registered",
        args.path.display(),
        library.len()
    );
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
