use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use stockpick_core::config::Settings;
use stockpick_core::domain::recommendation::ReportTable;
use stockpick_core::export::csv::{to_csv_string, CSV_CONTENT_TYPE, CSV_FILE_NAME};
use stockpick_core::ingest::{PriceProvider, YahooChartProvider};
use stockpick_core::report::{self, ReportOptions, INVALID_CASH_PROMPT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let provider = YahooChartProvider::from_settings(&settings)?;
    let state = AppState {
        provider: Arc::new(provider),
        options: ReportOptions::from_env(),
        currency: settings.currency().to_string(),
    };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/report", get(get_report))
        .route("/report.csv", get(get_report_csv))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    provider: Arc<dyn PriceProvider>,
    options: ReportOptions,
    currency: String,
}

#[derive(Debug, Default, Deserialize)]
struct ReportQuery {
    /// Kept as text so malformed amounts get the same prompt as missing ones.
    cash: Option<String>,
    /// Comma-separated override of the configured ticker list.
    tickers: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiReport {
    report_id: Uuid,
    generated_at: DateTime<Utc>,
    currency: String,
    report: ReportTable,
}

type ApiError = (StatusCode, String);

fn resolve_request(
    defaults: &ReportOptions,
    query: &ReportQuery,
) -> Result<(f64, ReportOptions), ApiError> {
    let cash = query
        .cash
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|c| report::is_valid_cash(*c))
        .ok_or_else(|| (StatusCode::BAD_REQUEST, INVALID_CASH_PROMPT.to_string()))?;

    let mut options = defaults.clone();
    if let Some(s) = query.tickers.as_deref() {
        let tickers = report::parse_tickers(s);
        if tickers.is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                "tickers must list at least one symbol".to_string(),
            ));
        }
        options.tickers = tickers;
    }

    Ok((cash, options))
}

async fn run_report(state: &AppState, query: &ReportQuery) -> Result<ReportTable, ApiError> {
    let (cash, options) = resolve_request(&state.options, query)?;

    report::build_report(state.provider.as_ref(), &options, cash)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "report build failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "report build failed".to_string())
        })
}

async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiReport>, ApiError> {
    let table = run_report(&state, &query).await?;

    Ok(Json(ApiReport {
        report_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        currency: state.currency.clone(),
        report: table,
    }))
}

async fn get_report_csv(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let table = run_report(&state, &query).await?;

    let body = to_csv_string(&table).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        (StatusCode::INTERNAL_SERVER_ERROR, "CSV export failed".to_string())
    })?;

    let headers = [
        (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{CSV_FILE_NAME}\""),
        ),
    ];
    Ok((headers, body))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
