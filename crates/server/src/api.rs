use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use finsight_core::date_range::DateRange;
use finsight_core::transaction::{Flow, Transaction};
use finsight_reports::scheduler::render_all;
use finsight_reports::{markup, FanOutSummary};
use finsight_store::insights::{self, CategoryCount, InsightSummary, MonthComparison};
use finsight_store::{ingest, SortOrder};

use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: e.to_string() }),
    )
}

fn bad_request(e: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: e.to_string() }),
    )
}

#[derive(Deserialize)]
pub struct RangeParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub order: Option<String>,
}

fn parse_range(
    state: &AppState,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<DateRange, ApiError> {
    let start = start.unwrap_or(&state.config.reports.default_range_start);
    let end = end.unwrap_or(&state.config.reports.default_range_end);
    DateRange::parse(start, end).map_err(bad_request)
}

// ── Health ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ── Transactions ──────────────────────────────────────────────

pub async fn transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let range = parse_range(&state, params.start.as_deref(), params.end.as_deref())?;
    let order = match params.order.as_deref() {
        Some("asc") | Some("ASC") => SortOrder::Asc,
        _ => SortOrder::Desc,
    };
    let rows = state
        .ledger
        .fetch_range(&range, order)
        .await
        .map_err(internal_error)?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct CategoryUpdate {
    pub c1: Option<String>,
    pub c2: Option<String>,
    pub c3: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateResponse {
    pub updated: bool,
}

pub async fn update_categories(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
    Json(update): Json<CategoryUpdate>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let matched = state
        .ledger
        .update_categories(
            &transaction_id,
            update.c1.as_deref(),
            update.c2.as_deref(),
            update.c3.as_deref(),
        )
        .await
        .map_err(internal_error)?;
    if !matched {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no transaction with id {}", transaction_id),
            }),
        ));
    }
    // Source data changed; every cached render may be stale.
    state.cache.invalidate_all().await.map_err(internal_error)?;
    Ok(Json(UpdateResponse { updated: true }))
}

// ── Reports & visuals ─────────────────────────────────────────

pub async fn reports_list(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.coordinator.catalog().all_display_ids())
}

#[derive(Serialize)]
pub struct Visual {
    pub display_id: String,
    pub markup: String,
}

#[derive(Serialize)]
pub struct VisualsResponse {
    /// Vector markup embedded inline in the page.
    pub vectors: Vec<Visual>,
    /// Complete standalone documents, shown in iframes.
    pub documents: Vec<Visual>,
}

async fn collect_visuals(state: &AppState) -> VisualsResponse {
    let mut vectors = Vec::new();
    let mut documents = Vec::new();
    for display_id in state.coordinator.catalog().all_display_ids() {
        if let Some(artifact) = state.cache.latest(&display_id).await {
            let visual = Visual { display_id, markup: artifact };
            if markup::is_html_document(&visual.markup) {
                documents.push(visual);
            } else {
                vectors.push(visual);
            }
        }
    }
    VisualsResponse { vectors, documents }
}

pub async fn visuals(State(state): State<Arc<AppState>>) -> Json<VisualsResponse> {
    Json(collect_visuals(&state).await)
}

#[derive(Deserialize)]
pub struct RedrawRequest {
    pub start: Option<String>,
    pub end: Option<String>,
    /// Display ids to render; everything in the catalog when omitted.
    pub reports: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct RedrawResponse {
    pub summary: FanOutSummary,
    pub visuals: VisualsResponse,
}

pub async fn visuals_redraw(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RedrawRequest>,
) -> Result<Json<RedrawResponse>, ApiError> {
    let range = parse_range(&state, request.start.as_deref(), request.end.as_deref())?;
    let all_ids = state.coordinator.catalog().all_display_ids();
    let display_ids: Vec<String> = match &request.reports {
        Some(requested) => all_ids
            .into_iter()
            .filter(|id| requested.contains(id))
            .collect(),
        None => all_ids,
    };

    let transactions = state
        .ledger
        .fetch_range(&range, SortOrder::Asc)
        .await
        .map_err(internal_error)?;
    let geo_points = state
        .ledger
        .heatmap_points(&range)
        .await
        .map_err(internal_error)?;

    let summary = render_all(
        Arc::clone(&state.coordinator),
        &display_ids,
        transactions,
        geo_points,
        range,
        state.config.reports.max_render_tasks,
    )
    .await;

    Ok(Json(RedrawResponse {
        summary,
        visuals: collect_visuals(&state).await,
    }))
}

// ── Insights ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct InsightsResponse {
    pub summary: Option<InsightSummary>,
    pub top_income_categories: Vec<CategoryCount>,
    pub top_expense_categories: Vec<CategoryCount>,
    pub month_over_month: MonthComparison,
}

const TOP_CATEGORIES_N: u32 = 5;

pub async fn insights(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<InsightsResponse>, ApiError> {
    let range = parse_range(&state, params.start.as_deref(), params.end.as_deref())?;
    let summary = insights::summary(&state.pool, &range)
        .await
        .map_err(internal_error)?;
    let top_income_categories =
        insights::top_categories(&state.pool, &range, Flow::Income, TOP_CATEGORIES_N)
            .await
            .map_err(internal_error)?;
    let top_expense_categories =
        insights::top_categories(&state.pool, &range, Flow::Expense, TOP_CATEGORIES_N)
            .await
            .map_err(internal_error)?;
    let month_over_month = insights::month_over_month(&state.pool, Local::now().date_naive())
        .await
        .map_err(internal_error)?;
    Ok(Json(InsightsResponse {
        summary,
        top_income_categories,
        top_expense_categories,
        month_over_month,
    }))
}

// ── Data mutation (every path invalidates the artifact cache) ─

#[derive(Serialize)]
pub struct UploadResponse {
    pub transactions: usize,
    pub locations: usize,
    pub payment_meta: usize,
    pub cache_cleared: u64,
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<UploadResponse>, ApiError> {
    let batch = ingest::parse_csv(&body).map_err(bad_request)?;
    state.ledger.merge(&batch).await.map_err(internal_error)?;
    let cache_cleared = state.cache.invalidate_all().await.map_err(internal_error)?;
    info!("Upload merged {} transactions", batch.transactions.len());
    Ok(Json(UploadResponse {
        transactions: batch.transactions.len(),
        locations: batch.locations.len(),
        payment_meta: batch.payment_meta.len(),
        cache_cleared,
    }))
}

#[derive(Serialize)]
pub struct TruncateResponse {
    pub truncated: bool,
    pub cache_cleared: u64,
}

pub async fn truncate_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TruncateResponse>, ApiError> {
    state.ledger.truncate_all().await.map_err(internal_error)?;
    let cache_cleared = state.cache.invalidate_all().await.map_err(internal_error)?;
    Ok(Json(TruncateResponse { truncated: true, cache_cleared }))
}

// ── Cache management ──────────────────────────────────────────

#[derive(Serialize)]
pub struct CacheStatus {
    pub entries: i64,
}

pub async fn cache_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CacheStatus>, ApiError> {
    let entries = state.cache.count().await.map_err(internal_error)?;
    Ok(Json(CacheStatus { entries }))
}

#[derive(Serialize)]
pub struct CacheCleared {
    pub cleared: u64,
}

pub async fn cache_clear(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CacheCleared>, ApiError> {
    let cleared = state.cache.invalidate_all().await.map_err(internal_error)?;
    Ok(Json(CacheCleared { cleared }))
}
