use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::dashboard::{FlightFilter, Summary};
use crate::estimator::{FlightPhase, TrackedFlight, estimate_batch};
use crate::render::{RenderError, render_map_svg, svg_to_png};
use crate::source::{FlightSource, SourceError};

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

#[derive(Clone)]
pub struct AppState {
    pub source: FlightSource,
    pub usvg_options: Arc<usvg::Options<'static>>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Source(#[from] SourceError),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Source(_) | AppError::Render(_) => {
                error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, format!("Error: {}", self)).into_response()
    }
}

/// Query parameters shared by every data endpoint. `status` and `phase` take
/// comma separated lists.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    status: Option<String>,
    phase: Option<String>,
    min_progress: Option<f64>,
    max_progress: Option<f64>,
}

impl FilterParams {
    fn into_filter(self) -> Result<FlightFilter, AppError> {
        let statuses = split_list(self.status.as_deref())
            .map(str::to_string)
            .collect();
        let phases = split_list(self.phase.as_deref())
            .map(|p| p.parse::<FlightPhase>().map_err(AppError::BadRequest))
            .collect::<Result<Vec<_>, _>>()?;

        let defaults = FlightFilter::default();
        let min_progress = self.min_progress.unwrap_or(defaults.min_progress);
        let max_progress = self.max_progress.unwrap_or(defaults.max_progress);
        if min_progress > max_progress || min_progress.is_nan() || max_progress.is_nan() {
            return Err(AppError::BadRequest(format!(
                "invalid progress range [{}, {}]",
                min_progress, max_progress
            )));
        }

        Ok(FlightFilter {
            statuses,
            phases,
            min_progress,
            max_progress,
        })
    }
}

fn split_list(list: Option<&str>) -> impl Iterator<Item = &str> {
    list.into_iter()
        .flat_map(|l| l.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/flights", get(list_flights))
        .route("/api/summary", get(summary))
        .route("/map.svg", get(get_map_svg))
        .route("/map.png", get(get_map_png))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html("<h1>SkyVision</h1><ul><li><a href='/api/flights'>/api/flights</a></li><li><a href='/api/summary'>/api/summary</a></li><li><a href='/map.svg'>/map.svg</a></li><li><a href='/map.png'>/map.png</a></li></ul>")
}

/// One evaluated batch after filtering.
struct Evaluation {
    flights: Vec<TrackedFlight>,
    /// Parsed flights before filtering
    unfiltered_total: usize,
    rejected_rows: usize,
}

/// Fetches the current batch, evaluates it against the wall clock and filters it.
async fn tracked_flights(state: &AppState, params: FilterParams) -> Result<Evaluation, AppError> {
    let filter = params.into_filter()?;

    let start = Instant::now();
    let parsed = state.source.fetch().await?;
    let fetch_duration = start.elapsed();

    let unfiltered_total = parsed.records.len();
    let flights = filter.apply(estimate_batch(parsed.records, Utc::now().timestamp()));
    info!(
        "Displaying {} / {} flights ({} rows rejected): fetch={:?}, total={:?}",
        flights.len(),
        unfiltered_total,
        parsed.rejected,
        fetch_duration,
        start.elapsed()
    );
    Ok(Evaluation {
        flights,
        unfiltered_total,
        rejected_rows: parsed.rejected,
    })
}

async fn list_flights(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Vec<TrackedFlight>>, AppError> {
    Ok(Json(tracked_flights(&state, params).await?.flights))
}

async fn summary(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Summary>, AppError> {
    let evaluation = tracked_flights(&state, params).await?;
    let summary = Summary::from_flights(&evaluation.flights)
        .with_batch_counts(evaluation.unfiltered_total, evaluation.rejected_rows);
    Ok(Json(summary))
}

async fn get_map_svg(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    let flights = tracked_flights(&state, params).await?.flights;
    let svg = render_map_svg(&flights);
    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, NO_CACHE),
        ],
        svg,
    )
        .into_response())
}

async fn get_map_png(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Response, AppError> {
    let flights = tracked_flights(&state, params).await?.flights;

    let render_start = Instant::now();
    let svg = render_map_svg(&flights);
    let png = svg_to_png(&svg, &state.usvg_options)?;
    info!("Rendered map PNG: render_png={:?}", render_start.elapsed());

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, NO_CACHE),
        ],
        png,
    )
        .into_response())
}
