use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use super::ApiError;
use crate::middleware::AdminUser;
use crate::models::seat::{DEFAULT_ROWS, DEFAULT_SEATS_PER_ROW};
use crate::models::showtime::clock_time;
use crate::models::{Grid, Movie, NewShowtime, SeatMap, Showtime, ShowtimeFilter};
use crate::store::ShowtimeStore;
use crate::AppState;

const DEFAULT_PRICE: u32 = 25;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtimes", get(list_showtimes).post(create_showtime))
        .route("/showtimes/movie/{movie_id}", get(list_for_movie))
        .route("/showtimes/{id}", get(get_showtime).delete(delete_showtime))
        .route("/showtimes/{id}/seats", get(get_seats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShowtimeRequest {
    pub movie_id: i64,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub time: NaiveTime,
    pub price: Option<u32>,
    pub rows: Option<u8>,
    pub seats_per_row: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct ShowtimeDetail {
    #[serde(flatten)]
    pub showtime: Showtime,
    pub movie: Option<Movie>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatsResponse {
    pub showtime_id: i64,
    #[serde(flatten)]
    pub seat_map: SeatMap,
    pub available: usize,
}

// GET /api/showtimes?movieId=&date=
async fn list_showtimes(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ShowtimeFilter>,
) -> Result<Json<Vec<Showtime>>, ApiError> {
    Ok(Json(state.store.list_showtimes(&filter).await?))
}

// GET /api/showtimes/movie/{movie_id}
async fn list_for_movie(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let showtimes = state
        .store
        .list_showtimes(&ShowtimeFilter {
            movie_id: Some(movie_id),
            date: None,
        })
        .await?;
    Ok(Json(json!({ "showtimes": showtimes })))
}

// GET /api/showtimes/{id}
async fn get_showtime(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ShowtimeDetail>, ApiError> {
    let showtime = state.store.get_showtime(id).await?;
    let movie = Movie::find(showtime.movie_id, &state.db).await?;
    Ok(Json(ShowtimeDetail { showtime, movie }))
}

// GET /api/showtimes/{id}/seats
async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let (seat_map, cache_status) = match state.cache.get_seats(id).await {
        Some(seat_map) => (seat_map, "HIT"),
        None => {
            let showtime = state.store.get_showtime(id).await?;
            state.cache.store_seats(id, &showtime.seat_map).await;
            (showtime.seat_map, "MISS")
        }
    };

    Ok((
        [("X-Cache", cache_status)],
        Json(SeatsResponse {
            showtime_id: id,
            available: seat_map.available_count(),
            seat_map,
        }),
    ))
}

// POST /api/showtimes
async fn create_showtime(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateShowtimeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let grid = Grid::new(
        req.rows.unwrap_or(DEFAULT_ROWS),
        req.seats_per_row.unwrap_or(DEFAULT_SEATS_PER_ROW),
    )
    .ok_or_else(|| ApiError::BadRequest("hall must have 1 to 26 rows and at least one seat per row".into()))?;

    if Movie::find(req.movie_id, &state.db).await?.is_none() {
        return Err(ApiError::NotFound(format!("movie {} not found", req.movie_id)));
    }

    let showtime = state
        .store
        .create_showtime(&NewShowtime {
            movie_id: req.movie_id,
            date: req.date,
            time: req.time,
            price: req.price.unwrap_or(DEFAULT_PRICE),
            grid,
        })
        .await?;

    tracing::info!(
        "showtime {} for movie {} scheduled by {}",
        showtime.id,
        showtime.movie_id,
        admin.email
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "showtime created", "showtime": showtime })),
    ))
}

// DELETE /api/showtimes/{id}
async fn delete_showtime(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_showtime(id).await?;
    state.cache.invalidate_seats(id).await;

    tracing::info!("showtime {} deleted by {}", id, admin.email);
    Ok(Json(json!({ "message": "showtime deleted" })))
}
