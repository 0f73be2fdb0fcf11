use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::middleware::AdminUser;
use crate::models::{Movie, MovieQuery, NewMovie, ShowtimeFilter};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/{id}", get(get_movie).delete(delete_movie))
}

// GET /api/movies
async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MovieQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(page) = state.cache.get_movie_page(&query).await {
        return Ok(([("X-Cache", "HIT")], Json(page)));
    }

    let page = Movie::search(&query, &state.db).await?;
    state.cache.store_movie_page(&query, &page).await;
    Ok(([("X-Cache", "MISS")], Json(page)))
}

// GET /api/movies/{id}
async fn get_movie(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<Json<Movie>, ApiError> {
    Movie::find(id, &state.db)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("movie {} not found", id)))
}

// POST /api/movies
async fn create_movie(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<NewMovie>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let movie = Movie::insert(&req, &state.db).await?;
    state.cache.invalidate_movies().await;

    tracing::info!("movie {} created by {}", movie.id, admin.email);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "movie created", "movie": movie })),
    ))
}

// DELETE /api/movies/{id}
async fn delete_movie(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let showtimes = state
        .store
        .list_showtimes(&ShowtimeFilter {
            movie_id: Some(id),
            date: None,
        })
        .await?;

    if !Movie::delete(id, &state.db).await? {
        return Err(ApiError::NotFound(format!("movie {} not found", id)));
    }

    state.cache.invalidate_movies().await;
    for showtime in &showtimes {
        state.cache.invalidate_seats(showtime.id).await;
    }

    tracing::info!(
        "movie {} and {} showtimes deleted by {}",
        id,
        showtimes.len(),
        admin.email
    );
    Ok(Json(json!({ "message": "movie and its showtimes deleted" })))
}
