use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::ApiError;
use crate::middleware::AuthUser;
use crate::models::{Movie, Reservation, Showtime};
use crate::store::{ReservationStore, ShowtimeStore, StoreError};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", post(create_reservation))
        .route("/reservations/my", get(my_reservations))
        .route(
            "/reservations/{id}",
            get(get_reservation).delete(cancel_reservation),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    pub showtime_id: i64,
    #[serde(default)]
    pub seats: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReservationDetail {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub showtime: Option<Showtime>,
    pub movie: Option<Movie>,
}

// POST /api/reservations
async fn create_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateReservationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reservation = state
        .ledger
        .commit_reservation(req.showtime_id, user.user_id, req.seats.as_slice())
        .await?;
    state.cache.invalidate_seats(req.showtime_id).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "reservation confirmed", "reservation": reservation })),
    ))
}

// GET /api/reservations/my
async fn my_reservations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<ReservationDetail>>, ApiError> {
    let reservations = state.store.list_reservations_for_user(user.user_id).await?;

    let mut showtimes: HashMap<i64, Option<Showtime>> = HashMap::new();
    let mut movies: HashMap<i64, Option<Movie>> = HashMap::new();
    let mut details = Vec::with_capacity(reservations.len());

    for reservation in reservations {
        let showtime = match showtimes.get(&reservation.showtime_id) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = match state.store.get_showtime(reservation.showtime_id).await {
                    Ok(showtime) => Some(showtime),
                    Err(StoreError::NotFound { .. }) => None,
                    Err(e) => return Err(e.into()),
                };
                showtimes.insert(reservation.showtime_id, fetched.clone());
                fetched
            }
        };

        let movie = match &showtime {
            Some(showtime) => match movies.get(&showtime.movie_id) {
                Some(cached) => cached.clone(),
                None => {
                    let fetched = Movie::find(showtime.movie_id, &state.db).await?;
                    movies.insert(showtime.movie_id, fetched.clone());
                    fetched
                }
            },
            None => None,
        };

        details.push(ReservationDetail {
            reservation,
            showtime,
            movie,
        });
    }

    Ok(Json(details))
}

/// Someone else's reservation looks exactly like a missing one.
async fn owned_reservation(state: &AppState, user: &AuthUser, id: i64) -> Result<Reservation, ApiError> {
    match state.store.get_reservation(id).await {
        Ok(reservation) if reservation.user_id == user.user_id => Ok(reservation),
        Ok(_) | Err(StoreError::NotFound { .. }) => {
            Err(ApiError::NotFound(format!("reservation {} not found", id)))
        }
        Err(e) => Err(e.into()),
    }
}

// GET /api/reservations/{id}
async fn get_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ReservationDetail>, ApiError> {
    let reservation = owned_reservation(&state, &user, id).await?;

    let showtime = match state.store.get_showtime(reservation.showtime_id).await {
        Ok(showtime) => Some(showtime),
        Err(StoreError::NotFound { .. }) => None,
        Err(e) => return Err(e.into()),
    };
    let movie = match &showtime {
        Some(showtime) => Movie::find(showtime.movie_id, &state.db).await?,
        None => None,
    };

    Ok(Json(ReservationDetail {
        reservation,
        showtime,
        movie,
    }))
}

// DELETE /api/reservations/{id}
async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let owned = owned_reservation(&state, &user, id).await?;

    let released = state.ledger.release_reservation(owned.id).await?;
    state.cache.invalidate_seats(released.showtime_id).await;

    Ok(Json(json!({
        "message": "reservation cancelled, seats released",
        "reservation": released,
    })))
}
