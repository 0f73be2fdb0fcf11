pub mod error;
pub mod movies;
pub mod reservations;
pub mod showtimes;
pub mod users;

pub use error::ApiError;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(users::routes())
        .merge(movies::routes())
        .merge(showtimes::routes())
        .merge(reservations::routes())
}
