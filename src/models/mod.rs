pub mod movie;
pub mod reservation;
pub mod seat;
pub mod showtime;
pub mod user;

pub use movie::{Movie, MoviePage, MovieQuery, NewMovie, Pagination};
pub use reservation::{NewReservation, ReleaseMode, Reservation, ReservationStatus};
pub use seat::{Grid, SeatCode, SeatCodeError, SeatMap};
pub use showtime::{NewShowtime, Showtime, ShowtimeFilter};
pub use user::{RegisterRequest, Role, User};
