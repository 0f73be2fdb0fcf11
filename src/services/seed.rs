use chrono::{Days, NaiveTime, Utc};
use tracing::info;

use crate::config::SeedConfig;
use crate::database::Database;
use crate::models::{Grid, Movie, NewMovie, NewShowtime, RegisterRequest, Role, User};
use crate::services::auth::Credentials;
use crate::store::{SqliteStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] crate::services::auth::AuthError),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub movies: usize,
    pub showtimes: usize,
    pub admin_created: bool,
}

// (title, director, minutes, genres, release date)
const CATALOG: &[(&str, &str, u32, &[&str], &str)] = &[
    ("Dune: Part Two", "Denis Villeneuve", 166, &["Sci-Fi", "Adventure"], "2024-03-01"),
    ("Oppenheimer", "Christopher Nolan", 180, &["Biography", "Drama"], "2023-07-21"),
    ("The Batman", "Matt Reeves", 176, &["Action", "Crime"], "2022-03-04"),
    ("Barbie", "Greta Gerwig", 114, &["Comedy", "Fantasy"], "2023-07-21"),
    ("Killers of the Flower Moon", "Martin Scorsese", 206, &["Crime", "Drama"], "2023-10-20"),
];

const SCREENING_HOURS: &[u32] = &[14, 18, 21];
const DEFAULT_PRICE: u32 = 25;

/// Fills an empty database with a demo catalog and an admin account.
/// A database that already holds movies is left alone, apart from the
/// admin account which is created when missing.
pub async fn seed_demo_data(
    db: &Database,
    store: &SqliteStore,
    credentials: &Credentials,
    config: &SeedConfig,
) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    if User::find_by_email(&config.admin_email, db).await?.is_none() {
        let hash = credentials.hash_password(&config.admin_password).await?;
        let admin = RegisterRequest {
            first_name: "Admin".into(),
            last_name: "System".into(),
            email: config.admin_email.clone(),
            password: config.admin_password.clone(),
        };
        User::insert(&admin, &hash, Role::Admin, db).await?;
        report.admin_created = true;
        info!("Seeded admin account {}", config.admin_email);
    }

    if Movie::count(db).await? > 0 {
        info!("Catalog already present, skipping demo movies");
        return Ok(report);
    }

    let tomorrow = Utc::now().date_naive() + Days::new(1);
    for &(title, director, duration, genres, released) in CATALOG {
        let movie = Movie::insert(
            &NewMovie {
                title: title.into(),
                description: String::new(),
                duration,
                genres: genres.iter().map(|g| g.to_string()).collect(),
                director: director.into(),
                poster_url: String::new(),
                trailer_url: None,
                release_date: Some(released.into()),
            },
            db,
        )
        .await?;
        report.movies += 1;

        for &hour in SCREENING_HOURS {
            let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else {
                continue;
            };
            store
                .create_showtime(&NewShowtime {
                    movie_id: movie.id,
                    date: tomorrow,
                    time,
                    price: DEFAULT_PRICE,
                    grid: Grid::default(),
                })
                .await?;
            report.showtimes += 1;
        }
    }

    info!(
        "Seeded {} movies with {} showtimes",
        report.movies, report.showtimes
    );
    Ok(report)
}
