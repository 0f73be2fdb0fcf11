use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use validator::Validate;

use crate::database::Database;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Running time in minutes.
    pub duration: u32,
    pub genres: Vec<String>,
    pub director: String,
    pub poster_url: String,
    pub trailer_url: Option<String>,
    pub release_date: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewMovie {
    #[validate(length(min = 1, max = 200, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, max = 1000, message = "duration must be between 1 and 1000 minutes"))]
    pub duration: u32,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub poster_url: String,
    #[validate(url)]
    pub trailer_url: Option<String>,
    pub release_date: Option<String>,
}

// Genres live in a JSON text column
#[derive(FromRow)]
pub(crate) struct MovieRow {
    id: i64,
    title: String,
    description: String,
    duration: i64,
    genres: String,
    director: String,
    poster_url: String,
    trailer_url: Option<String>,
    release_date: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovieRow> for Movie {
    type Error = sqlx::Error;

    fn try_from(row: MovieRow) -> Result<Self, Self::Error> {
        let genres: Vec<String> =
            serde_json::from_str(&row.genres).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let duration = u32::try_from(row.duration).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Movie {
            id: row.id,
            title: row.title,
            description: row.description,
            duration,
            genres,
            director: row.director,
            poster_url: row.poster_url,
            trailer_url: row.trailer_url,
            release_date: row.release_date,
            created_at: row.created_at,
        })
    }
}

/// Listing parameters of `GET /api/movies`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Substring of the title or of any genre.
    pub search: Option<String>,
    pub genre: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl MovieQuery {
    pub const DEFAULT_LIMIT: u32 = 100;

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 500)
    }

    // unknown columns fall back to creation time
    fn sort_column(&self) -> &'static str {
        match self.sort_by.as_deref() {
            Some("title") => "title",
            Some("duration") => "duration",
            Some("releaseDate") => "release_date",
            Some("director") => "director",
            _ => "created_at",
        }
    }

    fn descending(&self) -> bool {
        !matches!(self.order.as_deref(), Some(o) if o.eq_ignore_ascii_case("asc"))
    }

    /// Cache key for this exact listing.
    pub fn cache_key(&self) -> String {
        format!(
            "movies:p={}&l={}&q={}&g={}&s={}&d={}",
            self.page(),
            self.limit(),
            self.search.as_deref().unwrap_or_default(),
            self.genre.as_deref().unwrap_or_default(),
            self.sort_column(),
            self.descending()
        )
    }

    fn push_filters<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            qb.push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR genres LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(genre) = self.genre.as_deref().filter(|g| !g.is_empty()) {
            qb.push(" AND genres LIKE ").push_bind(format!("%{}%", genre));
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_items: i64,
    pub total_pages: i64,
    pub current_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoviePage {
    pub movies: Vec<Movie>,
    pub pagination: Pagination,
}

pub(crate) const MOVIE_COLUMNS: &str =
    "id, title, description, duration, genres, director, poster_url, trailer_url, release_date, created_at";

impl Movie {
    pub async fn find(id: i64, db: &Database) -> Result<Option<Movie>, sqlx::Error> {
        let row = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&db.pool)
        .await?;

        row.map(Movie::try_from).transpose()
    }

    pub async fn insert(new: &NewMovie, db: &Database) -> Result<Movie, sqlx::Error> {
        let genres = serde_json::to_string(&new.genres).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let row = sqlx::query_as::<_, MovieRow>(&format!(
            "INSERT INTO movies (title, description, duration, genres, director, poster_url, trailer_url, release_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {MOVIE_COLUMNS}"
        ))
        .bind(&new.title)
        .bind(&new.description)
        .bind(i64::from(new.duration))
        .bind(genres)
        .bind(&new.director)
        .bind(&new.poster_url)
        .bind(&new.trailer_url)
        .bind(&new.release_date)
        .bind(Utc::now())
        .fetch_one(&db.pool)
        .await?;

        Movie::try_from(row)
    }

    pub async fn search(query: &MovieQuery, db: &Database) -> Result<MoviePage, sqlx::Error> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM movies");
        query.push_filters(&mut count);
        let total_items: i64 = count.build_query_scalar().fetch_one(&db.pool).await?;

        let limit = query.limit();
        let offset = i64::from(query.page() - 1) * i64::from(limit);

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {MOVIE_COLUMNS} FROM movies"));
        query.push_filters(&mut select);
        select
            .push(format!(
                " ORDER BY {} {}, id",
                query.sort_column(),
                if query.descending() { "DESC" } else { "ASC" }
            ))
            .push(" LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(offset);

        let movies = select
            .build_query_as::<MovieRow>()
            .fetch_all(&db.pool)
            .await?
            .into_iter()
            .map(Movie::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let limit = i64::from(limit);
        Ok(MoviePage {
            movies,
            pagination: Pagination {
                total_items,
                total_pages: (total_items + limit - 1) / limit,
                current_page: query.page(),
            },
        })
    }

    /// Removes the movie together with its showtimes. Returns false when no
    /// such movie exists.
    pub async fn delete(id: i64, db: &Database) -> Result<bool, sqlx::Error> {
        let mut tx = db.pool.begin().await?;
        sqlx::query("DELETE FROM showtimes WHERE movie_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }

    pub async fn count(db: &Database) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM movies")
            .fetch_one(&db.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_movie_requires_title_and_duration() {
        let movie: NewMovie = serde_json::from_value(serde_json::json!({
            "title": "",
            "duration": 0
        }))
        .unwrap();

        let errors = movie.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("duration"));
    }

    #[test]
    fn trailer_must_be_a_url() {
        let movie: NewMovie = serde_json::from_value(serde_json::json!({
            "title": "Dune",
            "duration": 155,
            "genres": ["Sci-Fi"],
            "trailerUrl": "not a url"
        }))
        .unwrap();

        assert!(movie.validate().unwrap_err().field_errors().contains_key("trailer_url"));
    }

    fn titled(title: &str, genres: &[&str]) -> NewMovie {
        NewMovie {
            title: title.into(),
            description: String::new(),
            duration: 120,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            director: String::new(),
            poster_url: String::new(),
            trailer_url: None,
            release_date: None,
        }
    }

    #[tokio::test]
    async fn search_filters_sorts_and_pages() {
        let db = Database::in_memory().await.unwrap();
        for (title, genres) in [
            ("Dune", vec!["Sci-Fi", "Adventure"]),
            ("Barbie", vec!["Comedy"]),
            ("Arrival", vec!["Sci-Fi", "Drama"]),
        ] {
            Movie::insert(&titled(title, &genres), &db).await.unwrap();
        }

        let sci_fi = Movie::search(
            &MovieQuery {
                genre: Some("Sci-Fi".into()),
                sort_by: Some("title".into()),
                order: Some("asc".into()),
                ..MovieQuery::default()
            },
            &db,
        )
        .await
        .unwrap();
        let titles: Vec<_> = sci_fi.movies.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Arrival", "Dune"]);
        assert_eq!(sci_fi.pagination.total_items, 2);

        let paged = Movie::search(
            &MovieQuery {
                page: Some(2),
                limit: Some(2),
                sort_by: Some("title".into()),
                order: Some("ASC".into()),
                ..MovieQuery::default()
            },
            &db,
        )
        .await
        .unwrap();
        assert_eq!(paged.movies.len(), 1);
        assert_eq!(paged.movies[0].title, "Dune");
        assert_eq!(paged.pagination.total_pages, 2);

        let by_search = Movie::search(
            &MovieQuery {
                search: Some("comedy".into()),
                ..MovieQuery::default()
            },
            &db,
        )
        .await
        .unwrap();
        assert_eq!(by_search.movies[0].title, "Barbie");
    }

    #[tokio::test]
    async fn delete_reports_missing_movies() {
        let db = Database::in_memory().await.unwrap();
        let movie = Movie::insert(&titled("Oppenheimer", &["Drama"]), &db).await.unwrap();

        assert!(Movie::delete(movie.id, &db).await.unwrap());
        assert!(!Movie::delete(movie.id, &db).await.unwrap());
        assert_eq!(Movie::count(&db).await.unwrap(), 0);
    }
}
