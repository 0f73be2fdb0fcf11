use crate::cache::CacheService;
use crate::models::{MoviePage, MovieQuery};

impl CacheService {
    pub async fn get_movie_page(&self, query: &MovieQuery) -> Option<MoviePage> {
        self.get_json(&query.cache_key()).await
    }

    pub async fn store_movie_page(&self, query: &MovieQuery, page: &MoviePage) {
        self.set_json(&query.cache_key(), page, self.movies_ttl).await
    }

    // listings are keyed per query, so any catalog change drops all of them
    pub async fn invalidate_movies(&self) {
        self.delete_matching("movies:*").await
    }
}
