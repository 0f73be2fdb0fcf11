use crate::cache::CacheService;
use crate::models::SeatMap;

fn seats_key(showtime_id: i64) -> String {
    format!("seats:{}", showtime_id)
}

impl CacheService {
    pub async fn get_seats(&self, showtime_id: i64) -> Option<SeatMap> {
        self.get_json(&seats_key(showtime_id)).await
    }

    pub async fn store_seats(&self, showtime_id: i64, seat_map: &SeatMap) {
        self.set_json(&seats_key(showtime_id), seat_map, self.seats_ttl).await
    }

    /// Must follow every committed seat-map change.
    pub async fn invalidate_seats(&self, showtime_id: i64) {
        self.delete(&seats_key(showtime_id)).await
    }
}
